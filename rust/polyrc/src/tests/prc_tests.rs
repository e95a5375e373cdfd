use std::any::Any;
use std::cell::Cell;
use std::mem::size_of;

use polyrc_testkit::{InstanceCounter, MemoryGuard};

use crate::{Prc, Rc, cast, make_prc};

trait Shape: Any {
    fn area(&self) -> u32;
}

crate::impl_downcast!(dyn Shape);

#[derive(Debug, PartialEq)]
struct Square {
    side: u32,
}

impl Shape for Square {
    fn area(&self) -> u32 {
        self.side * self.side
    }
}

#[derive(Debug)]
struct Circle {
    radius: u32,
}

impl Shape for Circle {
    fn area(&self) -> u32 {
        3 * self.radius * self.radius
    }
}

struct Labeled {
    label: &'static str,
    square: Square,
    seen: Cell<u32>,
}

impl Shape for Labeled {
    fn area(&self) -> u32 {
        self.square.area()
    }
}

crate::impl_upcast!(Square => dyn Shape);
crate::impl_upcast!(Circle => dyn Shape);
crate::impl_upcast!(Labeled => dyn Shape);
crate::impl_upcast!(Labeled => Square, .square);

fn labeled(side: u32) -> Labeled {
    Labeled {
        label: "box",
        square: Square { side },
        seen: Cell::new(0),
    }
}

#[test]
fn test_null_by_default() {
    let prc = Prc::<dyn Shape>::default();
    assert!(Prc::is_null(&prc));
    assert!(Prc::get(&prc).is_none());
    assert!(Prc::as_ptr(&prc).is_none());
    assert!(Prc::control_block(&prc).is_none());
    assert_eq!(Prc::strong_count(&prc), 0);
    assert_eq!(Prc::weak_count(&prc), 0);
}

#[test]
fn test_handle_sizes() {
    assert_eq!(size_of::<Prc<u32>>(), 2 * size_of::<usize>());
    assert_eq!(size_of::<Prc<dyn Shape>>(), 3 * size_of::<usize>());
}

#[test]
fn test_from_rc_shares_allocation() {
    let _guard = MemoryGuard::new();
    let before = InstanceCounter::instances();
    {
        let rc = Rc::new(InstanceCounter::with_value(5));
        let prc = Prc::from(&rc);
        assert_eq!(InstanceCounter::instances(), before + 1);
        assert_eq!(Rc::strong_count(&rc), 2);
        assert_eq!(Prc::get(&prc).unwrap() as *const InstanceCounter, Rc::as_ptr(&rc));
    }
    assert_eq!(InstanceCounter::instances(), before);
}

#[test]
fn test_from_rc_moves_reference() {
    let _guard = MemoryGuard::new();
    let mut rc = Rc::new(InstanceCounter::with_value(5));
    let prc = Prc::from(Rc::take(&mut rc));
    assert!(Rc::is_null(&rc));
    assert_eq!(prc.get(), 5);
    assert_eq!(Prc::strong_count(&prc), 1);

    let null = Prc::from(Rc::<u8>::null());
    assert!(Prc::is_null(&null));
}

#[test]
fn test_clone_and_assign() {
    let _guard = MemoryGuard::new();
    let before = InstanceCounter::instances();
    {
        let mut prc = Prc::null();
        {
            let second = make_prc(InstanceCounter::new());
            let third = second.clone();
            Prc::assign(&mut prc, third.clone());
            assert_eq!(Prc::strong_count(&prc), 3);
            assert_eq!(InstanceCounter::instances(), before + 1);
        }
        assert_eq!(Prc::strong_count(&prc), 1);
        assert_eq!(InstanceCounter::instances(), before + 1);
    }
    assert_eq!(InstanceCounter::instances(), before);
}

#[test]
fn test_move_and_assign() {
    let _guard = MemoryGuard::new();
    let mut prc = Prc::null();
    let mut second = Prc::new(InstanceCounter::with_value(2));
    let mut third = Prc::take(&mut second);
    assert!(Prc::is_null(&second));
    Prc::assign(&mut prc, Prc::take(&mut third));
    assert!(Prc::is_null(&third));
    assert_eq!(prc.get(), 2);
    assert_eq!(Prc::strong_count(&prc), 1);
}

#[test]
fn test_handles_see_shared_mutation() {
    let _guard = MemoryGuard::new();
    let prc = Prc::new(InstanceCounter::with_value(5));
    let second = prc.clone();
    prc.set(10);
    assert_eq!(second.get(), 10);
    assert_eq!((*second).get(), 10);
}

#[test]
fn test_upcast_to_trait_object() {
    let _guard = MemoryGuard::new();
    let square = Prc::new(Square { side: 3 });
    let shape: Prc<dyn Shape> = cast::upcast(&square);
    assert_eq!(shape.area(), 9);
    assert_eq!(Prc::strong_count(&square), 2);
    assert!(Prc::same_block(&square, &shape));

    let mut square = square;
    let moved: Prc<dyn Shape> = cast::upcast_take(&mut square);
    assert!(Prc::is_null(&square));
    assert_eq!(moved.area(), 9);
    assert_eq!(Prc::strong_count(&moved), 2);
}

#[test]
fn test_upcast_then_downcast_round_trip() {
    let _guard = MemoryGuard::new();
    let original = Prc::new(Square { side: 4 });
    let shape: Prc<dyn Shape> = Prc::upcast(original.clone());

    let square = cast::downcast::<Square, _>(&shape);
    assert!(!Prc::is_null(&square));
    assert_eq!(square, original);
    assert!(Prc::ptr_eq(&square, &original));
    assert_eq!(Prc::strong_count(&original), 3);

    let mut shape = shape;
    let moved = cast::downcast_take::<Square, _>(&mut shape);
    assert!(Prc::is_null(&shape));
    assert_eq!(moved.side, 4);
    assert_eq!(Prc::strong_count(&original), 3);
}

#[test]
fn test_failed_downcast_keeps_source() {
    let _guard = MemoryGuard::new();
    let mut shape: Prc<dyn Shape> = Prc::upcast(Prc::new(Circle { radius: 2 }));
    let view = Prc::as_ptr(&shape);

    assert!(Prc::is_null(&cast::downcast::<Square, _>(&shape)));
    assert_eq!(Prc::strong_count(&shape), 1);

    let result = cast::downcast_take::<Square, _>(&mut shape);
    assert!(Prc::is_null(&result));
    assert!(!Prc::is_null(&shape));
    assert_eq!(Prc::as_ptr(&shape).map(|p| p.cast::<u8>()), view.map(|p| p.cast::<u8>()));
    assert_eq!(Prc::strong_count(&shape), 1);
    assert_eq!(shape.area(), 12);

    let shape = match Prc::downcast::<Square>(shape) {
        Ok(_) => panic!("a circle is not a square"),
        Err(shape) => shape,
    };
    assert_eq!(shape.area(), 12);
}

#[test]
fn test_try_downcast_reports_types() {
    let _guard = MemoryGuard::new();
    let shape: Prc<dyn Shape> = Prc::upcast(Prc::new(Circle { radius: 1 }));
    let err = Prc::try_downcast::<Square>(&shape).unwrap_err();
    assert!(err.is_cast_failure());
    assert!(err.to_string().contains("Square"));

    let circle = Prc::try_downcast::<Circle>(&shape).unwrap();
    assert_eq!(circle.radius, 1);

    let err = Prc::try_downcast::<Circle>(&Prc::<dyn Shape>::null()).unwrap_err();
    assert!(!err.is_cast_failure());
}

#[test]
fn test_recover_requires_exact_allocation_type() {
    let _guard = MemoryGuard::new();
    let shape: Prc<dyn Shape> = Prc::upcast(Prc::new(Square { side: 2 }));

    let rc = cast::recover::<Square, _>(&shape);
    assert!(!Rc::is_null(&rc));
    assert_eq!(rc.side, 2);
    assert_eq!(Rc::strong_count(&rc), 2);

    assert!(Rc::is_null(&cast::recover::<Circle, _>(&shape)));
    assert!(Rc::is_null(&cast::recover::<Labeled, _>(&shape)));
    assert_eq!(Rc::strong_count(&rc), 2);
}

#[test]
fn test_recover_take_moves_only_on_success() {
    let _guard = MemoryGuard::new();
    let mut shape: Prc<dyn Shape> = Prc::upcast(Prc::new(Square { side: 2 }));

    let failed = cast::recover_take::<Circle, _>(&mut shape);
    assert!(Rc::is_null(&failed));
    assert!(!Prc::is_null(&shape));
    assert_eq!(Prc::strong_count(&shape), 1);

    let rc = cast::recover_take::<Square, _>(&mut shape);
    assert!(Prc::is_null(&shape));
    assert_eq!(Rc::strong_count(&rc), 1);
    assert_eq!(rc.area(), 4);
}

#[test]
fn test_field_view_keeps_outer_allocation() {
    let _guard = MemoryGuard::new();
    let outer = Prc::new(labeled(5));
    let square: Prc<Square> = Prc::upcast(outer.clone());
    assert_eq!(square.side, 5);
    assert!(Prc::same_block(&square, &outer));
    let projected = Prc::project(outer.clone(), |l| &l.square);
    assert!(Prc::ptr_eq(&projected, &square));
    drop(projected);
    drop(outer);

    // The view is a `Square`, the allocation is a `Labeled`.
    let any: Prc<dyn Any> = Prc::upcast(square.clone());
    assert!(!Prc::is_null(&cast::downcast::<Square, _>(&any)));
    assert!(Rc::is_null(&cast::recover::<Square, _>(&any)));

    let rc = cast::recover::<Labeled, _>(&any);
    assert_eq!(rc.label, "box");
    rc.seen.set(1);
    assert_eq!(Rc::strong_count(&rc), 3);
}

#[test]
fn test_try_recover_reports_allocation_type() {
    let _guard = MemoryGuard::new();
    let square: Prc<Square> = Prc::upcast(Prc::new(labeled(1)));
    let err = Prc::try_recover::<Square>(&square).unwrap_err();
    assert!(err.is_cast_failure());
    assert!(err.to_string().contains("Labeled"));
    assert_eq!(Prc::try_recover::<Labeled>(&square).unwrap().label, "box");
}

#[test]
fn test_project_and_try_project() {
    let _guard = MemoryGuard::new();
    let pair = Prc::new((1u32, String::from("two")));
    let second: Prc<str> = Prc::project(pair.clone(), |p| p.1.as_str());
    assert_eq!(&*second, "two");
    assert_eq!(Prc::strong_count(&pair), 2);

    let pair = match Prc::try_project(pair, |p| (p.0 > 5).then_some(&p.0)) {
        Ok(_) => panic!("projection should have been refused"),
        Err(pair) => pair,
    };
    assert_eq!(Prc::strong_count(&pair), 2);

    let first = Prc::try_project(pair, |p| Some(&p.0)).unwrap();
    assert_eq!(*first, 1);
    assert_eq!(Prc::strong_count(&first), 2);

    let null: Prc<u32> = Prc::project(Prc::<(u32, u32)>::null(), |p| &p.0);
    assert!(Prc::is_null(&null));
}

#[test]
fn test_casts_of_null_are_null() {
    let mut shape = Prc::<dyn Shape>::null();
    assert!(Prc::is_null(&cast::downcast::<Square, _>(&shape)));
    assert!(Prc::is_null(&cast::downcast_take::<Square, _>(&mut shape)));
    assert!(Rc::is_null(&cast::recover::<Square, _>(&shape)));
    assert!(Rc::is_null(&cast::recover_take::<Square, _>(&mut shape)));
    let any: Prc<dyn Any> = cast::upcast_take(&mut Prc::<u8>::null());
    assert!(Prc::is_null(&any));
}

#[test]
fn test_upcast_from_rc() {
    let _guard = MemoryGuard::new();
    let mut rc = Rc::new(Circle { radius: 1 });
    let shared: Prc<dyn Shape> = cast::upcast_rc(&rc);
    assert_eq!(Rc::strong_count(&rc), 2);
    let moved: Prc<dyn Shape> = cast::upcast_rc_take(&mut rc);
    assert!(Rc::is_null(&rc));
    assert_eq!(Prc::strong_count(&shared), 2);
    assert_eq!(moved.area(), 3);
}

#[test]
fn test_dropping_through_trait_object_view() {
    let _guard = MemoryGuard::new();
    let before = InstanceCounter::instances();
    let any: Prc<dyn Any> = Prc::upcast(Prc::new(InstanceCounter::new()));
    assert_eq!(InstanceCounter::instances(), before + 1);
    drop(any);
    assert_eq!(InstanceCounter::instances(), before);
}

#[test]
fn test_mutate_view_by_recovering_unique_rc() {
    let _guard = MemoryGuard::new();
    let mut square: Prc<Square> = Prc::upcast(Prc::new(labeled(2)));

    let weak = Prc::downgrade(&square);
    let mut rc = cast::recover_take::<Labeled, _>(&mut square);
    assert!(Prc::is_null(&square));
    assert!(Rc::get_mut(&mut rc).is_none());
    drop(weak);

    Rc::get_mut(&mut rc).unwrap().square.side = 7;
    let square: Prc<Square> = cast::upcast_rc_take(&mut rc);
    assert_eq!(square.area(), 49);
}

static SHARED_SIDE: u32 = 7;

#[test]
fn test_view_outside_payload_is_read_only() {
    let _guard = MemoryGuard::new();
    let view: Prc<u32> = Prc::project(Prc::new(0u8), |_| &SHARED_SIDE);
    assert_eq!(*view, 7);
    assert_eq!(Prc::strong_count(&view), 1);
    drop(view);
    assert_eq!(SHARED_SIDE, 7);
}

#[test]
fn test_downcast_view_addresses_payload() {
    let _guard = MemoryGuard::new();
    let square = Prc::new(Square { side: 3 });
    let shape: Prc<dyn Shape> = cast::upcast(&square);
    let any: Prc<dyn Any> = cast::upcast(&square);

    let from_shape = cast::downcast::<Square, _>(&shape);
    let from_any = cast::downcast::<Square, _>(&any);
    assert_eq!(Prc::as_ptr(&from_shape), Prc::as_ptr(&square));
    assert_eq!(Prc::as_ptr(&from_any), Prc::as_ptr(&square));
}

#[test]
fn test_try_get_and_formatting() {
    let _guard = MemoryGuard::new();
    let prc = Prc::new(Square { side: 1 });
    assert_eq!(Prc::try_get(&prc).unwrap().side, 1);
    assert_eq!(format!("{prc:?}"), "Square { side: 1 }");
    assert_eq!(format!("{:?}", Prc::<Square>::null()), "null");
    assert!(Prc::try_get(&Prc::<Square>::null()).is_err());
    assert_eq!(Prc::new(3), Prc::new(3));
}

#[test]
#[should_panic(expected = "null Prc")]
fn test_deref_null_panics() {
    let prc = Prc::<dyn Shape>::null();
    prc.area();
}
