//! Random sequences of handle operations must neither leak nor double free.

use polyrc::{Prc, Pweak, Rc, Weak, cast};
use polyrc_testkit::{Base, Derived, InstanceCounter, MemoryGuard};

#[global_allocator]
static ALLOC: polyrc_testkit::CountingAllocator = polyrc_testkit::CountingAllocator;

enum Handle {
    Rc(Rc<InstanceCounter>),
    Derived(Rc<Derived>),
    Weak(Weak<InstanceCounter>),
    Base(Prc<dyn Base>),
    Counter(Prc<InstanceCounter>),
    Pweak(Pweak<dyn Base>),
}

impl Handle {
    /// Derives a new handle from this one, possibly moving out of it.
    fn derive(&mut self, rng: &mut fastrand::Rng) -> Handle {
        let take = rng.bool();
        match self {
            Handle::Rc(rc) => match rng.u8(0..3) {
                0 if take => Handle::Rc(Rc::take(rc)),
                0 => Handle::Rc(rc.clone()),
                1 => Handle::Weak(Rc::downgrade(rc)),
                _ if take => Handle::Base(cast::upcast_rc_take(rc)),
                _ => Handle::Base(cast::upcast_rc(rc)),
            },
            Handle::Derived(rc) => match rng.u8(0..2) {
                0 if take => Handle::Counter(cast::upcast_rc_take(rc)),
                0 => Handle::Counter(cast::upcast_rc(rc)),
                _ => Handle::Base(cast::upcast_rc(rc)),
            },
            Handle::Weak(weak) => match rng.u8(0..2) {
                0 => Handle::Rc(weak.lock()),
                _ if take => Handle::Weak(weak.take()),
                _ => Handle::Weak(weak.clone()),
            },
            Handle::Base(base) => match rng.u8(0..4) {
                0 if take => Handle::Counter(cast::downcast_take(base)),
                0 => Handle::Counter(cast::downcast(base)),
                1 if take => Handle::Rc(cast::recover_take(base)),
                1 => Handle::Rc(cast::recover(base)),
                2 if take => Handle::Derived(cast::recover_take(base)),
                2 => Handle::Derived(cast::recover(base)),
                _ => Handle::Pweak(Prc::downgrade(base)),
            },
            Handle::Counter(counter) => match rng.u8(0..2) {
                0 if take => Handle::Base(cast::upcast_take(counter)),
                0 => Handle::Base(cast::upcast(counter)),
                _ => Handle::Counter(counter.clone()),
            },
            Handle::Pweak(weak) => match rng.u8(0..2) {
                0 => Handle::Base(weak.lock()),
                _ => Handle::Pweak(weak.clone()),
            },
        }
    }
}

fn run_sequence(seed: u64, steps: usize) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let before = InstanceCounter::instances();
    let _guard = MemoryGuard::new();

    let mut handles = Vec::with_capacity(steps);
    for step in 0..steps {
        match rng.u8(0..10) {
            0 => handles.push(Handle::Rc(Rc::new(InstanceCounter::with_value(step as i32)))),
            1 => handles.push(Handle::Derived(Rc::new(Derived::new(step as i32, "random")))),
            2..=3 if !handles.is_empty() => {
                let index = rng.usize(..handles.len());
                handles.swap_remove(index);
            }
            _ if !handles.is_empty() => {
                let index = rng.usize(..handles.len());
                let derived = handles[index].derive(&mut rng);
                handles.push(derived);
            }
            _ => {}
        }
    }
    rng.shuffle(&mut handles);
    drop(handles);

    assert_eq!(InstanceCounter::instances(), before, "seed {seed}");
}

#[test]
fn test_random_sequences_release_everything() {
    for seed in 0..200 {
        run_sequence(seed, 64);
    }
}

#[test]
fn test_long_random_sequence() {
    run_sequence(0x5eed, 4096);
}
