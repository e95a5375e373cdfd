//! Conversions between pointer kinds.
//!
//! A [`Prc`] keeps the control block and the value view apart, so a cast only
//! recomputes the view and shares the block untouched:
//!
//! - *Upcast* ([`Upcast`]) never fails: a concrete type to a trait object it
//!   implements, or a type to an embedded subobject.
//! - *Downcast* ([`Downcast`]) checks the runtime type of the view.
//! - *Recovery* checks the runtime type of the allocation, which survives any
//!   number of upcasts, and yields the original single-allocation [`Rc`].
//!
//! Every cast comes in a sharing form taking `&Prc` (the result holds a new
//! strong reference) and a moving form taking `&mut Prc` (`*_take`), which
//! moves the reference out of the source only when the cast succeeds. A
//! failed cast returns a null handle and leaves its operand untouched.

use std::any::Any;
use std::ptr::NonNull;

use crate::prc::Prc;
use crate::rc::Rc;

/// Infallible conversion of a pointer to `Self` into a pointer to `U` that
/// addresses the same object or a part of it.
///
/// Implemented for every type to itself and for every `Any` type to
/// `dyn Any`. Use [`impl_upcast!`](crate::impl_upcast) for user hierarchies;
/// it only emits conversions that satisfy the contract below.
///
/// # Safety
///
/// `upcast_ptr` must return a pointer derived from `ptr` (keeping its
/// provenance) that addresses `*ptr` itself or a subobject of it. A [`Prc`]
/// dereferences the result for as long as the allocation lives.
///
/// A safe impl is rejected:
///
/// ```compile_fail
/// use std::ptr::NonNull;
///
/// struct Elsewhere;
///
/// impl polyrc::Upcast<u64> for Elsewhere {
///     fn upcast_ptr(_: NonNull<Self>) -> NonNull<u64> {
///         NonNull::dangling()
///     }
/// }
/// ```
pub unsafe trait Upcast<U: ?Sized> {
    fn upcast_ptr(ptr: NonNull<Self>) -> NonNull<U>;
}

unsafe impl<T: ?Sized> Upcast<T> for T {
    #[inline]
    fn upcast_ptr(ptr: NonNull<T>) -> NonNull<T> {
        ptr
    }
}

unsafe impl<T: Any> Upcast<dyn Any> for T {
    #[inline]
    fn upcast_ptr(ptr: NonNull<T>) -> NonNull<dyn Any> {
        ptr
    }
}

/// Checked conversion of a view to a `D` view.
///
/// Implemented for sized `Any` types (succeeds only for `D == Self`) and for
/// `dyn Any`. Use [`impl_downcast!`](crate::impl_downcast) for trait objects
/// whose trait has `Any` as a supertrait.
///
/// The returned reference must borrow from `self`. A reference to anything
/// else becomes a view that no longer lies in the allocation it keeps alive;
/// handles only ever read through their view, so this is wrong but not
/// unsound.
pub trait Downcast<D: ?Sized> {
    fn downcast_view(&self) -> Option<&D>;
}

impl<T: Any, D: Any> Downcast<D> for T {
    #[inline]
    fn downcast_view(&self) -> Option<&D> {
        (self as &dyn Any).downcast_ref::<D>()
    }
}

impl<D: Any> Downcast<D> for dyn Any {
    #[inline]
    fn downcast_view(&self) -> Option<&D> {
        self.downcast_ref::<D>()
    }
}

/// Implements [`Upcast`] for a type.
///
/// - `impl_upcast!(Circle => dyn Shape)` converts to a trait object.
/// - `impl_upcast!(Labeled => Circle, .circle)` converts to an embedded field.
///
/// Both forms derive the result from the input pointer, which is what the
/// `unsafe` contract of [`Upcast`] asks for.
#[macro_export]
macro_rules! impl_upcast {
    ($ty:ty => $target:ty) => {
        unsafe impl $crate::Upcast<$target> for $ty {
            #[inline]
            fn upcast_ptr(ptr: ::std::ptr::NonNull<Self>) -> ::std::ptr::NonNull<$target> {
                ptr
            }
        }
    };
    ($ty:ty => $target:ty, .$field:ident) => {
        unsafe impl $crate::Upcast<$target> for $ty {
            #[inline]
            fn upcast_ptr(ptr: ::std::ptr::NonNull<Self>) -> ::std::ptr::NonNull<$target> {
                // SAFETY: field projection of a non-null pointer to a live `Self`.
                unsafe { ::std::ptr::NonNull::new_unchecked(&raw mut (*ptr.as_ptr()).$field) }
            }
        }
    };
}

/// Implements [`Downcast`] from a trait object to any concrete type.
///
/// The trait must have `Any` as a supertrait: `impl_downcast!(dyn Shape)`.
#[macro_export]
macro_rules! impl_downcast {
    (dyn $($tr:tt)+) => {
        impl<D: ::std::any::Any> $crate::Downcast<D> for dyn $($tr)+ {
            #[inline]
            fn downcast_view(&self) -> ::std::option::Option<&D> {
                let any: &dyn ::std::any::Any = self;
                any.downcast_ref::<D>()
            }
        }
    };
}

/// Upcasts, sharing ownership with `prc`.
pub fn upcast<U, T>(prc: &Prc<T>) -> Prc<U>
where
    U: ?Sized,
    T: ?Sized + Upcast<U>,
{
    Prc::upcast(prc.clone())
}

/// Upcasts, moving ownership out of `prc` and leaving it null.
pub fn upcast_take<U, T>(prc: &mut Prc<T>) -> Prc<U>
where
    U: ?Sized,
    T: ?Sized + Upcast<U>,
{
    Prc::upcast(Prc::take(prc))
}

/// Upcasts a single-allocation handle, sharing ownership with `rc`.
pub fn upcast_rc<U, T>(rc: &Rc<T>) -> Prc<U>
where
    U: ?Sized,
    T: Upcast<U>,
{
    Prc::upcast(Prc::from(rc))
}

/// Upcasts a single-allocation handle, moving ownership out of `rc`.
pub fn upcast_rc_take<U, T>(rc: &mut Rc<T>) -> Prc<U>
where
    U: ?Sized,
    T: Upcast<U>,
{
    Prc::upcast(Prc::from(Rc::take(rc)))
}

/// Downcasts, sharing ownership with `prc`; null if the view is not a `D`.
pub fn downcast<D, T>(prc: &Prc<T>) -> Prc<D>
where
    D: ?Sized,
    T: ?Sized + Downcast<D>,
{
    Prc::share_view(prc, <T as Downcast<D>>::downcast_view)
}

/// Downcasts, moving ownership out of `prc` on success.
///
/// On failure the result is null and `prc` keeps its reference and view.
pub fn downcast_take<D, T>(prc: &mut Prc<T>) -> Prc<D>
where
    D: ?Sized,
    T: ?Sized + Downcast<D>,
{
    match Prc::downcast(Prc::take(prc)) {
        Ok(result) => result,
        Err(source) => {
            *prc = source;
            Prc::null()
        }
    }
}

/// Recovers the original handle, sharing ownership with `prc`; null unless
/// the allocation was made for exactly a `D`.
pub fn recover<D, T>(prc: &Prc<T>) -> Rc<D>
where
    D: 'static,
    T: ?Sized,
{
    match Prc::typed_block::<D>(prc) {
        Some(block) => Rc::share_block(block),
        None => Rc::null(),
    }
}

/// Recovers the original handle, moving ownership out of `prc` on success.
///
/// On failure the result is null and `prc` is left untouched.
pub fn recover_take<D, T>(prc: &mut Prc<T>) -> Rc<D>
where
    D: 'static,
    T: ?Sized,
{
    match Prc::recover(Prc::take(prc)) {
        Ok(result) => result,
        Err(source) => {
            *prc = source;
            Rc::null()
        }
    }
}
