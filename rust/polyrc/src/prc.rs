//! `Prc`: owning pointer with a separate value view, for polymorphic use.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

use polyrc_common::Result;
use polyrc_common::error::Error;

use crate::block::{ControlBlock, ValueBlock};
use crate::cast::{Downcast, Upcast};
use crate::pweak::Pweak;
use crate::rc::Rc;

/// The two halves of a non-null [`Prc`]: what to release and what to show.
///
/// `value` points into the payload owned by `block`. Both are always set or
/// cleared together.
pub(crate) struct PrcRaw<T: ?Sized> {
    pub(crate) block: NonNull<ControlBlock>,
    pub(crate) value: NonNull<T>,
}

impl<T: ?Sized> Clone for PrcRaw<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for PrcRaw<T> {}

impl<T: ?Sized> PrcRaw<T> {
    #[inline]
    pub(crate) fn header(&self) -> &ControlBlock {
        unsafe { self.block.as_ref() }
    }
}

/// A single-threaded, reference-counted owning pointer whose view may be a
/// part, or a trait object, of a larger allocation.
///
/// A `Prc<T>` shares the control block of the allocation it came from but
/// dereferences to its own `T` view. This is what allows a `Prc<dyn Shape>`
/// to keep a `Circle` allocation alive, and to hand the original
/// [`Rc<Circle>`] back through [`Prc::recover`].
///
/// A `Prc` is null iff it has no view; a null `Prc` owns nothing.
///
/// Views are shared and read-only: a projection may hand out any reference
/// the closure can produce, so there is no `get_mut`. Mutate through
/// interior mutability, or [`Prc::recover`] the `Rc` and use
/// [`Rc::get_mut`].
///
/// ```compile_fail
/// let mut prc = polyrc::Prc::new(1u32);
/// *polyrc::Prc::get_mut(&mut prc).unwrap() = 2;
/// ```
pub struct Prc<T: ?Sized> {
    raw: Option<PrcRaw<T>>,
    _marker: PhantomData<T>,
}

impl<T: 'static> Prc<T> {
    /// Allocates `value` and returns the only strong handle to it.
    pub fn new(value: T) -> Prc<T> {
        Prc::from(Rc::new(value))
    }
}

/// Allocates `value` and returns the only strong handle to it.
pub fn make_prc<T: 'static>(value: T) -> Prc<T> {
    Prc::new(value)
}

impl<T: ?Sized> Prc<T> {
    /// Returns a null handle that owns nothing.
    pub const fn null() -> Prc<T> {
        Prc {
            raw: None,
            _marker: PhantomData,
        }
    }

    /// Wraps a pair on which the caller already owns one strong reference.
    pub(crate) fn from_raw(raw: Option<PrcRaw<T>>) -> Prc<T> {
        Prc {
            raw,
            _marker: PhantomData,
        }
    }

    /// Takes one more strong reference on a block whose payload is alive.
    pub(crate) fn share_raw(raw: PrcRaw<T>) -> Prc<T> {
        raw.header().increment_strong();
        Prc::from_raw(Some(raw))
    }

    pub(crate) fn raw(this: &Self) -> Option<PrcRaw<T>> {
        this.raw
    }

    /// Gives up the handle's strong reference without releasing it.
    fn into_raw(mut this: Self) -> Option<PrcRaw<T>> {
        this.raw.take()
    }

    #[inline]
    pub fn is_null(this: &Self) -> bool {
        this.raw.is_none()
    }

    /// Returns the view, or `None` for a null handle.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.raw.map(|raw| unsafe { raw.value.as_ref() })
    }

    /// Returns the view, or a `NullHandle` error for a null handle.
    pub fn try_get(this: &Self) -> Result<&T> {
        match Prc::get(this) {
            Some(value) => Ok(value),
            None => polyrc_common::result::null_handle("Prc"),
        }
    }

    /// The control block shared by every handle of this allocation.
    pub fn control_block(this: &Self) -> Option<&ControlBlock> {
        this.raw.as_ref().map(PrcRaw::header)
    }

    pub fn strong_count(this: &Self) -> usize {
        Prc::control_block(this).map_or(0, ControlBlock::strong_count)
    }

    /// Weak references on the block, including the implicit one held by the
    /// strong handles; `0` for a null handle.
    pub fn weak_count(this: &Self) -> usize {
        Prc::control_block(this).map_or(0, ControlBlock::weak_count)
    }

    /// Address of the view, or `None` for a null handle.
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.raw.map(|raw| raw.value)
    }

    /// Returns true if both handles view the same address of the same
    /// allocation, or both are null.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (this.raw, other.raw) {
            (Some(a), Some(b)) => {
                a.block == b.block && std::ptr::addr_eq(a.value.as_ptr(), b.value.as_ptr())
            }
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns true if both handles keep the same allocation alive, whatever
    /// their views.
    pub fn same_block<U: ?Sized>(this: &Self, other: &Prc<U>) -> bool {
        match (this.raw, other.raw) {
            (Some(a), Some(b)) => a.block == b.block,
            _ => false,
        }
    }

    /// Creates a weak observer of this handle's view.
    pub fn downgrade(this: &Self) -> Pweak<T> {
        Pweak::from(this)
    }

    /// Releases this handle's strong reference and leaves it null.
    pub fn reset(this: &mut Self) {
        if let Some(raw) = this.raw.take() {
            unsafe { ControlBlock::release_strong(raw.block) };
        }
    }

    /// Moves the reference out of `this`, leaving it null.
    pub fn take(this: &mut Self) -> Prc<T> {
        Prc::from_raw(this.raw.take())
    }

    /// Swaps block and view of both handles as one unit.
    pub fn swap(this: &mut Self, other: &mut Self) {
        std::mem::swap(&mut this.raw, &mut other.raw);
    }

    /// Replaces the referenced view by swapping with `other`, which then
    /// releases the previously held reference.
    pub fn assign(this: &mut Self, mut other: Self) {
        Prc::swap(this, &mut other);
    }

    /// Converts the view to a `U` view of the same object, keeping the
    /// reference.
    pub fn upcast<U: ?Sized>(this: Self) -> Prc<U>
    where
        T: Upcast<U>,
    {
        let raw = Prc::into_raw(this).map(|raw| PrcRaw {
            block: raw.block,
            value: T::upcast_ptr(raw.value),
        });
        Prc::from_raw(raw)
    }

    /// Narrows the view to a part of the value, keeping the reference.
    ///
    /// A null handle stays null and `f` is not called.
    pub fn project<U: ?Sized>(this: Self, f: impl FnOnce(&T) -> &U) -> Prc<U> {
        match Prc::try_project(this, |value| Some(f(value))) {
            Ok(result) => result,
            Err(_) => Prc::null(),
        }
    }

    /// Narrows the view if `f` returns a part of the value.
    ///
    /// On success the reference moves to the result. Otherwise `this` is
    /// handed back unchanged.
    pub fn try_project<U: ?Sized>(
        this: Self,
        f: impl FnOnce(&T) -> Option<&U>,
    ) -> std::result::Result<Prc<U>, Self> {
        let Some(raw) = this.raw else {
            return Err(this);
        };
        match f(unsafe { raw.value.as_ref() }).map(NonNull::from) {
            Some(value) => {
                let block = raw.block;
                let _ = Prc::into_raw(this);
                Ok(Prc::from_raw(Some(PrcRaw { block, value })))
            }
            None => Err(this),
        }
    }

    /// Shares the allocation under the view returned by `f`, or returns a
    /// null handle if `f` returns `None`.
    pub(crate) fn share_view<U: ?Sized>(
        this: &Self,
        f: impl FnOnce(&T) -> Option<&U>,
    ) -> Prc<U> {
        let Some(raw) = this.raw else {
            return Prc::null();
        };
        match f(unsafe { raw.value.as_ref() }).map(NonNull::from) {
            Some(value) => Prc::share_raw(PrcRaw {
                block: raw.block,
                value,
            }),
            None => Prc::null(),
        }
    }

    /// Converts to a `D` view if the view's runtime type is `D`.
    ///
    /// On failure `this` is handed back with its reference and view intact.
    pub fn downcast<D: ?Sized>(this: Self) -> std::result::Result<Prc<D>, Self>
    where
        T: Downcast<D>,
    {
        Prc::try_project(this, <T as Downcast<D>>::downcast_view)
    }

    /// Shares the allocation under a `D` view, or fails with `CastFailed`.
    pub fn try_downcast<D: ?Sized>(this: &Self) -> Result<Prc<D>>
    where
        T: Downcast<D>,
    {
        if Prc::is_null(this) {
            return polyrc_common::result::null_handle("Prc");
        }
        let result = crate::cast::downcast::<D, T>(this);
        if Prc::is_null(&result) {
            return polyrc_common::result::cast_failed(
                std::any::type_name::<T>(),
                std::any::type_name::<D>(),
            );
        }
        Ok(result)
    }

    /// The typed block, if the allocation was made for exactly a `D`.
    pub(crate) fn typed_block<D: 'static>(this: &Self) -> Option<NonNull<ValueBlock<D>>> {
        this.raw.and_then(|raw| ValueBlock::<D>::from_header(raw.block))
    }

    /// Recovers the single-allocation handle if the allocation was made for
    /// exactly a `D`, whatever the current view.
    ///
    /// On success the reference moves to the result. Otherwise `this` is
    /// handed back unchanged.
    pub fn recover<D: 'static>(this: Self) -> std::result::Result<Rc<D>, Self> {
        match Prc::typed_block::<D>(&this) {
            Some(block) => {
                let _ = Prc::into_raw(this);
                Ok(Rc::from_block(block))
            }
            None => Err(this),
        }
    }

    /// Shares the allocation as an `Rc<D>`, or fails with `CastFailed`.
    pub fn try_recover<D: 'static>(this: &Self) -> Result<Rc<D>> {
        let Some(block) = Prc::control_block(this) else {
            return polyrc_common::result::null_handle("Prc");
        };
        let result = crate::cast::recover::<D, T>(this);
        if Rc::is_null(&result) {
            return Err(Error::cast_failed(
                block.type_name(),
                std::any::type_name::<D>(),
            ));
        }
        Ok(result)
    }
}

impl<T> From<Rc<T>> for Prc<T> {
    fn from(rc: Rc<T>) -> Self {
        let raw = Rc::into_block(rc).map(|block| PrcRaw {
            block: ValueBlock::header(block),
            value: ValueBlock::content_ptr(block),
        });
        Prc::from_raw(raw)
    }
}

impl<T> From<&Rc<T>> for Prc<T> {
    fn from(rc: &Rc<T>) -> Self {
        Prc::from(rc.clone())
    }
}

impl<T: ?Sized> Clone for Prc<T> {
    fn clone(&self) -> Self {
        match self.raw {
            Some(raw) => Prc::share_raw(raw),
            None => Prc::null(),
        }
    }
}

impl<T: ?Sized> Drop for Prc<T> {
    fn drop(&mut self) {
        Prc::reset(self);
    }
}

impl<T: ?Sized> Default for Prc<T> {
    fn default() -> Self {
        Prc::null()
    }
}

impl<T: ?Sized> Deref for Prc<T> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match Prc::get(self) {
            Some(value) => value,
            None => crate::null_deref("Prc"),
        }
    }
}

impl<T: ?Sized> AsRef<T> for Prc<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Prc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Prc::get(self) {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Prc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Prc::get(self) {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Prc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Prc::as_ptr(self) {
            Some(ptr) => fmt::Pointer::fmt(&ptr, f),
            None => fmt::Pointer::fmt(&std::ptr::null::<u8>(), f),
        }
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Prc<T> {
    fn eq(&self, other: &Self) -> bool {
        Prc::get(self) == Prc::get(other)
    }
}
impl<T: ?Sized + Eq> Eq for Prc<T> {}

impl<T: ?Sized + PartialOrd> PartialOrd for Prc<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Prc::get(self).partial_cmp(&Prc::get(other))
    }
}
impl<T: ?Sized + Ord> Ord for Prc<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        Prc::get(self).cmp(&Prc::get(other))
    }
}

impl<T: ?Sized + Hash> Hash for Prc<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Prc::get(self).hash(state)
    }
}
