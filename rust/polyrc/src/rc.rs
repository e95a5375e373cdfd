//! `Rc`: owning pointer whose payload and counts share one allocation.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

use polyrc_common::Result;

use crate::block::{ControlBlock, ValueBlock};
use crate::weak::Weak;

/// A single-threaded, reference-counted owning pointer, or null.
///
/// The handle is exactly one pointer wide. Cloning shares the allocation and
/// bumps the strong count; dropping the last strong handle destroys the
/// payload. The allocation itself is freed once no [`Weak`] observer remains.
///
/// Handle operations are associated functions (`Rc::is_null(&rc)`) so they
/// never shadow methods of the payload reached through `Deref`.
pub struct Rc<T> {
    block: Option<NonNull<ValueBlock<T>>>,
    _marker: PhantomData<ValueBlock<T>>,
}

impl<T: 'static> Rc<T> {
    /// Allocates `value` and returns the only strong handle to it.
    pub fn new(value: T) -> Rc<T> {
        Rc {
            block: Some(ValueBlock::allocate(value)),
            _marker: PhantomData,
        }
    }
}

/// Allocates `value` and returns the only strong handle to it.
pub fn make_rc<T: 'static>(value: T) -> Rc<T> {
    Rc::new(value)
}

impl<T> Rc<T> {
    /// Returns a null handle that owns nothing.
    pub const fn null() -> Rc<T> {
        Rc {
            block: None,
            _marker: PhantomData,
        }
    }

    /// Wraps a block on which the caller already owns one strong reference.
    pub(crate) fn from_block(block: NonNull<ValueBlock<T>>) -> Rc<T> {
        Rc {
            block: Some(block),
            _marker: PhantomData,
        }
    }

    /// Takes one more strong reference on a block whose payload is alive.
    pub(crate) fn share_block(block: NonNull<ValueBlock<T>>) -> Rc<T> {
        unsafe { ValueBlock::header(block).as_ref() }.increment_strong();
        Rc::from_block(block)
    }

    pub(crate) fn block(this: &Self) -> Option<NonNull<ValueBlock<T>>> {
        this.block
    }

    /// Gives up the handle's strong reference without releasing it.
    pub(crate) fn into_block(mut this: Self) -> Option<NonNull<ValueBlock<T>>> {
        this.block.take()
    }

    #[inline]
    pub fn is_null(this: &Self) -> bool {
        this.block.is_none()
    }

    /// Returns the payload, or `None` for a null handle.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.block.map(|block| unsafe { ValueBlock::content(block) })
    }

    /// Returns the payload, or a `NullHandle` error for a null handle.
    pub fn try_get(this: &Self) -> Result<&T> {
        match Rc::get(this) {
            Some(value) => Ok(value),
            None => polyrc_common::result::null_handle("Rc"),
        }
    }

    /// Returns a mutable reference to the payload if this is the only handle,
    /// strong or weak, referring to it.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let block = this.block?;
        let header = unsafe { ValueBlock::header(block).as_ref() };
        if header.strong_count() == 1 && header.weak_count() == 1 {
            Some(unsafe { ValueBlock::content_ptr(block).as_mut() })
        } else {
            None
        }
    }

    pub(crate) fn control_block(this: &Self) -> Option<&ControlBlock> {
        this.block
            .map(|block| unsafe { ValueBlock::header(block).as_ref() })
    }

    /// Number of strong handles sharing the payload; `0` for a null handle.
    pub fn strong_count(this: &Self) -> usize {
        Rc::control_block(this).map_or(0, ControlBlock::strong_count)
    }

    /// Number of weak references on the block, counting the implicit one
    /// held by the strong handles; `0` for a null handle.
    pub fn weak_count(this: &Self) -> usize {
        Rc::control_block(this).map_or(0, ControlBlock::weak_count)
    }

    /// Address of the payload, or null.
    pub fn as_ptr(this: &Self) -> *const T {
        this.block
            .map_or(std::ptr::null(), |block| {
                ValueBlock::content_ptr(block).as_ptr().cast_const()
            })
    }

    /// Returns true if both handles share one allocation, or both are null.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.block == other.block
    }

    /// Creates a weak observer of this handle's payload.
    pub fn downgrade(this: &Self) -> Weak<T> {
        Weak::from(this)
    }

    /// Releases this handle's strong reference and leaves it null.
    pub fn reset(this: &mut Self) {
        if let Some(block) = this.block.take() {
            unsafe { ControlBlock::release_strong(ValueBlock::header(block)) };
        }
    }

    /// Moves the reference out of `this`, leaving it null.
    pub fn take(this: &mut Self) -> Rc<T> {
        std::mem::take(this)
    }

    pub fn swap(this: &mut Self, other: &mut Self) {
        std::mem::swap(&mut this.block, &mut other.block);
    }

    /// Replaces the referenced payload by swapping with `other`, which then
    /// releases the previously held reference.
    pub fn assign(this: &mut Self, mut other: Self) {
        Rc::swap(this, &mut other);
    }
}

impl<T> Clone for Rc<T> {
    fn clone(&self) -> Self {
        match self.block {
            Some(block) => Rc::share_block(block),
            None => Rc::null(),
        }
    }
}

impl<T> Drop for Rc<T> {
    fn drop(&mut self) {
        Rc::reset(self);
    }
}

impl<T> Default for Rc<T> {
    fn default() -> Self {
        Rc::null()
    }
}

impl<T> Deref for Rc<T> {
    type Target = T;

    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match Rc::get(self) {
            Some(value) => value,
            None => crate::null_deref("Rc"),
        }
    }
}

impl<T> AsRef<T> for Rc<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: 'static> From<T> for Rc<T> {
    fn from(value: T) -> Self {
        Rc::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Rc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Rc::get(self) {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Rc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Rc::get(self) {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T> fmt::Pointer for Rc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Rc::as_ptr(self), f)
    }
}

impl<T: PartialEq> PartialEq for Rc<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::get(self) == Rc::get(other)
    }
}
impl<T: Eq> Eq for Rc<T> {}

impl<T: PartialOrd> PartialOrd for Rc<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Rc::get(self).partial_cmp(&Rc::get(other))
    }
}
impl<T: Ord> Ord for Rc<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        Rc::get(self).cmp(&Rc::get(other))
    }
}

impl<T: Hash> Hash for Rc<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::get(self).hash(state)
    }
}
