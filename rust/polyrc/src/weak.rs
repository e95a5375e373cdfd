//! `Weak`: non-owning observer of an [`Rc`] payload.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use polyrc_common::Result;
use polyrc_common::error::Error;

use crate::block::{ControlBlock, ValueBlock};
use crate::rc::Rc;

/// A weak reference to an [`Rc`]-managed payload, or null.
///
/// Holds one weak count on the block, which keeps the allocation (not the
/// payload) alive. [`Weak::lock`] produces a new strong handle while any
/// strong handle still exists.
pub struct Weak<T> {
    block: Option<NonNull<ValueBlock<T>>>,
    _marker: PhantomData<ValueBlock<T>>,
}

impl<T> Weak<T> {
    /// Returns a null observer.
    pub const fn new() -> Weak<T> {
        Weak {
            block: None,
            _marker: PhantomData,
        }
    }

    fn control_block(&self) -> Option<&ControlBlock> {
        self.block
            .map(|block| unsafe { ValueBlock::header(block).as_ref() })
    }

    fn observe(block: Option<NonNull<ValueBlock<T>>>) -> Weak<T> {
        if let Some(block) = block {
            unsafe { ValueBlock::header(block).as_ref() }.increment_weak();
        }
        Weak {
            block,
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.block.is_none()
    }

    /// Returns a new strong handle if the payload is still alive, or a null
    /// handle otherwise.
    pub fn lock(&self) -> Rc<T> {
        match self.block {
            Some(block) if !self.is_expired() => Rc::share_block(block),
            _ => Rc::null(),
        }
    }

    /// Like [`Weak::lock`], returning `None` instead of a null handle.
    pub fn upgrade(&self) -> Option<Rc<T>> {
        let rc = self.lock();
        if Rc::is_null(&rc) { None } else { Some(rc) }
    }

    /// Like [`Weak::lock`], returning an `Expired` error instead of a null
    /// handle.
    pub fn try_lock(&self) -> Result<Rc<T>> {
        self.upgrade().ok_or_else(|| Error::expired("Weak"))
    }

    /// Returns true if no strong handle to the payload remains (or the
    /// observer is null).
    pub fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }

    pub fn strong_count(&self) -> usize {
        self.control_block().map_or(0, ControlBlock::strong_count)
    }

    /// Weak references on the block, including the implicit one while the
    /// payload is alive.
    pub fn weak_count(&self) -> usize {
        self.control_block().map_or(0, ControlBlock::weak_count)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.block == other.block
    }

    /// Releases this observer's weak reference and leaves it null.
    pub fn reset(&mut self) {
        if let Some(block) = self.block.take() {
            unsafe { ControlBlock::release_weak(ValueBlock::header(block)) };
        }
    }

    /// Moves the observer out, leaving `self` null.
    pub fn take(&mut self) -> Weak<T> {
        std::mem::take(self)
    }

    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.block, &mut other.block);
    }

    /// Replaces the observed block by swapping with `other`, which then
    /// releases the previously held reference.
    pub fn assign(&mut self, mut other: Self) {
        self.swap(&mut other);
    }

    /// Starts observing the payload of `rc` instead.
    pub fn assign_from(&mut self, rc: &Rc<T>) {
        self.assign(Weak::from(rc));
    }
}

impl<T> From<&Rc<T>> for Weak<T> {
    fn from(rc: &Rc<T>) -> Self {
        Weak::observe(Rc::block(rc))
    }
}

impl<T> Clone for Weak<T> {
    fn clone(&self) -> Self {
        Weak::observe(self.block)
    }
}

impl<T> Drop for Weak<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> Default for Weak<T> {
    fn default() -> Self {
        Weak::new()
    }
}

impl<T> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Weak")
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}
