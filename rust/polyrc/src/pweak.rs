//! `Pweak`: non-owning observer of a [`Prc`] view.

use std::fmt;
use std::marker::PhantomData;

use polyrc_common::Result;
use polyrc_common::error::Error;

use crate::block::ControlBlock;
use crate::prc::{Prc, PrcRaw};

/// A weak reference to a [`Prc`] view, or null.
///
/// Carries the same block/view pair as the `Prc` it was made from. The view
/// is only dereferenced through [`Pweak::lock`], after checking that the
/// payload is still alive.
pub struct Pweak<T: ?Sized> {
    raw: Option<PrcRaw<T>>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> Pweak<T> {
    /// Returns a null observer.
    pub const fn new() -> Pweak<T> {
        Pweak {
            raw: None,
            _marker: PhantomData,
        }
    }

    fn observe(raw: Option<PrcRaw<T>>) -> Pweak<T> {
        if let Some(raw) = raw {
            raw.header().increment_weak();
        }
        Pweak {
            raw,
            _marker: PhantomData,
        }
    }

    fn control_block(&self) -> Option<&ControlBlock> {
        self.raw.as_ref().map(PrcRaw::header)
    }

    pub fn is_null(&self) -> bool {
        self.raw.is_none()
    }

    /// Returns a new strong handle with this observer's view if the payload
    /// is still alive, or a null handle otherwise.
    pub fn lock(&self) -> Prc<T> {
        match self.raw {
            Some(raw) if raw.header().strong_count() > 0 => Prc::share_raw(raw),
            _ => Prc::null(),
        }
    }

    /// Like [`Pweak::lock`], returning `None` instead of a null handle.
    pub fn upgrade(&self) -> Option<Prc<T>> {
        let prc = self.lock();
        if Prc::is_null(&prc) { None } else { Some(prc) }
    }

    /// Like [`Pweak::lock`], returning an `Expired` error instead of a null
    /// handle.
    pub fn try_lock(&self) -> Result<Prc<T>> {
        self.upgrade().ok_or_else(|| Error::expired("Pweak"))
    }

    pub fn is_expired(&self) -> bool {
        self.strong_count() == 0
    }

    pub fn strong_count(&self) -> usize {
        self.control_block().map_or(0, ControlBlock::strong_count)
    }

    pub fn weak_count(&self) -> usize {
        self.control_block().map_or(0, ControlBlock::weak_count)
    }

    /// Returns true if both observers hold the same block and view, or both
    /// are null.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.raw, other.raw) {
            (Some(a), Some(b)) => {
                a.block == b.block && std::ptr::addr_eq(a.value.as_ptr(), b.value.as_ptr())
            }
            (None, None) => true,
            _ => false,
        }
    }

    /// Releases this observer's weak reference and leaves it null.
    pub fn reset(&mut self) {
        if let Some(raw) = self.raw.take() {
            unsafe { ControlBlock::release_weak(raw.block) };
        }
    }

    /// Moves the observer out, leaving `self` null.
    pub fn take(&mut self) -> Pweak<T> {
        Pweak {
            raw: self.raw.take(),
            _marker: PhantomData,
        }
    }

    /// Swaps block and view of both observers as one unit.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.raw, &mut other.raw);
    }

    /// Replaces the observed view by swapping with `other`, which then
    /// releases the previously held reference.
    pub fn assign(&mut self, mut other: Self) {
        self.swap(&mut other);
    }

    /// Starts observing the view of `prc` instead.
    pub fn assign_from(&mut self, prc: &Prc<T>) {
        self.assign(Pweak::from(prc));
    }
}

impl<T: ?Sized> From<&Prc<T>> for Pweak<T> {
    fn from(prc: &Prc<T>) -> Self {
        Pweak::observe(Prc::raw(prc))
    }
}

impl<T: ?Sized> Clone for Pweak<T> {
    fn clone(&self) -> Self {
        Pweak::observe(self.raw)
    }
}

impl<T: ?Sized> Drop for Pweak<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Default for Pweak<T> {
    fn default() -> Self {
        Pweak::new()
    }
}

impl<T: ?Sized> fmt::Debug for Pweak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pweak")
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}
