//! Control blocks: the shared allocation behind every handle.
//!
//! A [`ValueBlock<T>`] is a single heap allocation holding the strong and weak
//! counts (its [`ControlBlock`] header) followed by the payload. Handles that
//! know the payload type (`Rc`, `Weak`) point at the whole `ValueBlock<T>`;
//! the polymorphic handles (`Prc`, `Pweak`) only keep a header pointer and go
//! through the block's vtable to drop, free or identify the payload.
//!
//! Counting rules:
//! - The payload is alive iff `strong > 0`.
//! - All strong references together hold one implicit weak reference, taken
//!   at allocation and released when the payload is dropped. The block is
//!   deallocated when `weak` reaches zero, so it always outlives the payload.

use std::any::TypeId;
use std::cell::Cell;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// Type-erased operations on a [`ValueBlock<T>`], reachable from its header.
pub(crate) struct BlockVtable {
    drop_content: unsafe fn(NonNull<ControlBlock>),
    deallocate: unsafe fn(NonNull<ControlBlock>),
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
}

/// Strong and weak counts of one allocation.
#[repr(C)]
pub struct ControlBlock {
    strong: Cell<usize>,
    weak: Cell<usize>,
    vtable: &'static BlockVtable,
}

impl ControlBlock {
    /// Number of strong references, i.e. handles keeping the payload alive.
    #[inline]
    pub fn strong_count(&self) -> usize {
        self.strong.get()
    }

    /// Number of weak references, including the implicit one held by the
    /// strong references while the payload is alive.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.weak.get()
    }

    /// Returns true if the block was allocated for a payload of exactly type `T`.
    #[inline]
    pub fn is_exactly<T: 'static>(&self) -> bool {
        (self.vtable.type_id)() == TypeId::of::<T>()
    }

    /// Name of the payload type the block was allocated for.
    pub fn type_name(&self) -> &'static str {
        (self.vtable.type_name)()
    }

    #[inline]
    pub(crate) fn increment_strong(&self) -> usize {
        increment(&self.strong)
    }

    #[inline]
    pub(crate) fn decrement_strong(&self) -> usize {
        decrement(&self.strong)
    }

    #[inline]
    pub(crate) fn increment_weak(&self) -> usize {
        increment(&self.weak)
    }

    #[inline]
    pub(crate) fn decrement_weak(&self) -> usize {
        decrement(&self.weak)
    }

    /// Drops one strong reference.
    ///
    /// On the strong→0 transition the payload is destroyed and the implicit
    /// weak reference is released, which deallocates the block if no weak
    /// observers remain.
    ///
    /// # Safety
    ///
    /// `block` must point to a live block and the caller must own one strong
    /// reference on it, which is consumed. No reference into the payload may
    /// be used after this call unless the caller knows other strong
    /// references exist.
    pub(crate) unsafe fn release_strong(block: NonNull<ControlBlock>) {
        let (remaining, vtable) = {
            let header = unsafe { block.as_ref() };
            (header.decrement_strong(), header.vtable)
        };
        if remaining != 0 {
            return;
        }

        log::trace!("dropping payload of {}", (vtable.type_name)());
        unsafe { (vtable.drop_content)(block) };

        // All strong references are gone: release the implicit weak reference.
        unsafe { Self::release_weak(block) };
    }

    /// Drops one weak reference, deallocating the block when none remain.
    ///
    /// # Safety
    ///
    /// `block` must point to a live block and the caller must own one weak
    /// reference on it, which is consumed.
    pub(crate) unsafe fn release_weak(block: NonNull<ControlBlock>) {
        let (remaining, vtable) = {
            let header = unsafe { block.as_ref() };
            (header.decrement_weak(), header.vtable)
        };
        if remaining == 0 {
            log::trace!("deallocating block of {}", (vtable.type_name)());
            unsafe { (vtable.deallocate)(block) };
        }
    }
}

#[inline]
fn increment(count: &Cell<usize>) -> usize {
    let value = count.get().wrapping_add(1);
    // Overflowing would let a later decrement free a block still in use.
    if value == 0 {
        std::process::abort();
    }
    count.set(value);
    value
}

#[inline]
fn decrement(count: &Cell<usize>) -> usize {
    let value = count.get();
    debug_assert!(value > 0, "reference count underflow");
    let value = value.wrapping_sub(1);
    count.set(value);
    value
}

/// A control block with in-place storage for one `T`.
#[repr(C)]
pub struct ValueBlock<T> {
    header: ControlBlock,
    content: ManuallyDrop<T>,
}

impl<T: 'static> ValueBlock<T> {
    const VTABLE: BlockVtable = BlockVtable {
        drop_content: Self::drop_content_erased,
        deallocate: Self::deallocate_erased,
        type_id: TypeId::of::<T>,
        type_name: std::any::type_name::<T>,
    };

    /// Allocates a block holding `value`, with one strong reference and the
    /// implicit weak reference.
    pub(crate) fn allocate(value: T) -> NonNull<ValueBlock<T>> {
        let block = Box::new(ValueBlock {
            header: ControlBlock {
                strong: Cell::new(1),
                weak: Cell::new(1),
                vtable: &Self::VTABLE,
            },
            content: ManuallyDrop::new(value),
        });
        NonNull::from(Box::leak(block))
    }

    unsafe fn drop_content_erased(block: NonNull<ControlBlock>) {
        unsafe { Self::destruct_content(block.cast()) }
    }

    unsafe fn deallocate_erased(block: NonNull<ControlBlock>) {
        unsafe { Self::deallocate(block.cast()) }
    }

    /// Recovers the typed block behind a header, if it was allocated for `T`.
    pub(crate) fn from_header(block: NonNull<ControlBlock>) -> Option<NonNull<ValueBlock<T>>> {
        // `header` is the first field of a `repr(C)` struct.
        if unsafe { block.as_ref() }.is_exactly::<T>() {
            Some(block.cast())
        } else {
            None
        }
    }
}

impl<T> ValueBlock<T> {
    #[inline]
    pub(crate) fn header(this: NonNull<ValueBlock<T>>) -> NonNull<ControlBlock> {
        this.cast()
    }

    /// Pointer to the payload; valid to dereference while `strong > 0`.
    #[inline]
    pub(crate) fn content_ptr(this: NonNull<ValueBlock<T>>) -> NonNull<T> {
        let content = unsafe { &raw mut (*this.as_ptr()).content };
        // `ManuallyDrop<T>` is `repr(transparent)`.
        unsafe { NonNull::new_unchecked(content.cast::<T>()) }
    }

    /// # Safety
    ///
    /// The payload must be alive and `'a` must not outlive it.
    #[inline]
    pub(crate) unsafe fn content<'a>(this: NonNull<ValueBlock<T>>) -> &'a T {
        unsafe { Self::content_ptr(this).as_ref() }
    }

    /// Runs the payload destructor.
    ///
    /// # Safety
    ///
    /// The payload must be alive, and it is dead after this call. Called
    /// exactly once, at the strong→0 transition.
    pub(crate) unsafe fn destruct_content(this: NonNull<ValueBlock<T>>) {
        unsafe { ManuallyDrop::drop(&mut (*this.as_ptr()).content) }
    }

    /// Frees the allocation without touching the payload.
    ///
    /// # Safety
    ///
    /// The payload must already be destructed and no handle may refer to the
    /// block any more.
    pub(crate) unsafe fn deallocate(this: NonNull<ValueBlock<T>>) {
        drop(unsafe { Box::from_raw(this.as_ptr()) });
    }
}
