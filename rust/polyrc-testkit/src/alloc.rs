//! Allocation accounting for leak checks.
//!
//! Counts are kept per thread, so tests running in parallel do not see each
//! other's allocations. A block allocated on one thread and freed on another
//! skews both threads' counts; the leak checks here only make sense for
//! single-threaded test bodies.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
    static TOTAL: Cell<usize> = const { Cell::new(0) };
}

fn on_alloc() {
    let _ = LIVE.try_with(|live| live.set(live.get() + 1));
    let _ = TOTAL.try_with(|total| total.set(total.get() + 1));
}

fn on_dealloc() {
    let _ = LIVE.try_with(|live| live.set(live.get() - 1));
}

/// Global allocator forwarding to [`System`] while counting live blocks.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            on_alloc();
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            on_alloc();
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        on_dealloc();
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

/// Blocks allocated and not yet freed by the current thread.
pub fn live_allocations() -> isize {
    LIVE.with(Cell::get)
}

/// Blocks ever allocated by the current thread.
pub fn total_allocations() -> usize {
    TOTAL.with(Cell::get)
}

/// Fails the current test if the thread's live allocation count differs
/// between creation and drop of the guard.
///
/// Only meaningful in binaries that install [`CountingAllocator`].
pub struct MemoryGuard {
    at_start: isize,
}

impl MemoryGuard {
    pub fn new() -> MemoryGuard {
        MemoryGuard {
            at_start: live_allocations(),
        }
    }

    /// Net allocations made since the guard was created.
    pub fn outstanding(&self) -> isize {
        live_allocations() - self.at_start
    }
}

impl Default for MemoryGuard {
    fn default() -> Self {
        MemoryGuard::new()
    }
}

impl Drop for MemoryGuard {
    fn drop(&mut self) {
        // The assertion message allocates, so read the count first.
        let now = live_allocations();
        if now != self.at_start && !std::thread::panicking() {
            panic!(
                "memory leak: {} live allocations at start, {} now",
                self.at_start, now
            );
        }
    }
}
