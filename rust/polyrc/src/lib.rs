//! Single-threaded reference counting with polymorphic aliasing.
//!
//! Four handle types share one kind of allocation, a [`ValueBlock<T>`] that
//! stores the strong/weak counts next to the payload:
//!
//! - [`Rc<T>`]: owning pointer to the whole allocation, one pointer wide.
//! - [`Weak<T>`]: observer of an `Rc` payload that can [`Weak::lock`] back
//!   into an `Rc` while the payload is alive.
//! - [`Prc<T>`]: owning pointer that keeps the control block and the value
//!   view apart, so the view can be a trait object or a part of the payload
//!   while the block still frees the original allocation.
//! - [`Pweak<T>`]: observer counterpart of `Prc`.
//!
//! The [`cast`] module converts between them: infallible upcasts, checked
//! downcasts of the view, and recovery of the original `Rc` from a `Prc` by
//! testing the exact type of the allocation.
//!
//! Counts are plain integers; none of the handles are `Send` or `Sync`.
//! Cycles are not collected and must be broken with weak handles.
//!
//! # Usage
//!
//! ```
//! use std::any::Any;
//! use polyrc::{Prc, Rc, cast};
//!
//! let rc = Rc::new(42u32);
//! let any: Prc<dyn Any> = cast::upcast_rc(&rc);
//! assert_eq!(*cast::downcast::<u32, _>(&any), 42);
//! assert!(Rc::ptr_eq(&cast::recover::<u32, _>(&any), &rc));
//! assert!(Rc::is_null(&cast::recover::<u64, _>(&any)));
//! ```

pub mod block;
pub mod cast;
pub mod prc;
pub mod pweak;
pub mod rc;
pub mod weak;

#[cfg(feature = "serde")]
mod serde_impls;

pub use block::{ControlBlock, ValueBlock};
pub use cast::{Downcast, Upcast};
pub use polyrc_common::Result;
pub use polyrc_common::error::{Error, ErrorKind};
pub use prc::{Prc, make_prc};
pub use pweak::Pweak;
pub use rc::{Rc, make_rc};
pub use weak::Weak;

#[cold]
#[track_caller]
pub(crate) fn null_deref(handle: &'static str) -> ! {
    panic!("{}", Error::null_handle(handle))
}

#[cfg(test)]
mod tests;
