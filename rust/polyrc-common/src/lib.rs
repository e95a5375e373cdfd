//! Core definitions shared by all polyrc-* crates.

pub mod error;
pub mod result;

pub use result::Result;
