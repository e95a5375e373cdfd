//! Test utilities for the polyrc crates.
//!
//! This crate provides:
//! - A counting global allocator and a scope guard that fails on leaks
//! - A small class-like hierarchy whose instances count themselves
//!
//! # Usage
//!
//! Install the allocator in a test binary to make [`MemoryGuard`] effective:
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: polyrc_testkit::CountingAllocator = polyrc_testkit::CountingAllocator;
//! ```

pub mod alloc;
pub mod hierarchy;

pub use alloc::{CountingAllocator, MemoryGuard};
pub use hierarchy::{Base, BaseValue, Derived, InstanceCounter, Sibling};
