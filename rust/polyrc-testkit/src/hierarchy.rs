//! A class-like hierarchy for exercising polymorphic handles.
//!
//! `Base` plays the role of the base class. `InstanceCounter` implements it
//! and counts its live instances; `Derived` extends `InstanceCounter` by
//! embedding one, and `Sibling` is an unrelated `Base` implementor.

use std::any::Any;
use std::cell::Cell;

use polyrc::{impl_downcast, impl_upcast};

thread_local! {
    static INSTANCES: Cell<usize> = const { Cell::new(0) };
    static COPIES: Cell<usize> = const { Cell::new(0) };
}

pub trait Base: Any {
    fn is_base(&self) -> bool {
        true
    }
}

impl_downcast!(dyn Base);

/// A `Base` implementor that is nothing more.
#[derive(Debug, Default)]
pub struct BaseValue;

impl Base for BaseValue {}

impl_upcast!(BaseValue => dyn Base);

/// Counts its live instances on the current thread.
#[derive(Debug)]
pub struct InstanceCounter {
    /// A marker to tell instances apart.
    pub value: Cell<i32>,
}

impl InstanceCounter {
    pub fn new() -> InstanceCounter {
        InstanceCounter::with_value(0)
    }

    pub fn with_value(value: i32) -> InstanceCounter {
        INSTANCES.with(|n| n.set(n.get() + 1));
        InstanceCounter {
            value: Cell::new(value),
        }
    }

    /// Live instances on the current thread.
    pub fn instances() -> usize {
        INSTANCES.with(Cell::get)
    }

    /// Clones made on the current thread.
    pub fn copies() -> usize {
        COPIES.with(Cell::get)
    }

    pub fn get(&self) -> i32 {
        self.value.get()
    }

    pub fn set(&self, value: i32) {
        self.value.set(value);
    }
}

impl Default for InstanceCounter {
    fn default() -> Self {
        InstanceCounter::new()
    }
}

impl Clone for InstanceCounter {
    fn clone(&self) -> Self {
        COPIES.with(|n| n.set(n.get() + 1));
        InstanceCounter::with_value(self.get())
    }
}

impl Drop for InstanceCounter {
    fn drop(&mut self) {
        INSTANCES.with(|n| n.set(n.get() - 1));
    }
}

impl Base for InstanceCounter {
    fn is_base(&self) -> bool {
        false
    }
}

impl_upcast!(InstanceCounter => dyn Base);

/// Extends `InstanceCounter`.
#[derive(Debug, Default)]
pub struct Derived {
    pub counter: InstanceCounter,
    pub label: &'static str,
}

impl Derived {
    pub fn new(value: i32, label: &'static str) -> Derived {
        Derived {
            counter: InstanceCounter::with_value(value),
            label,
        }
    }
}

impl Base for Derived {
    fn is_base(&self) -> bool {
        false
    }
}

impl_upcast!(Derived => dyn Base);
impl_upcast!(Derived => InstanceCounter, .counter);

/// A `Base` implementor unrelated to `InstanceCounter`.
#[derive(Debug, Default)]
pub struct Sibling {
    pub counter: InstanceCounter,
}

impl Base for Sibling {
    fn is_base(&self) -> bool {
        false
    }
}

impl_upcast!(Sibling => dyn Base);
