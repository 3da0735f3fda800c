//! Common type definitions shared across the bus.

pub mod aliases;

pub use aliases::*;
