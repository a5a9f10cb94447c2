//! Device protocol implementations.

pub mod console;
