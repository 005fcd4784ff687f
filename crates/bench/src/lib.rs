//! Benchmarking support for kernel variants.

pub mod runner;
pub mod stats;

pub use runner::*;
pub use stats::*;
