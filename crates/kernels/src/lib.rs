//! Numeric kernels, their interchangeable variants, and input fixtures.

pub mod config;
pub mod dot;
pub mod error;
pub mod fixtures;
pub mod integrate;
pub mod params;
pub mod primes;
pub mod registry;
pub mod smooth;
pub mod utils;

pub use config::*;
pub use dot::*;
pub use error::*;
pub use fixtures::*;
pub use integrate::*;
pub use params::*;
pub use primes::*;
pub use registry::*;
pub use smooth::*;
pub use utils::*;
