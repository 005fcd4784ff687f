//! kernelcheck run orchestration.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod emit;
pub mod report;
pub mod session;

#[cfg(feature = "cli")]
pub use cli::*;
pub use config::*;
pub use emit::*;
pub use report::*;
pub use session::*;
