//! Equivalence checking and benchmarking for interchangeable numeric kernel variants.

pub use kernelcheck_bench as bench;
pub use kernelcheck_harness as harness;
pub use kernelcheck_kernels as kernels;
pub use kernelcheck_verifier as verifier;
