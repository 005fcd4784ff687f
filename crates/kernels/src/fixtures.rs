//! Deterministic input fixtures for each kernel.
//!
//! Fixtures are built lazily from a base seed: the same seed always yields the
//! same parameters, and every consumer can restart the sequence from the top.

use crate::dot::DotFixtures;
use crate::error::KernelError;
use crate::integrate::IntegrateFixtures;
use crate::params::Params;
use crate::primes::NthPrimeFixtures;
use crate::smooth::SmoothFixtures;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_SEED: u64 = 42;

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureMode {
    /// Edge cases plus seeded random inputs.
    Correctness,
    /// Inputs of increasing size.
    Benchmark,
}

impl fmt::Display for FixtureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureMode::Correctness => f.write_str("correctness"),
            FixtureMode::Benchmark => f.write_str("benchmark"),
        }
    }
}

/// One materialized input for a kernel.
#[derive(Debug, Clone)]
pub struct InputFixture {
    pub kernel_name: String,
    pub label: String,
    pub size: usize,
    pub seed: u64,
    pub params: Params,
}

type Builder = Arc<dyn Fn(&mut fastrand::Rng) -> Params + Send + Sync>;

/// Recipe for one fixture; parameters are only built when the fixture is drawn.
#[derive(Clone)]
pub struct FixtureCase {
    label: String,
    size: Option<usize>,
    build: Builder,
}

impl FixtureCase {
    /// Case whose parameters do not depend on the seed.
    pub fn fixed<F>(label: impl Into<String>, build: F) -> Self
    where
        F: Fn() -> Params + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            size: None,
            build: Arc::new(move |_rng: &mut fastrand::Rng| build()),
        }
    }

    pub fn seeded<F>(label: impl Into<String>, build: F) -> Self
    where
        F: Fn(&mut fastrand::Rng) -> Params + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            size: None,
            build: Arc::new(build),
        }
    }

    /// Override the size reported for the fixture (defaults to the longest array).
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for FixtureCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureCase")
            .field("label", &self.label)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Source of fixture cases for one kernel.
pub trait FixtureProvider: Send + Sync {
    fn kernel_name(&self) -> &str;
    fn cases(&self, mode: FixtureMode) -> Vec<FixtureCase>;
}

pub struct FixtureGenerator {
    seed: u64,
    providers: Vec<Arc<dyn FixtureProvider>>,
}

impl FixtureGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            providers: Vec::new(),
        }
    }

    pub fn with_builtin_providers(seed: u64) -> Self {
        let mut generator = Self::new(seed);
        generator.register_provider(Arc::new(NthPrimeFixtures));
        generator.register_provider(Arc::new(SmoothFixtures));
        generator.register_provider(Arc::new(DotFixtures));
        generator.register_provider(Arc::new(IntegrateFixtures));
        generator
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Add a provider; a later provider for the same kernel replaces the earlier one.
    pub fn register_provider(&mut self, provider: Arc<dyn FixtureProvider>) {
        self.providers
            .retain(|existing| existing.kernel_name() != provider.kernel_name());
        self.providers.push(provider);
    }

    pub fn has_provider(&self, kernel: &str) -> bool {
        self.providers.iter().any(|p| p.kernel_name() == kernel)
    }

    pub fn fixtures_for(&self, kernel: &str, mode: FixtureMode) -> Result<Fixtures, KernelError> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.kernel_name() == kernel)
            .ok_or_else(|| KernelError::UnknownKernel(kernel.to_string()))?;
        Ok(Fixtures {
            kernel_name: kernel.to_string(),
            seed: self.seed,
            cases: provider.cases(mode).into(),
            next: 0,
        })
    }
}

impl fmt::Debug for FixtureGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kernels: Vec<&str> = self.providers.iter().map(|p| p.kernel_name()).collect();
        f.debug_struct("FixtureGenerator")
            .field("seed", &self.seed)
            .field("kernels", &kernels)
            .finish()
    }
}

/// Lazy, restartable sequence of fixtures for one kernel.
#[derive(Debug, Clone)]
pub struct Fixtures {
    kernel_name: String,
    seed: u64,
    cases: Arc<[FixtureCase]>,
    next: usize,
}

impl Fixtures {
    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }

    /// Fixed-seed copy starting from the first fixture.
    pub fn restarted(&self) -> Self {
        let mut copy = self.clone();
        copy.restart();
        copy
    }

    fn materialize(&self, index: usize) -> InputFixture {
        let case = &self.cases[index];
        let seed = self.seed ^ (index as u64 + 1).wrapping_mul(SEED_MIX);
        let mut rng = fastrand::Rng::with_seed(seed);
        let params = (case.build)(&mut rng);
        InputFixture {
            kernel_name: self.kernel_name.clone(),
            label: case.label.clone(),
            size: case.size.unwrap_or_else(|| params.extent()),
            seed,
            params,
        }
    }
}

impl Iterator for Fixtures {
    type Item = InputFixture;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.cases.len() {
            return None;
        }
        let fixture = self.materialize(self.next);
        self.next += 1;
        Some(fixture)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cases.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fixtures {}
