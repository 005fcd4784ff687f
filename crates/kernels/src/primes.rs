//! Prime kernel: the n-th prime number.

use crate::config::{KernelOutput, OutputKind, Strategy};
use crate::ensure_input;
use crate::error::KernelError;
use crate::fixtures::{FixtureCase, FixtureMode, FixtureProvider};
use crate::params::{ParamKind, Params};
use crate::registry::{KernelRegistry, KernelSpec};
use crate::utils::count_param;
use anyhow::{anyhow, Result};
use ndarray::{s, Array1};

pub const NTH_PRIME: &str = "nth_prime";

const SIGNATURE: [(&str, ParamKind); 1] = [("n", ParamKind::Int)];

/// Trial division by every integer below the candidate.
pub fn nth_prime_reference(n: usize) -> Result<u64> {
    ensure_input!(n >= 1, "n must be at least 1, got {n}");

    let mut found = 0;
    let mut candidate: u64 = 2;
    loop {
        let mut prime = true;
        for div in 2..candidate {
            if candidate % div == 0 {
                prime = false;
                break;
            }
        }
        if prime {
            found += 1;
            if found == n {
                return Ok(candidate);
            }
        }
        candidate += 1;
    }
}

/// Sieve of Eratosthenes over a boolean array bounded by `n(ln n + ln ln n)`.
pub fn nth_prime_vectorized(n: usize) -> Result<u64> {
    ensure_input!(n >= 1, "n must be at least 1, got {n}");

    let limit = sieve_limit(n);
    let mut sieve = Array1::from_elem(limit + 1, true);
    sieve[0] = false;
    sieve[1] = false;

    let mut p = 2;
    while p * p <= limit {
        if sieve[p] {
            let step = p as isize;
            sieve.slice_mut(s![p * p..;step]).fill(false);
        }
        p += 1;
    }

    sieve
        .iter()
        .enumerate()
        .filter(|&(_, &is_prime)| is_prime)
        .nth(n - 1)
        .map(|(value, _)| value as u64)
        .ok_or_else(|| anyhow!("sieve bound {limit} holds fewer than {n} primes"))
}

/// Odd-only trial division up to the square root of the candidate.
pub fn nth_prime_compiled(n: usize) -> Result<u64> {
    ensure_input!(n >= 1, "n must be at least 1, got {n}");
    if n == 1 {
        return Ok(2);
    }

    let mut found = 1;
    let mut candidate: u64 = 1;
    loop {
        candidate += 2;
        if is_odd_prime(candidate) {
            found += 1;
            if found == n {
                return Ok(candidate);
            }
        }
    }
}

#[inline(always)]
fn is_odd_prime(candidate: u64) -> bool {
    let mut div = 3;
    while div * div <= candidate {
        if candidate % div == 0 {
            return false;
        }
        div += 2;
    }
    true
}

/// Rosser's upper bound on the n-th prime, valid for n >= 6.
fn sieve_limit(n: usize) -> usize {
    if n < 6 {
        return 15;
    }
    let n = n as f64;
    (n * (n.ln() + n.ln().ln())).ceil() as usize
}

pub fn register_nth_prime(registry: &mut KernelRegistry) -> Result<(), KernelError> {
    let variants: [(Strategy, fn(usize) -> Result<u64>); 3] = [
        (Strategy::Reference, nth_prime_reference),
        (Strategy::Vectorized, nth_prime_vectorized),
        (Strategy::Compiled, nth_prime_compiled),
    ];
    for (strategy, kernel) in variants {
        let spec = KernelSpec::new(NTH_PRIME, strategy, OutputKind::ScalarInt, move |params: &Params| {
            let n = count_param(params, "n")?;
            let prime = kernel(n)?;
            Ok(KernelOutput::Int(i64::try_from(prime)?))
        })
        .with_signature(&SIGNATURE);
        registry.register_spec(spec)?;
    }
    Ok(())
}

/// Fixtures for [`NTH_PRIME`].
pub struct NthPrimeFixtures;

impl FixtureProvider for NthPrimeFixtures {
    fn kernel_name(&self) -> &str {
        NTH_PRIME
    }

    fn cases(&self, mode: FixtureMode) -> Vec<FixtureCase> {
        match mode {
            FixtureMode::Correctness => vec![
                FixtureCase::fixed("n=1", || Params::new().with("n", 1i64)),
                FixtureCase::fixed("n=2", || Params::new().with("n", 2i64)),
                FixtureCase::fixed("n=5", || Params::new().with("n", 5i64)),
                FixtureCase::fixed("n=0 (invalid)", || Params::new().with("n", 0i64)),
                FixtureCase::seeded("random n", |rng| {
                    Params::new().with("n", rng.i64(1..=400))
                }),
            ],
            FixtureMode::Benchmark => [10usize, 100, 1_000]
                .into_iter()
                .map(|n| {
                    FixtureCase::fixed(format!("n={n}"), move || {
                        Params::new().with("n", n as i64)
                    })
                    .with_size(n)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidInput;
    use proptest::prelude::*;
    use crate::config::Strategy;

    #[test]
    fn first_primes() {
        let expected = [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29];
        for (idx, &prime) in expected.iter().enumerate() {
            let n = idx + 1;
            assert_eq!(nth_prime_reference(n).unwrap(), prime);
            assert_eq!(nth_prime_vectorized(n).unwrap(), prime);
            assert_eq!(nth_prime_compiled(n).unwrap(), prime);
        }
    }

    #[test]
    fn fifth_prime_is_eleven() {
        let registry = KernelRegistry::with_builtin_kernels().unwrap();
        let params = Params::new().with("n", 5i64);
        for strategy in Strategy::ALL {
            let output = registry.invoke(NTH_PRIME, strategy, &params).unwrap();
            assert_eq!(output, KernelOutput::Int(11), "{strategy} variant");
        }
    }

    #[test]
    fn zero_is_rejected_by_every_variant() {
        for kernel in [nth_prime_reference, nth_prime_vectorized, nth_prime_compiled] {
            let err = kernel(0).unwrap_err();
            assert!(err.downcast_ref::<InvalidInput>().is_some());
        }
    }

    #[test]
    fn thousandth_prime() {
        assert_eq!(nth_prime_vectorized(1_000).unwrap(), 7_919);
        assert_eq!(nth_prime_compiled(1_000).unwrap(), 7_919);
    }

    proptest! {
        #[test]
        fn prop_variants_agree_exactly(n in 1usize..300) {
            let reference = nth_prime_reference(n).unwrap();
            prop_assert_eq!(nth_prime_vectorized(n).unwrap(), reference);
            prop_assert_eq!(nth_prime_compiled(n).unwrap(), reference);
        }
    }
}
