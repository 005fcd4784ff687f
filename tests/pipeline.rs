use anyhow::Result;
use approx::assert_abs_diff_eq;
use kernelcheck::bench::{BenchConfig, BenchmarkRunner};
use kernelcheck::harness::{Harness, HarnessConfig, RunReport};
use kernelcheck::kernels::{
    FailureCategory, FixtureGenerator, FixtureMode, KernelError, KernelOutput, KernelRegistry, Params, Strategy,
    DOT, INTEGRATE, NTH_PRIME, SMOOTH,
};
use ndarray::array;

fn quick_config() -> HarnessConfig {
    HarnessConfig {
        warmup_iterations: 1,
        min_measure_seconds: 1e-3,
        min_repetitions: 3,
        max_repetitions: Some(50),
        ..HarnessConfig::default()
    }
}

#[test]
fn every_variant_agrees_with_reference() -> Result<()> {
    let harness = Harness::new(quick_config())?;
    let reports = harness.verify(&[])?;
    assert_eq!(reports.len(), 4);
    for report in &reports {
        assert_eq!(report.baseline, Strategy::Reference);
        assert!(report.passed(), "{} failed: {:?}", report.kernel_name, report.disagreements().collect::<Vec<_>>());
        assert!(report.errors.is_empty());
    }
    Ok(())
}

#[test]
fn smoothing_a_ramp() -> Result<()> {
    let registry = KernelRegistry::with_builtin_kernels()?;
    let params = Params::new().with("x", array![1.0, 2.0, 3.0, 4.0]);
    for strategy in Strategy::ALL {
        let output = registry.invoke(SMOOTH, strategy, &params)?;
        let values = output.as_sequence().cloned().unwrap_or_default();
        assert_eq!(values.len(), 4);
        for (got, want) in values.iter().zip([1.5, 2.0, 3.0, 3.5]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
    }
    Ok(())
}

#[test]
fn fifth_prime_is_eleven() -> Result<()> {
    let registry = KernelRegistry::with_builtin_kernels()?;
    let params = Params::new().with("n", 5i64);
    for strategy in Strategy::ALL {
        assert_eq!(registry.invoke(NTH_PRIME, strategy, &params)?, KernelOutput::Int(11));
    }
    Ok(())
}

#[test]
fn boundary_inputs_are_rejected_by_every_variant() -> Result<()> {
    let registry = KernelRegistry::with_builtin_kernels()?;
    let cases = [
        (NTH_PRIME, Params::new().with("n", 0i64)),
        (SMOOTH, Params::new().with("x", array![1.0])),
        (DOT, Params::new().with("x", array![1.0, 2.0]).with("y", array![1.0])),
        (INTEGRATE, Params::new().with("a", -1.0).with("b", 1.0).with("n", 0i64)),
    ];
    for (kernel, params) in &cases {
        for strategy in Strategy::ALL {
            let err = registry.invoke(kernel, strategy, params).unwrap_err();
            assert!(err.is_invalid_input(), "{kernel}/{strategy}: {err}");
        }
    }
    Ok(())
}

#[test]
fn two_element_smoothing_is_the_pair_mean() -> Result<()> {
    let registry = KernelRegistry::with_builtin_kernels()?;
    let params = Params::new().with("x", array![1.0, 3.0]);
    let output = registry.invoke(SMOOTH, Strategy::Compiled, &params)?;
    assert_eq!(output, KernelOutput::Sequence(array![2.0, 2.0]));
    Ok(())
}

#[test]
fn fixtures_are_reproducible_from_seed() -> Result<()> {
    let a = FixtureGenerator::with_builtin_providers(7);
    let b = FixtureGenerator::with_builtin_providers(7);
    let c = FixtureGenerator::with_builtin_providers(8);
    for kernel in [SMOOTH, DOT] {
        let first: Vec<_> = a.fixtures_for(kernel, FixtureMode::Correctness)?.collect();
        let second: Vec<_> = b.fixtures_for(kernel, FixtureMode::Correctness)?.collect();
        let other: Vec<_> = c.fixtures_for(kernel, FixtureMode::Correctness)?.collect();
        assert_eq!(first.len(), second.len());
        assert!(first.iter().zip(&second).all(|(x, y)| x.params.bitwise_eq(&y.params)));
        assert!(first.iter().zip(&other).any(|(x, y)| !x.params.bitwise_eq(&y.params)));
    }
    Ok(())
}

#[test]
fn restarted_fixtures_repeat_the_sequence() -> Result<()> {
    let generator = FixtureGenerator::with_builtin_providers(42);
    let mut fixtures = generator.fixtures_for(DOT, FixtureMode::Benchmark)?;
    let first = fixtures.next().map(|f| f.params);
    fixtures.restart();
    let again = fixtures.next().map(|f| f.params);
    assert!(matches!((first, again), (Some(x), Some(y)) if x.bitwise_eq(&y)));
    Ok(())
}

#[test]
fn reference_timing_grows_with_size() -> Result<()> {
    let registry = KernelRegistry::with_builtin_kernels()?;
    let generator = FixtureGenerator::with_builtin_providers(42);
    let runner = BenchmarkRunner::new(BenchConfig {
        warmup_iterations: 1,
        min_measure_seconds: 5e-3,
        min_repetitions: 3,
        max_repetitions: Some(200),
        variant_time_budget_seconds: None,
    })?;
    let report = runner.run_kernel(&registry, DOT, generator.fixtures_for(DOT, FixtureMode::Benchmark)?)?;
    assert!(report.failures.is_empty());

    let trend = report.median_trend(Strategy::Reference);
    assert_eq!(trend.len(), 3);
    let (smallest, largest) = (trend[0], trend[trend.len() - 1]);
    assert!(smallest.0 < largest.0);
    // Only the extremes are compared; neighbouring sizes can swap under noise.
    assert!(largest.1 > smallest.1, "{trend:?}");
    Ok(())
}

#[test]
fn saved_report_diffs_against_itself() -> Result<()> {
    let harness = Harness::new(quick_config())?;
    let report = harness.run(&[NTH_PRIME.to_string()])?;
    assert!(report.passed());

    let path = std::env::temp_dir().join(format!("kernelcheck-pipeline-{}.json", std::process::id()));
    report.save(&path)?;
    let loaded = RunReport::load(&path)?;
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, report);
    let deltas = report.diff(&loaded);
    assert_eq!(deltas.len(), report.samples().count());
    for delta in deltas.values() {
        assert_abs_diff_eq!(delta.median_delta_seconds, 0.0);
    }
    Ok(())
}

#[test]
fn selftest_kills_every_mutant() -> Result<()> {
    let harness = Harness::new(quick_config())?;
    let outcomes = harness.selftest()?;
    assert!(!outcomes.is_empty());
    for outcome in &outcomes {
        assert!(outcome.killed, "{} survived: {:?}", outcome.description, outcome.observed);
    }
    assert!(outcomes.iter().any(|o| o.expected_failure == FailureCategory::NonDeterministic));
    Ok(())
}

#[test]
fn unknown_kernel_halts_the_run() -> Result<()> {
    let harness = Harness::new(quick_config())?;
    let err = harness.run(&["fft".to_string()]).unwrap_err();
    assert!(matches!(err.downcast_ref::<KernelError>(), Some(KernelError::UnknownKernel(name)) if name == "fft"));
    Ok(())
}
