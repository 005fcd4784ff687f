//! Kernel registry: tagged variants of each logical kernel.

use crate::config::{KernelOutput, OutputKind, Strategy};
use crate::error::{InvalidInput, KernelError};
use crate::params::{signature_of, ParamKind, Params, Signature};
use anyhow::anyhow;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub type KernelFn = Arc<dyn Fn(&Params) -> anyhow::Result<KernelOutput> + Send + Sync>;

/// One registered implementation of a logical kernel.
#[derive(Clone)]
pub struct KernelSpec {
    name: String,
    strategy: Strategy,
    output_kind: OutputKind,
    signature: Option<Signature>,
    callable: KernelFn,
}

impl KernelSpec {
    pub fn new<F>(name: impl Into<String>, strategy: Strategy, output_kind: OutputKind, callable: F) -> Self
    where
        F: Fn(&Params) -> anyhow::Result<KernelOutput> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            strategy,
            output_kind,
            signature: None,
            callable: Arc::new(callable),
        }
    }

    pub fn with_signature(mut self, entries: &[(&str, ParamKind)]) -> Self {
        self.signature = Some(signature_of(entries));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Invoke the variant, classifying every failure it can raise.
    ///
    /// Kernel validation failures become [`KernelError::InvalidInput`]; any other
    /// error or panic becomes [`KernelError::Execution`] with the cause attached.
    pub fn call(&self, params: &Params) -> Result<KernelOutput, KernelError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.callable)(params)));
        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(self.classify(err)),
            Err(payload) => {
                return Err(self.execution_error(anyhow!(
                    "variant panicked: {}",
                    panic_message(payload.as_ref())
                )))
            }
        };

        if output.kind() != self.output_kind {
            return Err(self.execution_error(anyhow!(
                "returned {} but was registered as {}",
                output.kind(),
                self.output_kind
            )));
        }
        Ok(output)
    }

    fn classify(&self, err: anyhow::Error) -> KernelError {
        match err.downcast::<InvalidInput>() {
            Ok(invalid) => KernelError::InvalidInput {
                kernel: self.name.clone(),
                strategy: self.strategy,
                reason: invalid.reason,
            },
            Err(err) => self.execution_error(err),
        }
    }

    fn execution_error(&self, source: anyhow::Error) -> KernelError {
        KernelError::Execution {
            kernel: self.name.clone(),
            strategy: self.strategy,
            source,
        }
    }
}

impl fmt::Debug for KernelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelSpec")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("output_kind", &self.output_kind)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug, Clone)]
struct KernelEntry {
    name: String,
    output_kind: OutputKind,
    signature: Option<Signature>,
    variants: Vec<KernelSpec>,
}

/// Registered kernels in first-registration order, each with its variants in
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: Vec<KernelEntry>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            kernels: Vec::new(),
        }
    }

    /// Registry holding the reference, vectorized and compiled variants of
    /// every built-in kernel.
    pub fn with_builtin_kernels() -> Result<Self, KernelError> {
        let mut registry = Self::new();
        crate::primes::register_nth_prime(&mut registry)?;
        crate::smooth::register_smooth(&mut registry)?;
        crate::dot::register_dot(&mut registry)?;
        crate::integrate::register_integrate(&mut registry)?;
        Ok(registry)
    }

    pub fn register<F>(
        &mut self,
        name: &str,
        strategy: Strategy,
        callable: F,
        output_kind: OutputKind,
    ) -> Result<(), KernelError>
    where
        F: Fn(&Params) -> anyhow::Result<KernelOutput> + Send + Sync + 'static,
    {
        self.register_spec(KernelSpec::new(name, strategy, output_kind, callable))
    }

    pub fn register_spec(&mut self, spec: KernelSpec) -> Result<(), KernelError> {
        let Some(index) = self.kernels.iter().position(|entry| entry.name == spec.name) else {
            self.kernels.push(KernelEntry {
                name: spec.name.clone(),
                output_kind: spec.output_kind,
                signature: spec.signature.clone(),
                variants: vec![spec],
            });
            return Ok(());
        };

        let kernel = spec.name.clone();
        let strategy = spec.strategy;
        let rejection = move |reason: String| KernelError::Registration {
            kernel,
            strategy,
            reason,
        };
        let entry = &mut self.kernels[index];

        if entry.variants.iter().any(|v| v.strategy == spec.strategy) {
            return Err(rejection(format!(
                "a {} variant is already registered",
                spec.strategy
            )));
        }
        if entry.output_kind != spec.output_kind {
            return Err(rejection(format!(
                "declares {} but earlier variants produce {}",
                spec.output_kind, entry.output_kind
            )));
        }
        match (&entry.signature, &spec.signature) {
            (Some(existing), Some(declared)) if existing != declared => {
                return Err(rejection(format!(
                    "parameter signature {} differs from {}",
                    describe_signature(declared),
                    describe_signature(existing)
                )));
            }
            (None, Some(declared)) => entry.signature = Some(declared.clone()),
            _ => {}
        }

        entry.variants.push(spec);
        Ok(())
    }

    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(|entry| entry.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn variants_for(&self, name: &str) -> Result<&[KernelSpec], KernelError> {
        self.entry(name)
            .map(|entry| entry.variants.as_slice())
            .ok_or_else(|| KernelError::UnknownKernel(name.to_string()))
    }

    pub fn find_variant(&self, name: &str, strategy: Strategy) -> Option<&KernelSpec> {
        self.entry(name)?
            .variants
            .iter()
            .find(|variant| variant.strategy == strategy)
    }

    pub fn output_kind(&self, name: &str) -> Option<OutputKind> {
        self.entry(name).map(|entry| entry.output_kind)
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.entry(name)?.signature.as_ref()
    }

    pub fn invoke(
        &self,
        name: &str,
        strategy: Strategy,
        params: &Params,
    ) -> Result<KernelOutput, KernelError> {
        self.resolve(name, strategy, params)?.call(params)
    }

    /// Everything `invoke` checks before calling the variant.
    pub fn check_signature(
        &self,
        name: &str,
        strategy: Strategy,
        params: &Params,
    ) -> Result<(), KernelError> {
        self.resolve(name, strategy, params).map(|_| ())
    }

    fn resolve(
        &self,
        name: &str,
        strategy: Strategy,
        params: &Params,
    ) -> Result<&KernelSpec, KernelError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| KernelError::UnknownKernel(name.to_string()))?;
        let variant = entry
            .variants
            .iter()
            .find(|variant| variant.strategy == strategy)
            .ok_or_else(|| KernelError::UnknownVariant {
                kernel: name.to_string(),
                strategy,
            })?;

        if let Some(signature) = &entry.signature {
            let provided = params.signature();
            if &provided != signature {
                return Err(KernelError::InvalidInput {
                    kernel: name.to_string(),
                    strategy,
                    reason: format!(
                        "parameters {} do not match signature {}",
                        describe_signature(&provided),
                        describe_signature(signature)
                    ),
                });
            }
        }

        Ok(variant)
    }

    fn entry(&self, name: &str) -> Option<&KernelEntry> {
        self.kernels.iter().find(|entry| entry.name == name)
    }
}

fn describe_signature(signature: &Signature) -> String {
    let fields: Vec<String> = signature
        .iter()
        .map(|(name, kind)| format!("{name}: {kind}"))
        .collect();
    format!("{{{}}}", fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_input;
    use crate::error::FailureCategory;

    fn constant(value: i64) -> impl Fn(&Params) -> anyhow::Result<KernelOutput> + Send + Sync {
        move |_params: &Params| Ok(KernelOutput::Int(value))
    }

    #[test]
    fn variants_keep_registration_order() {
        let mut registry = KernelRegistry::new();
        registry
            .register("k", Strategy::Compiled, constant(1), OutputKind::ScalarInt)
            .unwrap();
        registry
            .register("k", Strategy::Reference, constant(1), OutputKind::ScalarInt)
            .unwrap();
        registry
            .register("k", Strategy::Vectorized, constant(1), OutputKind::ScalarInt)
            .unwrap();

        let order: Vec<Strategy> = registry
            .variants_for("k")
            .unwrap()
            .iter()
            .map(KernelSpec::strategy)
            .collect();
        assert_eq!(
            order,
            vec![Strategy::Compiled, Strategy::Reference, Strategy::Vectorized]
        );
    }

    #[test]
    fn duplicate_strategy_is_rejected() {
        let mut registry = KernelRegistry::new();
        registry
            .register("k", Strategy::Reference, constant(1), OutputKind::ScalarInt)
            .unwrap();
        let err = registry
            .register("k", Strategy::Reference, constant(2), OutputKind::ScalarInt)
            .unwrap_err();
        assert_eq!(err.category(), FailureCategory::Registration);
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn conflicting_output_kind_is_rejected() {
        let mut registry = KernelRegistry::new();
        registry
            .register("k", Strategy::Reference, constant(1), OutputKind::ScalarInt)
            .unwrap();
        let err = registry
            .register(
                "k",
                Strategy::Vectorized,
                |_: &Params| Ok(KernelOutput::Float(1.0)),
                OutputKind::ScalarFloat,
            )
            .unwrap_err();
        assert!(matches!(err, KernelError::Registration { .. }));
    }

    #[test]
    fn conflicting_signature_is_rejected() {
        let mut registry = KernelRegistry::new();
        registry
            .register_spec(
                KernelSpec::new("k", Strategy::Reference, OutputKind::ScalarInt, constant(1))
                    .with_signature(&[("n", ParamKind::Int)]),
            )
            .unwrap();
        let err = registry
            .register_spec(
                KernelSpec::new("k", Strategy::Compiled, OutputKind::ScalarInt, constant(1))
                    .with_signature(&[("n", ParamKind::Float)]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn invoke_classifies_validation_and_execution_failures() {
        let mut registry = KernelRegistry::new();
        registry
            .register(
                "k",
                Strategy::Reference,
                |params: &Params| {
                    let n = params.int("n")?;
                    ensure_input!(n > 0, "n must be positive");
                    if n == 13 {
                        anyhow::bail!("unlucky input");
                    }
                    Ok(KernelOutput::Int(n))
                },
                OutputKind::ScalarInt,
            )
            .unwrap();

        let ok = registry
            .invoke("k", Strategy::Reference, &Params::new().with("n", 3i64))
            .unwrap();
        assert_eq!(ok, KernelOutput::Int(3));

        let invalid = registry
            .invoke("k", Strategy::Reference, &Params::new().with("n", 0i64))
            .unwrap_err();
        assert!(invalid.is_invalid_input());

        let failed = registry
            .invoke("k", Strategy::Reference, &Params::new().with("n", 13i64))
            .unwrap_err();
        match failed {
            KernelError::Execution { source, .. } => {
                assert_eq!(source.to_string(), "unlucky input")
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn panics_and_wrong_kinds_become_execution_errors() {
        let mut registry = KernelRegistry::new();
        registry
            .register(
                "k",
                Strategy::Reference,
                |_: &Params| panic!("boom"),
                OutputKind::ScalarInt,
            )
            .unwrap();
        registry
            .register(
                "k",
                Strategy::Compiled,
                |_: &Params| Ok(KernelOutput::Float(0.5)),
                OutputKind::ScalarInt,
            )
            .unwrap();

        let err = registry
            .invoke("k", Strategy::Reference, &Params::new())
            .unwrap_err();
        assert!(err.to_string().contains("boom"));

        let err = registry
            .invoke("k", Strategy::Compiled, &Params::new())
            .unwrap_err();
        assert!(err.to_string().contains("registered as scalar_int"));
    }

    #[test]
    fn unknown_lookups_are_reported() {
        let registry = KernelRegistry::with_builtin_kernels().unwrap();
        assert!(matches!(
            registry.variants_for("fft"),
            Err(KernelError::UnknownKernel(_))
        ));

        let mut sparse = KernelRegistry::new();
        sparse
            .register("k", Strategy::Reference, constant(1), OutputKind::ScalarInt)
            .unwrap();
        assert!(matches!(
            sparse.invoke("k", Strategy::Compiled, &Params::new()),
            Err(KernelError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn builtin_registry_has_three_variants_per_kernel() {
        let registry = KernelRegistry::with_builtin_kernels().unwrap();
        let names: Vec<&str> = registry.kernel_names().collect();
        assert_eq!(names, vec!["nth_prime", "smooth", "dot", "integrate"]);
        for name in names {
            let strategies: Vec<Strategy> = registry
                .variants_for(name)
                .unwrap()
                .iter()
                .map(KernelSpec::strategy)
                .collect();
            assert_eq!(strategies, Strategy::ALL.to_vec());
        }
    }

    #[test]
    fn invoke_rejects_parameters_outside_signature() {
        let registry = KernelRegistry::with_builtin_kernels().unwrap();
        let err = registry
            .invoke("nth_prime", Strategy::Reference, &Params::new().with("n", 2.0))
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn signature_check_runs_without_calling() {
        let registry = KernelRegistry::with_builtin_kernels().unwrap();
        assert!(registry
            .check_signature("nth_prime", Strategy::Compiled, &Params::new().with("n", 0i64))
            .is_ok());
        let err = registry
            .check_signature("nth_prime", Strategy::Compiled, &Params::new().with("x", vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, KernelError::InvalidInput { .. }));
        assert!(matches!(
            registry.check_signature("fft", Strategy::Reference, &Params::new()),
            Err(KernelError::UnknownKernel(_))
        ));
    }
}
