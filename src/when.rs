//! The per-test stubbing context.
//!
//! A [`When`] owns the stub registry and every interceptor installed through
//! it. Registration is a three-step chain:
//!
//! ```
//! use tugwhen::{args, Parameter, Signature, Target, Value, When, ANY};
//!
//! let klass = Target::new("Klass1").member(
//!     "method",
//!     Signature::new(vec![
//!         Parameter::regular("self"),
//!         Parameter::regular("arg1"),
//!         Parameter::keyword_only("kwarg1"),
//!     ])?,
//!     |_args| Ok(Value::from("Not mocked")),
//! );
//!
//! let mut when = When::with_config(Default::default());
//! when.configure(&klass, "method")?
//!     .expecting(args!("a", kwarg1 = ANY))?
//!     .returning("Mocked")?;
//!
//! let obj = tugwhen::ObjectRef::new("Klass1");
//! assert_eq!(klass.invoke_method("method", &obj, args!("a", kwarg1 = 1))?, Value::from("Mocked"));
//! assert_eq!(klass.invoke_method("method", &obj, args!("b", kwarg1 = 1))?, Value::from("Not mocked"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Dropping the context uninstalls every interceptor, restoring the original
//! implementations.

use std::collections::BTreeMap;
use std::sync::PoisonError;

use serde::Serialize;
use tracing::debug;

use tugwhen_core::{
    Behavior, CallArgs, CallLog, CallResult, CallShape, CallSpecification, CanonicalKey,
    Interceptor, InterceptorHandle, PatchError, PatchTarget, Raised, StubConfig, StubError,
    StubRegistry, TargetKey, Value,
};

// ============================================================================
// Context
// ============================================================================

/// A stubbing context, scoped to one test.
#[derive(Debug)]
pub struct When {
    config: StubConfig,
    registry: StubRegistry,
    interceptors: BTreeMap<TargetKey, Interceptor>,
    logs: BTreeMap<TargetKey, CallLog>,
}

impl When {
    /// New context configured from the environment.
    pub fn new() -> Self {
        When::with_config(StubConfig::from_env())
    }

    pub fn with_config(config: StubConfig) -> Self {
        When {
            config,
            registry: StubRegistry::new(),
            interceptors: BTreeMap::new(),
            logs: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    /// Start configuring `member` of `target`.
    ///
    /// Any interceptor this context installed on the member is removed first,
    /// so until the chain completes calls reach the original implementation.
    /// Fails with [`PatchError::AlreadyPatched`] while another context (or any
    /// other patch) holds the member.
    pub fn configure<'w, T>(
        &'w mut self,
        target: &'w T,
        member: &str,
    ) -> Result<ConfigurationHandle<'w, T>, StubError>
    where
        T: PatchTarget + ?Sized,
    {
        let key = TargetKey::new(target.display_name(), member);
        let signature = target
            .signature(member)
            .ok_or_else(|| PatchError::UnknownMember {
                target: key.target().to_string(),
                member: member.to_string(),
            })?;
        self.uninstall(&key);
        if target.is_patched(member) {
            return Err(PatchError::AlreadyPatched {
                target: key.target().to_string(),
                member: member.to_string(),
            }
            .into());
        }
        let shape = CallShape::new(signature, &self.config);
        Ok(ConfigurationHandle {
            when: self,
            target,
            key,
            shape,
        })
    }

    /// Returns true while an interceptor of this context wraps the member.
    pub fn is_installed(&self, target: &str, member: &str) -> bool {
        self.interceptors
            .get(&TargetKey::new(target, member))
            .is_some_and(Interceptor::is_installed)
    }

    /// Handle for the calls recorded on a member so far.
    pub fn handle(&self, target: &str, member: &str) -> Option<InterceptorHandle> {
        self.interceptors
            .get(&TargetKey::new(target, member))
            .map(Interceptor::handle)
    }

    /// Uninstall every interceptor, keeping registered specifications.
    pub fn uninstall_all(&mut self) {
        for (_, mut interceptor) in std::mem::take(&mut self.interceptors) {
            interceptor.uninstall();
        }
    }

    /// Uninstall everything and forget all specifications and calls.
    pub fn reset(&mut self) {
        self.uninstall_all();
        self.registry.clear();
        self.logs.clear();
        debug!("stubbing context reset");
    }

    /// Registered specifications per member, for diagnostics.
    pub fn summary(&self) -> Vec<StubSummary> {
        self.registry
            .targets()
            .filter_map(|key| {
                let bucket = self.registry.bucket(key)?;
                let bucket = bucket.read().unwrap_or_else(PoisonError::into_inner);
                Some(StubSummary {
                    target: key.clone(),
                    installed: self
                        .interceptors
                        .get(key)
                        .is_some_and(Interceptor::is_installed),
                    calls: self.logs.get(key).map_or(0, CallLog::len),
                    specifications: bucket
                        .entries()
                        .iter()
                        .map(|spec| SpecificationSummary {
                            key: spec.key().clone(),
                            behavior: spec.behavior().describe(),
                        })
                        .collect(),
                })
            })
            .collect()
    }

    /// [`When::summary`] as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.summary()).unwrap_or(serde_json::Value::Null)
    }

    fn uninstall(&mut self, key: &TargetKey) {
        if let Some(mut interceptor) = self.interceptors.remove(key) {
            interceptor.uninstall();
        }
    }
}

impl Default for When {
    fn default() -> Self {
        When::new()
    }
}

impl Drop for When {
    fn drop(&mut self) {
        self.uninstall_all();
    }
}

/// Diagnostic view of one member's specifications.
#[derive(Debug, Clone, Serialize)]
pub struct StubSummary {
    pub target: TargetKey,
    pub installed: bool,
    pub calls: usize,
    pub specifications: Vec<SpecificationSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecificationSummary {
    pub key: CanonicalKey,
    pub behavior: String,
}

// ============================================================================
// Handles
// ============================================================================

/// A member selected for stubbing; awaits example arguments.
pub struct ConfigurationHandle<'w, T: PatchTarget + ?Sized> {
    when: &'w mut When,
    target: &'w T,
    key: TargetKey,
    shape: CallShape,
}

impl<'w, T: PatchTarget + ?Sized> ConfigurationHandle<'w, T> {
    /// Example arguments the behavior applies to. [`ANY`](crate::ANY) matches
    /// any value; methods omit the receiver.
    pub fn expecting(self, args: CallArgs) -> Result<SpecificationHandle<'w, T>, StubError> {
        let spec_key = self.shape.example_key(&args)?;
        debug!(target_key = %self.key, key = %spec_key, "expecting");
        Ok(SpecificationHandle {
            when: self.when,
            target: self.target,
            key: self.key,
            shape: self.shape,
            spec_key,
        })
    }

    pub fn key(&self) -> &TargetKey {
        &self.key
    }
}

/// Example arguments bound; awaits a behavior.
pub struct SpecificationHandle<'w, T: PatchTarget + ?Sized> {
    when: &'w mut When,
    target: &'w T,
    key: TargetKey,
    shape: CallShape,
    spec_key: CanonicalKey,
}

impl<'w, T: PatchTarget + ?Sized> SpecificationHandle<'w, T> {
    /// Matching calls return `value`.
    pub fn returning(self, value: impl Into<Value>) -> Result<InterceptorHandle, StubError> {
        self.behaving(Behavior::returning(value))
    }

    /// Matching calls run `f` at call time and return its result.
    pub fn invoking<F>(self, f: F) -> Result<InterceptorHandle, StubError>
    where
        F: Fn() -> CallResult + Send + Sync + 'static,
    {
        self.behaving(Behavior::invoking(f))
    }

    /// Matching calls fail with `error`, the same instance every time.
    pub fn raising(self, error: impl Into<Raised>) -> Result<InterceptorHandle, StubError> {
        self.behaving(Behavior::raising(error))
    }

    /// Register an arbitrary behavior and (re)install the interceptor.
    pub fn behaving(self, behavior: Behavior) -> Result<InterceptorHandle, StubError> {
        let SpecificationHandle {
            when,
            target,
            key,
            shape,
            spec_key,
        } = self;

        let bucket = when
            .registry
            .register(key.clone(), CallSpecification::new(spec_key, behavior));
        when.uninstall(&key);
        let log = when.logs.entry(key.clone()).or_default().clone();
        let interceptor = Interceptor::install(target, key.member(), shape, bucket, log)?;
        let handle = interceptor.handle();
        when.interceptors.insert(key, interceptor);
        Ok(handle)
    }

    pub fn key(&self) -> &CanonicalKey {
        &self.spec_key
    }
}

// ============================================================================
// Tests
// ============================================================================
