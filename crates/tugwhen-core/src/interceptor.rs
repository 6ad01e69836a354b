//! Interceptors: the routing callables installed over patched members.
//!
//! An [`Interceptor`] wraps a member's current implementation. Every call it
//! receives is recorded, bound against the member's signature, turned into a
//! canonical key and resolved against the member's shared bucket:
//!
//! ```text
//! call ──► record ──► bind ──► key ──► bucket.resolve ──► behavior.run()
//!                                           │
//!                                           └─ no match ──► original(call)
//! ```
//!
//! Binding and key errors fail the call immediately; only "no specification
//! matches" falls back to the original implementation, which receives the
//! untouched arguments.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::bind::{bind, CallArgs};
use crate::config::StubConfig;
use crate::error::{CallError, CallResult, StubError};
use crate::key::CanonicalKey;
use crate::matcher::{matches, KeywordMatch};
use crate::registry::{read_bucket, SharedBucket, TargetKey};
use crate::signature::Signature;
use crate::target::{Callable, PatchError, PatchHandle, PatchTarget};
use crate::value::ANY;

// ============================================================================
// Call Shape
// ============================================================================

/// Signature of a member plus the policy used to key and match its calls.
#[derive(Debug, Clone)]
pub struct CallShape {
    signature: Signature,
    receiver: Option<String>,
    keywords: KeywordMatch,
}

impl CallShape {
    pub fn new(signature: Signature, config: &StubConfig) -> Self {
        let receiver = signature
            .receiver(config.receiver_names())
            .map(|p| p.name.clone());
        CallShape {
            signature,
            receiver,
            keywords: config.keyword_match(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Name of the receiver parameter, when the member is a method.
    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    pub fn keyword_match(&self) -> KeywordMatch {
        self.keywords
    }

    /// Key of example arguments written by a test. Methods get a wildcard
    /// receiver, so examples omit it.
    pub fn example_key(&self, args: &CallArgs) -> Result<CanonicalKey, StubError> {
        let args = match self.receiver {
            Some(_) => args.clone().with_receiver(ANY),
            None => args.clone(),
        };
        let bound = bind(&self.signature, &args)?;
        Ok(CanonicalKey::build(&bound)?)
    }

    /// Key of an actual call.
    pub fn call_key(&self, args: &CallArgs) -> Result<CanonicalKey, CallError> {
        let bound = bind(&self.signature, args)?;
        Ok(CanonicalKey::build(&bound)?)
    }

    pub fn matches(&self, call: &CanonicalKey, spec: &CanonicalKey) -> bool {
        matches(call, spec, self.keywords)
    }
}

// ============================================================================
// Call Log
// ============================================================================

/// How an intercepted call was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Answered by the specification at this bucket index.
    Stubbed(usize),
    /// No specification matched; the original implementation ran.
    Original,
    /// The call failed to bind or held an unmatchable value.
    Rejected,
}

/// One intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub args: CallArgs,
    pub routing: Routing,
}

/// Shared, append-only record of intercepted calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<CallRecord>>>);

impl CallLog {
    pub fn new() -> Self {
        CallLog::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CallRecord>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, args: CallArgs, routing: Routing) {
        self.lock().push(CallRecord { args, routing });
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

// ============================================================================
// Interceptor
// ============================================================================

/// A routing callable installed over one member.
pub struct Interceptor {
    key: TargetKey,
    shape: CallShape,
    original: Callable,
    patch: PatchHandle,
    log: CallLog,
}

impl Interceptor {
    /// Wrap the current implementation of `member` and install the router.
    pub fn install<T>(
        target: &T,
        member: &str,
        shape: CallShape,
        bucket: SharedBucket,
        log: CallLog,
    ) -> Result<Interceptor, StubError>
    where
        T: PatchTarget + ?Sized,
    {
        let key = TargetKey::new(target.display_name(), member);
        let original = match (target.current(member), target.signature(member)) {
            (Some(original), _) => original,
            (None, Some(_)) => {
                return Err(StubError::internal(format!(
                    "{} declares a signature but no callable",
                    key
                )))
            }
            (None, None) => {
                return Err(PatchError::UnknownMember {
                    target: key.target().to_string(),
                    member: member.to_string(),
                }
                .into())
            }
        };

        let router = {
            let key = key.clone();
            let shape = shape.clone();
            let original = Arc::clone(&original);
            let log = log.clone();
            move |args: &CallArgs| route(&key, &shape, &bucket, &original, &log, args)
        };
        let patch = target.patch(member, Arc::new(router))?;
        debug!(target_key = %key, "interceptor installed");

        Ok(Interceptor {
            key,
            shape,
            original,
            patch,
            log,
        })
    }

    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    /// The implementation that was current when this interceptor installed.
    pub fn original(&self) -> &Callable {
        &self.original
    }

    pub fn is_installed(&self) -> bool {
        self.patch.is_active()
    }

    /// Restore the wrapped implementation. Uninstalling twice is a no-op.
    pub fn uninstall(&mut self) {
        if self.patch.is_active() {
            self.patch.stop();
            debug!(target_key = %self.key, "interceptor uninstalled");
        }
    }

    /// Handle for inspecting the calls this interceptor receives.
    pub fn handle(&self) -> InterceptorHandle {
        InterceptorHandle {
            key: self.key.clone(),
            shape: self.shape.clone(),
            log: self.log.clone(),
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("key", &self.key)
            .field("installed", &self.is_installed())
            .finish()
    }
}

fn route(
    key: &TargetKey,
    shape: &CallShape,
    bucket: &SharedBucket,
    original: &Callable,
    log: &CallLog,
    args: &CallArgs,
) -> CallResult {
    let call_key = match shape.call_key(args) {
        Ok(call_key) => call_key,
        Err(err) => {
            log.record(args.clone(), Routing::Rejected);
            debug!(target_key = %key, error = %err, "call rejected");
            return Err(err);
        }
    };

    let resolved = read_bucket(bucket).resolve(&call_key, shape.keyword_match());
    match resolved {
        Ok((index, behavior)) => {
            log.record(args.clone(), Routing::Stubbed(index));
            trace!(target_key = %key, call = %call_key, index, behavior = %behavior.describe(), "stubbed");
            behavior.run()
        }
        Err(unmatched) => {
            log.record(args.clone(), Routing::Original);
            trace!(target_key = %key, reason = %unmatched, "falling back to original");
            original(args)
        }
    }
}

// ============================================================================
// Interceptor Handle
// ============================================================================

/// Read access to the calls an interceptor received, with mock-style
/// assertions.
///
/// Expected arguments are written like registration examples: methods omit
/// the receiver and [`ANY`] matches any value.
#[derive(Debug, Clone)]
pub struct InterceptorHandle {
    key: TargetKey,
    shape: CallShape,
    log: CallLog,
}

impl InterceptorHandle {
    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    pub fn call_count(&self) -> usize {
        self.log.len()
    }

    pub fn was_called(&self) -> bool {
        !self.log.is_empty()
    }

    /// Raw arguments of every call, oldest first.
    pub fn calls(&self) -> Vec<CallArgs> {
        self.log.records().into_iter().map(|r| r.args).collect()
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.log.records()
    }

    /// Forget recorded calls.
    pub fn reset_calls(&self) {
        self.log.clear();
    }

    #[track_caller]
    pub fn assert_called(&self) {
        if !self.was_called() {
            panic!("expected {} to have been called", self.key);
        }
    }

    #[track_caller]
    pub fn assert_not_called(&self) {
        let count = self.call_count();
        if count != 0 {
            panic!(
                "expected {} not to have been called, called {} times",
                self.key, count
            );
        }
    }

    #[track_caller]
    pub fn assert_called_times(&self, expected: usize) {
        let count = self.call_count();
        if count != expected {
            panic!(
                "expected {} to be called {} times, called {} times",
                self.key, expected, count
            );
        }
    }

    /// Assert that the most recent call matches `expected`.
    #[track_caller]
    pub fn assert_called_with(&self, expected: CallArgs) {
        let spec = self.expected_key(&expected);
        match self.calls().last() {
            Some(last) if self.call_matches(last, &spec) => {}
            Some(last) => panic!(
                "expected call not found\nexpected: {}{}\nactual:   {}{}",
                self.key, expected, self.key, last
            ),
            None => panic!(
                "expected call not found\nexpected: {}{}\nactual:   not called",
                self.key, expected
            ),
        }
    }

    /// Assert that any recorded call matches `expected`.
    #[track_caller]
    pub fn assert_any_call(&self, expected: CallArgs) {
        let spec = self.expected_key(&expected);
        if !self.calls().iter().any(|call| self.call_matches(call, &spec)) {
            panic!("{}{} call not found", self.key, expected);
        }
    }

    #[track_caller]
    fn expected_key(&self, expected: &CallArgs) -> CanonicalKey {
        match self.shape.example_key(expected) {
            Ok(key) => key,
            Err(err) => panic!("invalid expected call {}{}: {}", self.key, expected, err),
        }
    }

    fn call_matches(&self, call: &CallArgs, spec: &CanonicalKey) -> bool {
        self.shape
            .call_key(call)
            .is_ok_and(|key| self.shape.matches(&key, spec))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::behavior::{Behavior, Raised};
    use crate::registry::{CallSpecification, StubRegistry};
    use crate::signature::Parameter;
    use crate::target::Target;
    use crate::value::{ObjectRef, Value};

    fn klass() -> Target {
        Target::new("Klass1")
            .member(
                "method",
                Signature::new(vec![
                    Parameter::regular("self"),
                    Parameter::regular("arg1"),
                    Parameter::keyword_only("kwarg1"),
                ])
                .unwrap(),
                |_: &CallArgs| Ok(Value::from("Not mocked")),
            )
            .member(
                "function",
                Signature::new(vec![Parameter::regular("x")]).unwrap(),
                |args: &CallArgs| Ok(args.get(0).cloned().unwrap_or(Value::None)),
            )
    }

    struct Fixture {
        target: Target,
        registry: StubRegistry,
        config: StubConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                target: klass(),
                registry: StubRegistry::new(),
                config: StubConfig::default(),
            }
        }

        fn stub(&mut self, member: &str, example: CallArgs, behavior: Behavior) -> Interceptor {
            let shape = CallShape::new(
                self.target.signature(member).unwrap(),
                &self.config,
            );
            let spec = CallSpecification::new(shape.example_key(&example).unwrap(), behavior);
            let key = TargetKey::new(self.target.name(), member);
            let bucket = self.registry.register(key, spec);
            Interceptor::install(&self.target, member, shape, bucket, CallLog::new()).unwrap()
        }
    }

    mod routing {
        use super::*;

        #[test]
        fn matched_call_runs_behavior() {
            let mut fx = Fixture::new();
            let _interceptor = fx.stub("method", args!("a", kwarg1 = 1), Behavior::returning("Mocked"));
            let obj = ObjectRef::new("Klass1");

            let result = fx.target.invoke_method("method", &obj, args!("a", kwarg1 = 1));
            assert_eq!(result.unwrap(), Value::from("Mocked"));
        }

        #[test]
        fn unmatched_call_falls_back_to_original() {
            let mut fx = Fixture::new();
            let _interceptor = fx.stub("method", args!("a", kwarg1 = 1), Behavior::returning("Mocked"));
            let obj = ObjectRef::new("Klass1");

            let result = fx.target.invoke_method("method", &obj, args!("b", kwarg1 = 1));
            assert_eq!(result.unwrap(), Value::from("Not mocked"));
        }

        #[test]
        fn binding_errors_fail_the_call() {
            let mut fx = Fixture::new();
            let interceptor = fx.stub("function", args!(1), Behavior::returning(2));

            let err = fx.target.invoke("function", args!(1, 2)).unwrap_err();
            assert!(matches!(err, CallError::Binding(_)));
            assert_eq!(interceptor.handle().records()[0].routing, Routing::Rejected);
        }

        #[test]
        fn unmatchable_values_fail_the_call() {
            let mut fx = Fixture::new();
            let _interceptor = fx.stub("function", args!(1), Behavior::returning(2));

            let err = fx.target.invoke("function", args!(Value::opaque(3u8))).unwrap_err();
            assert!(matches!(err, CallError::Key(_)));
        }

        #[test]
        fn raised_errors_keep_identity() {
            let mut fx = Fixture::new();
            let error = Raised::msg("Expected error");
            let _interceptor = fx.stub("function", args!(1), Behavior::raising(error.clone()));

            let err = fx.target.invoke("function", args!(1)).unwrap_err();
            assert!(err.as_raised().unwrap().same_as(&error));
        }

        #[test]
        fn records_routing() {
            let mut fx = Fixture::new();
            let interceptor = fx.stub("function", args!(1), Behavior::returning(2));
            fx.target.invoke("function", args!(1)).unwrap();
            fx.target.invoke("function", args!(5)).unwrap();

            let routings: Vec<Routing> = interceptor
                .handle()
                .records()
                .into_iter()
                .map(|r| r.routing)
                .collect();
            assert_eq!(routings, [Routing::Stubbed(0), Routing::Original]);
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn uninstall_restores_original() {
            let mut fx = Fixture::new();
            let mut interceptor = fx.stub("function", args!(1), Behavior::returning(2));
            assert!(fx.target.is_patched("function"));
            assert_eq!(fx.target.invoke("function", args!(1)).unwrap(), Value::Int(2));

            interceptor.uninstall();
            interceptor.uninstall();
            assert!(!interceptor.is_installed());
            assert!(!fx.target.is_patched("function"));
            assert_eq!(fx.target.invoke("function", args!(1)).unwrap(), Value::Int(1));
        }

        #[test]
        fn drop_restores_original() {
            let mut fx = Fixture::new();
            drop(fx.stub("function", args!(1), Behavior::returning(2)));
            assert_eq!(fx.target.invoke("function", args!(1)).unwrap(), Value::Int(1));
        }

        #[test]
        fn later_registrations_reach_live_interceptor() {
            let mut fx = Fixture::new();
            let _interceptor = fx.stub("function", args!(1), Behavior::returning(10));
            let key = TargetKey::new("Klass1", "function");
            let shape = CallShape::new(fx.target.signature("function").unwrap(), &fx.config);
            fx.registry.register(
                key,
                CallSpecification::new(shape.example_key(&args!(2)).unwrap(), Behavior::returning(20)),
            );

            assert_eq!(fx.target.invoke("function", args!(2)).unwrap(), Value::Int(20));
        }

        #[test]
        fn unknown_member_is_rejected() {
            let fx = Fixture::new();
            let shape = CallShape::new(Signature::empty(), &fx.config);
            let bucket = std::sync::Arc::new(std::sync::RwLock::new(
                crate::registry::Bucket::new(TargetKey::new("Klass1", "missing")),
            ));
            let err = Interceptor::install(&fx.target, "missing", shape, bucket, CallLog::new())
                .unwrap_err();
            assert!(matches!(
                err,
                StubError::Patch(PatchError::UnknownMember { ref member, .. }) if member == "missing"
            ));
        }
    }

    mod shape {
        use super::*;

        #[test]
        fn methods_get_wildcard_receiver() {
            let fx = Fixture::new();
            let shape = CallShape::new(fx.target.signature("method").unwrap(), &fx.config);
            assert_eq!(shape.receiver(), Some("self"));
            let key = shape.example_key(&args!(1, kwarg1 = 2)).unwrap();
            assert_eq!(key.to_string(), "(self=ANY, arg1=1, kwarg1=2)");
        }

        #[test]
        fn functions_have_no_receiver() {
            let fx = Fixture::new();
            let shape = CallShape::new(fx.target.signature("function").unwrap(), &fx.config);
            assert_eq!(shape.receiver(), None);
        }

        #[test]
        fn custom_receiver_names() {
            let config = StubConfig::default().with_receiver_names(["this"]);
            let sig = Signature::new(vec![Parameter::regular("this"), Parameter::regular("x")])
                .unwrap();
            assert_eq!(CallShape::new(sig, &config).receiver(), Some("this"));
        }
    }

    mod assertions {
        use super::*;

        #[test]
        fn counts_and_matches_calls() {
            let mut fx = Fixture::new();
            let interceptor = fx.stub("method", args!("a", kwarg1 = 1), Behavior::returning("Mocked"));
            let handle = interceptor.handle();
            handle.assert_not_called();

            let obj = ObjectRef::new("Klass1");
            fx.target.invoke_method("method", &obj, args!("a", kwarg1 = 1)).unwrap();
            fx.target.invoke_method("method", &obj, args!("z", kwarg1 = 9)).unwrap();

            handle.assert_called();
            handle.assert_called_times(2);
            handle.assert_called_with(args!("z", kwarg1 = ANY));
            handle.assert_any_call(args!("a", kwarg1 = 1));
            assert_eq!(handle.calls()[0], args!(obj.clone(), "a", kwarg1 = 1));
        }

        #[test]
        #[should_panic(expected = "expected Klass1.method to have been called")]
        fn assert_called_fails_without_calls() {
            let mut fx = Fixture::new();
            let interceptor = fx.stub("method", args!("a", kwarg1 = 1), Behavior::returning("x"));
            interceptor.handle().assert_called();
        }

        #[test]
        #[should_panic(expected = "expected call not found")]
        fn assert_called_with_fails_on_mismatch() {
            let mut fx = Fixture::new();
            let interceptor = fx.stub("function", args!(1), Behavior::returning(2));
            fx.target.invoke("function", args!(3)).unwrap();
            interceptor.handle().assert_called_with(args!(1));
        }

        #[test]
        fn reset_calls_forgets_history() {
            let mut fx = Fixture::new();
            let interceptor = fx.stub("function", args!(1), Behavior::returning(2));
            fx.target.invoke("function", args!(1)).unwrap();
            let handle = interceptor.handle();
            handle.reset_calls();
            handle.assert_not_called();
        }
    }
}
