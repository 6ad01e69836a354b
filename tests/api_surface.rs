//! Compile-only test to verify public API surface.
//!
//! The imports below are the public contract of `tugwhen`. If this file
//! fails to compile, a public re-export has regressed.
//!
//! Run with: cargo test -- api_surface

#![allow(unused_imports)]

// ============================================================================
// Values And Signatures
// ============================================================================

use tugwhen::value::{ObjectRef, OpaqueValue, Value, ANY};

use tugwhen::signature::{ParamKind, Parameter, Signature, SignatureError};

use tugwhen::bind::{bind, BindingError, BoundArgument, BoundArguments, CallArgs};

// ============================================================================
// Matching Engine
// ============================================================================

use tugwhen::key::{CanonicalKey, CanonicalValue, KeyEntry, KeyError};

use tugwhen::matcher::{matches, values_match, KeywordMatch};

use tugwhen::behavior::{Behavior, Raised, Thunk};

use tugwhen::registry::{
    Bucket, CallSpecification, SharedBucket, StubRegistry, TargetKey, UnmatchedCall,
};

// ============================================================================
// Interception
// ============================================================================

use tugwhen::target::{Callable, PatchError, PatchHandle, PatchTarget, Target};

use tugwhen::interceptor::{
    CallLog, CallRecord, CallShape, Interceptor, InterceptorHandle, Routing,
};

// ============================================================================
// Errors And Configuration
// ============================================================================

use tugwhen::error::{CallError, CallResult, ErrorKind, StubError};

use tugwhen::config::{
    ConfigOverrides, ConfigSource, ConfigValue, StubConfig, KWARGS_MATCH_ENV, RECEIVER_NAMES_ENV,
};

use tugwhen::logging::{LogFormat, LogInitError, DEFAULT_FILTER, LOG_ENV, LOG_FORMAT_ENV};

// ============================================================================
// Front Door
// ============================================================================

use tugwhen::when::{
    ConfigurationHandle, SpecificationHandle, SpecificationSummary, StubSummary, When,
};

use tugwhen::args;

// ============================================================================
// Test
// ============================================================================

#[test]
fn api_surface_compiles() {
    let _ = std::any::type_name::<When>();
    let _ = std::any::type_name::<Target>();
    let _ = std::any::type_name::<CanonicalKey>();
    let _ = std::any::type_name::<StubRegistry>();
    let _ = std::any::type_name::<InterceptorHandle>();
    let _ = std::any::type_name::<StubError>();
}

#[test]
fn environment_names_are_stable() {
    assert_eq!(LOG_ENV, "TUGWHEN_LOG");
    assert_eq!(LOG_FORMAT_ENV, "TUGWHEN_LOG_FORMAT");
    assert_eq!(KWARGS_MATCH_ENV, "TUGWHEN_KWARGS_MATCH");
    assert_eq!(RECEIVER_NAMES_ENV, "TUGWHEN_RECEIVER_NAMES");
}
