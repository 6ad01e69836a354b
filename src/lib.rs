//! tugwhen: argument-aware stubbing for tests.
//!
//! Register "when `member` of `target` is called with these arguments, do
//! this" specifications; real calls are intercepted and routed to the first
//! matching behavior, or to the original implementation when none matches.
//! Example arguments may contain the [`ANY`] wildcard at any depth.

// Core engine - re-exported from tugwhen-core
pub use tugwhen_core::behavior;
pub use tugwhen_core::bind;
pub use tugwhen_core::config;
pub use tugwhen_core::error;
pub use tugwhen_core::interceptor;
pub use tugwhen_core::key;
pub use tugwhen_core::matcher;
pub use tugwhen_core::registry;
pub use tugwhen_core::signature;
pub use tugwhen_core::target;
pub use tugwhen_core::value;

pub use tugwhen_core::args;
pub use tugwhen_core::{
    Behavior, CallArgs, CallError, CallResult, ConfigOverrides, ErrorKind, InterceptorHandle,
    KeywordMatch, ObjectRef, ParamKind, Parameter, PatchTarget, Raised, Signature, StubConfig,
    StubError, Target, Value, ANY,
};

// Per-test facade
pub mod logging;
pub mod when;

pub use when::{ConfigurationHandle, SpecificationHandle, When};
