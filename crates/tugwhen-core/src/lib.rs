//! Core engine for tugwhen.
//!
//! This crate provides the call-specification matching engine:
//! - Dynamic values and the `ANY` wildcard
//! - Parameter signatures and argument binding
//! - Canonical call keys and wildcard matching
//! - Behaviors (return, invoke, raise) and the stub registry
//! - Patchable targets and the interceptors installed over them
//! - Configuration and error types
//!
//! The per-test `When` facade lives in the `tugwhen` crate.

pub mod behavior;
pub mod bind;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod key;
pub mod matcher;
pub mod registry;
pub mod signature;
pub mod target;
pub mod value;

pub use behavior::{Behavior, Raised, Thunk};
pub use bind::{bind, BindingError, BoundArgument, BoundArguments, CallArgs};
pub use config::{ConfigOverrides, ConfigSource, ConfigValue, StubConfig};
pub use error::{CallError, CallResult, ErrorKind, StubError};
pub use interceptor::{CallLog, CallRecord, CallShape, Interceptor, InterceptorHandle, Routing};
pub use key::{CanonicalKey, CanonicalValue, KeyEntry, KeyError};
pub use matcher::{matches, KeywordMatch};
pub use registry::{Bucket, CallSpecification, SharedBucket, StubRegistry, TargetKey};
pub use signature::{ParamKind, Parameter, Signature, SignatureError};
pub use target::{Callable, PatchError, PatchHandle, PatchTarget, Target};
pub use value::{ObjectRef, OpaqueValue, Value, ANY};
