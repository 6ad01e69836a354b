//! Error types for tugwhen.
//!
//! Each subsystem has its own error enum (`SignatureError`, `BindingError`,
//! `KeyError`, `PatchError`). Two errors sit on top of them:
//!
//! - [`CallError`]: what an invoked member fails with. Either the error a stub
//!   or original implementation raised, or a programmer error detected while
//!   routing the call.
//! - [`StubError`]: what the registration API fails with. Bridges the
//!   subsystem errors and classifies them with an [`ErrorKind`].
//!
//! A call that matches no specification is not an error; it falls back to the
//! original implementation.

use std::fmt;

use thiserror::Error;

use crate::behavior::Raised;
use crate::bind::BindingError;
use crate::key::KeyError;
use crate::signature::SignatureError;
use crate::target::PatchError;
use crate::value::Value;

/// Result of invoking a member.
pub type CallResult = Result<Value, CallError>;

// ============================================================================
// Call Errors
// ============================================================================

/// Error returned from invoking a (possibly stubbed) member.
#[derive(Debug, Error)]
pub enum CallError {
    /// Raised by a stub behavior or by the original implementation.
    #[error("{0}")]
    Raised(Raised),

    /// The call does not fit the member's signature.
    #[error("invalid call: {0}")]
    Binding(#[from] BindingError),

    /// The call carries a value that cannot be matched.
    #[error("{0}")]
    Key(#[from] KeyError),

    /// The member does not exist.
    #[error("{0}")]
    Patch(#[from] PatchError),
}

impl CallError {
    /// Raise an arbitrary error from a callable.
    pub fn raised(error: impl Into<Raised>) -> Self {
        CallError::Raised(error.into())
    }

    pub fn as_raised(&self) -> Option<&Raised> {
        match self {
            CallError::Raised(raised) => Some(raised),
            _ => None,
        }
    }

    /// Downcast a raised error to its concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.as_raised().and_then(|raised| raised.downcast_ref::<E>())
    }
}

impl From<Raised> for CallError {
    fn from(raised: Raised) -> Self {
        CallError::Raised(raised)
    }
}

// ============================================================================
// Error Classification
// ============================================================================

/// Broad classification of registration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The API was used incorrectly (bad signature, unknown member).
    Usage,
    /// Example arguments do not fit the signature.
    Binding,
    /// Example arguments contain a value that cannot be matched.
    Value,
    /// The patch target is in an inconsistent state.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Usage => "usage",
            ErrorKind::Binding => "binding",
            ErrorKind::Value => "value",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Error returned by the registration API.
#[derive(Debug, Error)]
pub enum StubError {
    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("example arguments do not fit the signature: {0}")]
    Binding(#[from] BindingError),

    #[error("{0}")]
    Value(#[from] KeyError),

    #[error("{0}")]
    Patch(#[from] PatchError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl StubError {
    pub fn internal(message: impl Into<String>) -> Self {
        StubError::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }
}

impl From<&StubError> for ErrorKind {
    fn from(err: &StubError) -> Self {
        match err {
            StubError::Signature(_) => ErrorKind::Usage,
            StubError::Binding(_) => ErrorKind::Binding,
            StubError::Value(_) => ErrorKind::Value,
            StubError::Patch(PatchError::UnknownMember { .. }) => ErrorKind::Usage,
            StubError::Patch(PatchError::AlreadyPatched { .. }) => ErrorKind::Usage,
            StubError::Internal { .. } => ErrorKind::Internal,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
