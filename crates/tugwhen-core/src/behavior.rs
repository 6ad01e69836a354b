//! Stub behaviors and the errors they raise.
//!
//! A [`Behavior`] is what a matched call produces. Behaviors are lazy: nothing
//! runs until a call actually resolves to them, so an invoked callable sees
//! the state at call time and a raised error is raised afresh on every match.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::{CallError, CallResult};
use crate::value::Value;

// ============================================================================
// Raised Errors
// ============================================================================

/// A shared error value raised by a stub or an original implementation.
///
/// Cloning shares the same allocation, so the error a test registers is the
/// very error the caller receives: [`Raised::same_as`] checks identity and
/// [`Raised::downcast_ref`] recovers the concrete type.
#[derive(Clone)]
pub struct Raised(Arc<dyn Error + Send + Sync + 'static>);

impl Raised {
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Raised(Arc::new(error))
    }

    /// Wrap an already shared error without reallocating.
    pub fn from_arc(error: Arc<dyn Error + Send + Sync + 'static>) -> Self {
        Raised(error)
    }

    /// Raise a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Raised::new(Message(message.into()))
    }

    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn is<E: Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// Returns true if both handles share the same error instance.
    pub fn same_as(&self, other: &Raised) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> From<E> for Raised
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Raised::new(error)
    }
}

impl fmt::Debug for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

// ============================================================================
// Behavior
// ============================================================================

/// A zero-argument callable run when a specification matches.
pub type Thunk = Arc<dyn Fn() -> CallResult + Send + Sync>;

/// What a matched call produces.
#[derive(Clone)]
pub enum Behavior {
    /// Return a copy of the stored value.
    ReturnValue(Value),
    /// Call the stored function and propagate its result.
    InvokeCallable(Thunk),
    /// Fail with the stored error.
    RaiseError(Raised),
}

impl Behavior {
    pub fn returning(value: impl Into<Value>) -> Self {
        Behavior::ReturnValue(value.into())
    }

    pub fn invoking<F>(f: F) -> Self
    where
        F: Fn() -> CallResult + Send + Sync + 'static,
    {
        Behavior::InvokeCallable(Arc::new(f))
    }

    pub fn raising(error: impl Into<Raised>) -> Self {
        Behavior::RaiseError(error.into())
    }

    /// Produce the outcome of one matched call.
    pub fn run(&self) -> CallResult {
        match self {
            Behavior::ReturnValue(value) => Ok(value.clone()),
            Behavior::InvokeCallable(f) => f(),
            Behavior::RaiseError(error) => Err(CallError::Raised(error.clone())),
        }
    }

    /// Short description for log output.
    pub fn describe(&self) -> String {
        match self {
            Behavior::ReturnValue(value) => format!("return {}", value),
            Behavior::InvokeCallable(_) => "invoke callable".to_string(),
            Behavior::RaiseError(error) => format!("raise {}", error),
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::ReturnValue(value) => f.debug_tuple("ReturnValue").field(value).finish(),
            Behavior::InvokeCallable(_) => f.write_str("InvokeCallable(..)"),
            Behavior::RaiseError(error) => f.debug_tuple("RaiseError").field(error).finish(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
