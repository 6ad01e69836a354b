//! Binding raw call arguments against a signature.
//!
//! [`bind`] maps a [`CallArgs`] (positional values plus named keyword values)
//! onto a [`Signature`], producing [`BoundArguments`] in declaration order:
//!
//! 1. Positional arguments fill positional-only, then regular parameters
//! 2. Excess positional arguments go to `*args`, if declared
//! 3. Keyword arguments fill regular and keyword-only parameters by name
//! 4. Unknown keywords go to `**kwargs`, if declared
//! 5. Missing parameters take their defaults
//!
//! `*args` is always bound (possibly to an empty tuple) and so is `**kwargs`
//! (possibly to an empty dict), so two calls binding the same values produce
//! the same entries.

use std::fmt;

use thiserror::Error;

use crate::signature::{ParamKind, Signature};
use crate::value::Value;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised when a call does not fit a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A required parameter was not supplied and has no default.
    #[error("missing required parameter '{name}'")]
    MissingRequired { name: String },

    /// A keyword argument names no parameter and there is no `**kwargs`.
    #[error("unexpected keyword argument '{name}'")]
    UnexpectedKeyword { name: String },

    /// More positional arguments than positional parameters and no `*args`.
    #[error("takes {expected} positional arguments but {given} were given")]
    TooManyPositional { expected: usize, given: usize },

    /// A parameter received more than one value.
    #[error("got multiple values for argument '{name}'")]
    DuplicateArgument { name: String },

    /// A positional-only parameter was passed by keyword.
    #[error("positional-only parameter '{name}' passed as keyword argument")]
    PositionalOnlyAsKeyword { name: String },
}

// ============================================================================
// Call Arguments
// ============================================================================

/// The raw arguments of one call: positional values and keyword values in
/// call order.
///
/// Usually built with the [`args!`](crate::args) macro.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        CallArgs::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Prepend a receiver as the first positional argument.
    pub fn with_receiver(mut self, receiver: impl Into<Value>) -> Self {
        self.positional.insert(0, receiver.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keywords
    }

    /// Positional argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument by name.
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positional = self.positional.iter().map(ToString::to_string);
        let keywords = self
            .keywords
            .iter()
            .map(|(name, value)| format!("{}={}", name, value));
        let parts: Vec<String> = positional.chain(keywords).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Build [`CallArgs`] from positional expressions and `name = value` pairs.
///
/// ```
/// use tugwhen_core::{args, Value, ANY};
///
/// let call = args!(1, ANY, c = 3, d = "four");
/// assert_eq!(call.get(0), Some(&Value::Int(1)));
/// assert_eq!(call.keyword("d"), Some(&Value::from("four")));
/// ```
#[macro_export]
macro_rules! args {
    (@acc $call:ident;) => {};
    (@acc $call:ident; $name:ident = $value:expr $(, $($rest:tt)*)?) => {
        $call = $call.kwarg(stringify!($name), $value);
        $crate::args!(@acc $call; $($($rest)*)?);
    };
    (@acc $call:ident; $value:expr $(, $($rest:tt)*)?) => {
        $call = $call.arg($value);
        $crate::args!(@acc $call; $($($rest)*)?);
    };
    ($($tokens:tt)*) => {{
        #[allow(unused_mut)]
        let mut call = $crate::CallArgs::new();
        $crate::args!(@acc call; $($tokens)*);
        call
    }};
}

// ============================================================================
// Bound Arguments
// ============================================================================

/// One parameter with the value bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgument {
    pub name: String,
    pub kind: ParamKind,
    pub value: Value,
}

/// Parameter values in signature order.
///
/// `*args` is bound to a [`Value::Tuple`] and `**kwargs` to a [`Value::Dict`]
/// with string keys in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    entries: Vec<BoundArgument>,
}

impl BoundArguments {
    pub fn entries(&self) -> &[BoundArgument] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundArgument> {
        self.entries.iter()
    }

    /// Value bound to the named parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    /// Parameter names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Binding
// ============================================================================

/// Bind `call` against `signature`.
pub fn bind(signature: &Signature, call: &CallArgs) -> Result<BoundArguments, BindingError> {
    let params = signature.params();
    let has_kwargs = signature.kwargs().is_some();
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    let mut extra_positional: Vec<Value> = Vec::new();
    let mut extra_keywords: Vec<(Value, Value)> = Vec::new();

    // Positional arguments, left to right
    let positional_slots: Vec<usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind.accepts_positional())
        .map(|(i, _)| i)
        .collect();
    let mut positional = call.positional().iter();
    for &index in &positional_slots {
        match positional.next() {
            Some(value) => slots[index] = Some(value.clone()),
            None => break,
        }
    }
    let excess: Vec<Value> = positional.cloned().collect();
    if !excess.is_empty() {
        if signature.var_args().is_none() {
            return Err(BindingError::TooManyPositional {
                expected: positional_slots.len(),
                given: call.positional().len(),
            });
        }
        extra_positional = excess;
    }

    // Keyword arguments, by name
    for (name, value) in call.keywords() {
        let index = params.iter().position(|p| &p.name == name);
        match index {
            Some(index) if params[index].kind.accepts_keyword() => {
                if slots[index].is_some() {
                    return Err(BindingError::DuplicateArgument { name: name.clone() });
                }
                slots[index] = Some(value.clone());
            }
            Some(index) if params[index].kind == ParamKind::PositionalOnly && !has_kwargs => {
                return Err(BindingError::PositionalOnlyAsKeyword { name: name.clone() });
            }
            _ => {
                if !has_kwargs {
                    return Err(BindingError::UnexpectedKeyword { name: name.clone() });
                }
                if extra_keywords
                    .iter()
                    .any(|(k, _)| k.as_str() == Some(name.as_str()))
                {
                    return Err(BindingError::DuplicateArgument { name: name.clone() });
                }
                extra_keywords.push((Value::Str(name.clone()), value.clone()));
            }
        }
    }

    // Assemble in declaration order, applying defaults
    let mut entries = Vec::with_capacity(params.len());
    for (param, slot) in params.iter().zip(slots) {
        let value = match param.kind {
            ParamKind::VarArgs => Value::Tuple(std::mem::take(&mut extra_positional)),
            ParamKind::KwArgs => Value::Dict(std::mem::take(&mut extra_keywords)),
            _ => match slot.or_else(|| param.default.clone()) {
                Some(value) => value,
                None => {
                    return Err(BindingError::MissingRequired {
                        name: param.name.clone(),
                    })
                }
            },
        };
        entries.push(BoundArgument {
            name: param.name.clone(),
            kind: param.kind,
            value,
        });
    }

    Ok(BoundArguments { entries })
}

// ============================================================================
// Tests
// ============================================================================
