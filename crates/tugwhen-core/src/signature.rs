//! Parameter signatures of stubbable members.
//!
//! A [`Signature`] is the declared parameter list of one member: the only
//! thing the binder needs to know about a target. Signatures are supplied by
//! whatever implements [`PatchTarget`](crate::target::PatchTarget); the
//! concrete [`Target`](crate::target::Target) takes them as explicit metadata.
//!
//! Parameter kinds follow the usual dynamic-language calling convention:
//!
//! ```text
//! def member(pos_only, /, regular, *args, kw_only, **kwargs)
//! ```
//!
//! The declaration order above is enforced by [`Signature::new`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while declaring a signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// A parameter without a name.
    #[error("parameter names must not be empty")]
    EmptyName,

    /// The same name was declared twice.
    #[error("duplicate parameter '{name}'")]
    DuplicateParameter { name: String },

    /// Parameter kinds are declared out of order.
    #[error("parameter '{name}' ({kind}) cannot follow a {after} parameter")]
    OutOfOrder {
        name: String,
        kind: ParamKind,
        after: ParamKind,
    },

    /// More than one `*args` or `**kwargs`.
    #[error("only one {kind} parameter is allowed")]
    MultipleVariadic { kind: ParamKind },

    /// Variadic parameters cannot have defaults.
    #[error("variadic parameter '{name}' cannot have a default")]
    VariadicDefault { name: String },

    /// A positional parameter without default follows one with a default.
    #[error("parameter '{name}' without a default follows a parameter with a default")]
    NonDefaultAfterDefault { name: String },
}

// ============================================================================
// Parameter Kind
// ============================================================================

/// Kind of parameter in a member signature.
///
/// Variants are declared in the order they may appear in a signature, so the
/// derived `Ord` doubles as the ordering rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Positional-only parameter (before `/`).
    PositionalOnly,
    /// Positional-or-keyword parameter (default).
    #[default]
    Regular,
    /// Variadic positional parameter (`*args`).
    VarArgs,
    /// Keyword-only parameter (after `*` or `*args`).
    KeywordOnly,
    /// Variadic keyword parameter (`**kwargs`).
    KwArgs,
}

impl ParamKind {
    /// Returns true for `*args` and `**kwargs`.
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarArgs | ParamKind::KwArgs)
    }

    /// Returns true if a positional argument can fill this parameter.
    pub fn accepts_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::Regular)
    }

    /// Returns true if a keyword argument can fill this parameter by name.
    pub fn accepts_keyword(self) -> bool {
        matches!(self, ParamKind::Regular | ParamKind::KeywordOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::PositionalOnly => "positional-only",
            ParamKind::Regular => "positional-or-keyword",
            ParamKind::VarArgs => "variadic positional",
            ParamKind::KeywordOnly => "keyword-only",
            ParamKind::KwArgs => "variadic keyword",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parameter
// ============================================================================

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Kind of parameter.
    pub kind: ParamKind,
    /// Default value applied when the caller omits the parameter.
    pub default: Option<Value>,
}

impl Parameter {
    /// Create a new parameter with the given name and kind.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Parameter {
            name: name.into(),
            kind,
            default: None,
        }
    }

    /// Create a regular parameter (most common case).
    pub fn regular(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Regular)
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::PositionalOnly)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KeywordOnly)
    }

    pub fn var_args(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::VarArgs)
    }

    pub fn kwargs(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::KwArgs)
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::VarArgs => write!(f, "*{}", self.name),
            ParamKind::KwArgs => write!(f, "**{}", self.name),
            _ => match &self.default {
                Some(default) => write!(f, "{}={}", self.name, default),
                None => write!(f, "{}", self.name),
            },
        }
    }
}

// ============================================================================
// Signature
// ============================================================================

/// The ordered parameter list of one member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Parameter>,
}

impl Signature {
    /// Create a signature, validating the declaration rules.
    pub fn new(params: Vec<Parameter>) -> Result<Self, SignatureError> {
        validate(&params)?;
        Ok(Signature { params })
    }

    /// A signature with no parameters.
    pub fn empty() -> Self {
        Signature::default()
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// The `*args` parameter, if declared.
    pub fn var_args(&self) -> Option<&Parameter> {
        self.params.iter().find(|p| p.kind == ParamKind::VarArgs)
    }

    /// The `**kwargs` parameter, if declared.
    pub fn kwargs(&self) -> Option<&Parameter> {
        self.params.iter().find(|p| p.kind == ParamKind::KwArgs)
    }

    /// The implicit receiver parameter, if the first parameter is positional
    /// and carries one of the conventional receiver names.
    pub fn receiver<S: AsRef<str>>(&self, receiver_names: &[S]) -> Option<&Parameter> {
        self.params.first().filter(|p| {
            p.kind.accepts_positional() && receiver_names.iter().any(|n| n.as_ref() == p.name)
        })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

fn validate(params: &[Parameter]) -> Result<(), SignatureError> {
    let mut seen = HashSet::new();
    let mut last_kind: Option<ParamKind> = None;
    let mut saw_positional_default = false;

    for param in params {
        if param.name.is_empty() {
            return Err(SignatureError::EmptyName);
        }
        if !seen.insert(param.name.as_str()) {
            return Err(SignatureError::DuplicateParameter {
                name: param.name.clone(),
            });
        }
        if let Some(after) = last_kind {
            if param.kind < after {
                return Err(SignatureError::OutOfOrder {
                    name: param.name.clone(),
                    kind: param.kind,
                    after,
                });
            }
            if param.kind == after && param.kind.is_variadic() {
                return Err(SignatureError::MultipleVariadic { kind: param.kind });
            }
        }
        if param.kind.is_variadic() && param.has_default() {
            return Err(SignatureError::VariadicDefault {
                name: param.name.clone(),
            });
        }
        if param.kind.accepts_positional() {
            if param.has_default() {
                saw_positional_default = true;
            } else if saw_positional_default {
                return Err(SignatureError::NonDefaultAfterDefault {
                    name: param.name.clone(),
                });
            }
        }
        last_kind = Some(param.kind);
    }
    Ok(())
}

/// Renders the signature the way it would be declared, e.g.
/// `(self, a, /, b=1, *args, c, **kwargs)`.
impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::with_capacity(self.params.len() + 2);
        let has_var_args = self.var_args().is_some();
        let mut star_written = false;

        for (i, param) in self.params.iter().enumerate() {
            if param.kind == ParamKind::KeywordOnly && !has_var_args && !star_written {
                parts.push("*".to_string());
                star_written = true;
            }
            parts.push(param.to_string());

            let next_is_positional_only = self
                .params
                .get(i + 1)
                .is_some_and(|next| next.kind == ParamKind::PositionalOnly);
            if param.kind == ParamKind::PositionalOnly && !next_is_positional_only {
                parts.push("/".to_string());
            }
        }
        write!(f, "({})", parts.join(", "))
    }
}

// ============================================================================
// Tests
// ============================================================================
