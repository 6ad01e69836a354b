//! Canonical call keys.
//!
//! A [`CanonicalKey`] is the comparable, hashable form of a bound call. Each
//! parameter value is normalized recursively into a [`CanonicalValue`]:
//!
//! | Value | Canonical form |
//! |-------|----------------|
//! | dict | `Seq` of `[key, value]` pairs, insertion order |
//! | list, tuple | `Seq`, element order |
//! | set | `Set`, sorted and deduplicated |
//! | scalar, object | kept as-is |
//! | wildcard | `Wildcard` |
//! | opaque, NaN | rejected with [`KeyError::UnsupportedValue`] |
//!
//! Building a key twice from equal bindings yields equal keys.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::bind::BoundArguments;
use crate::signature::ParamKind;
use crate::value::{ObjectRef, Value};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building a canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The value at `path` cannot be compared, so it cannot take part in a key.
    #[error("unsupported argument value at {path}: {type_name} is not comparable")]
    UnsupportedValue { path: String, type_name: String },
}

// ============================================================================
// Canonical Values
// ============================================================================

/// A float with total equality. NaN is never admitted and `-0.0` is folded
/// into `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatKey(u64);

impl FloatKey {
    pub fn new(value: f64) -> Option<Self> {
        if value.is_nan() {
            None
        } else if value == 0.0 {
            Some(FloatKey(0.0f64.to_bits()))
        } else {
            Some(FloatKey(value.to_bits()))
        }
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl Serialize for FloatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

/// Normalized form of a single value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalValue {
    Wildcard,
    None,
    Bool(bool),
    Int(i64),
    Float(FloatKey),
    Str(String),
    Bytes(Vec<u8>),
    Object(ObjectRef),
    /// Ordered sequence (lists, tuples, dict pairs).
    Seq(Vec<CanonicalValue>),
    /// Sorted, deduplicated set.
    Set(Vec<CanonicalValue>),
}

impl CanonicalValue {
    /// Normalize `value`. `path` names the position for error messages.
    pub fn from_value(value: &Value, path: &str) -> Result<Self, KeyError> {
        let canonical = match value {
            Value::Wildcard => CanonicalValue::Wildcard,
            Value::None => CanonicalValue::None,
            Value::Bool(b) => CanonicalValue::Bool(*b),
            Value::Int(i) => CanonicalValue::Int(*i),
            Value::Float(x) => match FloatKey::new(*x) {
                Some(key) => CanonicalValue::Float(key),
                None => return Err(unsupported(path, "float (NaN)")),
            },
            Value::Str(s) => CanonicalValue::Str(s.clone()),
            Value::Bytes(b) => CanonicalValue::Bytes(b.clone()),
            Value::Object(obj) => CanonicalValue::Object(obj.clone()),
            Value::List(items) | Value::Tuple(items) => CanonicalValue::Seq(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Self::from_value(item, &format!("{}[{}]", path, i)))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Set(items) => {
                let mut elements = items
                    .iter()
                    .map(|item| Self::from_value(item, &format!("{}{{}}", path)))
                    .collect::<Result<Vec<_>, _>>()?;
                elements.sort();
                elements.dedup();
                CanonicalValue::Set(elements)
            }
            Value::Dict(pairs) => CanonicalValue::Seq(
                pairs
                    .iter()
                    .map(|(k, v)| {
                        let key = Self::from_value(k, &format!("{}<key>", path))?;
                        let value = Self::from_value(v, &format!("{}[{}]", path, k))?;
                        Ok(CanonicalValue::Seq(vec![key, value]))
                    })
                    .collect::<Result<_, KeyError>>()?,
            ),
            Value::Opaque(opaque) => return Err(unsupported(path, opaque.type_name())),
        };
        Ok(canonical)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, CanonicalValue::Wildcard)
    }

    /// Split a two-element `Seq` into its halves.
    pub fn as_pair(&self) -> Option<(&CanonicalValue, &CanonicalValue)> {
        match self {
            CanonicalValue::Seq(items) if items.len() == 2 => Some((&items[0], &items[1])),
            _ => None,
        }
    }
}

fn unsupported(path: &str, type_name: &str) -> KeyError {
    KeyError::UnsupportedValue {
        path: path.to_string(),
        type_name: type_name.to_string(),
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalValue::Wildcard => write!(f, "ANY"),
            CanonicalValue::None => write!(f, "None"),
            CanonicalValue::Bool(true) => write!(f, "True"),
            CanonicalValue::Bool(false) => write!(f, "False"),
            CanonicalValue::Int(i) => write!(f, "{}", i),
            CanonicalValue::Float(x) => write!(f, "{:?}", x.value()),
            CanonicalValue::Str(s) => write!(f, "{:?}", s),
            CanonicalValue::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            CanonicalValue::Object(obj) => write!(f, "<{} #{}>", obj.type_name(), obj.id()),
            CanonicalValue::Seq(items) | CanonicalValue::Set(items) => {
                let (open, close) = match self {
                    CanonicalValue::Set(_) => ("{", "}"),
                    _ => ("(", ")"),
                };
                write!(f, "{}", open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "{}", close)
            }
        }
    }
}

// ============================================================================
// Canonical Key
// ============================================================================

/// One parameter of a canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyEntry {
    pub name: String,
    pub kind: ParamKind,
    pub value: CanonicalValue,
}

/// Comparable form of a bound call, in signature order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CanonicalKey {
    entries: Vec<KeyEntry>,
}

impl CanonicalKey {
    /// Build the key for a bound call.
    pub fn build(bound: &BoundArguments) -> Result<Self, KeyError> {
        let entries = bound
            .iter()
            .map(|arg| {
                Ok(KeyEntry {
                    name: arg.name.clone(),
                    kind: arg.kind,
                    value: CanonicalValue::from_value(&arg.value, &arg.name)?,
                })
            })
            .collect::<Result<Vec<_>, KeyError>>()?;
        Ok(CanonicalKey { entries })
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Canonical value of the named parameter.
    pub fn get(&self, name: &str) -> Option<&CanonicalValue> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    /// Returns true if any position holds a wildcard.
    pub fn has_wildcards(&self) -> bool {
        fn contains(value: &CanonicalValue) -> bool {
            match value {
                CanonicalValue::Wildcard => true,
                CanonicalValue::Seq(items) | CanonicalValue::Set(items) => {
                    items.iter().any(contains)
                }
                _ => false,
            }
        }
        self.entries.iter().any(|e| contains(&e.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON form for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", entry.name, entry.value)?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// Tests
// ============================================================================
