//! Dynamic values passed to and returned from stubbed members.
//!
//! Stubbed members are called through a uniform calling convention, so every
//! argument and every result is a [`Value`]. The model mirrors what a test
//! typically passes around:
//! - Scalars: [`Value::None`], [`Value::Bool`], [`Value::Int`], [`Value::Float`],
//!   [`Value::Str`], [`Value::Bytes`]
//! - Containers: [`Value::List`], [`Value::Tuple`], [`Value::Set`], [`Value::Dict`]
//! - Instances: [`Value::Object`], compared by identity (method receivers)
//! - Anything else: [`Value::Opaque`], carried through untouched but never
//!   comparable, so it cannot appear in a call key
//! - The wildcard sentinel: [`Value::Wildcard`] (also exported as [`ANY`])
//!
//! Dicts keep insertion order; the key builder relies on it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// The wildcard sentinel: matches any value at the position it occupies,
/// including nested positions and entries of variadic groups.
pub const ANY: Value = Value::Wildcard;

// ============================================================================
// Value
// ============================================================================

/// A dynamically typed argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    None,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered, mutable-style sequence.
    List(Vec<Value>),
    /// Ordered, fixed sequence.
    Tuple(Vec<Value>),
    /// Unordered collection. Element order is irrelevant for matching.
    Set(Vec<Value>),
    /// Mapping in insertion order.
    Dict(Vec<(Value, Value)>),
    /// Instance handle, compared by identity.
    Object(ObjectRef),
    /// Arbitrary Rust value without a notion of equality.
    Opaque(OpaqueValue),
    /// Matches anything.
    Wildcard,
}

impl Value {
    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Build a bytes value.
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(b.into())
    }

    /// Build a list from anything convertible to values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a tuple from anything convertible to values.
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Build a set from anything convertible to values.
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    /// Build a dict from key/value pairs, keeping their order.
    pub fn dict<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Dict(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wrap an arbitrary Rust value.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(OpaqueValue::new(value))
    }

    /// Returns true for the wildcard sentinel.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Value::Wildcard)
    }

    /// Returns true for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Object(obj) => obj.type_name(),
            Value::Opaque(opaque) => opaque.type_name(),
            Value::Wildcard => "wildcard",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Elements of a list, tuple or set.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a dict entry by string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Downcast an opaque value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(opaque) => opaque.downcast_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// Object References
// ============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity handle for an instance of some type.
///
/// Two `ObjectRef`s are equal only if one is a clone of the other. Used as the
/// receiver value when calling methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectRef {
    type_name: String,
    id: u64,
}

impl ObjectRef {
    /// Allocate a fresh instance identity of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        ObjectRef {
            type_name: type_name.into(),
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true if this object was created for `type_name`.
    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }
}

// ============================================================================
// Opaque Values
// ============================================================================

/// A Rust value carried inside a [`Value`] without equality or hashing.
///
/// Opaque values can be returned from stubs and passed to original
/// implementations, but the key builder rejects them.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        OpaqueValue {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueValue<{}>", self.type_name)
    }
}

/// Opaque values are equal only when they share the same allocation.
impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<&ObjectRef> for Value {
    fn from(v: &ObjectRef) -> Self {
        Value::Object(v.clone())
    }
}

impl From<OpaqueValue> for Value {
    fn from(v: OpaqueValue) -> Self {
        Value::Opaque(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

/// JSON objects become dicts with string keys; numbers become `Int` when they
/// fit in an `i64` and `Float` otherwise.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Dict(
                map.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Display
// ============================================================================

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Set(items) => {
                write!(f, "{{")?;
                write_items(f, items)?;
                write!(f, "}}")
            }
            Value::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Object(obj) => write!(f, "<{} #{}>", obj.type_name(), obj.id()),
            Value::Opaque(opaque) => write!(f, "<opaque {}>", opaque.type_name()),
            Value::Wildcard => write!(f, "ANY"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod conversions {
        use super::*;

        #[test]
        fn scalars_convert() {
            assert_eq!(Value::from(3), Value::Int(3));
            assert_eq!(Value::from(3u8), Value::Int(3));
            assert_eq!(Value::from(true), Value::Bool(true));
            assert_eq!(Value::from("a"), Value::Str("a".to_string()));
            assert_eq!(Value::from(()), Value::None);
            assert_eq!(Value::from(None::<i32>), Value::None);
            assert_eq!(Value::from(Some(2)), Value::Int(2));
        }

        #[test]
        fn vec_becomes_list() {
            assert_eq!(
                Value::from(vec![1, 2]),
                Value::List(vec![Value::Int(1), Value::Int(2)])
            );
        }

        #[test]
        fn json_object_becomes_ordered_dict() {
            let json = serde_json::json!({"a": 1, "b": [true, null], "c": 1.5});
            let value = Value::from(json);
            assert_eq!(value.get("a"), Some(&Value::Int(1)));
            assert_eq!(
                value.get("b"),
                Some(&Value::List(vec![Value::Bool(true), Value::None]))
            );
            assert_eq!(value.get("c"), Some(&Value::Float(1.5)));
            assert_eq!(value.get("missing"), None);
        }
    }

    mod identity {
        use super::*;

        #[test]
        fn objects_compare_by_identity() {
            let a = ObjectRef::new("Klass1");
            let b = ObjectRef::new("Klass1");
            assert_ne!(a, b);
            assert_eq!(a, a.clone());
            assert!(a.is_instance_of("Klass1"));
            assert!(!a.is_instance_of("Klass2"));
        }

        #[test]
        fn opaque_values_compare_by_allocation() {
            let a = Value::opaque(vec![1u8, 2, 3]);
            let b = Value::opaque(vec![1u8, 2, 3]);
            assert_ne!(a, b);
            assert_eq!(a, a.clone());
            assert_eq!(a.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
            assert_eq!(a.downcast_ref::<String>(), None);
        }
    }

    mod display {
        use super::*;

        #[test]
        fn renders_nested_values() {
            let value = Value::dict([
                ("a", Value::list([1, 2])),
                ("b", Value::tuple([ANY])),
            ]);
            assert_eq!(value.to_string(), r#"{"a": [1, 2], "b": (ANY,)}"#);
        }

        #[test]
        fn renders_scalars() {
            assert_eq!(Value::None.to_string(), "None");
            assert_eq!(Value::Bool(false).to_string(), "False");
            assert_eq!(Value::Float(2.0).to_string(), "2.0");
        }
    }
}
