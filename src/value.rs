//! The dynamic value model.
//!
//! binform describes formats with descriptors and carries instance data in a
//! dynamic [`Value`] tree. A [`Record`] pairs a [`TypeId`] with named fields;
//! every other variant is a leaf or a homogeneous list. The model is
//! deliberately width-agnostic: the schema decides whether an integer travels
//! as one octet or eight.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a registered record type.
///
/// Type ids key the descriptor registry and the type-graph cache, and appear
/// in [`Record`] values to drive subtype dispatch.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    /// Creates a type id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for TypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A record instance: a type id plus named field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// The declared (or dispatched) type of this record.
    pub type_id: TypeId,
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record of the given type.
    pub fn new(type_id: impl Into<TypeId>) -> Self {
        Self {
            type_id: type_id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Returns the field value, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Inserts or replaces a field value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Removes a field, returning its value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Iterates fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A dynamic instance value.
///
/// Numeric variants are width-agnostic; the schema's primitive kind decides
/// the wire width and signedness window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value (nullable primitives, skipped conditionals).
    Null,
    /// Boolean, serialized as a single octet unless re-represented.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Text, encoded per the effective encoding.
    Str(String),
    /// Raw octet buffer.
    Bytes(Vec<u8>),
    /// Homogeneous sequence.
    List(Vec<Value>),
    /// Nested record.
    Record(Record),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    /// Widens to `u64` when the value is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) if *v >= 0 => Some(*v as u64),
            Self::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    /// Widens to `i64` when the value is an integer in range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric view as `f64`, accepting any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the byte payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrows the list payload.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrows the record payload.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Interprets the value as a length/count, rejecting negatives.
    pub fn to_count(&self) -> Option<u64> {
        self.as_u64()
    }

    /// Value equality that tolerates numeric variant differences, so a
    /// condition literal `UInt(5)` matches a slot holding `Int(5)`.
    ///
    /// Non-numeric variants fall back to structural equality.
    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(_) | Self::UInt(_) | Self::Bool(_), Self::Int(_) | Self::UInt(_) | Self::Bool(_)) => {
                match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => a == b,
                    // Both out of i64 range means both are large u64s.
                    (None, None) => self.as_u64() == other.as_u64(),
                    _ => false,
                }
            }
            (Self::Float(a), b) | (b, Self::Float(a)) => b.as_f64() == Some(*a),
            (a, b) => a == b,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn loose_equality_crosses_numeric_variants() {
        assert!(Value::Int(5).loosely_eq(&Value::UInt(5)));
        assert!(Value::UInt(1).loosely_eq(&Value::Bool(true)));
        assert!(!Value::Int(-1).loosely_eq(&Value::UInt(u64::MAX)));
        assert!(Value::Str("a".into()).loosely_eq(&Value::Str("a".into())));
        assert!(!Value::Str("a".into()).loosely_eq(&Value::Int(0)));
    }

    #[test]
    fn record_field_access() {
        let mut rec = Record::new("Point").with("x", Value::Int(1));
        rec.set("y", Value::Int(2));
        assert_eq!(rec.get("x"), Some(&Value::Int(1)));
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.take("y"), Some(Value::Int(2)));
    }
}
