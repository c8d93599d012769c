//! Dynamically-typed field values.
//!
//! [`Value`] is the tagged union every document field holds. It has two
//! orderings:
//!
//! - [`Value::compare`] is the filter ordering. It only orders values of
//!   compatible types and returns `None` otherwise, so a predicate such as
//!   `price < 3` never matches a string-valued `price`.
//! - The [`Ord`] implementation is a total order (type rank first, then
//!   value) used for document keys and result sorting.
//!
//! Integers follow two's-complement order, floats follow the IEEE-754 total
//! order (`f64::total_cmp`), mixed integer/float comparisons are exact, and
//! strings compare byte-lexicographically.

use std::cmp::Ordering;

use bson::{Binary, Bson, spec::BinarySubtype};
use chrono::{DateTime, Utc};
use serde_json::{Number, Value as JsonValue};

use crate::{
    document::Fields,
    error::{DocStoreError, DocStoreResult},
};

/// A dynamically-typed document field value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(Fields),
}

impl Value {
    /// Short name of this value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns `true` if a value of `other`'s type may be stored where this
    /// value's type is expected. Numbers are interchangeable and `Null` is
    /// compatible with everything.
    pub fn is_compatible_with(&self, other: &Value) -> bool {
        self.is_null()
            || other.is_null()
            || (self.is_number() && other.is_number())
            || self.rank() == other.rank()
    }

    /// Compares two values with filter semantics.
    ///
    /// Returns `None` when the types are not comparable (for example a
    /// string against a number, or two maps that differ).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Int(a), Value::Float(b)) => Some(compare_int_float(*a, *b)),
            (Value::Float(a), Value::Int(b)) => Some(compare_int_float(*b, *a).reverse()),
            (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.compare(right)? {
                        Ordering::Equal => continue,
                        ordering => return Some(ordering),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Value::Map(a), Value::Map(b)) => {
                if a.len() == b.len()
                    && a.iter().all(|(key, left)| {
                        b.get(key)
                            .and_then(|right| left.compare(right))
                            == Some(Ordering::Equal)
                    })
                {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Filter equality: `true` iff [`Value::compare`] yields `Equal`.
    pub fn matches(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
            Value::Timestamp(_) => 5,
            Value::List(_) => 6,
            Value::Map(_) => 7,
        }
    }
}

/// Exact comparison of an integer against a float under the IEEE-754 total
/// order. NaNs sort above every integer when positive and below when negative.
fn compare_int_float(int: i64, float: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return if float.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if float >= TWO_POW_63 {
        return Ordering::Less;
    }
    if float < -TWO_POW_63 {
        return Ordering::Greater;
    }

    let truncated = float.trunc();
    match int.cmp(&(truncated as i64)) {
        Ordering::Equal if float > truncated => Ordering::Less,
        Ordering::Equal if float < truncated => Ordering::Greater,
        ordering => ordering,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            ordering => return ordering,
        }

        match (self, other) {
            // Numerically equal ints sort before floats so that the order
            // stays strict across the two representations.
            (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b).then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a)
                .reverse()
                .then(Ordering::Greater),
            (Value::List(a), Value::List(b)) => a.iter().cmp(b.iter()),
            (Value::Map(a), Value::Map(b)) => {
                let mut left = a.iter().collect::<Vec<_>>();
                let mut right = b.iter().collect::<Vec<_>>();
                left.sort_by(|x, y| x.0.cmp(y.0));
                right.sort_by(|x, y| x.0.cmp(y.0));
                left.cmp(&right)
            }
            _ => self
                .compare(other)
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(value as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Fields> for Value {
    fn from(value: Fields) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Value> for JsonValue {
    type Error = DocStoreError;

    /// Converts to JSON. Bytes become arrays of numbers and timestamps become
    /// RFC 3339 strings; non-finite floats are rejected.
    fn try_from(value: Value) -> DocStoreResult<Self> {
        Ok(match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Int(i) => JsonValue::Number(i.into()),
            Value::Float(f) => JsonValue::Number(Number::from_f64(f).ok_or_else(|| {
                DocStoreError::Serialization(format!("{f} cannot be represented in JSON"))
            })?),
            Value::String(s) => JsonValue::String(s),
            Value::Bytes(bytes) => JsonValue::Array(
                bytes
                    .into_iter()
                    .map(|b| JsonValue::Number(b.into()))
                    .collect(),
            ),
            Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
            Value::List(items) => JsonValue::Array(
                items
                    .into_iter()
                    .map(JsonValue::try_from)
                    .collect::<DocStoreResult<Vec<_>>>()?,
            ),
            Value::Map(fields) => JsonValue::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| JsonValue::try_from(v).map(|v| (k, v)))
                    .collect::<DocStoreResult<serde_json::Map<_, _>>>()?,
            ),
        })
    }
}

impl From<&Value> for Bson {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Int(i) => Bson::Int64(*i),
            Value::Float(f) => Bson::Double(*f),
            Value::String(s) => Bson::String(s.clone()),
            Value::Bytes(bytes) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            }),
            Value::Timestamp(ts) => Bson::DateTime(bson::DateTime::from_chrono(*ts)),
            Value::List(items) => Bson::Array(items.iter().map(Bson::from).collect()),
            Value::Map(fields) => Bson::Document(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Bson::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Bson> for Value {
    type Error = DocStoreError;

    fn try_from(bson: Bson) -> DocStoreResult<Self> {
        Ok(match bson {
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Boolean(b) => Value::Bool(b),
            Bson::Int32(i) => Value::Int(i as i64),
            Bson::Int64(i) => Value::Int(i),
            Bson::Double(f) => Value::Float(f),
            Bson::String(s) | Bson::Symbol(s) => Value::String(s),
            Bson::ObjectId(oid) => Value::String(oid.to_hex()),
            Bson::Binary(binary) => Value::Bytes(binary.bytes),
            Bson::DateTime(dt) => Value::Timestamp(dt.to_chrono()),
            Bson::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<DocStoreResult<Vec<_>>>()?,
            ),
            Bson::Document(doc) => Value::Map(
                doc.into_iter()
                    .map(|(k, v)| Value::try_from(v).map(|v| (k, v)))
                    .collect::<DocStoreResult<Fields>>()?,
            ),
            other => {
                return Err(DocStoreError::Serialization(format!(
                    "unsupported BSON value: {other}"
                )));
            }
        })
    }
}
