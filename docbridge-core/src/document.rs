//! Documents, document keys and revision tokens.
//!
//! A [`Document`] is an insertion-ordered map from field name to [`Value`].
//! Which fields form its key and which field carries its revision is decided
//! by the [`CollectionDescriptor`](crate::collection::CollectionDescriptor)
//! it is written to, not by the document itself.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::{
    collection::CollectionDescriptor,
    error::{DocStoreError, DocStoreResult},
    value::Value,
};

/// Insertion-ordered field map.
pub type Fields = IndexMap<String, Value>;

/// An in-memory document: an ordered field map.
///
/// # Example
///
/// ```ignore
/// use docbridge::document::Document;
///
/// let book = Document::new()
///     .with("title", "YellowBook")
///     .with("price", 3);
///
/// assert_eq!(book.get("price").and_then(|v| v.as_i64()), Some(3));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: Fields,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Fields::new() }
    }

    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Builder-style setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Removes a field, preserving the order of the remaining fields.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the revision token stored under the collection's revision
    /// field, if one is present and non-null.
    pub fn revision(&self, collection: &CollectionDescriptor) -> Option<RevisionToken> {
        self.get(collection.revision_field())
            .filter(|value| !value.is_null())
            .cloned()
            .map(RevisionToken::new)
    }

    /// Stores a revision token under the collection's revision field.
    pub fn set_revision(&mut self, collection: &CollectionDescriptor, revision: RevisionToken) {
        self.set(collection.revision_field(), revision.into_value());
    }

    /// Returns a copy containing only the given fields, in the requested order.
    pub fn project(&self, fields: &[String]) -> Document {
        Document::from_fields(
            fields
                .iter()
                .filter_map(|field| {
                    self.get(field)
                        .map(|value| (field.clone(), value.clone()))
                })
                .collect(),
        )
    }

    /// Decodes `source` into this document, treating the current fields as
    /// a template.
    ///
    /// An empty template accepts every field of `source`. Otherwise only the
    /// template's field names are populated: a field missing from `source`
    /// becomes [`Value::Null`], and a field whose stored type cannot be held
    /// by the template's current value fails with
    /// [`DocStoreError::TypeMismatch`]. A `Null` template slot accepts any
    /// type. On error the template is left untouched.
    pub fn populate_from(&mut self, mut source: Document) -> DocStoreResult<()> {
        if self.fields.is_empty() {
            self.fields = source.fields;
            return Ok(());
        }

        let mut populated = Fields::with_capacity(self.fields.len());
        for (name, slot) in &self.fields {
            let value = source.fields.swap_remove(name).unwrap_or(Value::Null);
            if !slot.is_compatible_with(&value) {
                return Err(DocStoreError::TypeMismatch {
                    field: name.clone(),
                    expected: slot.type_name(),
                    found: value.type_name(),
                });
            }
            populated.insert(name.clone(), value);
        }

        self.fields = populated;
        Ok(())
    }

    /// Converts this document into a JSON object.
    pub fn to_json(&self) -> DocStoreResult<JsonValue> {
        JsonValue::try_from(Value::Map(self.fields.clone()))
    }

    /// Creates a document from a JSON object.
    ///
    /// # Errors
    ///
    /// Fails with [`DocStoreError::InvalidArgument`] if `value` is not an object.
    pub fn from_json(value: JsonValue) -> DocStoreResult<Self> {
        match Value::from(value) {
            Value::Map(fields) => Ok(Document::from_fields(fields)),
            other => Err(DocStoreError::invalid_argument(format!(
                "expected a JSON object, found {}",
                other.type_name()
            ))),
        }
    }
}

impl From<Fields> for Document {
    fn from(fields: Fields) -> Self {
        Document::from_fields(fields)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document::from_fields(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Opaque, backend-assigned optimistic-concurrency marker.
///
/// Tokens can only be compared for equality. A write that carries a token
/// succeeds only if the backend's current token for that key is equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionToken(Value);

impl RevisionToken {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other:?}"),
        }
    }
}

/// The identity of a document within a collection: its partition key value
/// and, for collections with a sort key, its sort key value.
///
/// Integral floats are stored as ints, so `2` and `2.0` name the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DocumentKey {
    partition: Value,
    sort: Option<Value>,
}

impl DocumentKey {
    pub fn new(partition: impl Into<Value>) -> Self {
        Self {
            partition: key_value(partition.into()),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: impl Into<Value>) -> Self {
        self.sort = Some(key_value(sort.into()));
        self
    }

    pub fn partition(&self) -> &Value {
        &self.partition
    }

    pub fn sort(&self) -> Option<&Value> {
        self.sort.as_ref()
    }

    /// Builds a document holding only this key's fields.
    pub fn to_document(&self, collection: &CollectionDescriptor) -> Document {
        let mut document = Document::new().with(collection.partition_key(), self.partition.clone());
        if let (Some(field), Some(value)) = (collection.sort_key(), &self.sort) {
            document.set(field, value.clone());
        }
        document
    }
}

fn key_value(value: Value) -> Value {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

    match value {
        Value::Float(f) if f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f) => Value::Int(f as i64),
        other => other,
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", RevisionToken(self.partition.clone()))?;
        if let Some(sort) = &self.sort {
            write!(f, "/{}", RevisionToken(sort.clone()))?;
        }
        Ok(())
    }
}
