//! Collection descriptors and collection handles.
//!
//! A [`CollectionDescriptor`] is the static metadata about a target
//! collection: its name, the fields forming a document's key, the field
//! holding the revision token, and whether unkeyed scans are permitted.
//! A [`Collection`] binds a descriptor to a [`DocumentStore`] and offers
//! single-document convenience operations on top of the batch executor.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::collection::CollectionDescriptor;
//!
//! let books = CollectionDescriptor::builder("books", "title")
//!     .sort_key("price")
//!     .allow_scans(true)
//!     .build()?;
//!
//! let collection = store.collection(books);
//! let mut book = Document::new().with("title", "YellowBook").with("price", 3);
//! collection.put(&mut book).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    action::{Action, ActionBatch, FieldMutation},
    batch::{ActionOutput, BatchResult},
    document::{Document, DocumentKey},
    driver::DocumentDriver,
    error::{DocStoreError, DocStoreResult},
    iterator::DocumentIterator,
    query::Query,
    store::DocumentStore,
};

/// Field name used for revision tokens when none is configured.
pub const DEFAULT_REVISION_FIELD: &str = "docRevision";

fn default_revision_field() -> String {
    DEFAULT_REVISION_FIELD.to_string()
}

/// Static metadata about a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    name: String,
    partition_key: String,
    #[serde(default)]
    sort_key: Option<String>,
    #[serde(default = "default_revision_field")]
    revision_field: String,
    #[serde(default)]
    allow_scans: bool,
}

impl CollectionDescriptor {
    /// Creates a builder for a collection keyed on `partition_key`.
    pub fn builder(
        name: impl Into<String>,
        partition_key: impl Into<String>,
    ) -> CollectionDescriptorBuilder {
        CollectionDescriptorBuilder::new(name, partition_key)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn revision_field(&self) -> &str {
        &self.revision_field
    }

    pub fn allow_scans(&self) -> bool {
        self.allow_scans
    }

    /// Returns `true` if `field` is the partition key or the sort key.
    pub fn is_key_field(&self, field: &str) -> bool {
        field == self.partition_key || self.sort_key.as_deref() == Some(field)
    }

    /// Checks the descriptor's own invariants. Descriptors built through the
    /// builder are always valid; deserialized ones should be checked.
    pub fn validate(&self) -> DocStoreResult<()> {
        if self.name.is_empty() {
            return Err(DocStoreError::invalid_argument("collection name must not be empty"));
        }
        if self.partition_key.is_empty() {
            return Err(DocStoreError::invalid_argument(format!(
                "collection {}: partition key field must not be empty",
                self.name
            )));
        }
        if self.sort_key.as_deref() == Some(self.partition_key.as_str()) {
            return Err(DocStoreError::invalid_argument(format!(
                "collection {}: sort key must differ from the partition key",
                self.name
            )));
        }
        if self.revision_field.is_empty() || self.is_key_field(&self.revision_field) {
            return Err(DocStoreError::invalid_argument(format!(
                "collection {}: revision field must be non-empty and distinct from the key fields",
                self.name
            )));
        }
        Ok(())
    }

    /// Extracts the key of `document` in this collection.
    ///
    /// # Errors
    ///
    /// Fails with [`DocStoreError::InvalidArgument`] if the partition key, or
    /// a configured sort key, is missing or null.
    pub fn key_of(&self, document: &Document) -> DocStoreResult<DocumentKey> {
        let partition = self.required_field(document, &self.partition_key)?;
        let mut key = DocumentKey::new(partition.clone());
        if let Some(sort_key) = &self.sort_key {
            key = key.with_sort(self.required_field(document, sort_key)?.clone());
        }
        Ok(key)
    }

    fn required_field<'d>(
        &self,
        document: &'d Document,
        field: &str,
    ) -> DocStoreResult<&'d crate::value::Value> {
        document
            .get(field)
            .filter(|value| !value.is_null())
            .ok_or_else(|| {
                DocStoreError::invalid_argument(format!(
                    "document is missing key field {field} of collection {}",
                    self.name
                ))
            })
    }
}

/// Builder for [`CollectionDescriptor`].
#[derive(Debug, Clone)]
pub struct CollectionDescriptorBuilder {
    descriptor: CollectionDescriptor,
}

impl CollectionDescriptorBuilder {
    pub fn new(name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            descriptor: CollectionDescriptor {
                name: name.into(),
                partition_key: partition_key.into(),
                sort_key: None,
                revision_field: default_revision_field(),
                allow_scans: false,
            },
        }
    }

    pub fn sort_key(mut self, field: impl Into<String>) -> Self {
        self.descriptor.sort_key = Some(field.into());
        self
    }

    pub fn revision_field(mut self, field: impl Into<String>) -> Self {
        self.descriptor.revision_field = field.into();
        self
    }

    /// Permits queries that do not pin the partition key.
    pub fn allow_scans(mut self, allow: bool) -> Self {
        self.descriptor.allow_scans = allow;
        self
    }

    pub fn build(self) -> DocStoreResult<CollectionDescriptor> {
        self.descriptor.validate()?;
        Ok(self.descriptor)
    }
}

/// A collection bound to a document store.
///
/// Every operation here is a one-action batch; on success the caller's
/// document is refreshed with the revision the driver returned.
#[derive(Debug)]
pub struct Collection<'a, D: DocumentDriver> {
    descriptor: Arc<CollectionDescriptor>,
    store: &'a DocumentStore<D>,
}

impl<'a, D: DocumentDriver> Collection<'a, D> {
    pub(crate) fn new(descriptor: Arc<CollectionDescriptor>, store: &'a DocumentStore<D>) -> Self {
        Self { descriptor, store }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<CollectionDescriptor> {
        &self.descriptor
    }

    /// Starts an empty batch against this collection.
    pub fn batch(&self) -> CollectionBatch<'a, D> {
        CollectionBatch {
            descriptor: self.descriptor.clone(),
            store: self.store,
            batch: ActionBatch::new(),
        }
    }

    /// Inserts `document`, failing with `AlreadyExists` if its key is taken.
    pub async fn create(&self, document: &mut Document) -> DocStoreResult<()> {
        let action = Action::create(&self.descriptor, document.clone());
        self.write(action, document).await
    }

    /// Upserts `document`. If it carries a revision the write is conditional.
    pub async fn put(&self, document: &mut Document) -> DocStoreResult<()> {
        let action = Action::put(&self.descriptor, document.clone());
        self.write(action, document).await
    }

    /// Replaces an existing document.
    pub async fn replace(&self, document: &mut Document) -> DocStoreResult<()> {
        let action = Action::replace(&self.descriptor, document.clone());
        self.write(action, document).await
    }

    /// Applies field mutations to the document identified by `document`'s key.
    pub async fn update(
        &self,
        document: &mut Document,
        mutations: Vec<FieldMutation>,
    ) -> DocStoreResult<()> {
        let action = Action::update(&self.descriptor, document.clone(), mutations);
        self.write(action, document).await
    }

    /// Loads the document identified by `document`'s key, replacing its
    /// contents with the stored fields.
    pub async fn get(&self, document: &mut Document) -> DocStoreResult<()> {
        let action = Action::get(&self.descriptor, document.clone());
        if let ActionOutput::Fetched(fetched) = self.run_one(action).await? {
            *document = fetched;
        }
        Ok(())
    }

    /// Fetches a document by key.
    pub async fn get_by_key(&self, key: &DocumentKey) -> DocStoreResult<Document> {
        let mut document = key.to_document(&self.descriptor);
        self.get(&mut document).await?;
        Ok(document)
    }

    /// Deletes the document identified by `document`'s key. If it carries a
    /// revision the delete is conditional.
    pub async fn delete(&self, document: &Document) -> DocStoreResult<()> {
        let action = Action::delete(&self.descriptor, document.clone());
        self.run_one(action).await.map(|_| ())
    }

    /// Compiles `query` against this collection and returns a lazy iterator
    /// over its results.
    pub fn query(&self, query: Query) -> DocStoreResult<DocumentIterator<'a, D>> {
        self.store.query(&self.descriptor, query)
    }

    async fn write(&self, action: Action, document: &mut Document) -> DocStoreResult<()> {
        if let ActionOutput::Written(revision) = self.run_one(action).await? {
            document.set_revision(&self.descriptor, revision);
        }
        Ok(())
    }

    async fn run_one(&self, action: Action) -> DocStoreResult<ActionOutput> {
        let result = self.store.run(ActionBatch::from(vec![action])).await?;
        result
            .into_result()?
            .into_iter()
            .next()
            .ok_or_else(|| DocStoreError::invalid_argument("batch produced no result"))
    }
}

/// A batch under construction against one collection.
///
/// # Example
///
/// ```ignore
/// let result = collection
///     .batch()
///     .put(first)
///     .get(DocumentKey::new("YellowBook").with_sort(2))
///     .delete_key(DocumentKey::new("YellowBook").with_sort(3))
///     .run()
///     .await?;
/// ```
#[derive(Debug)]
pub struct CollectionBatch<'a, D: DocumentDriver> {
    descriptor: Arc<CollectionDescriptor>,
    store: &'a DocumentStore<D>,
    batch: ActionBatch,
}

impl<'a, D: DocumentDriver> CollectionBatch<'a, D> {
    pub fn create(mut self, document: Document) -> Self {
        self.batch.push(Action::create(&self.descriptor, document));
        self
    }

    pub fn put(mut self, document: Document) -> Self {
        self.batch.push(Action::put(&self.descriptor, document));
        self
    }

    pub fn replace(mut self, document: Document) -> Self {
        self.batch.push(Action::replace(&self.descriptor, document));
        self
    }

    pub fn get(mut self, key: DocumentKey) -> Self {
        let document = key.to_document(&self.descriptor);
        self.batch.push(Action::get(&self.descriptor, document));
        self
    }

    pub fn get_projected(mut self, key: DocumentKey, fields: Vec<String>) -> Self {
        let document = key.to_document(&self.descriptor);
        self.batch
            .push(Action::get(&self.descriptor, document).with_projection(fields));
        self
    }

    pub fn update(mut self, document: Document, mutations: Vec<FieldMutation>) -> Self {
        self.batch
            .push(Action::update(&self.descriptor, document, mutations));
        self
    }

    pub fn delete(mut self, document: Document) -> Self {
        self.batch.push(Action::delete(&self.descriptor, document));
        self
    }

    pub fn delete_key(self, key: DocumentKey) -> Self {
        let document = key.to_document(&self.descriptor);
        self.delete(document)
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn into_batch(self) -> ActionBatch {
        self.batch
    }

    pub async fn run(self) -> DocStoreResult<BatchResult> {
        self.store.run(self.batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn builder_defaults() {
        let books = CollectionDescriptor::builder("books", "title")
            .build()
            .unwrap();

        assert_eq!(books.revision_field(), DEFAULT_REVISION_FIELD);
        assert_eq!(books.sort_key(), None);
        assert!(!books.allow_scans());
    }

    #[test]
    fn builder_rejects_overlapping_fields() {
        assert!(
            CollectionDescriptor::builder("books", "title")
                .sort_key("title")
                .build()
                .is_err()
        );
        assert!(
            CollectionDescriptor::builder("books", "title")
                .revision_field("title")
                .build()
                .is_err()
        );
        assert!(CollectionDescriptor::builder("", "title").build().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let books: CollectionDescriptor =
            serde_json::from_str(r#"{ "name": "books", "partition_key": "title" }"#).unwrap();

        assert_eq!(books.revision_field(), DEFAULT_REVISION_FIELD);
        assert!(books.validate().is_ok());
    }

    #[test]
    fn key_extraction_requires_key_fields() {
        let books = CollectionDescriptor::builder("books", "title")
            .sort_key("price")
            .build()
            .unwrap();

        let key = books
            .key_of(&Document::new().with("title", "YellowBook").with("price", 3))
            .unwrap();
        assert_eq!(key.partition(), &Value::from("YellowBook"));
        assert_eq!(key.sort(), Some(&Value::from(3)));

        let err = books
            .key_of(&Document::new().with("title", "YellowBook"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);

        assert!(
            books
                .key_of(&Document::new().with("title", Value::Null).with("price", 3))
                .is_err()
        );
    }
}
