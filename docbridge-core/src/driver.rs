//! The provider driver contract.
//!
//! A [`DocumentDriver`] is the interface every backend implements. The core
//! consumes it and never looks past it: drivers report failures as
//! [`DriverError`]s in their native error vocabulary and classify them
//! through [`DocumentDriver::classify`], so the batch executor, the retry
//! engine and the result iterator stay backend-agnostic.
//!
//! # Traits
//!
//! - [`DocumentDriver`]: the core contract, used generically
//! - [`DynDocumentDriver`]: object-safe mirror for runtime-selected drivers
//! - [`DocumentDriverBuilder`]: factory trait for constructing drivers
//!
//! # Thread Safety
//!
//! A driver may be shared by concurrent batches and queries, so
//! implementations must be safe for concurrent use. The core never holds a
//! lock across driver calls.

use std::{any::Any, fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{
    action::FieldMutation,
    collection::CollectionDescriptor,
    document::{Document, DocumentKey, RevisionToken},
    error::{DocStoreError, DocStoreResult, DriverError, DriverResult, ErrorKind},
    page::{PageToken, QueryPage},
    query::QueryDescriptor,
};

/// Precondition attached to a write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteCondition {
    /// Write regardless of the current state.
    #[default]
    Unconditional,
    /// The key must already exist (`NotFound` otherwise).
    MustExist,
    /// The key must not exist (`AlreadyExists` otherwise).
    MustNotExist,
    /// The stored revision must equal this token (`PreconditionFailed`
    /// otherwise, including when the key does not exist).
    RevisionMatches(RevisionToken),
}

impl WriteCondition {
    /// `RevisionMatches` if a token is given, `fallback` otherwise.
    pub fn from_revision(revision: Option<RevisionToken>, fallback: WriteCondition) -> Self {
        revision
            .map(WriteCondition::RevisionMatches)
            .unwrap_or(fallback)
    }
}

/// Interface implemented by every document store backend.
///
/// Documents passed to writes never contain the collection's revision field;
/// the driver assigns a fresh revision on every successful write and returns
/// it. Documents returned by reads and queries carry their current revision
/// under [`CollectionDescriptor::revision_field`].
#[async_trait]
pub trait DocumentDriver: Send + Sync + Debug {
    /// Stable identifier of this backend, e.g. `"memory"` or `"mongodb"`.
    fn provider_id(&self) -> &str;

    /// Writes a whole document under `condition`.
    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken>;

    /// Reads a document by key. A non-empty `projection` limits the returned
    /// fields; key and revision fields are always included.
    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document>;

    /// Deletes a document by key under `condition`.
    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()>;

    /// Applies field-level mutations to an existing document.
    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken>;

    /// Fetches one page of results, resuming from `page_token` if given.
    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage>;

    /// Maps a failure raised by this driver onto the abstract taxonomy.
    fn classify(&self, error: &DriverError) -> ErrorKind;

    /// Describes how this driver would execute `query`.
    fn query_plan(&self, _query: &QueryDescriptor) -> String {
        "unspecified".to_string()
    }

    /// Converts a driver failure into the caller-facing error.
    fn to_store_error(&self, error: DriverError) -> DocStoreError {
        DocStoreError::from_driver(self.provider_id(), self.classify(&error), error)
    }

    /// Releases connections and other resources.
    async fn shutdown(self) -> DocStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<D> DocumentDriver for &D
where
    D: DocumentDriver,
{
    fn provider_id(&self) -> &str {
        DocumentDriver::provider_id(*self)
    }

    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DocumentDriver::put_document(*self, collection, document, condition).await
    }

    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document> {
        DocumentDriver::get_document(*self, collection, key, projection).await
    }

    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()> {
        DocumentDriver::delete_document(*self, collection, key, condition).await
    }

    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DocumentDriver::update_document(*self, collection, key, mutations, condition).await
    }

    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage> {
        DocumentDriver::run_query(*self, query, page_token).await
    }

    fn classify(&self, error: &DriverError) -> ErrorKind {
        DocumentDriver::classify(*self, error)
    }

    fn query_plan(&self, query: &QueryDescriptor) -> String {
        DocumentDriver::query_plan(*self, query)
    }
}

#[async_trait]
impl<D> DocumentDriver for Arc<D>
where
    D: DocumentDriver,
{
    fn provider_id(&self) -> &str {
        DocumentDriver::provider_id(&**self)
    }

    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DocumentDriver::put_document(&**self, collection, document, condition).await
    }

    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document> {
        DocumentDriver::get_document(&**self, collection, key, projection).await
    }

    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()> {
        DocumentDriver::delete_document(&**self, collection, key, condition).await
    }

    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DocumentDriver::update_document(&**self, collection, key, mutations, condition).await
    }

    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage> {
        DocumentDriver::run_query(&**self, query, page_token).await
    }

    fn classify(&self, error: &DriverError) -> ErrorKind {
        DocumentDriver::classify(&**self, error)
    }

    fn query_plan(&self, query: &QueryDescriptor) -> String {
        DocumentDriver::query_plan(&**self, query)
    }
}

/// Object-safe mirror of [`DocumentDriver`], implemented for every sized
/// driver.
#[async_trait]
pub trait DynDocumentDriver: Send + Sync + Debug {
    fn provider_id(&self) -> &str;
    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken>;
    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document>;
    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()>;
    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken>;
    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage>;
    fn classify(&self, error: &DriverError) -> ErrorKind;
    fn query_plan(&self, query: &QueryDescriptor) -> String;
    async fn shutdown_boxed(self: Box<Self>) -> DocStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<D: DocumentDriver + 'static> DynDocumentDriver for D {
    fn provider_id(&self) -> &str {
        DocumentDriver::provider_id(self)
    }

    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DocumentDriver::put_document(self, collection, document, condition).await
    }

    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document> {
        DocumentDriver::get_document(self, collection, key, projection).await
    }

    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()> {
        DocumentDriver::delete_document(self, collection, key, condition).await
    }

    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DocumentDriver::update_document(self, collection, key, mutations, condition).await
    }

    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage> {
        DocumentDriver::run_query(self, query, page_token).await
    }

    fn classify(&self, error: &DriverError) -> ErrorKind {
        DocumentDriver::classify(self, error)
    }

    fn query_plan(&self, query: &QueryDescriptor) -> String {
        DocumentDriver::query_plan(self, query)
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocStoreResult<()> {
        DocumentDriver::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A driver selected at runtime, as produced by the
/// [`DriverRegistry`](crate::registry::DriverRegistry).
pub type BoxedDriver = Box<dyn DynDocumentDriver>;

#[async_trait]
impl DocumentDriver for BoxedDriver {
    fn provider_id(&self) -> &str {
        DynDocumentDriver::provider_id(&**self)
    }

    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DynDocumentDriver::put_document(&**self, collection, document, condition).await
    }

    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document> {
        DynDocumentDriver::get_document(&**self, collection, key, projection).await
    }

    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()> {
        DynDocumentDriver::delete_document(&**self, collection, key, condition).await
    }

    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        DynDocumentDriver::update_document(&**self, collection, key, mutations, condition).await
    }

    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage> {
        DynDocumentDriver::run_query(&**self, query, page_token).await
    }

    fn classify(&self, error: &DriverError) -> ErrorKind {
        DynDocumentDriver::classify(&**self, error)
    }

    fn query_plan(&self, query: &QueryDescriptor) -> String {
        DynDocumentDriver::query_plan(&**self, query)
    }

    async fn shutdown(self) -> DocStoreResult<()> {
        self.shutdown_boxed().await
    }
}

/// Factory trait for drivers that need asynchronous setup.
#[async_trait]
pub trait DocumentDriverBuilder {
    type Driver: DocumentDriver;

    async fn build(self) -> DocStoreResult<Self::Driver>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_selects_the_condition() {
        assert_eq!(
            WriteCondition::from_revision(None, WriteCondition::MustExist),
            WriteCondition::MustExist
        );
        assert_eq!(
            WriteCondition::from_revision(Some(RevisionToken::new("r1")), WriteCondition::MustExist),
            WriteCondition::RevisionMatches(RevisionToken::new("r1"))
        );
    }
}
