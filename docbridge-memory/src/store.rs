//! In-memory implementation of the document driver contract.
//!
//! Documents live in per-collection ordered maps keyed by [`DocumentKey`],
//! behind an async-aware read-write lock. Every successful write stamps the
//! document with a fresh UUID revision.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
    },
};

use async_trait::async_trait;
use mea::{mutex::Mutex, rwlock::RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docbridge_core::{
    action::{FieldMutation, MutationOp},
    collection::CollectionDescriptor,
    document::{Document, DocumentKey, RevisionToken},
    driver::{DocumentDriver, DocumentDriverBuilder, WriteCondition},
    error::{DocStoreResult, DriverError, DriverResult, ErrorCodeTable, ErrorKind},
    page::{PageToken, QueryPage},
    query::{QueryDescriptor, SortDirection},
    value::Value,
};

use crate::evaluator::DocumentEvaluator;

pub const PROVIDER_ID: &str = "memory";

/// Native error codes raised by [`InMemoryDriver`].
pub mod codes {
    pub const NOT_FOUND: &str = "NotFound";
    pub const ALREADY_EXISTS: &str = "AlreadyExists";
    pub const REVISION_MISMATCH: &str = "RevisionMismatch";
    pub const INVALID_ARGUMENT: &str = "InvalidArgument";
    pub const UNAVAILABLE: &str = "Unavailable";
    pub const THROTTLED: &str = "Throttled";
    pub const TIMEOUT: &str = "Timeout";
    pub const UNAUTHORIZED: &str = "Unauthorized";
}

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    revision: String,
}

type CollectionMap = BTreeMap<DocumentKey, StoredDocument>;
type StoreMap = HashMap<String, CollectionMap>;

/// Driver operations, used to count calls and target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Put,
    Get,
    Delete,
    Update,
    Query,
}

impl DriverOp {
    const ALL: [DriverOp; 5] = [
        DriverOp::Put,
        DriverOp::Get,
        DriverOp::Delete,
        DriverOp::Update,
        DriverOp::Query,
    ];

    fn index(self) -> usize {
        match self {
            DriverOp::Put => 0,
            DriverOp::Get => 1,
            DriverOp::Delete => 2,
            DriverOp::Update => 3,
            DriverOp::Query => 4,
        }
    }
}

/// Options read from the `options` block of a driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryOptions {
    /// Page size used when a query does not set one.
    pub page_size: usize,
}

impl Default for InMemoryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    calls: [AtomicUsize; 5],
}

/// Thread-safe in-memory document driver.
///
/// Clones share the same underlying data, counters and injected faults, so a
/// test can hand one clone to a store and keep another for inspection.
///
/// Besides storage the driver records how often each operation was called
/// and can be told to fail upcoming calls with a native error code, which is
/// how retry and partial-failure behavior is exercised without a network.
///
/// Query pages are offsets into the filtered results, recomputed from live
/// data on every fetch. Without a sort the result order is key order. A
/// write between two page fetches shifts the offsets, so a concurrent
/// delete can cause a later document to be skipped and an insert can cause
/// one to be returned twice.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::{InMemoryDriver, DriverOp, codes};
///
/// let driver = InMemoryDriver::new();
/// driver.fail_next(DriverOp::Put, 2, codes::UNAVAILABLE).await;
///
/// let store = DocumentStore::new(driver.clone());
/// // the third attempt succeeds
/// store.collection(books).put(&mut book).await?;
/// assert_eq!(driver.calls(DriverOp::Put), 3);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryDriver {
    store: Arc<RwLock<StoreMap>>,
    options: InMemoryOptions,
    codes: Arc<ErrorCodeTable>,
    counters: Arc<CallCounters>,
    faults: Arc<Mutex<HashMap<DriverOp, VecDeque<DriverError>>>>,
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::with_options(InMemoryOptions::default())
    }
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: InMemoryOptions) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            options,
            codes: Arc::new(error_codes()),
            counters: Arc::new(CallCounters::default()),
            faults: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn builder() -> InMemoryDriverBuilder {
        InMemoryDriverBuilder::default()
    }

    pub fn options(&self) -> &InMemoryOptions {
        &self.options
    }

    /// Number of times `op` has been invoked, including failed calls.
    pub fn calls(&self, op: DriverOp) -> usize {
        self.counters.calls[op.index()].load(AtomicOrdering::SeqCst)
    }

    /// Number of driver invocations across all operations.
    pub fn total_calls(&self) -> usize {
        DriverOp::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    /// Makes the next `times` invocations of `op` fail with `code`.
    pub async fn fail_next(&self, op: DriverOp, times: usize, code: &str) {
        let mut faults = self.faults.lock().await;
        let queue = faults.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(DriverError::new(code, format!("injected {op:?} failure")));
        }
    }

    /// Queues a specific error for the next invocation of `op`.
    pub async fn inject(&self, op: DriverOp, error: DriverError) {
        self.faults
            .lock()
            .await
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Drops every queued fault.
    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    /// Number of documents stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    async fn begin(&self, op: DriverOp) -> DriverResult<()> {
        self.counters.calls[op.index()].fetch_add(1, AtomicOrdering::SeqCst);

        let fault = self
            .faults
            .lock()
            .await
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(error) => {
                tracing::debug!(op = ?op, code = error.code(), "injected driver failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn materialize(collection: &CollectionDescriptor, stored: &StoredDocument) -> Document {
        let mut document = stored.document.clone();
        document.set(collection.revision_field(), stored.revision.clone());
        document
    }
}

fn error_codes() -> ErrorCodeTable {
    ErrorCodeTable::builder()
        .map(codes::NOT_FOUND, ErrorKind::NotFound)
        .map(codes::ALREADY_EXISTS, ErrorKind::AlreadyExists)
        .map(codes::REVISION_MISMATCH, ErrorKind::PreconditionFailed)
        .map(codes::INVALID_ARGUMENT, ErrorKind::InvalidArgument)
        .map(codes::UNAVAILABLE, ErrorKind::Unavailable)
        .map(codes::THROTTLED, ErrorKind::ResourceExhausted)
        .map(codes::TIMEOUT, ErrorKind::DeadlineExceeded)
        .map(codes::UNAUTHORIZED, ErrorKind::Unauthorized)
        .build()
}

fn new_revision() -> String {
    Uuid::new_v4().to_string()
}

fn key_of(collection: &CollectionDescriptor, document: &Document) -> DriverResult<DocumentKey> {
    collection
        .key_of(document)
        .map_err(|e| DriverError::new(codes::INVALID_ARGUMENT, e.to_string()))
}

fn not_found(collection: &CollectionDescriptor, key: &DocumentKey) -> DriverError {
    DriverError::new(
        codes::NOT_FOUND,
        format!("no document {key} in {}", collection.name()),
    )
}

fn check_condition(
    collection: &CollectionDescriptor,
    key: &DocumentKey,
    existing: Option<&StoredDocument>,
    condition: &WriteCondition,
) -> DriverResult<()> {
    match (condition, existing) {
        (WriteCondition::Unconditional, _) => Ok(()),
        (WriteCondition::MustExist, Some(_)) | (WriteCondition::MustNotExist, None) => Ok(()),
        (WriteCondition::MustExist, None) => Err(not_found(collection, key)),
        (WriteCondition::MustNotExist, Some(_)) => Err(DriverError::new(
            codes::ALREADY_EXISTS,
            format!("document {key} already exists in {}", collection.name()),
        )),
        (WriteCondition::RevisionMatches(expected), Some(stored))
            if expected.as_value().as_str() == Some(stored.revision.as_str()) =>
        {
            Ok(())
        }
        (WriteCondition::RevisionMatches(expected), _) => Err(DriverError::new(
            codes::REVISION_MISMATCH,
            format!("document {key} is not at revision {expected}"),
        )),
    }
}

fn apply_mutation(document: &mut Document, mutation: &FieldMutation) -> DriverResult<()> {
    match &mutation.op {
        MutationOp::Set(value) => {
            document.set(mutation.field.clone(), value.clone());
        }
        MutationOp::Remove => {
            document.remove(&mutation.field);
        }
        MutationOp::Increment(by) => {
            let current = document.get(&mutation.field).cloned().unwrap_or(Value::Null);
            let next = increment(&current, by).ok_or_else(|| {
                DriverError::new(
                    codes::INVALID_ARGUMENT,
                    format!(
                        "cannot increment {} ({}) by {}",
                        mutation.field,
                        current.type_name(),
                        by.type_name()
                    ),
                )
            })?;
            document.set(mutation.field.clone(), next);
        }
    }
    Ok(())
}

fn increment(current: &Value, by: &Value) -> Option<Value> {
    match (current, by) {
        (Value::Null, by) if by.is_number() => Some(by.clone()),
        (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int),
        (a, b) if a.is_number() && b.is_number() => Some(Value::Float(a.as_f64()? + b.as_f64()?)),
        _ => None,
    }
}

fn sort_documents(documents: &mut [Document], field: &str, direction: SortDirection) {
    documents.sort_by(|a, b| {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        match direction {
            SortDirection::Asc => left.cmp(right),
            SortDirection::Desc => right.cmp(left),
        }
    });
}

#[async_trait]
impl DocumentDriver for InMemoryDriver {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        mut document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        self.begin(DriverOp::Put).await?;
        let key = key_of(collection, &document)?;
        document.remove(collection.revision_field());

        let mut store = self.store.write().await;
        let documents = store.entry(collection.name().to_string()).or_default();
        check_condition(collection, &key, documents.get(&key), &condition)?;

        let revision = new_revision();
        tracing::debug!(collection = collection.name(), key = %key, revision = %revision, "stored document");
        documents.insert(
            key,
            StoredDocument {
                document,
                revision: revision.clone(),
            },
        );
        Ok(RevisionToken::new(revision))
    }

    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document> {
        self.begin(DriverOp::Get).await?;
        let store = self.store.read().await;
        let stored = store
            .get(collection.name())
            .and_then(|documents| documents.get(key))
            .ok_or_else(|| not_found(collection, key))?;

        let document = Self::materialize(collection, stored);
        if projection.is_empty() {
            return Ok(document);
        }

        let mut fields = projection.to_vec();
        fields.push(collection.partition_key().to_string());
        fields.extend(collection.sort_key().map(str::to_string));
        fields.push(collection.revision_field().to_string());
        Ok(document.project(&fields))
    }

    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()> {
        self.begin(DriverOp::Delete).await?;
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection.name()) else {
            return check_condition(collection, key, None, &condition);
        };

        check_condition(collection, key, documents.get(key), &condition)?;
        documents.remove(key);
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        self.begin(DriverOp::Update).await?;
        let mut store = self.store.write().await;
        let existing = store
            .get_mut(collection.name())
            .and_then(|documents| documents.get_mut(key));
        check_condition(collection, key, existing.as_deref(), &condition)?;
        let stored = existing.ok_or_else(|| not_found(collection, key))?;

        // Mutations apply to a copy so a failing one leaves the document untouched.
        let mut document = stored.document.clone();
        for mutation in mutations {
            if collection.is_key_field(&mutation.field) || mutation.field == collection.revision_field() {
                return Err(DriverError::new(
                    codes::INVALID_ARGUMENT,
                    format!("cannot mutate reserved field {}", mutation.field),
                ));
            }
            apply_mutation(&mut document, mutation)?;
        }

        let revision = new_revision();
        stored.document = document;
        stored.revision = revision.clone();
        Ok(RevisionToken::new(revision))
    }

    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage> {
        self.begin(DriverOp::Query).await?;
        let collection = query.collection();
        let start = page_token
            .map(PageToken::to_offset)
            .transpose()
            .map_err(|e| DriverError::new(codes::INVALID_ARGUMENT, e.to_string()))?
            .unwrap_or(0);

        let candidates = {
            let store = self.store.read().await;
            store
                .get(collection.name())
                .map(|documents| {
                    documents
                        .values()
                        .map(|stored| Self::materialize(collection, stored))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        let mut matched = DocumentEvaluator::filter_documents(candidates, query)
            .map_err(|e| DriverError::new(codes::INVALID_ARGUMENT, e.to_string()))?;
        if let Some(sort) = query.sort() {
            sort_documents(&mut matched, &sort.field, sort.direction);
        }

        let results = matched
            .into_iter()
            .skip(query.offset().unwrap_or(0))
            .take(query.limit().unwrap_or(usize::MAX))
            .collect::<Vec<_>>();

        let page_size = query.page_size().unwrap_or(self.options.page_size).max(1);
        let end = start.saturating_add(page_size).min(results.len());
        let next_token = (end < results.len()).then(|| PageToken::from_offset(end));
        let documents = results
            .into_iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect::<Vec<_>>();

        tracing::debug!(
            collection = collection.name(),
            start,
            returned = documents.len(),
            has_more = next_token.is_some(),
            "served query page"
        );

        Ok(QueryPage::builder(documents)
            .with_next_token(next_token)
            .build())
    }

    fn classify(&self, error: &DriverError) -> ErrorKind {
        self.codes.classify_error(error)
    }

    fn query_plan(&self, query: &QueryDescriptor) -> String {
        let collection = query.collection();
        match query.partition_equality() {
            Some(value) => format!(
                "memory: partition lookup on {}.{} = {value:?}",
                collection.name(),
                collection.partition_key()
            ),
            None => format!("memory: full scan of {}", collection.name()),
        }
    }
}

/// Builder for [`InMemoryDriver`].
///
/// # Example
///
/// ```ignore
/// let driver = InMemoryDriver::builder().with_page_size(2).build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDriverBuilder {
    options: InMemoryOptions,
}

impl InMemoryDriverBuilder {
    pub fn with_options(mut self, options: InMemoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.options.page_size = page_size;
        self
    }
}

#[async_trait]
impl DocumentDriverBuilder for InMemoryDriverBuilder {
    type Driver = InMemoryDriver;

    async fn build(self) -> DocStoreResult<Self::Driver> {
        Ok(InMemoryDriver::with_options(self.options))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docbridge_core::query::{Filter, Query, compile};

    use super::*;

    fn books() -> Arc<CollectionDescriptor> {
        Arc::new(
            CollectionDescriptor::builder("books", "title")
                .sort_key("price")
                .allow_scans(true)
                .build()
                .unwrap(),
        )
    }

    fn book(title: &str, price: i64) -> Document {
        Document::new().with("title", title).with("price", price)
    }

    fn key(title: &str, price: i64) -> DocumentKey {
        DocumentKey::new(title).with_sort(price)
    }

    #[tokio::test]
    async fn put_then_get_returns_revision() {
        let driver = InMemoryDriver::new();
        let books = books();

        let revision = driver
            .put_document(&books, book("YellowBook", 1), WriteCondition::Unconditional)
            .await
            .unwrap();

        let fetched = driver
            .get_document(&books, &key("YellowBook", 1), &[])
            .await
            .unwrap();
        assert_eq!(fetched.revision(&books), Some(revision));
        assert_eq!(driver.calls(DriverOp::Put), 1);
        assert_eq!(driver.calls(DriverOp::Get), 1);
        assert_eq!(driver.total_calls(), 2);
    }

    #[tokio::test]
    async fn write_conditions_are_enforced() {
        let driver = InMemoryDriver::new();
        let books = books();

        let err = driver
            .put_document(&books, book("A", 1), WriteCondition::MustExist)
            .await
            .unwrap_err();
        assert_eq!(driver.classify(&err), ErrorKind::NotFound);

        let first = driver
            .put_document(&books, book("A", 1), WriteCondition::MustNotExist)
            .await
            .unwrap();
        let err = driver
            .put_document(&books, book("A", 1), WriteCondition::MustNotExist)
            .await
            .unwrap_err();
        assert_eq!(driver.classify(&err), ErrorKind::AlreadyExists);

        let second = driver
            .put_document(&books, book("A", 1), WriteCondition::RevisionMatches(first.clone()))
            .await
            .unwrap();
        assert_ne!(first, second);

        let err = driver
            .delete_document(&books, &key("A", 1), WriteCondition::RevisionMatches(first))
            .await
            .unwrap_err();
        assert_eq!(driver.classify(&err), ErrorKind::PreconditionFailed);
        assert_eq!(driver.count("books").await, 1);
    }

    #[tokio::test]
    async fn unconditional_delete_of_missing_key_succeeds() {
        let driver = InMemoryDriver::new();
        driver
            .delete_document(&books(), &key("missing", 0), WriteCondition::Unconditional)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn integral_float_sort_keys_address_the_int_key() {
        let driver = InMemoryDriver::new();
        let books = books();

        driver
            .put_document(&books, book("A", 2), WriteCondition::Unconditional)
            .await
            .unwrap();
        let err = driver
            .put_document(
                &books,
                Document::new().with("title", "A").with("price", 2.0),
                WriteCondition::MustNotExist,
            )
            .await
            .unwrap_err();

        assert_eq!(driver.classify(&err), ErrorKind::AlreadyExists);
        assert_eq!(driver.count("books").await, 1);
    }

    #[tokio::test]
    async fn revision_checked_writes_to_missing_keys_fail_the_precondition() {
        let driver = InMemoryDriver::new();
        let books = books();
        let stale = || WriteCondition::RevisionMatches(RevisionToken::new("stale"));

        let err = driver
            .update_document(&books, &key("missing", 0), &[FieldMutation::set("stock", 1)], stale())
            .await
            .unwrap_err();
        assert_eq!(driver.classify(&err), ErrorKind::PreconditionFailed);

        let err = driver
            .update_document(&books, &key("missing", 0), &[FieldMutation::set("stock", 1)], WriteCondition::MustExist)
            .await
            .unwrap_err();
        assert_eq!(driver.classify(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn get_projects_fields_but_keeps_keys() {
        let driver = InMemoryDriver::new();
        let books = books();
        driver
            .put_document(
                &books,
                book("A", 1).with("author", "Ann").with("pages", 300),
                WriteCondition::Unconditional,
            )
            .await
            .unwrap();

        let fetched = driver
            .get_document(&books, &key("A", 1), &["author".to_string()])
            .await
            .unwrap();
        assert!(fetched.contains("title"));
        assert!(fetched.contains("price"));
        assert!(fetched.contains("author"));
        assert!(fetched.contains(books.revision_field()));
        assert!(!fetched.contains("pages"));
    }

    #[tokio::test]
    async fn updates_apply_all_or_nothing() {
        let driver = InMemoryDriver::new();
        let books = books();
        driver
            .put_document(&books, book("A", 1).with("stock", 2), WriteCondition::Unconditional)
            .await
            .unwrap();

        driver
            .update_document(
                &books,
                &key("A", 1),
                &[
                    FieldMutation::increment("stock", 3),
                    FieldMutation::increment("sold", 1.5),
                    FieldMutation::set("author", "Ann"),
                ],
                WriteCondition::MustExist,
            )
            .await
            .unwrap();

        let fetched = driver.get_document(&books, &key("A", 1), &[]).await.unwrap();
        assert_eq!(fetched.get("stock"), Some(&Value::Int(5)));
        assert_eq!(fetched.get("sold"), Some(&Value::Float(1.5)));
        assert_eq!(fetched.get("author"), Some(&Value::from("Ann")));

        let err = driver
            .update_document(
                &books,
                &key("A", 1),
                &[FieldMutation::remove("stock"), FieldMutation::increment("author", 1)],
                WriteCondition::MustExist,
            )
            .await
            .unwrap_err();
        assert_eq!(driver.classify(&err), ErrorKind::InvalidArgument);

        let fetched = driver.get_document(&books, &key("A", 1), &[]).await.unwrap();
        assert_eq!(fetched.get("stock"), Some(&Value::Int(5)));
    }

    #[tokio::test]
    async fn queries_page_through_sorted_results() {
        let driver = InMemoryDriver::builder().with_page_size(2).build().await.unwrap();
        let books = books();
        for (title, price) in [("A", 5), ("B", 3), ("C", 4), ("D", 1), ("E", 2)] {
            driver
                .put_document(&books, book(title, price), WriteCondition::Unconditional)
                .await
                .unwrap();
        }

        let query = compile(
            &books,
            Query::builder()
                .filter(Filter::gt("price", 1))
                .sort("price", SortDirection::Desc)
                .build(),
        )
        .unwrap();

        let mut token = None;
        let mut prices = Vec::new();
        let mut pages = 0;
        loop {
            let page = driver.run_query(&query, token.as_ref()).await.unwrap();
            pages += 1;
            prices.extend(page.documents.iter().filter_map(|d| d.get("price").and_then(Value::as_i64)));
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(prices, vec![5, 4, 3, 2]);
        assert_eq!(pages, 2);
        assert_eq!(driver.calls(DriverOp::Query), 2);
    }

    #[tokio::test]
    async fn injected_faults_fail_only_the_targeted_calls() {
        let driver = InMemoryDriver::new();
        let books = books();
        driver.fail_next(DriverOp::Put, 2, codes::UNAVAILABLE).await;

        for _ in 0..2 {
            let err = driver
                .put_document(&books, book("A", 1), WriteCondition::Unconditional)
                .await
                .unwrap_err();
            assert_eq!(driver.classify(&err), ErrorKind::Unavailable);
        }
        driver
            .put_document(&books, book("A", 1), WriteCondition::Unconditional)
            .await
            .unwrap();
        assert_eq!(driver.calls(DriverOp::Put), 3);
    }

    #[test]
    fn unknown_codes_classify_as_unknown() {
        let driver = InMemoryDriver::new();
        assert_eq!(driver.classify(&DriverError::new("Weird", "?")), ErrorKind::Unknown);
        assert_eq!(driver.classify(&DriverError::new(codes::THROTTLED, "slow down")), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn query_plan_names_the_access_path() {
        let driver = InMemoryDriver::new();
        let books = books();
        let scan = compile(&books, Query::new()).unwrap();
        let lookup = compile(&books, Query::builder().filter(Filter::eq("title", "A")).build()).unwrap();

        assert!(driver.query_plan(&scan).contains("full scan"));
        assert!(driver.query_plan(&lookup).contains("partition lookup"));
    }
}
