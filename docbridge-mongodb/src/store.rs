use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind as MongoErrorKind, WriteFailure},
    options::{ClientOptions, FindOneOptions, FindOptions},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docbridge_core::{
    action::{FieldMutation, MutationOp},
    collection::CollectionDescriptor,
    document::{Document, DocumentKey, RevisionToken},
    driver::{DocumentDriver, DocumentDriverBuilder, WriteCondition},
    error::{DocStoreError, DocStoreResult, DriverError, DriverResult, ErrorCodeTable, ErrorKind},
    page::{PageToken, QueryPage},
    query::{QueryDescriptor, QueryVisitor, SortDirection},
    value::Value,
};

use crate::{query::MongoFilterTranslator, sanitizer::FieldSanitizer};

pub const PROVIDER_ID: &str = "mongodb";

const ID_FIELD: &str = "_id";
const DEFAULT_DATABASE: &str = "docbridge";
const DEFAULT_PAGE_SIZE: usize = 100;

/// Error codes for failures MongoDB does not report with a numeric server
/// code.
pub mod codes {
    pub const DOCUMENT_NOT_FOUND: &str = "DocumentNotFound";
    pub const REVISION_MISMATCH: &str = "RevisionMismatch";
    pub const INVALID_ARGUMENT: &str = "InvalidArgument";
    pub const IO: &str = "Io";
    pub const SERVER_SELECTION: &str = "ServerSelection";
    pub const CONNECTION_POOL_CLEARED: &str = "ConnectionPoolCleared";
    pub const AUTHENTICATION: &str = "Authentication";
    pub const DECODE: &str = "Decode";
    pub const UNKNOWN: &str = "Unknown";
}

/// Options read from the `options` block of a driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDbOptions {
    /// Connection string. Falls back to the configuration's endpoint.
    pub uri: Option<String>,
    pub database: String,
    /// Page size used when a query does not set one.
    pub page_size: usize,
}

impl Default for MongoDbOptions {
    fn default() -> Self {
        Self {
            uri: None,
            database: DEFAULT_DATABASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// MongoDB document driver.
///
/// Each docbridge collection maps to a MongoDB collection of the same name.
/// The document key becomes `_id`: the partition value alone, or a
/// `{ p, s }` sub-document when the collection has a sort key. Revisions
/// are UUID strings stored in the collection's revision field, and
/// conditional writes are expressed as filters on `_id` and that field.
#[derive(Debug, Clone)]
pub struct MongoDbDriver {
    client: Client,
    database: String,
    page_size: usize,
    codes: Arc<ErrorCodeTable>,
}

impl MongoDbDriver {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            page_size: DEFAULT_PAGE_SIZE,
            codes: Arc::new(error_codes()),
        }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbDriverBuilder {
        MongoDbDriverBuilder::new(uri, database)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn collection(&self, collection: &CollectionDescriptor) -> MongoCollection<BsonDocument> {
        self.client
            .database(&self.database)
            .collection(&FieldSanitizer::escape(collection.name()))
    }
}

fn error_codes() -> ErrorCodeTable {
    ErrorCodeTable::builder()
        // DuplicateKey, DuplicateKeyValue
        .map_all(["11000", "11001"], ErrorKind::AlreadyExists)
        .map(codes::DOCUMENT_NOT_FOUND, ErrorKind::NotFound)
        .map(codes::REVISION_MISMATCH, ErrorKind::PreconditionFailed)
        // BadValue, FailedToParse, TypeMismatch, InvalidLength
        .map_all(["2", "9", "14", "16", codes::INVALID_ARGUMENT], ErrorKind::InvalidArgument)
        // Unauthorized, AuthenticationFailed
        .map_all(["13", "18", codes::AUTHENTICATION], ErrorKind::Unauthorized)
        // MaxTimeMSExpired, ExceededTimeLimit, NetworkTimeout
        .map_all(["50", "262", "89"], ErrorKind::DeadlineExceeded)
        // RequestRateTooLarge, ExceededMemoryLimit
        .map_all(["16500", "146"], ErrorKind::ResourceExhausted)
        // HostUnreachable, HostNotFound, ShutdownInProgress, PrimarySteppedDown,
        // NotWritablePrimary, InterruptedAtShutdown, InterruptedDueToReplStateChange
        .map_all(
            [
                "6",
                "7",
                "91",
                "189",
                "10107",
                "11600",
                "11602",
                codes::IO,
                codes::SERVER_SELECTION,
                codes::CONNECTION_POOL_CLEARED,
            ],
            ErrorKind::Unavailable,
        )
        .build()
}

/// Extracts the native code from a MongoDB error. Server errors carry a
/// numeric code; client-side failures are named after their kind.
fn native_code(error: &MongoError) -> String {
    match error.kind.as_ref() {
        MongoErrorKind::Command(command) => command.code.to_string(),
        MongoErrorKind::Write(WriteFailure::WriteError(write)) => write.code.to_string(),
        MongoErrorKind::Write(WriteFailure::WriteConcernError(concern)) => concern.code.to_string(),
        MongoErrorKind::Io(_) => codes::IO.to_string(),
        MongoErrorKind::ServerSelection { .. } => codes::SERVER_SELECTION.to_string(),
        MongoErrorKind::ConnectionPoolCleared { .. } => codes::CONNECTION_POOL_CLEARED.to_string(),
        MongoErrorKind::Authentication { .. } => codes::AUTHENTICATION.to_string(),
        MongoErrorKind::InvalidArgument { .. } => codes::INVALID_ARGUMENT.to_string(),
        _ => codes::UNKNOWN.to_string(),
    }
}

fn native_error(error: MongoError) -> DriverError {
    DriverError::new(native_code(&error), error.to_string()).with_source(error)
}

fn invalid_argument(error: DocStoreError) -> DriverError {
    DriverError::new(codes::INVALID_ARGUMENT, error.to_string())
}

fn new_revision() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn document_id(key: &DocumentKey) -> Bson {
    match key.sort() {
        Some(sort) => Bson::Document(doc! {
            "p": Bson::from(key.partition()),
            "s": Bson::from(sort),
        }),
        None => Bson::from(key.partition()),
    }
}

/// Filter selecting the document at `key`, narrowed to its expected
/// revision for revision-checked writes.
pub(crate) fn condition_filter(
    collection: &CollectionDescriptor,
    key: &DocumentKey,
    condition: &WriteCondition,
) -> BsonDocument {
    let mut filter = doc! { ID_FIELD: document_id(key) };
    if let WriteCondition::RevisionMatches(revision) = condition {
        filter.insert(
            FieldSanitizer::escape(collection.revision_field()),
            Bson::from(revision.as_value()),
        );
    }
    filter
}

fn condition_failed(key: &DocumentKey, condition: &WriteCondition) -> DriverError {
    match condition {
        WriteCondition::RevisionMatches(revision) => DriverError::new(
            codes::REVISION_MISMATCH,
            format!("document {key} is not at revision {revision}"),
        ),
        _ => DriverError::new(codes::DOCUMENT_NOT_FOUND, format!("no document {key}")),
    }
}

/// Encodes a document for storage, stamping `revision` and `_id`.
pub(crate) fn encode_document(
    collection: &CollectionDescriptor,
    key: &DocumentKey,
    mut document: Document,
    revision: &str,
) -> BsonDocument {
    document.set(collection.revision_field(), revision);

    let mut encoded = BsonDocument::new();
    encoded.insert(ID_FIELD, document_id(key));
    for (field, value) in document {
        encoded.insert(
            FieldSanitizer::escape(&field),
            FieldSanitizer::escape_keys(Bson::from(&value)),
        );
    }
    encoded
}

pub(crate) fn decode_document(stored: BsonDocument) -> DriverResult<Document> {
    stored
        .into_iter()
        .filter(|(field, _)| field != ID_FIELD)
        .map(|(field, value)| {
            Value::try_from(FieldSanitizer::restore_keys(value))
                .map(|value| (FieldSanitizer::restore(&field), value))
                .map_err(|e| DriverError::new(codes::DECODE, e.to_string()))
        })
        .collect()
}

pub(crate) fn projection_document(collection: &CollectionDescriptor, projection: &[String]) -> BsonDocument {
    let mut fields = BsonDocument::new();
    let always = [Some(collection.partition_key()), collection.sort_key(), Some(collection.revision_field())];
    for field in projection.iter().map(String::as_str).chain(always.into_iter().flatten()) {
        fields.insert(FieldSanitizer::escape(field), 1);
    }
    fields
}

/// Translates mutations into a MongoDB update document that also replaces
/// the revision.
pub(crate) fn update_document(
    collection: &CollectionDescriptor,
    mutations: &[FieldMutation],
    revision: &str,
) -> DriverResult<BsonDocument> {
    let mut set = BsonDocument::new();
    let mut inc = BsonDocument::new();
    let mut unset = BsonDocument::new();

    for mutation in mutations {
        if collection.is_key_field(&mutation.field) || mutation.field == collection.revision_field() {
            return Err(DriverError::new(
                codes::INVALID_ARGUMENT,
                format!("cannot mutate reserved field {}", mutation.field),
            ));
        }

        let field = FieldSanitizer::escape(&mutation.field);
        match &mutation.op {
            MutationOp::Set(value) => {
                set.insert(field, FieldSanitizer::escape_keys(Bson::from(value)));
            }
            MutationOp::Increment(by) if by.is_number() => {
                inc.insert(field, Bson::from(by));
            }
            MutationOp::Increment(by) => {
                return Err(DriverError::new(
                    codes::INVALID_ARGUMENT,
                    format!("cannot increment {} by a {}", mutation.field, by.type_name()),
                ));
            }
            MutationOp::Remove => {
                unset.insert(field, "");
            }
        }
    }

    set.insert(FieldSanitizer::escape(collection.revision_field()), revision);
    let mut update = doc! { "$set": set };
    if !inc.is_empty() {
        update.insert("$inc", inc);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    Ok(update)
}

/// The slice of results one page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    /// Documents to skip on the server.
    pub skip: usize,
    /// Documents this page returns at most.
    pub take: usize,
    /// Whether one extra document is fetched to detect a following page.
    pub probe: bool,
}

pub(crate) fn page_window(query: &QueryDescriptor, start: usize, default_page_size: usize) -> PageWindow {
    let page_size = query.page_size().unwrap_or(default_page_size).max(1);
    let remaining = query.limit().map(|limit| limit.saturating_sub(start));
    let take = remaining.map_or(page_size, |remaining| remaining.min(page_size));

    PageWindow {
        skip: query.offset().unwrap_or(0).saturating_add(start),
        take,
        probe: remaining.is_none_or(|remaining| remaining > take),
    }
}

fn sort_document(query: &QueryDescriptor) -> BsonDocument {
    match query.sort() {
        Some(sort) => {
            let field = FieldSanitizer::escape(&sort.field);
            let direction = match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            doc! { field: direction, ID_FIELD: 1 }
        }
        None => doc! { ID_FIELD: 1 },
    }
}

#[async_trait]
impl DocumentDriver for MongoDbDriver {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn put_document(
        &self,
        collection: &CollectionDescriptor,
        document: Document,
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        let key = collection.key_of(&document).map_err(invalid_argument)?;
        let revision = new_revision();
        let encoded = encode_document(collection, &key, document, &revision);
        let target = self.collection(collection);

        match &condition {
            WriteCondition::MustNotExist => {
                target.insert_one(encoded).await.map_err(native_error)?;
            }
            WriteCondition::Unconditional => {
                target
                    .replace_one(condition_filter(collection, &key, &condition), encoded)
                    .upsert(true)
                    .await
                    .map_err(native_error)?;
            }
            WriteCondition::MustExist | WriteCondition::RevisionMatches(_) => {
                let result = target
                    .replace_one(condition_filter(collection, &key, &condition), encoded)
                    .await
                    .map_err(native_error)?;
                if result.matched_count == 0 {
                    return Err(condition_failed(&key, &condition));
                }
            }
        }

        tracing::debug!(collection = collection.name(), key = %key, revision = %revision, "wrote document");
        Ok(RevisionToken::new(revision))
    }

    async fn get_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        projection: &[String],
    ) -> DriverResult<Document> {
        let mut options = FindOneOptions::default();
        if !projection.is_empty() {
            options.projection = Some(projection_document(collection, projection));
        }

        let found = self
            .collection(collection)
            .find_one(doc! { ID_FIELD: document_id(key) })
            .with_options(options)
            .await
            .map_err(native_error)?
            .ok_or_else(|| {
                DriverError::new(
                    codes::DOCUMENT_NOT_FOUND,
                    format!("no document {key} in {}", collection.name()),
                )
            })?;

        decode_document(found)
    }

    async fn delete_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        condition: WriteCondition,
    ) -> DriverResult<()> {
        let result = self
            .collection(collection)
            .delete_one(condition_filter(collection, key, &condition))
            .await
            .map_err(native_error)?;

        let satisfied = match condition {
            WriteCondition::Unconditional | WriteCondition::MustNotExist => true,
            WriteCondition::MustExist | WriteCondition::RevisionMatches(_) => result.deleted_count > 0,
        };
        if !satisfied {
            return Err(condition_failed(key, &condition));
        }
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &CollectionDescriptor,
        key: &DocumentKey,
        mutations: &[FieldMutation],
        condition: WriteCondition,
    ) -> DriverResult<RevisionToken> {
        let revision = new_revision();
        let update = update_document(collection, mutations, &revision)?;

        let result = self
            .collection(collection)
            .update_one(condition_filter(collection, key, &condition), update)
            .await
            .map_err(native_error)?;
        if result.matched_count == 0 {
            return Err(condition_failed(key, &condition));
        }

        Ok(RevisionToken::new(revision))
    }

    async fn run_query(
        &self,
        query: &QueryDescriptor,
        page_token: Option<&PageToken>,
    ) -> DriverResult<QueryPage> {
        let start = page_token
            .map(PageToken::to_offset)
            .transpose()
            .map_err(invalid_argument)?
            .unwrap_or(0);
        let window = page_window(query, start, self.page_size);
        if window.take == 0 {
            return Ok(QueryPage::empty());
        }

        let filter = MongoFilterTranslator.visit_query(query).map_err(invalid_argument)?;
        let mut options = FindOptions::default();
        options.sort = Some(sort_document(query));
        options.skip = Some(window.skip as u64);
        options.limit = Some((window.take + usize::from(window.probe)) as i64);

        let mut documents = self
            .collection(query.collection())
            .find(filter)
            .with_options(options)
            .await
            .map_err(native_error)?
            .try_collect::<Vec<BsonDocument>>()
            .await
            .map_err(native_error)?
            .into_iter()
            .map(decode_document)
            .collect::<DriverResult<Vec<_>>>()?;

        let next_token = (documents.len() > window.take).then(|| PageToken::from_offset(start + window.take));
        documents.truncate(window.take);

        tracing::debug!(
            collection = query.collection().name(),
            skip = window.skip,
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
        match MongoFilterTranslator.visit_query(query) {
            Ok(filter) => format!(
                "mongodb: find on {}.{} filter={filter} sort={}",
                self.database,
                query.collection().name(),
                sort_document(query)
            ),
            Err(e) => format!("mongodb: untranslatable query ({e})"),
        }
    }

    async fn shutdown(self) -> DocStoreResult<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

/// Builder for [`MongoDbDriver`].
///
/// # Example
///
/// ```ignore
/// let driver = MongoDbDriver::builder("mongodb://localhost:27017", "library")
///     .with_page_size(50)
///     .build()
///     .await?;
/// ```
#[derive(Debug)]
pub struct MongoDbDriverBuilder {
    uri: String,
    database: String,
    page_size: usize,
}

impl MongoDbDriverBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_options(uri: &str, options: &MongoDbOptions) -> Self {
        Self::new(uri, &options.database).with_page_size(options.page_size)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

#[async_trait]
impl DocumentDriverBuilder for MongoDbDriverBuilder {
    type Driver = MongoDbDriver;

    async fn build(self) -> DocStoreResult<Self::Driver> {
        let options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| DocStoreError::Initialization(e.to_string()))?;
        let client = Client::with_options(options).map_err(|e| DocStoreError::Initialization(e.to_string()))?;

        tracing::info!(database = %self.database, "connected mongodb client");
        Ok(MongoDbDriver::new(client, self.database).with_page_size(self.page_size))
    }
}
