//! Error taxonomy and result types for document store operations.
//!
//! Every failure a caller observes is a [`DocStoreError`], and every
//! [`DocStoreError`] reduces to exactly one [`ErrorKind`]. Drivers never leak
//! their native error types: they return a [`DriverError`] carrying the
//! backend's native error code, which the driver's own [`ErrorCodeTable`]
//! classifies. Use [`DocStoreResult<T>`] as the return type for fallible
//! operations.

use std::{collections::HashMap, error::Error as StdError, fmt};

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Abstract, backend-independent classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request was malformed or violated a collection invariant.
    InvalidArgument,
    /// The addressed document or collection does not exist.
    NotFound,
    /// A create targeted a key that is already present.
    AlreadyExists,
    /// A conditional write observed a different revision than expected.
    PreconditionFailed,
    /// The backend is throttling or a quota was exhausted.
    ResourceExhausted,
    /// The caller is not authenticated or not permitted.
    Unauthorized,
    /// The backend did not answer in time.
    DeadlineExceeded,
    /// The backend is temporarily unreachable.
    Unavailable,
    /// Anything the driver could not classify.
    Unknown,
}

impl ErrorKind {
    /// Returns `true` for transient, throttling and timeout kinds.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Unavailable | ErrorKind::ResourceExhausted | ErrorKind::DeadlineExceeded
        )
    }

    /// Returns the canonical upper-case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorKind::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure raised by a provider driver, expressed in the driver's own
/// native error vocabulary.
///
/// The `code` is whatever string the backend uses to identify the failure
/// (an HTTP status, a service error code, a numeric server code rendered as
/// text). It is only ever interpreted by the driver's [`ErrorCodeTable`].
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct DriverError {
    code: String,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl DriverError {
    /// Creates a driver error from a native code and a message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying native error.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The backend's native error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A specialized `Result` type for driver calls.
pub type DriverResult<T> = Result<T, DriverError>;

/// Explicit lookup table from native error codes to [`ErrorKind`].
///
/// Each driver owns one of these. Codes missing from the table classify as
/// [`ErrorKind::Unknown`].
///
/// # Example
///
/// ```ignore
/// let table = ErrorCodeTable::builder()
///     .map("ConditionalCheckFailedException", ErrorKind::PreconditionFailed)
///     .map("ProvisionedThroughputExceededException", ErrorKind::ResourceExhausted)
///     .build();
///
/// assert_eq!(table.classify("ConditionalCheckFailedException"), ErrorKind::PreconditionFailed);
/// assert_eq!(table.classify("SomethingElse"), ErrorKind::Unknown);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorCodeTable {
    entries: HashMap<String, ErrorKind>,
}

impl ErrorCodeTable {
    /// Creates a builder for a new table.
    pub fn builder() -> ErrorCodeTableBuilder {
        ErrorCodeTableBuilder::default()
    }

    /// Classifies a native code, falling back to [`ErrorKind::Unknown`].
    pub fn classify(&self, code: &str) -> ErrorKind {
        self.entries
            .get(code)
            .copied()
            .unwrap_or(ErrorKind::Unknown)
    }

    /// Classifies a [`DriverError`] by its native code.
    pub fn classify_error(&self, error: &DriverError) -> ErrorKind {
        self.classify(error.code())
    }

    /// Returns the number of mapped native codes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no native code is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`ErrorCodeTable`].
#[derive(Debug, Default)]
pub struct ErrorCodeTableBuilder {
    entries: HashMap<String, ErrorKind>,
}

impl ErrorCodeTableBuilder {
    /// Maps a native code to a kind. Later mappings for the same code win.
    pub fn map(mut self, code: impl Into<String>, kind: ErrorKind) -> Self {
        self.entries.insert(code.into(), kind);
        self
    }

    /// Maps several native codes to the same kind.
    pub fn map_all<I, S>(mut self, codes: I, kind: ErrorKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for code in codes {
            self.entries.insert(code.into(), kind);
        }
        self
    }

    pub fn build(self) -> ErrorCodeTable {
        ErrorCodeTable { entries: self.entries }
    }
}

/// Represents all errors a caller can observe from a document store.
#[derive(Error, Debug)]
pub enum DocStoreError {
    /// The request was rejected before any driver dispatch.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A stored value could not be decoded into the caller's template.
    #[error("Type mismatch for field {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A driver call failed and was classified by the driver.
    #[error("{kind} from provider {provider} ({code}): {message}")]
    Driver {
        kind: ErrorKind,
        provider: String,
        code: String,
        message: String,
        #[source]
        source: Option<DriverError>,
    },
    /// A retryable failure persisted until the retry budget ran out.
    #[error("Retries exhausted after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<DocStoreError>,
    },
    /// A single action of a batch failed.
    #[error("Action {index} failed: {source}")]
    Action {
        index: usize,
        #[source]
        source: Box<DocStoreError>,
    },
    /// A page fetch failed while iterating query results.
    #[error(
        "Query on collection {collection} failed after {pages_fetched} page(s) and {documents_read} document(s): {source}"
    )]
    Query {
        collection: String,
        pages_fetched: usize,
        documents_read: usize,
        #[source]
        source: Box<DocStoreError>,
    },
    /// `next` was called on an iterator with no remaining results.
    #[error("Result iterator is exhausted")]
    IteratorExhausted,
    /// No driver factory is registered under the requested provider id.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    /// Serialization or deserialization of configuration or values failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during driver construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

/// A specialized `Result` type for document store operations.
pub type DocStoreResult<T> = Result<T, DocStoreError>;

impl DocStoreError {
    /// Wraps a driver failure with the kind the driver assigned to it.
    pub fn from_driver(provider: &str, kind: ErrorKind, error: DriverError) -> Self {
        DocStoreError::Driver {
            kind,
            provider: provider.to_string(),
            code: error.code().to_string(),
            message: error.message().to_string(),
            source: Some(error),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DocStoreError::InvalidArgument(message.into())
    }

    /// The abstract kind of this error. Wrapping variants report the kind of
    /// the failure they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocStoreError::InvalidArgument(_)
            | DocStoreError::TypeMismatch { .. }
            | DocStoreError::IteratorExhausted
            | DocStoreError::UnknownProvider(_)
            | DocStoreError::Serialization(_) => ErrorKind::InvalidArgument,
            DocStoreError::Driver { kind, .. } => *kind,
            DocStoreError::RetriesExhausted { source, .. }
            | DocStoreError::Action { source, .. }
            | DocStoreError::Query { source, .. } => source.kind(),
            DocStoreError::Initialization(_) => ErrorKind::Unknown,
        }
    }

    /// Returns `true` if this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            DocStoreError::RetriesExhausted { .. } => false,
            other => other.kind().is_retryable(),
        }
    }

    /// Strips `Action` and `Query` annotations, returning the failure they wrap.
    pub fn into_root(self) -> DocStoreError {
        match self {
            DocStoreError::Action { source, .. } | DocStoreError::Query { source, .. } => {
                source.into_root()
            }
            other => other,
        }
    }
}

impl From<SerdeJsonError> for DocStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_codes_classify_as_unknown() {
        let table = ErrorCodeTable::builder()
            .map("Throttled", ErrorKind::ResourceExhausted)
            .map_all(["503", "ServiceUnavailable"], ErrorKind::Unavailable)
            .build();

        assert_eq!(table.classify("Throttled"), ErrorKind::ResourceExhausted);
        assert_eq!(table.classify("503"), ErrorKind::Unavailable);
        assert_eq!(table.classify("ServiceUnavailable"), ErrorKind::Unavailable);
        assert_eq!(table.classify("418"), ErrorKind::Unknown);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn wrapped_errors_report_the_inner_kind() {
        let driver = DocStoreError::from_driver(
            "memory",
            ErrorKind::PreconditionFailed,
            DriverError::new("RevisionMismatch", "stale revision"),
        );
        let wrapped = DocStoreError::Action {
            index: 3,
            source: Box::new(driver),
        };

        assert_eq!(wrapped.kind(), ErrorKind::PreconditionFailed);
        assert!(wrapped.to_string().contains("Action 3 failed"));
        assert!(matches!(wrapped.into_root(), DocStoreError::Driver { .. }));
    }

    #[test]
    fn exhausted_retries_are_not_retried_again() {
        let inner = DocStoreError::from_driver(
            "memory",
            ErrorKind::Unavailable,
            DriverError::new("Unavailable", "down"),
        );
        assert!(inner.is_retryable());

        let exhausted = DocStoreError::RetriesExhausted {
            attempts: 3,
            source: Box::new(inner),
        };
        assert_eq!(exhausted.kind(), ErrorKind::Unavailable);
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn validation_errors_are_invalid_argument() {
        assert_eq!(
            DocStoreError::invalid_argument("bad").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            DocStoreError::UnknownProvider("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
    }
}
