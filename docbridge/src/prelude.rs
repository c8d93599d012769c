//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```

pub use docbridge_core::{
    action::{Action, ActionBatch, ActionKind, FieldMutation, MutationOp},
    batch::{ActionOutput, BatchExecutor, BatchOptions, BatchResult, SlotResult},
    collection::{Collection, CollectionBatch, CollectionDescriptor, CollectionDescriptorBuilder},
    config::DriverConfig,
    document::{Document, DocumentKey, Fields, RevisionToken},
    driver::{BoxedDriver, DocumentDriver, DocumentDriverBuilder, WriteCondition},
    error::{DocStoreError, DocStoreResult, DriverError, DriverResult, ErrorCodeTable, ErrorKind},
    iterator::DocumentIterator,
    page::{PageToken, QueryPage},
    query::{Filter, FilterOp, Query, QueryBuilder, QueryDescriptor, QueryVisitor, Sort, SortDirection},
    registry::DriverRegistry,
    retry::{RecordingSleeper, RetryConfig, RetryEngine, RetryMode, Sleeper, TokioSleeper},
    store::{DocumentStore, DocumentStoreBuilder},
    value::Value,
};
