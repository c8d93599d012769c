//! The document store: a driver plus the retry policy and batch options
//! applied to every call made through it.
//!
//! - [`DocumentStore`] - store over a statically known driver
//! - `DocumentStore<BoxedDriver>` - store over a driver selected at runtime,
//!   built with [`DocumentStore::from_config`]
//!
//! # Example
//!
//! ```ignore
//! use docbridge::prelude::*;
//!
//! let store = DocumentStore::builder(InMemoryDriver::new())
//!     .with_retry(RetryConfig::default())
//!     .with_batch_options(BatchOptions::default().with_fail_fast(true))
//!     .build();
//!
//! let books = store.collection(books_descriptor);
//! ```

use std::sync::Arc;

use crate::{
    action::ActionBatch,
    batch::{BatchExecutor, BatchOptions, BatchResult},
    collection::{Collection, CollectionDescriptor},
    config::DriverConfig,
    driver::{BoxedDriver, DocumentDriver},
    error::DocStoreResult,
    iterator::DocumentIterator,
    query::{Query, compile},
    registry::DriverRegistry,
    retry::{RetryConfig, RetryEngine, Sleeper},
};

#[derive(Debug)]
pub struct DocumentStore<D: DocumentDriver> {
    driver: D,
    retry: RetryEngine,
    batch_options: BatchOptions,
}

impl<D: DocumentDriver> DocumentStore<D> {
    /// Creates a store with the default retry policy and batch options.
    pub fn new(driver: D) -> Self {
        Self::builder(driver).build()
    }

    pub fn builder(driver: D) -> DocumentStoreBuilder<D> {
        DocumentStoreBuilder::new(driver)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn provider_id(&self) -> &str {
        self.driver.provider_id()
    }

    pub fn retry_engine(&self) -> &RetryEngine {
        &self.retry
    }

    pub fn batch_options(&self) -> BatchOptions {
        self.batch_options
    }

    /// Binds a collection descriptor to this store.
    pub fn collection(&self, descriptor: impl Into<Arc<CollectionDescriptor>>) -> Collection<'_, D> {
        Collection::new(descriptor.into(), self)
    }

    /// An executor using this store's batch options.
    pub fn executor(&self) -> BatchExecutor<'_, D> {
        BatchExecutor::new(&self.driver, &self.retry, self.batch_options)
    }

    /// Runs a batch with this store's batch options.
    pub async fn run(&self, batch: ActionBatch) -> DocStoreResult<BatchResult> {
        self.executor().run(batch).await
    }

    /// Runs a batch with explicit options.
    pub async fn run_with(
        &self,
        batch: ActionBatch,
        options: BatchOptions,
    ) -> DocStoreResult<BatchResult> {
        BatchExecutor::new(&self.driver, &self.retry, options)
            .run(batch)
            .await
    }

    /// Compiles `query` and returns a lazy iterator over its results. No
    /// driver call happens until the iterator is advanced.
    pub fn query(
        &self,
        collection: &Arc<CollectionDescriptor>,
        query: Query,
    ) -> DocStoreResult<DocumentIterator<'_, D>> {
        let descriptor = compile(collection, query)?;
        Ok(DocumentIterator::new(&self.driver, &self.retry, descriptor))
    }

    /// Describes how the driver would execute `query`.
    pub fn query_plan(
        &self,
        collection: &Arc<CollectionDescriptor>,
        query: Query,
    ) -> DocStoreResult<String> {
        let descriptor = compile(collection, query)?;
        Ok(self.driver.query_plan(&descriptor))
    }

    /// Shuts the driver down, releasing its resources.
    pub async fn shutdown(self) -> DocStoreResult<()> {
        self.driver.shutdown().await
    }
}

impl DocumentStore<BoxedDriver> {
    /// Builds the driver named by `config` from `registry` and wraps it in a
    /// store using the configured retry policy and batch options.
    pub async fn from_config(
        registry: &DriverRegistry,
        config: &DriverConfig,
    ) -> DocStoreResult<Self> {
        let driver = registry.build(config).await?;
        Ok(DocumentStore::builder(driver)
            .with_retry(config.retry.clone())
            .with_batch_options(config.batch)
            .build())
    }
}

/// Builder for [`DocumentStore`].
#[derive(Debug)]
pub struct DocumentStoreBuilder<D: DocumentDriver> {
    driver: D,
    retry: RetryConfig,
    sleeper: Option<Arc<dyn Sleeper>>,
    batch_options: BatchOptions,
}

impl<D: DocumentDriver> DocumentStoreBuilder<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            retry: RetryConfig::default(),
            sleeper: None,
            batch_options: BatchOptions::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the timer used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn with_batch_options(mut self, batch_options: BatchOptions) -> Self {
        self.batch_options = batch_options;
        self
    }

    pub fn build(self) -> DocumentStore<D> {
        let mut retry = RetryEngine::new(self.retry);
        if let Some(sleeper) = self.sleeper {
            retry = retry.with_sleeper(sleeper);
        }
        DocumentStore {
            driver: self.driver,
            retry,
            batch_options: self.batch_options,
        }
    }
}
