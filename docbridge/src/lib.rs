//! docbridge: one document-store client API over many backends.
//!
//! This crate is the primary entry point. It re-exports the core types and
//! the bundled drivers, and builds a registry holding every driver compiled
//! into the binary.
//!
//! # Features
//!
//! - **Provider-agnostic documents** - key-addressed documents with optimistic revisions
//! - **Ordered batches** - per-action results; one failure never hides another
//! - **Lazy queries** - paginated results pulled on demand
//! - **Retries** - exponential or fixed backoff around every backend call
//! - **Uniform errors** - native failures mapped onto one taxonomy
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryDriver};
//!
//! #[tokio::main]
//! async fn main() -> DocStoreResult<()> {
//!     let books = CollectionDescriptor::builder("books", "title")
//!         .sort_key("price")
//!         .allow_scans(true)
//!         .build()?;
//!
//!     let store = DocumentStore::new(InMemoryDriver::new());
//!     let collection = store.collection(books);
//!
//!     let mut book = Document::new().with("title", "YellowBook").with("price", 2);
//!     collection.create(&mut book).await?;
//!
//!     let mut results = collection.query(
//!         Query::builder()
//!             .filter(Filter::eq("title", "YellowBook"))
//!             .sort("price", SortDirection::Asc)
//!             .build(),
//!     )?;
//!
//!     while results.has_next().await? {
//!         let mut found = Document::new().with("title", "").with("price", 0);
//!         results.next_into(&mut found).await?;
//!         println!("{found:?}");
//!     }
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Runtime Driver Selection
//!
//! Drivers can be chosen from configuration instead of at compile time. The
//! store then holds a [`driver::BoxedDriver`].
//!
//! ```ignore
//! use docbridge::prelude::*;
//!
//! let registry = docbridge::default_registry();
//! let config = DriverConfig::from_json(r#"{
//!     "provider_id": "memory",
//!     "retry": { "mode": "exponential", "max_attempts": 4 },
//!     "options": { "page_size": 50 }
//! }"#)?;
//!
//! let store = DocumentStore::from_config(&registry, &config).await?;
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - In-memory driver for development and testing
//! - `mongodb` - MongoDB driver (requires the `mongodb` feature)

pub mod prelude;

pub use docbridge_core::{
    action, batch, collection, config, document, driver, error, iterator, page, query, registry, retry, store,
    value,
};

// Re-export BSON types for convenience
pub use bson;

use docbridge_core::registry::DriverRegistry;

/// In-memory driver.
pub mod memory {
    pub use docbridge_memory::{DriverOp, InMemoryDriver, InMemoryDriverBuilder, InMemoryOptions, codes};
}

/// MongoDB driver.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoDbDriver, MongoDbDriverBuilder, MongoDbOptions, codes};
}

/// A registry holding every driver compiled into this build.
pub fn default_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    docbridge_memory::register(&mut registry);
    #[cfg(feature = "mongodb")]
    docbridge_mongodb::register(&mut registry);
    registry
}
