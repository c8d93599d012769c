//! MongoDB driver for docbridge.
//!
//! This crate provides a MongoDB implementation of the `DocumentDriver`
//! contract on top of the official async driver.
//!
//! To use this driver through the façade crate, enable its `mongodb`
//! feature:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Conditional writes** - create, replace and revision checks expressed as server-side filters
//! - **Native querying** - filters, sorting and offset pagination run on the server
//! - **Error mapping** - server error codes classified through an explicit table
//!
//! # Configuration
//!
//! The connection string comes from `options.uri`, falling back to the
//! configuration's `endpoint`.
//!
//! ```ignore
//! let config = DriverConfig::from_json(r#"{
//!     "provider_id": "mongodb",
//!     "endpoint": "mongodb://localhost:27017",
//!     "options": { "database": "library", "page_size": 50 }
//! }"#)?;
//!
//! let store = DocumentStore::from_config(&registry, &config).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

pub mod query;
pub mod sanitizer;
pub mod store;

use docbridge_core::{
    config::DriverConfig,
    driver::{BoxedDriver, DocumentDriverBuilder},
    error::DocStoreError,
    registry::DriverRegistry,
};

pub use store::{MongoDbDriver, MongoDbDriverBuilder, MongoDbOptions, PROVIDER_ID, codes};

/// Registers the MongoDB driver under [`PROVIDER_ID`].
pub fn register(registry: &mut DriverRegistry) {
    registry.register(PROVIDER_ID, |config: DriverConfig| async move {
        let options: MongoDbOptions = config.provider_options()?;
        let uri = options
            .uri
            .clone()
            .or_else(|| config.endpoint.clone())
            .ok_or_else(|| {
                DocStoreError::Initialization("mongodb driver needs options.uri or an endpoint".to_string())
            })?;

        let driver = MongoDbDriverBuilder::from_options(&uri, &options)
            .build()
            .await?;
        Ok(Box::new(driver) as BoxedDriver)
    });
}
