//! In-memory document driver for docbridge.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `DocumentDriver` contract. It is intended for tests, local development
//! and as the reference for how a driver maps native failures onto the
//! shared error taxonomy.
//!
//! # Features
//!
//! - **Conditional writes** - create, replace and revision-checked writes enforced under a single lock
//! - **Full query support** - filtering, sorting, offsets, limits and token pagination
//! - **Call accounting** - per-operation call counters
//! - **Fault injection** - queue native errors for upcoming calls
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::prelude::*;
//!
//! let mut registry = DriverRegistry::new();
//! docbridge_memory::register(&mut registry);
//!
//! let config = DriverConfig::new("memory").with_options(&InMemoryOptions { page_size: 25 })?;
//! let store = DocumentStore::from_config(&registry, &config).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub mod evaluator;
pub mod store;

use docbridge_core::{
    config::DriverConfig,
    driver::BoxedDriver,
    registry::DriverRegistry,
};

pub use store::{DriverOp, InMemoryDriver, InMemoryDriverBuilder, InMemoryOptions, PROVIDER_ID, codes};

/// Registers the in-memory driver under [`PROVIDER_ID`].
pub fn register(registry: &mut DriverRegistry) {
    registry.register(PROVIDER_ID, |config: DriverConfig| async move {
        let options: InMemoryOptions = config.provider_options()?;
        tracing::debug!(page_size = options.page_size, "creating in-memory driver");
        Ok(Box::new(InMemoryDriver::with_options(options)) as BoxedDriver)
    });
}

#[cfg(test)]
mod tests {
    use docbridge_core::driver::DocumentDriver;

    use super::*;

    #[tokio::test]
    async fn builds_from_registry_with_options() {
        let mut registry = DriverRegistry::new();
        register(&mut registry);

        let config = DriverConfig::new(PROVIDER_ID)
            .with_options(&InMemoryOptions { page_size: 7 })
            .unwrap();
        let driver = registry.build(&config).await.unwrap();

        assert_eq!(driver.provider_id(), "memory");
        let memory = driver
            .as_any()
            .downcast_ref::<InMemoryDriver>()
            .unwrap();
        assert_eq!(memory.options().page_size, 7);
    }
}
