//! Explicit provider registry.
//!
//! Drivers are not discovered at runtime. Each driver crate exposes a
//! `register` function that adds its factory to a [`DriverRegistry`] under
//! its provider id, and applications build drivers from a
//! [`DriverConfig`] by looking that id up.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = DriverRegistry::new();
//! docbridge_memory::register(&mut registry);
//!
//! let driver = registry.build(&DriverConfig::new("memory")).await?;
//! ```

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;

use crate::{
    config::DriverConfig,
    driver::BoxedDriver,
    error::{DocStoreError, DocStoreResult},
};

/// Builds a driver from its configuration.
pub type DriverFactory =
    Arc<dyn Fn(DriverConfig) -> BoxFuture<'static, DocStoreResult<BoxedDriver>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `provider_id`, replacing any earlier
    /// registration. Returns `true` if one was replaced.
    pub fn register<F, Fut>(&mut self, provider_id: impl Into<String>, factory: F) -> bool
    where
        F: Fn(DriverConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DocStoreResult<BoxedDriver>> + Send + 'static,
    {
        let factory: DriverFactory = Arc::new(move |config| Box::pin(factory(config)));
        self.factories
            .insert(provider_id.into(), factory)
            .is_some()
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.factories.contains_key(provider_id)
    }

    /// Registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids = self
            .factories
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Validates `config` and builds the driver it names.
    ///
    /// # Errors
    ///
    /// [`DocStoreError::UnknownProvider`] if no factory is registered under
    /// `config.provider_id`, plus whatever validation or the factory reports.
    pub async fn build(&self, config: &DriverConfig) -> DocStoreResult<BoxedDriver> {
        config.validate()?;
        let factory = self
            .factories
            .get(&config.provider_id)
            .ok_or_else(|| DocStoreError::UnknownProvider(config.provider_id.clone()))?;

        let driver = factory(config.clone()).await?;
        tracing::info!(
            provider = %config.provider_id,
            region = ?config.region,
            "built document driver"
        );
        Ok(driver)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}
