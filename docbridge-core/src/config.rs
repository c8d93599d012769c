//! Driver configuration.
//!
//! A [`DriverConfig`] holds the settings every provider shares (region,
//! endpoint, default collection, retry policy, batch options, free-form
//! properties) next to an `options` blob that only the selected provider
//! interprets. Each driver deserializes that blob into its own typed struct
//! with [`DriverConfig::provider_options`].
//!
//! # Example
//!
//! ```ignore
//! let config = DriverConfig::from_json(r#"{
//!     "provider_id": "memory",
//!     "retry": { "mode": "exponential", "max_attempts": 5 },
//!     "batch": { "fail_fast": true },
//!     "options": { "page_size": 50 }
//! }"#)?;
//!
//! let options: InMemoryOptions = config.provider_options()?;
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    batch::BatchOptions,
    collection::CollectionDescriptor,
    error::{DocStoreError, DocStoreResult},
    retry::RetryConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Selects the driver factory in the registry.
    pub provider_id: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub collection: Option<CollectionDescriptor>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchOptions,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Provider-specific options, interpreted by the driver.
    #[serde(default)]
    pub options: JsonValue,
}

impl DriverConfig {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            region: None,
            endpoint: None,
            collection: None,
            retry: RetryConfig::default(),
            batch: BatchOptions::default(),
            properties: BTreeMap::new(),
            options: JsonValue::Null,
        }
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> DocStoreResult<Self> {
        let config: DriverConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_collection(mut self, collection: CollectionDescriptor) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch(mut self, batch: BatchOptions) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the provider-specific options from any serializable value.
    pub fn with_options<T: Serialize>(mut self, options: &T) -> DocStoreResult<Self> {
        self.options = serde_json::to_value(options)?;
        Ok(self)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Deserializes the provider-specific options. Absent options yield
    /// `T::default()`.
    pub fn provider_options<T: DeserializeOwned + Default>(&self) -> DocStoreResult<T> {
        if self.options.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.options.clone()).map_err(|e| {
            DocStoreError::Serialization(format!(
                "invalid options for provider {}: {e}",
                self.provider_id
            ))
        })
    }

    pub fn validate(&self) -> DocStoreResult<()> {
        if self.provider_id.is_empty() {
            return Err(DocStoreError::invalid_argument("provider_id must not be empty"));
        }
        self.retry.validate()?;
        if let Some(collection) = &self.collection {
            collection.validate()?;
        }
        Ok(())
    }
}
