//! Retry policy and the engine that applies it.
//!
//! Every driver call the core makes goes through a [`RetryEngine`]. The
//! engine re-runs an operation while its failures are classified as
//! retryable, sleeping between attempts according to a [`RetryConfig`], and
//! gives up when the attempt budget or the optional total timeout runs out.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::retry::{RetryConfig, RetryEngine, RetryMode};
//!
//! let config = RetryConfig::builder()
//!     .with_mode(RetryMode::Exponential)
//!     .with_max_attempts(5)
//!     .with_initial_delay_millis(100)
//!     .with_multiplier(2.0)
//!     .with_max_delay_millis(5000)
//!     .build()?;
//!
//! let engine = RetryEngine::new(config);
//! let revision = engine.run(|| driver_call()).await?;
//! ```

use std::{
    fmt,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::{DocStoreError, DocStoreResult};

/// Backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// `min(max_delay, initial_delay * multiplier^(attempt - 1))`.
    #[default]
    Exponential,
    /// `fixed_delay` after every failed attempt.
    Fixed,
}

/// Retry policy for a single logical operation (one action or one page
/// fetch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub mode: RetryMode,
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay_millis: u64,
    pub multiplier: f64,
    pub max_delay_millis: u64,
    pub fixed_delay_millis: u64,
    /// Wall-clock bound across all attempts of one operation.
    pub total_timeout_millis: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            mode: RetryMode::Exponential,
            max_attempts: 3,
            initial_delay_millis: 100,
            multiplier: 2.0,
            max_delay_millis: 5000,
            fixed_delay_millis: 100,
            total_timeout_millis: None,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> DocStoreResult<()> {
        if self.max_attempts < 1 {
            return Err(DocStoreError::invalid_argument("max_attempts must be at least 1"));
        }
        if self.mode == RetryMode::Exponential {
            if !(self.multiplier >= 1.0) {
                return Err(DocStoreError::invalid_argument(format!(
                    "multiplier must be at least 1.0, got {}",
                    self.multiplier
                )));
            }
            if self.max_delay_millis < self.initial_delay_millis {
                return Err(DocStoreError::invalid_argument(format!(
                    "max_delay_millis ({}) must not be below initial_delay_millis ({})",
                    self.max_delay_millis, self.initial_delay_millis
                )));
            }
        }
        Ok(())
    }

    /// The delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.mode {
            RetryMode::Fixed => Duration::from_millis(self.fixed_delay_millis),
            RetryMode::Exponential => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let raw = self.initial_delay_millis as f64 * self.multiplier.powi(exponent);
                let millis = raw.min(self.max_delay_millis as f64);
                Duration::from_micros((millis * 1000.0).round() as u64)
            }
        }
    }

    pub fn total_timeout(&self) -> Option<Duration> {
        self.total_timeout_millis.map(Duration::from_millis)
    }
}

/// Builder for [`RetryConfig`]; [`build`](RetryConfigBuilder::build)
/// validates the result.
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay_millis(mut self, millis: u64) -> Self {
        self.config.initial_delay_millis = millis;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    pub fn with_max_delay_millis(mut self, millis: u64) -> Self {
        self.config.max_delay_millis = millis;
        self
    }

    pub fn with_fixed_delay_millis(mut self, millis: u64) -> Self {
        self.config.fixed_delay_millis = millis;
        self
    }

    pub fn with_total_timeout_millis(mut self, millis: u64) -> Self {
        self.config.total_timeout_millis = Some(millis);
        self
    }

    pub fn build(self) -> DocStoreResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Whether a failed attempt should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

impl RetryDecision {
    /// Retries exactly the errors whose kind is retryable.
    pub fn from_error(error: &DocStoreError) -> Self {
        if error.is_retryable() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays without waiting. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delay);
    }
}

/// Applies a [`RetryConfig`] around fallible async operations.
#[derive(Debug, Clone)]
pub struct RetryEngine {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation`, retrying failures whose kind is retryable.
    pub async fn run<T, F, Fut>(&self, operation: F) -> DocStoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DocStoreResult<T>>,
    {
        self.execute(operation, RetryDecision::from_error)
            .await
    }

    /// Runs `operation` until it succeeds, `classify` says
    /// [`RetryDecision::Stop`], or the budget runs out.
    ///
    /// Errors classified as `Stop` are returned unchanged. When the attempt
    /// budget or the total timeout is exhausted, the last failure is wrapped
    /// in [`DocStoreError::RetriesExhausted`]. The total timeout is checked
    /// before each sleep: if the elapsed time plus the next delay would
    /// exceed it, no further attempt is made.
    pub async fn execute<T, F, Fut, C>(&self, mut operation: F, classify: C) -> DocStoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DocStoreResult<T>>,
        C: Fn(&DocStoreError) -> RetryDecision,
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if classify(&error) == RetryDecision::Stop {
                return Err(error);
            }

            if attempt >= self.config.max_attempts {
                tracing::info!(attempts = attempt, error = %error, "retries exhausted");
                return Err(DocStoreError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(error),
                });
            }

            let delay = self.config.delay_for(attempt);
            if let Some(total) = self.config.total_timeout() {
                if started.elapsed() + delay > total {
                    tracing::info!(
                        attempts = attempt,
                        timeout_ms = total.as_millis() as u64,
                        error = %error,
                        "retry timeout exhausted"
                    );
                    return Err(DocStoreError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }

            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                kind = %error.kind(),
                error = %error,
                "retrying after failure"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
