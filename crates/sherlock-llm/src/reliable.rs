use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use sherlock_core::errors::CompletionError;
use sherlock_core::provider::{CompletionProvider, CompletionRequest};

/// Timeout and retry policy applied around every completion call.
#[derive(Clone, Debug)]
pub struct ReliableConfig {
    /// Upper bound on one attempt, including the response body.
    pub attempt_timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(60),
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.2,
        }
    }
}

/// Wraps a CompletionProvider with a per-attempt timeout and retries.
///
/// - Timeouts surface as `CompletionError::Timeout` and count as retryable
/// - Retries retryable errors with exponential backoff + jitter
/// - Respects `retry_after` hints from rate limit responses
/// - Fatal errors are returned immediately
pub struct ReliableProvider<P: CompletionProvider> {
    inner: P,
    config: ReliableConfig,
    total_retries: AtomicU64,
}

impl<P: CompletionProvider> ReliableProvider<P> {
    pub fn new(inner: P, config: ReliableConfig) -> Self {
        Self {
            inner,
            config,
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: P) -> Self {
        Self::new(inner, ReliableConfig::default())
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn retry_delay(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay.min(self.config.max_delay);
        }

        let exp_delay = self.config.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt as i32);
        let capped = exp_delay.min(self.config.max_delay.as_millis() as f64);

        let jitter_range = capped * self.config.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_ms = (capped + jitter).max(1.0);

        Duration::from_millis(final_ms as u64)
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let attempt = self.inner.complete(request);
        match tokio::time::timeout(self.config.attempt_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.config.attempt_timeout)),
        }
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<P: CompletionProvider> CompletionProvider for ReliableProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut attempt = 0;
        loop {
            let err = match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            if err.is_fatal() || !err.is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            let delay = self.retry_delay(attempt, err.suggested_delay());
            self.total_retries.fetch_add(1, Ordering::Relaxed);
            warn!(
                provider = self.inner.name(),
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying completion after error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
