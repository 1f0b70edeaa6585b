//! Retry/backoff transport around the raw GraphQL client.
//!
//! Every remote call goes through [`Transport::execute`], which
//! detects the API's throttling signal, retries transport failures
//! with exponential backoff and jitter, and keeps the shared
//! [`RateLimitMonitor`] fed from the cost envelope of successful
//! responses. Configuration is threaded in at construction; there are
//! no process-wide mutable defaults.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::api::{CatalogApiError, GraphqlExecute, GraphqlResponse};
use crate::rate_limit::RateLimitMonitor;

/// Budget fraction below which a low-budget warning is emitted.
const LOW_BUDGET_FRACTION: f64 = 0.2;

/// Absolute budget floor that triggers a proactive pause.
const MIN_AVAILABLE_FLOOR: f64 = 100.0;

/// Length of the proactive pause taken at the budget floor.
const FLOOR_PAUSE: Duration = Duration::from_secs(2);

/// Maximum jitter added to a backoff delay, as a fraction of it.
const MAX_JITTER_FRACTION: f64 = 0.3;

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Backoff delay for the given zero-based attempt, before jitter.
///
/// `initial_delay * 2^attempt`, clamped to `max_delay`.
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config
        .initial_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

/// Add up to +30% random jitter to a delay.
fn jittered(delay: Duration) -> Duration {
    let fraction = rand::rng().random_range(0.0..=MAX_JITTER_FRACTION);
    delay + Duration::from_secs_f64(delay.as_secs_f64() * fraction)
}

/// Retrying wrapper over any [`GraphqlExecute`] implementation.
pub struct Transport<T> {
    inner: T,
    config: RetryConfig,
    monitor: Arc<RateLimitMonitor>,
}

impl<T: GraphqlExecute> Transport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            monitor: Arc::new(RateLimitMonitor::new()),
        }
    }

    /// The shared rate-limit monitor, for batch callers.
    pub fn monitor(&self) -> Arc<RateLimitMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Execute one call with throttle-aware retries.
    pub async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphqlResponse, CatalogApiError> {
        let mut attempt = 0u32;

        loop {
            match self.inner.execute(query, variables.clone()).await {
                Ok(response) if response.is_throttled() => {
                    if attempt >= self.config.max_retries {
                        tracing::warn!(attempts = attempt + 1, "Retry budget exhausted on throttle");
                        return Err(CatalogApiError::ThrottleExhausted {
                            attempts: attempt + 1,
                        });
                    }
                    let delay = jittered(backoff_delay(attempt, &self.config));
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Throttled by catalog API, backing off",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(response) => {
                    self.observe_budget(&response).await;
                    return Ok(response);
                }
                Err(err) => {
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    let delay = jittered(backoff_delay(attempt, &self.config));
                    tracing::warn!(
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Catalog call failed, backing off",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Feed the monitor and apply the low-budget safeguards.
    async fn observe_budget(&self, response: &GraphqlResponse) {
        let Some(status) = response.throttle_status() else {
            return;
        };
        self.monitor.record(&status);

        if status.currently_available < status.maximum_available * LOW_BUDGET_FRACTION {
            tracing::warn!(
                available = status.currently_available,
                maximum = status.maximum_available,
                "Rate budget below 20% of maximum",
            );
        }

        // Trade latency for safety margin near the floor.
        if status.currently_available < MIN_AVAILABLE_FLOOR {
            tracing::info!(
                available = status.currently_available,
                pause_ms = FLOOR_PAUSE.as_millis() as u64,
                "Rate budget near floor, pausing before next call",
            );
            tokio::time::sleep(FLOOR_PAUSE).await;
        }
    }
}

#[async_trait]
impl<T: GraphqlExecute> GraphqlExecute for Transport<T> {
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphqlResponse, CatalogApiError> {
        Transport::execute(self, query, variables).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails (or throttles) a fixed number of times, then succeeds.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        throttle: bool,
    }

    impl Flaky {
        fn failing(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                throttle: false,
            }
        }

        fn throttling(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                throttle: true,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GraphqlExecute for Flaky {
        async fn execute(
            &self,
            _query: &str,
            _variables: serde_json::Value,
        ) -> Result<GraphqlResponse, CatalogApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.throttle {
                    Ok(serde_json::from_value(serde_json::json!({
                        "errors": [{ "message": "x", "extensions": { "code": "THROTTLED" } }]
                    }))
                    .unwrap())
                } else {
                    Err(CatalogApiError::Http {
                        status: 502,
                        body: "bad gateway".into(),
                    })
                }
            } else {
                Ok(serde_json::from_value(serde_json::json!({ "data": {} })).unwrap())
            }
        }
    }

    #[test]
    fn backoff_doubles_and_clamps() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(0, &config), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, &config), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, &config), Duration::from_secs(4));
        assert_eq!(backoff_delay(10, &config), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            let d = jittered(base);
            assert!(d >= base);
            assert!(d <= Duration::from_secs(13));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let transport = Transport::new(Flaky::failing(2), RetryConfig::default());
        let response = transport.execute("query {}", serde_json::json!({})).await;
        assert!(response.is_ok());
        assert_eq!(transport.inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_is_retried_then_exhausted() {
        let transport = Transport::new(Flaky::throttling(10), RetryConfig::default());
        let err = transport
            .execute("query {}", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, CatalogApiError::ThrottleExhausted { attempts: 4 });
        assert_eq!(transport.inner.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transport_failure_propagates() {
        let transport = Transport::new(Flaky::failing(10), RetryConfig::default());
        let err = transport
            .execute("query {}", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, CatalogApiError::Http { status: 502, .. });
    }

    #[tokio::test(start_paused = true)]
    async fn successful_response_feeds_the_monitor() {
        struct WithBudget;

        #[async_trait]
        impl GraphqlExecute for WithBudget {
            async fn execute(
                &self,
                _query: &str,
                _variables: serde_json::Value,
            ) -> Result<GraphqlResponse, CatalogApiError> {
                Ok(serde_json::from_value(serde_json::json!({
                    "data": {},
                    "extensions": { "cost": {
                        "requestedQueryCost": 10.0,
                        "throttleStatus": {
                            "maximumAvailable": 1000.0,
                            "currentlyAvailable": 500.0,
                            "restoreRate": 50.0
                        }
                    }}
                }))
                .unwrap())
            }
        }

        let transport = Transport::new(WithBudget, RetryConfig::default());
        transport
            .execute("query {}", serde_json::json!({}))
            .await
            .unwrap();
        assert!(transport.monitor().estimated_available().unwrap() >= 500.0);
    }
}
