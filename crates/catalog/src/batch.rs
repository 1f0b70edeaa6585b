//! Windowed execution of a batch of logical calls.
//!
//! Partitions N calls into fixed-size windows, waits on the rate-limit
//! monitor before each window when the budget is low, runs each
//! window's calls concurrently, reports progress after each window,
//! and sleeps a fixed delay between windows (not after the last).

use std::time::Duration;

use futures::future::join_all;

use crate::api::{CatalogApiError, GraphqlExecute, GraphqlResponse};
use crate::transport::Transport;

/// One logical GraphQL call in a batch.
#[derive(Debug, Clone)]
pub struct BatchCall {
    pub query: String,
    pub variables: serde_json::Value,
}

/// Tunable parameters for batched execution.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Calls in flight at once.
    pub window_size: usize,
    /// Sleep between windows.
    pub window_delay: Duration,
    /// Budget points to wait for before starting a window.
    pub budget_threshold: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            window_delay: Duration::from_millis(500),
            budget_threshold: 200.0,
        }
    }
}

/// Execute `calls` in windows, returning one result per call in order.
///
/// `progress` is invoked after each window with (completed, total).
pub async fn execute_batched<T: GraphqlExecute>(
    transport: &Transport<T>,
    calls: &[BatchCall],
    config: &BatchConfig,
    mut progress: impl FnMut(usize, usize),
) -> Vec<Result<GraphqlResponse, CatalogApiError>> {
    let total = calls.len();
    let mut results = Vec::with_capacity(total);
    let monitor = transport.monitor();
    let window_size = config.window_size.max(1);

    let window_count = total.div_ceil(window_size);

    for (window_index, window) in calls.chunks(window_size).enumerate() {
        if monitor.should_wait(config.budget_threshold) {
            monitor.wait_for_availability(config.budget_threshold).await;
        }

        let window_results = join_all(
            window
                .iter()
                .map(|call| transport.execute(&call.query, call.variables.clone())),
        )
        .await;
        results.extend(window_results);

        progress(results.len(), total);
        tracing::debug!(
            window = window_index + 1,
            windows = window_count,
            completed = results.len(),
            total,
            "Batch window completed",
        );

        if window_index + 1 < window_count {
            tokio::time::sleep(config.window_delay).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RetryConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GraphqlExecute for Counting {
        async fn execute(
            &self,
            _query: &str,
            _variables: serde_json::Value,
        ) -> Result<GraphqlResponse, CatalogApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(serde_json::json!({ "data": {} })).unwrap())
        }
    }

    fn calls(n: usize) -> Vec<BatchCall> {
        (0..n)
            .map(|i| BatchCall {
                query: "query {}".to_string(),
                variables: serde_json::json!({ "i": i }),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn all_calls_run_and_progress_reports_per_window() {
        let counter = Arc::new(AtomicUsize::new(0));
        let transport = Transport::new(
            Counting {
                calls: Arc::clone(&counter),
            },
            RetryConfig::default(),
        );

        let mut reports = Vec::new();
        let results = execute_batched(
            &transport,
            &calls(25),
            &BatchConfig::default(),
            |done, total| reports.push((done, total)),
        )
        .await;

        assert_eq!(results.len(), 25);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(counter.load(Ordering::SeqCst), 25);
        assert_eq!(reports, vec![(10, 25), (20, 25), (25, 25)]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_is_a_noop() {
        let transport = Transport::new(
            Counting {
                calls: Arc::new(AtomicUsize::new(0)),
            },
            RetryConfig::default(),
        );
        let results =
            execute_batched(&transport, &[], &BatchConfig::default(), |_, _| {}).await;
        assert!(results.is_empty());
    }
}
