//! Cross-call rate-budget estimation.
//!
//! The API reports its throttle budget after each call. Between calls
//! the budget refills at `restore_rate` points per second, so the
//! monitor extrapolates the currently-available budget from elapsed
//! time and lets batch callers pace themselves before the next window.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::ThrottleStatus;

/// Minimum sleep slice while waiting for budget to restore.
const MIN_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct BudgetSnapshot {
    available: f64,
    maximum: f64,
    restore_rate: f64,
    updated_at: Instant,
}

/// Tracks the tenant's rate budget across a batch of calls.
///
/// Thread-safe; shared behind `Arc` by the transport and batch helper.
pub struct RateLimitMonitor {
    state: Mutex<Option<BudgetSnapshot>>,
}

impl RateLimitMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Record the throttle status reported by a response.
    pub fn record(&self, status: &ThrottleStatus) {
        let mut state = self.state.lock().expect("rate limit monitor poisoned");
        *state = Some(BudgetSnapshot {
            available: status.currently_available,
            maximum: status.maximum_available,
            restore_rate: status.restore_rate,
            updated_at: Instant::now(),
        });
    }

    /// Extrapolated currently-available budget, capped at the maximum.
    ///
    /// `None` until the first status has been recorded.
    pub fn estimated_available(&self) -> Option<f64> {
        let state = self.state.lock().expect("rate limit monitor poisoned");
        state.map(|s| {
            let restored = s.updated_at.elapsed().as_secs_f64() * s.restore_rate;
            (s.available + restored).min(s.maximum)
        })
    }

    /// The maximum budget, once known.
    pub fn maximum(&self) -> Option<f64> {
        let state = self.state.lock().expect("rate limit monitor poisoned");
        state.map(|s| s.maximum)
    }

    /// Whether a caller should pause before spending `threshold` points.
    ///
    /// With no recorded status yet there is nothing to wait on.
    pub fn should_wait(&self, threshold: f64) -> bool {
        match self.estimated_available() {
            Some(available) => available < threshold,
            None => false,
        }
    }

    /// Sleep until the extrapolated budget reaches `threshold`.
    pub async fn wait_for_availability(&self, threshold: f64) {
        loop {
            let (available, restore_rate) = {
                let state = self.state.lock().expect("rate limit monitor poisoned");
                match *state {
                    Some(s) => {
                        let restored = s.updated_at.elapsed().as_secs_f64() * s.restore_rate;
                        ((s.available + restored).min(s.maximum), s.restore_rate)
                    }
                    None => return,
                }
            };

            if available >= threshold {
                return;
            }

            let deficit = threshold - available;
            let wait = if restore_rate > 0.0 {
                Duration::from_secs_f64(deficit / restore_rate).max(MIN_WAIT)
            } else {
                MIN_WAIT
            };

            tracing::debug!(
                available,
                threshold,
                wait_ms = wait.as_millis() as u64,
                "Waiting for rate budget to restore",
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimitMonitor {
    fn default() -> Self {
        Self::new()
    }
}
