//! Eventual-consistency waiter (exponential backoff with a hard deadline)
//!
//! Some mutations are accepted by the provider before their effects are
//! visible: a freshly created role is not yet assumable, a service scaled to
//! zero still has tasks draining. The waiter polls a condition until it holds
//! or the deadline passes. Running out of time is reported as
//! [`WaitOutcome::TimedOut`], never as success.

use crate::driver::ResourceDriver;
use crate::error::Result;
use crate::resource::{Handle, ResourceDescriptor};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Backoff policy and total budget for one wait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Delay after the first failed check (ms)
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay (ms)
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Maximum total time spent waiting (s)
    pub timeout_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 15_000,
            multiplier: 2.0,
            timeout_secs: 120,
        }
    }
}

impl WaitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay to sleep after the `attempt`-th failed check (0-based), in ms
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let delay = (self.initial_delay_ms as f64 * factor).round();
        if delay >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            delay as u64
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready { attempts: u32, waited: Duration },
    TimedOut { attempts: u32, waited: Duration },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready { .. })
    }
}

/// Poll `check` until it reports `true` or the configured deadline elapses.
///
/// A check that returns an error counts as "not yet": providers commonly
/// answer "not found" for a resource that was created a moment ago.
/// `TimedOut` is only returned once the full budget has elapsed; the last
/// sleep is clipped to the deadline so the wait never overshoots by a whole
/// backoff step either.
pub async fn wait_until<F, Fut>(config: &WaitConfig, label: &str, mut check: F) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout = config.timeout();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match check().await {
            Ok(true) => {
                let waited = start.elapsed();
                tracing::debug!(resource = %label, attempts, ?waited, "Condition met");
                return WaitOutcome::Ready { attempts, waited };
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(resource = %label, attempts, error = %e, "Check failed, retrying");
            }
        }

        let waited = start.elapsed();
        if waited >= timeout {
            tracing::warn!(resource = %label, attempts, ?waited, "Gave up waiting");
            return WaitOutcome::TimedOut { attempts, waited };
        }

        let delay = Duration::from_millis(config.delay_for_attempt(attempts - 1));
        let delay = delay.min(timeout - waited);
        tracing::debug!(
            resource = %label,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Not ready yet"
        );
        sleep(delay).await;
    }
}

/// Wait until a freshly created resource can be referenced by its dependents
pub async fn wait_until_usable(
    driver: &dyn ResourceDriver,
    descriptor: &ResourceDescriptor,
    handle: &Handle,
    config: &WaitConfig,
) -> WaitOutcome {
    let label = format!("{} '{}'", descriptor.kind, descriptor.identity);
    wait_until(config, &label, || driver.is_usable(descriptor, handle)).await
}

/// Wait until a quiesced resource is ready to be deleted
pub async fn wait_until_quiesced(
    driver: &dyn ResourceDriver,
    descriptor: &ResourceDescriptor,
    handle: &Handle,
    config: &WaitConfig,
) -> WaitOutcome {
    let label = format!("{} '{}'", descriptor.kind, descriptor.identity);
    wait_until(config, &label, || driver.is_quiesced(descriptor, handle)).await
}
