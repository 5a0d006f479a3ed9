//! Exponential-backoff driver for the `rumqttc` event loop.
//!
//! Grounded on the reconnect-with-sleep pattern used by the teacher's
//! MQTT bridge and fleet agent event loops, generalized from a fixed
//! retry delay to the exponential backoff spec.md §4.2 prescribes
//! (base 1s, factor 2, cap 60s).

use rumqttc::{Event, EventLoop};
use std::time::Duration;

/// Exponential backoff state: base, factor-2 growth, capped.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay for the `n`th consecutive failure (0-indexed).
    fn delay_for(&self, n: u32) -> Duration {
        let scaled = self.base.saturating_mul(1u32.checked_shl(n).unwrap_or(u32::MAX));
        scaled.min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Drive the event loop, calling `on_event` for every incoming packet.
/// On error, sleeps with exponential backoff and retries; a
/// successful poll resets the backoff counter. Runs until cancelled
/// (the caller wraps this in a spawned task and drops it on shutdown).
pub async fn drive_with_backoff<F>(mut eventloop: EventLoop, policy: BackoffPolicy, mut on_event: F)
where
    F: FnMut(Event) + Send,
{
    let mut failures: u32 = 0;

    loop {
        match eventloop.poll().await {
            Ok(event) => {
                failures = 0;
                on_event(event);
            }
            Err(e) => {
                let delay = policy.delay_for(failures);
                failures = failures.saturating_add(1);
                tracing::error!(error = %e, delay_secs = delay.as_secs(), "mqtt event loop error, backing off");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
