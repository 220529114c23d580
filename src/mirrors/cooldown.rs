//! Request pacing for outbound service calls.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Monotonic slot-based pacer shared by the mirror clients.
///
/// `wait_for_slot` sleeps out the remainder of the configured delay since
/// the previous request; the first call never waits.
#[derive(Debug)]
pub struct Cooldown {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Wait for the configured delay since the last request.
    pub async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!("waiting {:?} before next request", wait);
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_slot_is_immediate() {
        let cooldown = Cooldown::new(Duration::from_millis(200));
        let start = Instant::now();
        cooldown.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_slot_waits_out_the_delay() {
        let cooldown = Cooldown::new(Duration::from_millis(50));
        cooldown.wait_for_slot().await;
        let start = Instant::now();
        cooldown.wait_for_slot().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }
}
