//! Minimum-interval pacing for completion calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Hands out permits no closer together than a fixed interval.
///
/// The external rate limit is per minute, so spacing calls is enough; a
/// caller awaits [`Pacer::acquire`] before every transport call. With a
/// zero interval the pacer is a no-op (useful in tests).
pub struct Pacer {
    min_interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_permit: Mutex::new(None),
        }
    }

    /// Waits until at least `min_interval` has passed since the previous
    /// permit, then takes the next one.
    pub async fn acquire(&self) {
        let mut last = self.last_permit.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
