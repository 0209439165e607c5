//! Activity throttling

use std::time::Duration;
use tokio::time::Instant;

/// Leading-edge throttle: admits the first signal, then drops signals until
/// `interval` has elapsed
#[derive(Debug, Clone)]
pub struct ActivityThrottle {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl ActivityThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}
