use std::time::Duration;

use super::{RECONNECT_BACKOFF_BASE, RECONNECT_BACKOFF_MAX};

/// Reconnect delay for one logical session.
///
/// Starts at the base delay, doubles after each consecutive loss, saturates
/// at the cap and resets to base on any successful connection.
#[derive(Debug)]
pub(crate) struct Backoff {
    delay: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            delay: RECONNECT_BACKOFF_BASE,
        }
    }

    /// Delay to wait before the next attempt; doubles the stored value
    /// (capped) for the attempt after that.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay * 2).min(RECONNECT_BACKOFF_MAX);
        current
    }

    /// Back to the base delay, called on every successful connection.
    pub fn reset(&mut self) {
        self.delay = RECONNECT_BACKOFF_BASE;
    }
}
