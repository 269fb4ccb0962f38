use std::collections::VecDeque;

use super::RECENT_ALERTS_CAP;
use crate::ws::Alert;

/// Bounded buffer of recently received alerts, newest first.
#[derive(Debug)]
pub(crate) struct AlertBuffer {
    alerts: VecDeque<Alert>,
}

impl AlertBuffer {
    pub fn new() -> Self {
        Self {
            alerts: VecDeque::with_capacity(RECENT_ALERTS_CAP),
        }
    }

    /// Prepend an alert, evicting the oldest one beyond capacity.
    pub fn push(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(RECENT_ALERTS_CAP);
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }
}
