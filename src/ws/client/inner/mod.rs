mod backoff;
mod buffer;
mod session;

pub(super) use session::Session;

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};

use tokio::sync::watch;

use crate::{handler::AlertHandler, ws::Alert};

use super::ConnectionState;
use buffer::AlertBuffer;

/// delay between becoming eligible to connect and the first attempt,
/// coalesces rapid start/stop toggles into a single attempt
pub(crate) const CONNECT_GRACE: Duration = Duration::from_millis(250);

/// first reconnect delay after a connection loss
pub(crate) const RECONNECT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// upper bound for the reconnect delay
pub(crate) const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// capacity of the recent alert buffer
pub(crate) const RECENT_ALERTS_CAP: usize = 50;

/// State shared between the client handle and the supervisor task.
///
/// The handler lives behind its own slot so rebinding it never touches the
/// connection; the supervisor reads the slot fresh for every delivery.
pub(crate) struct Shared {
    state_tx: watch::Sender<ConnectionState>,
    stopped: AtomicBool,
    buffer: Mutex<AlertBuffer>,
    handler: RwLock<Option<Arc<dyn AlertHandler>>>,
}

impl Shared {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        Self {
            state_tx,
            stopped: AtomicBool::new(false),
            buffer: Mutex::new(AlertBuffer::new()),
            handler: RwLock::new(None),
        }
    }

    /// Publish a new connection state, unless the client has been stopped.
    pub fn publish(&self, state: ConnectionState) {
        if self.stopped.load(Ordering::Acquire) {
            log::trace!("Client stopped, suppress {} state publication", state);
            return;
        }

        log::debug!("Move to {} state", state);
        self.state_tx.send_replace(state);
    }

    /// Block any further publication from the dying session.
    pub fn halt(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Lift the stop flag for a fresh session.
    pub fn release(&self) {
        self.stopped.store(false, Ordering::Release);
    }

    /// Publish `Idle` regardless of the stop flag; only the stop path calls
    /// this, after the supervisor task has terminated.
    pub fn publish_idle(&self) {
        self.state_tx.send_replace(ConnectionState::Idle);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn handler(&self) -> Option<Arc<dyn AlertHandler>> {
        self.handler.read().unwrap().clone()
    }

    pub fn set_handler(&self, handler: Arc<dyn AlertHandler>) {
        self.handler.write().unwrap().replace(handler);
    }

    pub fn push_alert(&self, alert: Alert) {
        self.buffer.lock().unwrap().push(alert);
    }

    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.buffer.lock().unwrap().snapshot()
    }

    pub fn clear_recent_alerts(&self) {
        self.buffer.lock().unwrap().clear();
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("state", &self.state())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}
