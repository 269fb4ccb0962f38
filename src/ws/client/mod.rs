mod inner;

use std::{
    fmt::Display,
    sync::{Arc, Mutex},
};

use snafu::prelude::*;
use tokio::{sync::watch, task::JoinHandle};
use tokio_tungstenite as websocket;

use super::endpoint::StreamEndpoint;
use crate::{error, handler::AlertHandler, ws::Alert, Result};
use inner::{Session, Shared};

pub(crate) type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection lifecycle state of a [`StreamClient`].
///
/// Exactly one state is active at any time. `Idle` is the initial state and
/// the only state reachable after a deliberate [stop](StreamClient::stop);
/// `Failed` marks a transport-level error and is otherwise equivalent to
/// `Disconnected`, both lead back to `Connecting` after the backoff delay.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// not started, or deliberately stopped
    Idle,
    /// a connection attempt is in flight
    Connecting,
    /// the stream is established and frames are being received
    Connected,
    /// the connection closed cleanly, a reconnect is pending
    Disconnected,
    /// the connection attempt or transport failed, a reconnect is pending
    Failed,
}

impl ConnectionState {
    /// true if the client is not running
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// true if the stream is established
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Real-time alert stream client.
///
/// Owns one logical connection at a time. After [start](Self::start) it keeps
/// itself connected: any connection loss schedules a reconnect with
/// exponential backoff (base 1s, cap 30s, reset on success), indefinitely,
/// until [stop](Self::stop) is called or the client is dropped.
#[derive(Debug)]
pub struct StreamClient {
    endpoint: StreamEndpoint,
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    /// Create a new client for the given endpoint url (`ws` or `wss`).
    ///
    /// No network activity happens here; the client starts `Idle` with an
    /// empty alert buffer and no handler.
    pub fn new<S: AsRef<str> + ?Sized>(endpoint: &S) -> Result<Self> {
        let endpoint = endpoint
            .as_ref()
            .parse::<StreamEndpoint>()
            .with_context(|_| error::InvalidEndpoint {
                url: endpoint.as_ref(),
            })?;

        log::info!("Create stream client for {}", endpoint);

        Ok(Self {
            endpoint,
            shared: Arc::new(Shared::new()),
            supervisor: Mutex::new(None),
        })
    }

    /// Start streaming with the given credential.
    ///
    /// Returns `false` and performs no network activity when `enabled` is
    /// false, when the token is absent or empty, or when a session is
    /// already running. Otherwise spawns the supervisor task and returns
    /// `true` without blocking; establishment and failure surface later
    /// through [state](Self::state).
    ///
    /// The first connection attempt is delayed by a short grace period so a
    /// rapid start/stop toggle does not open a socket just to discard it.
    ///
    /// # Panics
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self, token: Option<&str>, enabled: bool) -> bool {
        if !enabled {
            log::debug!("Streaming disabled, stay idle");
            return false;
        }

        let token = match token {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                log::debug!("No credential supplied, stay idle");
                return false;
            }
        };

        let mut slot = self.supervisor.lock().unwrap();

        if slot.is_some() {
            log::debug!("Stream session already running, ignore start");
            return false;
        }

        self.shared.release();

        let session = Session::new(self.endpoint.clone(), token, Arc::clone(&self.shared));
        slot.replace(tokio::spawn(session.run()));

        log::info!("Stream session started");

        true
    }

    /// Stop streaming.
    ///
    /// Cancels any pending grace or backoff timer, aborts an in-flight
    /// connection attempt, closes the active connection and moves the state
    /// to `Idle`. After this returns no further state change, reconnect or
    /// handler invocation can come from the torn down session. Safe to call
    /// repeatedly and when nothing is running.
    pub async fn stop(&self) {
        self.shared.halt();

        let supervisor = self.supervisor.lock().unwrap().take();

        if let Some(handle) = supervisor {
            log::debug!("Aborting stream supervisor task");
            handle.abort();
            let _ = handle.await;
        }

        self.shared.publish_idle();

        log::info!("Stream session stopped");
    }

    /// Replace the alert handler.
    ///
    /// Rebinding the handler never touches the connection, the recent alert
    /// buffer or the backoff state; the next decoded alert goes to the new
    /// handler.
    pub fn set_handler<H: AlertHandler + 'static>(&self, handler: H) {
        self.shared.set_handler(Arc::new(handler));
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.watch_state()
    }

    /// Snapshot of the most recent alerts, newest first, at most 50.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.shared.recent_alerts()
    }

    /// Empty the recent alert buffer without touching the connection.
    pub fn clear_recent_alerts(&self) {
        self.shared.clear_recent_alerts();
    }

    /// The endpoint this client connects to.
    pub fn endpoint(&self) -> &StreamEndpoint {
        &self.endpoint
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.lock().unwrap().take() {
            handle.abort();
        }
    }
}
