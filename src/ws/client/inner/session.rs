use std::{panic::AssertUnwindSafe, sync::Arc};

use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio_tungstenite as websocket;

use super::{backoff::Backoff, Shared, CONNECT_GRACE};
use crate::ws::{
    client::{ConnectionState, WebsocketClient},
    endpoint::StreamEndpoint,
    frame::Frame,
};

/// How one established connection ended.
#[derive(Debug)]
enum SessionEnd {
    /// server closed the stream cleanly
    Closed,
    /// the transport broke
    Broken,
}

/// One logical streaming session, driven by the supervisor task.
///
/// The session owns the credential and the backoff state; both die with it.
/// All state publication goes through [`Shared`], which the stop path can
/// silence before aborting the task.
pub(crate) struct Session {
    endpoint: StreamEndpoint,
    token: String,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // token stays out of any debug output
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(endpoint: StreamEndpoint, token: String, shared: Arc<Shared>) -> Self {
        Self {
            endpoint,
            token,
            shared,
        }
    }

    /// Supervisor loop: connect, pump frames until the connection dies,
    /// wait out the backoff delay, connect again. Never returns; the stop
    /// path aborts the task at one of the await points.
    pub async fn run(self) {
        log::debug!("Supervisor task start, grace period {:?}", CONNECT_GRACE);

        tokio::time::sleep(CONNECT_GRACE).await;

        let mut backoff = Backoff::new();

        loop {
            self.shared.publish(ConnectionState::Connecting);

            log::debug!("Connecting stream endpoint {}", self.endpoint);

            match websocket::connect_async(self.endpoint.url(&self.token)).await {
                Ok((ws, _)) => {
                    log::info!("Stream connected, start receiving frames");

                    self.shared.publish(ConnectionState::Connected);
                    backoff.reset();

                    match self.pump(ws).await {
                        SessionEnd::Closed => {
                            log::info!("Stream closed by server");
                            self.shared.publish(ConnectionState::Disconnected);
                        }
                        SessionEnd::Broken => {
                            self.shared.publish(ConnectionState::Failed);
                        }
                    }
                }
                Err(err) => {
                    log::warn!("Connect stream endpoint failed: {}", err);
                    self.shared.publish(ConnectionState::Failed);
                }
            }

            let delay = backoff.next_delay();

            log::info!("Reconnecting in {:?} ...", delay);

            tokio::time::sleep(delay).await;
        }
    }

    /// Receive frames until the connection ends, delivering decoded alerts.
    async fn pump(&self, mut ws: WebsocketClient) -> SessionEnd {
        loop {
            let frame = match ws.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    log::warn!("Stream transport broken: {}", err);

                    // force close so the loss surfaces exactly once
                    let _ = ws.close(None).await;

                    return SessionEnd::Broken;
                }
                None => return SessionEnd::Closed,
            };

            match frame {
                websocket::tungstenite::Message::Text(text) => self.deliver(&text).await,
                websocket::tungstenite::Message::Ping(payload) => {
                    log::trace!("Received ping, answer pong");

                    if let Err(err) = ws
                        .send(websocket::tungstenite::Message::Pong(payload))
                        .await
                    {
                        log::debug!("Send pong failed: {}", err);
                    }
                }
                websocket::tungstenite::Message::Close(_) => {
                    log::trace!("Received close frame");
                    return SessionEnd::Closed;
                }
                _ => log::trace!("Ignore non-text frame"),
            }
        }
    }

    /// Decode one text frame; a recognized alert goes to the buffer and the
    /// current handler, everything else is discarded without state change.
    async fn deliver(&self, text: &str) {
        let alert = match Frame::decode(text) {
            Ok(Frame::AlertCreated(alert)) => alert,
            Ok(Frame::Unrecognized { kind }) => {
                log::trace!("Ignore frame of unrecognized type {}", kind);
                return;
            }
            Err(err) => {
                log::debug!("Discard malformed frame: {}", err);
                log::trace!("Malformed frame content: {}", text);
                return;
            }
        };

        log::debug!(
            "Received {} alert {} for patient {}",
            alert.severity,
            alert.id,
            alert.patient_id
        );

        self.shared.push_alert(alert.clone());

        if let Some(handler) = self.shared.handler() {
            let name = handler.name();

            log::trace!("Deliver alert to handler {}", name);

            if AssertUnwindSafe(handler.on_alert(alert))
                .catch_unwind()
                .await
                .is_err()
            {
                log::error!("Alert handler {} panicked while handling alert", name);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::{
        net::{TcpListener, TcpStream},
        sync::{mpsc, oneshot, watch},
        time::timeout,
    };
    use tokio_tungstenite::{
        accept_async, accept_hdr_async,
        tungstenite::{
            handshake::server::{Request, Response},
            Message,
        },
        WebSocketStream,
    };

    use crate::ws::{Alert, ConnectionState, Severity, StreamClient};

    const LONG: Duration = Duration::from_secs(5);

    async fn gateway() -> (StreamClient, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = StreamClient::new(&format!("ws://{}/stream", addr)).unwrap();
        (client, listener)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = timeout(LONG, listener.accept()).await.unwrap().unwrap();
        accept_async(stream).await.unwrap()
    }

    async fn wait_for(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
        timeout(LONG, async {
            while *rx.borrow_and_update() != want {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {} state", want));
    }

    fn alert_frame(id: &str) -> Message {
        Message::Text(
            json!({
                "type": "ALERT_CREATED",
                "data": {
                    "alertId": id,
                    "patientId": "p1",
                    "severity": "critical",
                    "title": "X",
                    "ruleKey": "r1",
                },
            })
            .to_string(),
        )
    }

    fn channel_handler() -> (
        impl Fn(Alert) -> futures_util::future::Ready<()> + Send + Sync,
        mpsc::UnboundedReceiver<Alert>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |alert: Alert| {
            let _ = tx.send(alert);
            futures_util::future::ready(())
        };
        (handler, rx)
    }

    #[tokio::test]
    async fn test_connect_receive_close_reconnect() {
        let (client, listener) = gateway().await;

        let (handler, mut alerts) = channel_handler();
        client.set_handler(handler);

        let mut states = client.watch_state();

        assert!(client.start(Some("tok-1"), true));
        // second start while a session runs is a no-op
        assert!(!client.start(Some("tok-1"), true));

        let (uri_tx, uri_rx) = oneshot::channel();
        let (stream, _) = timeout(LONG, listener.accept()).await.unwrap().unwrap();
        let mut server = accept_hdr_async(stream, move |req: &Request, resp: Response| {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        })
        .await
        .unwrap();

        // the credential travels as a url-encoded query parameter
        let uri = uri_rx.await.unwrap();
        assert!(uri.contains("token=tok-1"), "unexpected uri {}", uri);

        wait_for(&mut states, ConnectionState::Connected).await;

        server.send(alert_frame("a1")).await.unwrap();

        let alert = timeout(LONG, alerts.recv()).await.unwrap().unwrap();
        assert_eq!(alert.id, "a1");
        assert_eq!(alert.patient_id, "p1");
        assert_eq!(alert.severity, Severity::Critical);

        let recent = client.recent_alerts();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "a1");

        // clean close moves to disconnected and schedules a reconnect
        // after the base backoff delay
        let lost_at = Instant::now();
        server.close(None).await.unwrap();

        wait_for(&mut states, ConnectionState::Disconnected).await;

        let _server = accept(&listener).await;
        assert!(lost_at.elapsed() >= Duration::from_millis(900));

        wait_for(&mut states, ConnectionState::Connected).await;

        // the buffer survives the reconnect
        assert_eq!(client.recent_alerts().len(), 1);

        client.stop().await;
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_transport_error_moves_to_failed() {
        let (client, listener) = gateway().await;

        let mut states = client.watch_state();
        assert!(client.start(Some("tok-1"), true));

        let server = accept(&listener).await;
        wait_for(&mut states, ConnectionState::Connected).await;

        // dropping the socket without a close handshake is a transport error
        drop(server);

        wait_for(&mut states, ConnectionState::Failed).await;

        client.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_frames_are_discarded() {
        let (client, listener) = gateway().await;

        let (handler, mut alerts) = channel_handler();
        client.set_handler(handler);

        let mut states = client.watch_state();
        assert!(client.start(Some("tok-1"), true));

        let mut server = accept(&listener).await;
        wait_for(&mut states, ConnectionState::Connected).await;

        let garbage = [
            Message::Text("definitely not json".to_string()),
            Message::Text(json!({ "data": {} }).to_string()),
            Message::Text(json!({ "type": 42, "data": {} }).to_string()),
            Message::Text(json!({ "type": "PATIENT_ADMITTED", "data": {} }).to_string()),
            Message::Text(
                json!({ "type": "ALERT_CREATED", "data": { "alertId": "broken" } }).to_string(),
            ),
        ];

        for frame in garbage {
            server.send(frame).await.unwrap();
        }

        server.send(alert_frame("a1")).await.unwrap();

        // only the valid alert comes through, and the client survived
        let alert = timeout(LONG, alerts.recv()).await.unwrap().unwrap();
        assert_eq!(alert.id, "a1");
        assert!(alerts.try_recv().is_err());

        let recent = client.recent_alerts();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "a1");
        assert_eq!(client.state(), ConnectionState::Connected);

        // pings are answered with a pong carrying the same payload
        server.send(Message::Ping(b"hb".to_vec())).await.unwrap();

        let reply = timeout(LONG, server.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(reply, Message::Pong(b"hb".to_vec()));

        client.stop().await;
    }

    #[tokio::test]
    async fn test_handler_panic_does_not_break_delivery() {
        let (client, listener) = gateway().await;

        let (tx, mut alerts) = mpsc::unbounded_channel();
        client.set_handler(move |alert: Alert| {
            let tx = tx.clone();
            async move {
                if alert.id == "boom" {
                    panic!("handler blew up");
                }
                let _ = tx.send(alert);
            }
        });

        let mut states = client.watch_state();
        assert!(client.start(Some("tok-1"), true));

        let mut server = accept(&listener).await;
        wait_for(&mut states, ConnectionState::Connected).await;

        server.send(alert_frame("boom")).await.unwrap();
        server.send(alert_frame("a2")).await.unwrap();

        // the panic is isolated, the next alert still comes through
        let alert = timeout(LONG, alerts.recv()).await.unwrap().unwrap();
        assert_eq!(alert.id, "a2");

        assert_eq!(client.state(), ConnectionState::Connected);

        // both alerts made it into the buffer before delivery
        let ids: Vec<_> = client.recent_alerts().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a2", "boom"]);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_handler_rebinding_keeps_connection() {
        let (client, listener) = gateway().await;

        let (old_handler, mut old_alerts) = channel_handler();
        client.set_handler(old_handler);

        let mut states = client.watch_state();
        assert!(client.start(Some("tok-1"), true));

        let mut server = accept(&listener).await;
        wait_for(&mut states, ConnectionState::Connected).await;

        server.send(alert_frame("a1")).await.unwrap();
        let alert = timeout(LONG, old_alerts.recv()).await.unwrap().unwrap();
        assert_eq!(alert.id, "a1");

        let (new_handler, mut new_alerts) = channel_handler();
        client.set_handler(new_handler);

        // rebinding did not disturb the connection
        assert_eq!(client.state(), ConnectionState::Connected);

        server.send(alert_frame("a2")).await.unwrap();
        let alert = timeout(LONG, new_alerts.recv()).await.unwrap().unwrap();
        assert_eq!(alert.id, "a2");
        assert!(old_alerts.try_recv().is_err());

        // buffer kept both alerts, newest first
        let ids: Vec<_> = client.recent_alerts().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a2", "a1"]);

        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_during_grace_cancels_attempt() {
        let (client, listener) = gateway().await;

        assert!(client.start(Some("tok-1"), true));
        client.stop().await;

        assert_eq!(client.state(), ConnectionState::Idle);

        // no connection may arrive once stopped
        assert!(
            timeout(Duration::from_millis(600), listener.accept())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_clear_recent_alerts_keeps_connection() {
        let (client, listener) = gateway().await;

        let (handler, mut alerts) = channel_handler();
        client.set_handler(handler);

        let mut states = client.watch_state();
        assert!(client.start(Some("tok-1"), true));

        let mut server = accept(&listener).await;
        wait_for(&mut states, ConnectionState::Connected).await;

        server.send(alert_frame("a1")).await.unwrap();
        timeout(LONG, alerts.recv()).await.unwrap().unwrap();

        client.clear_recent_alerts();

        assert!(client.recent_alerts().is_empty());
        assert_eq!(client.state(), ConnectionState::Connected);

        client.stop().await;
    }
}
