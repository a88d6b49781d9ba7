//! Realtime change feed listener
//!
//! Speaks the Phoenix channel protocol (vsn 1.0.0) over a websocket:
//! 1. Connect to `/realtime/v1/websocket`
//! 2. Join `realtime:public-schema-changes` for every change in `public`
//! 3. Heartbeat every 30 s
//! 4. Forward `postgres_changes` as [`ChangeEvent`]s
//! 5. Reconnect with exponential backoff on disconnect

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::types::{ChangeEvent, ChangeKind};

pub const CHANNEL_TOPIC: &str = "realtime:public-schema-changes";
const HEARTBEAT_INTERVAL_SECS: u64 = 30;
const INITIAL_RECONNECT_DELAY_SECS: u64 = 1;
const MAX_RECONNECT_DELAY_SECS: u64 = 60;

/// Supplies the current access token at (re)connect time
pub type TokenSource = Arc<dyn Fn() -> String + Send + Sync>;

pub struct RealtimeListener {
    url: String,
    token: TokenSource,
    changes: broadcast::Sender<ChangeEvent>,
    next_ref: u64,
}

impl RealtimeListener {
    pub fn new(url: String, token: TokenSource, changes: broadcast::Sender<ChangeEvent>) -> Self {
        Self {
            url,
            token,
            changes,
            next_ref: 0,
        }
    }

    fn make_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    /// Connect, listen, reconnect until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Realtime listener started");
        let mut reconnect_delay = Duration::from_secs(INITIAL_RECONNECT_DELAY_SECS);

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((ws, _response)) => {
                    reconnect_delay = Duration::from_secs(INITIAL_RECONNECT_DELAY_SECS);
                    self.run_session(ws, &shutdown).await;
                }
                Err(e) => {
                    tracing::warn!(
                        delay_secs = reconnect_delay.as_secs(),
                        "Realtime connection failed: {e}"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(reconnect_delay) => {},
            }
            reconnect_delay =
                (reconnect_delay * 2).min(Duration::from_secs(MAX_RECONNECT_DELAY_SECS));
        }

        tracing::info!("Realtime listener stopped");
    }

    async fn run_session<S>(&mut self, ws: S, shutdown: &CancellationToken)
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut ws_sink, mut ws_stream) = ws.split();

        let join = self.join_message();
        if let Err(e) = ws_sink.send(Message::Text(join.to_string().into())).await {
            tracing::warn!("Realtime join failed: {e}");
            return;
        }

        let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        heartbeat.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = ws_sink.close().await;
                    return;
                }

                _ = heartbeat.tick() => {
                    let beat = self.heartbeat_message();
                    if ws_sink.send(Message::Text(beat.to_string().into())).await.is_err() {
                        tracing::warn!("Realtime heartbeat failed, reconnecting");
                        return;
                    }
                }

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Realtime socket closed by server");
                            return;
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Realtime socket error: {e}");
                            return;
                        }
                        None => {
                            tracing::info!("Realtime stream ended");
                            return;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn join_message(&mut self) -> Value {
        json!({
            "topic": CHANNEL_TOPIC,
            "event": "phx_join",
            "payload": {
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [{ "event": "*", "schema": "public" }]
                },
                "access_token": (self.token)()
            },
            "ref": self.make_ref()
        })
    }

    fn heartbeat_message(&mut self) -> Value {
        json!({
            "topic": "phoenix",
            "event": "heartbeat",
            "payload": {},
            "ref": self.make_ref()
        })
    }

    fn handle_text(&self, text: &str) {
        let frame: PhoenixFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!("Ignoring unreadable realtime frame: {e}");
                return;
            }
        };

        match frame.event.as_str() {
            "phx_reply" => {
                let status = frame.payload.get("status").and_then(Value::as_str);
                if frame.topic == CHANNEL_TOPIC && status != Some("ok") {
                    tracing::warn!(?status, "Realtime channel join rejected");
                }
            }
            "phx_error" => tracing::warn!(topic = %frame.topic, "Realtime channel error"),
            _ => {
                if let Some(event) = parse_change(&frame) {
                    tracing::debug!(table = %event.table, kind = ?event.kind, "Realtime change");
                    // No subscribers is fine
                    let _ = self.changes.send(event);
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PhoenixFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
}

fn parse_change(frame: &PhoenixFrame) -> Option<ChangeEvent> {
    if frame.event != "postgres_changes" {
        return None;
    }
    let data: ChangeData = serde_json::from_value(frame.payload.get("data")?.clone()).ok()?;
    Some(ChangeEvent::new(data.table, data.kind))
}
