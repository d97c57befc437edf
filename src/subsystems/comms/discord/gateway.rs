//! Discord gateway session over WebSocket.
//!
//! One [`Gateway`] is one identified session: Hello → Identify → dispatch
//! loop with heartbeats. There is no resume; when the session ends the
//! caller reconnects and identifies again.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::DiscordError;
use super::model::{GatewayPayload, Message, Ready};

pub const GATEWAY_VERSION: u8 = 10;

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
pub const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

const DEFAULT_HEARTBEAT_MS: u64 = 41_250;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dispatch events the bot reacts to.
#[derive(Debug)]
pub enum GatewayEvent {
    Ready(Ready),
    MessageCreate(Message),
}

pub struct Gateway {
    ws: WsStream,
    heartbeat: Interval,
    seq: Option<u64>,
}

impl Gateway {
    /// Connect to `url` (from `GET /gateway/bot`), wait for Hello and
    /// identify with `token`.
    pub async fn connect(url: &str, token: &str) -> Result<Self, DiscordError> {
        let ws_url = format!("{url}/?v={GATEWAY_VERSION}&encoding=json");
        info!("discord: connecting to gateway");
        let (mut ws, _) = connect_async(ws_url.as_str()).await?;

        let hello = loop {
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => break serde_json::from_str::<GatewayPayload>(&text)?,
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(DiscordError::Gateway("connection closed before hello".into()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        };
        if hello.op != OP_HELLO {
            return Err(DiscordError::Gateway(format!("expected hello, got op {}", hello.op)));
        }
        let interval_ms = hello
            .d
            .get("heartbeat_interval")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_HEARTBEAT_MS);

        ws.send(WsMessage::Text(identify_payload(token).to_string())).await?;
        debug!(interval_ms, "discord: identified");

        let period = Duration::from_millis(interval_ms);
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self { ws, heartbeat, seq: None })
    }

    /// Next event of interest. `Ok(None)` means the session is over and the
    /// caller should reconnect.
    pub async fn next_event(&mut self) -> Result<Option<GatewayEvent>, DiscordError> {
        loop {
            let frame = tokio::select! {
                _ = self.heartbeat.tick() => None,
                frame = self.ws.next() => Some(frame),
            };

            let text = match frame {
                None => {
                    self.send_heartbeat().await?;
                    continue;
                }
                Some(None) => return Ok(None),
                Some(Some(Err(e))) => return Err(e.into()),
                Some(Some(Ok(WsMessage::Text(text)))) => text,
                Some(Some(Ok(WsMessage::Close(frame)))) => {
                    info!(?frame, "discord: gateway closed the connection");
                    return Ok(None);
                }
                Some(Some(Ok(_))) => continue,
            };

            let payload: GatewayPayload = serde_json::from_str(&text)?;
            if let Some(seq) = payload.s {
                self.seq = Some(seq);
            }

            match payload.op {
                OP_DISPATCH => {
                    if let Some(event) = decode_or_skip(payload) {
                        return Ok(Some(event));
                    }
                }
                OP_HEARTBEAT => self.send_heartbeat().await?,
                OP_HEARTBEAT_ACK => trace!("discord: heartbeat ack"),
                OP_RECONNECT => {
                    info!("discord: gateway requested reconnect");
                    return Ok(None);
                }
                OP_INVALID_SESSION => {
                    warn!("discord: invalid session");
                    return Ok(None);
                }
                other => debug!(op = other, "discord: unhandled gateway opcode"),
            }
        }
    }

    /// Send a close frame; errors are irrelevant at this point.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    async fn send_heartbeat(&mut self) -> Result<(), DiscordError> {
        trace!(seq = ?self.seq, "discord: heartbeat");
        let beat = json!({ "op": OP_HEARTBEAT, "d": self.seq });
        self.ws.send(WsMessage::Text(beat.to_string())).await?;
        Ok(())
    }
}

fn identify_payload(token: &str) -> serde_json::Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "parley-bot",
                "device": "parley-bot",
            },
        },
    })
}

/// Decode an op-0 payload into an event; other event types yield `None`.
pub fn decode_dispatch(payload: GatewayPayload) -> Result<Option<GatewayEvent>, DiscordError> {
    match payload.t.as_deref() {
        Some("READY") => Ok(Some(GatewayEvent::Ready(serde_json::from_value(payload.d)?))),
        Some("MESSAGE_CREATE") => Ok(Some(GatewayEvent::MessageCreate(serde_json::from_value(payload.d)?))),
        _ => Ok(None),
    }
}

/// [`decode_dispatch`] for the event loop: an undecodable event is logged
/// and dropped so the session survives it.
fn decode_or_skip(payload: GatewayPayload) -> Option<GatewayEvent> {
    let event_type = payload.t.clone();
    match decode_dispatch(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(event = ?event_type, "discord: skipping undecodable dispatch: {e}");
            None
        }
    }
}
