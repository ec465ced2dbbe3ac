use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use ticketdesk_core::config::DiscordConfig;

use crate::interactions::{Interaction, InteractionParseError, RawInteraction};
use crate::runner::{GatewayTransport, TransportError};

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_PRESENCE_UPDATE: u8 = 3;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;
const ACTIVITY_WATCHING: u8 = 3;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Decoded gateway payload, reduced to what the bot acts on.
#[derive(Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    Hello { heartbeat_interval_ms: u64 },
    Ready { session_id: String, username: String },
    Interaction(Box<Interaction>),
    /// An `INTERACTION_CREATE` the bot could not decode.
    Undecodable(String),
    HeartbeatRequested,
    HeartbeatAck,
    Reconnect,
    InvalidSession,
    Other { op: u8, name: Option<String> },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Splits a text frame into its sequence number and event.
pub fn decode_frame(text: &str) -> Result<(Option<u64>, GatewayEvent), TransportError> {
    let frame: RawFrame = serde_json::from_str(text)
        .map_err(|error| TransportError::Receive(format!("undecodable gateway frame: {error}")))?;

    let event = match frame.op {
        OP_HELLO => GatewayEvent::Hello {
            heartbeat_interval_ms: frame.d["heartbeat_interval"].as_u64().ok_or_else(|| {
                TransportError::Receive("HELLO without heartbeat_interval".to_owned())
            })?,
        },
        OP_DISPATCH => match frame.t.as_deref() {
            Some("READY") => GatewayEvent::Ready {
                session_id: frame.d["session_id"].as_str().unwrap_or_default().to_owned(),
                username: frame.d["user"]["username"].as_str().unwrap_or_default().to_owned(),
            },
            Some("INTERACTION_CREATE") => match decode_interaction(frame.d) {
                Ok(interaction) => GatewayEvent::Interaction(Box::new(interaction)),
                Err(error) => GatewayEvent::Undecodable(error.to_string()),
            },
            name => GatewayEvent::Other { op: frame.op, name: name.map(str::to_owned) },
        },
        OP_HEARTBEAT => GatewayEvent::HeartbeatRequested,
        OP_HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        OP_RECONNECT => GatewayEvent::Reconnect,
        OP_INVALID_SESSION => GatewayEvent::InvalidSession,
        op => GatewayEvent::Other { op, name: frame.t },
    };
    Ok((frame.s, event))
}

fn decode_interaction(payload: Value) -> Result<Interaction, InteractionParseError> {
    let raw: RawInteraction = serde_json::from_value(payload)?;
    raw.try_into()
}

pub fn identify_payload(token: &str, intents: u64) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": intents,
            "properties": { "os": std::env::consts::OS, "browser": "ticketdesk", "device": "ticketdesk" },
        }
    })
}

/// "Watching {activity}" with an online status.
pub fn presence_payload(activity: &str) -> Value {
    json!({
        "op": OP_PRESENCE_UPDATE,
        "d": {
            "since": null,
            "activities": [{ "name": activity, "type": ACTIVITY_WATCHING }],
            "status": "online",
            "afk": false,
        }
    })
}

pub fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": sequence })
}

/// Close codes after which reconnecting with the same settings cannot succeed.
pub fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}

fn close_error(frame: Option<CloseFrame<'static>>) -> TransportError {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            let message = format!("gateway closed the connection ({code}): {}", frame.reason);
            if is_fatal_close(code) {
                TransportError::Rejected(message)
            } else {
                TransportError::Receive(message)
            }
        }
        None => TransportError::Receive("gateway closed the connection".to_owned()),
    }
}

struct Session {
    socket: Socket,
    heartbeat: Interval,
    sequence: Option<u64>,
    awaiting_ack: bool,
}

enum Wake {
    Heartbeat,
    Message(Option<Result<Message, WsError>>),
}

impl Session {
    fn new(socket: Socket, heartbeat_interval_ms: u64) -> Self {
        let period = Duration::from_millis(heartbeat_interval_ms.max(1));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { socket, heartbeat, sequence: None, awaiting_ack: false }
    }

    async fn send(&mut self, payload: Value) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|error| TransportError::Send(error.to_string()))
    }

    async fn send_heartbeat(&mut self) -> Result<(), TransportError> {
        self.send(heartbeat_payload(self.sequence)).await?;
        self.awaiting_ack = true;
        Ok(())
    }

    /// Next gateway event, answering heartbeats while waiting.
    async fn next_event(&mut self) -> Result<GatewayEvent, TransportError> {
        loop {
            let wake = tokio::select! {
                _ = self.heartbeat.tick() => Wake::Heartbeat,
                message = self.socket.next() => Wake::Message(message),
            };

            match wake {
                Wake::Heartbeat => {
                    if self.awaiting_ack {
                        return Err(TransportError::Receive(
                            "previous heartbeat was never acknowledged".to_owned(),
                        ));
                    }
                    self.send_heartbeat().await?;
                }
                Wake::Message(None) => {
                    return Err(TransportError::Receive("gateway stream ended".to_owned()));
                }
                Wake::Message(Some(Err(error))) => {
                    return Err(TransportError::Receive(error.to_string()));
                }
                Wake::Message(Some(Ok(Message::Close(frame)))) => return Err(close_error(frame)),
                Wake::Message(Some(Ok(Message::Text(text)))) => {
                    let (sequence, event) = decode_frame(&text)?;
                    if sequence.is_some() {
                        self.sequence = sequence;
                    }
                    match event {
                        GatewayEvent::HeartbeatRequested => self.send_heartbeat().await?,
                        GatewayEvent::HeartbeatAck => self.awaiting_ack = false,
                        other => return Ok(other),
                    }
                }
                Wake::Message(Some(Ok(_))) => {}
            }
        }
    }
}

/// Live connection to the platform's websocket gateway.
///
/// `connect` completes the HELLO / IDENTIFY / READY handshake and sets the
/// bot's presence. The stream never ends cleanly: every drop surfaces as an
/// error so the runner reconnects.
pub struct WebSocketTransport {
    url: String,
    token: SecretString,
    intents: u64,
    presence: String,
    session: Mutex<Option<Session>>,
}

impl WebSocketTransport {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            url: config.gateway_url.clone(),
            token: config.bot_token.clone(),
            intents: config.gateway_intents,
            presence: config.presence.clone(),
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl GatewayTransport for WebSocketTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let mut slot = self.session.lock().await;
        slot.take();

        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let hello = match socket.next().await {
            Some(Ok(Message::Text(text))) => decode_frame(&text)?.1,
            Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
            Some(Ok(other)) => {
                return Err(TransportError::Connect(format!("expected HELLO, got {other:?}")))
            }
            Some(Err(error)) => return Err(TransportError::Connect(error.to_string())),
            None => return Err(TransportError::Connect("gateway closed before HELLO".to_owned())),
        };
        let GatewayEvent::Hello { heartbeat_interval_ms } = hello else {
            return Err(TransportError::Connect(format!("expected HELLO, got {hello:?}")));
        };

        let mut session = Session::new(socket, heartbeat_interval_ms);
        session.send(identify_payload(self.token.expose_secret(), self.intents)).await?;

        loop {
            match session.next_event().await? {
                GatewayEvent::Ready { session_id, username } => {
                    info!(
                        event_name = "gateway.ready",
                        session_id = %session_id,
                        username = %username,
                        heartbeat_interval_ms,
                        "logged in to gateway"
                    );
                    break;
                }
                GatewayEvent::InvalidSession => {
                    return Err(TransportError::Rejected("gateway refused IDENTIFY".to_owned()));
                }
                GatewayEvent::Reconnect => {
                    return Err(TransportError::Connect("gateway asked to reconnect".to_owned()));
                }
                other => debug!(event = ?other, "gateway event before READY"),
            }
        }

        session.send(presence_payload(&self.presence)).await?;
        *slot = Some(session);
        Ok(())
    }

    async fn next_interaction(&self) -> Result<Option<Interaction>, TransportError> {
        let mut slot = self.session.lock().await;
        let session = slot
            .as_mut()
            .ok_or_else(|| TransportError::Receive("gateway is not connected".to_owned()))?;

        loop {
            match session.next_event().await? {
                GatewayEvent::Interaction(interaction) => return Ok(Some(*interaction)),
                GatewayEvent::Undecodable(reason) => warn!(
                    event_name = "ingress.interaction.undecodable",
                    reason = %reason,
                    "dropping interaction payload"
                ),
                GatewayEvent::Reconnect => {
                    return Err(TransportError::Receive("gateway asked to reconnect".to_owned()));
                }
                GatewayEvent::InvalidSession => {
                    return Err(TransportError::Receive("gateway invalidated the session".to_owned()));
                }
                other => debug!(event = ?other, "ignoring gateway event"),
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        match session.socket.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use ticketdesk_core::config::AppConfig;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{accept_async, WebSocketStream};

    use super::{
        decode_frame, heartbeat_payload, identify_payload, is_fatal_close, presence_payload,
        GatewayEvent, WebSocketTransport,
    };
    use crate::interactions::InteractionKind;
    use crate::runner::{GatewayTransport, TransportError};

    fn interaction_create(sequence: u64, custom_id: &str) -> Value {
        json!({
            "op": 0,
            "s": sequence,
            "t": "INTERACTION_CREATE",
            "d": {
                "id": "I-77",
                "type": 3,
                "token": "tok",
                "guild_id": "100",
                "channel_id": "C-panel",
                "member": { "user": { "id": "U-1", "username": "alice" }, "roles": [], "permissions": "0" },
                "data": { "custom_id": custom_id, "component_type": 3, "values": ["SynthX"] }
            }
        })
    }

    async fn send(socket: &mut WebSocketStream<TcpStream>, payload: Value) {
        socket.send(Message::Text(payload.to_string())).await.expect("server send");
    }

    async fn receive(socket: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match socket.next().await.expect("client frame").expect("frame") {
                Message::Text(text) => return serde_json::from_str(&text).expect("json frame"),
                _ => continue,
            }
        }
    }

    async fn listen() -> (TcpListener, WebSocketTransport) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let mut config = AppConfig::default().discord;
        config.gateway_url = format!("ws://{}", listener.local_addr().expect("addr"));
        config.bot_token = SecretString::from("bot-token".to_owned());
        (listener, WebSocketTransport::new(&config))
    }

    #[test]
    fn decodes_dispatches_and_control_frames() {
        let (sequence, hello) =
            decode_frame(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
                .expect("hello");
        assert_eq!(sequence, None);
        assert_eq!(hello, GatewayEvent::Hello { heartbeat_interval_ms: 41250 });

        let (sequence, ready) = decode_frame(
            r#"{"op":0,"s":1,"t":"READY","d":{"session_id":"abc","user":{"id":"9","username":"ticketdesk"}}}"#,
        )
        .expect("ready");
        assert_eq!(sequence, Some(1));
        assert_eq!(
            ready,
            GatewayEvent::Ready { session_id: "abc".to_owned(), username: "ticketdesk".to_owned() }
        );

        let (_, event) = decode_frame(&interaction_create(2, "service_select").to_string()).expect("dispatch");
        let GatewayEvent::Interaction(interaction) = event else {
            panic!("expected an interaction, got {event:?}");
        };
        assert!(matches!(interaction.kind(), InteractionKind::ServiceSelected { .. }));

        let (_, broken) =
            decode_frame(r#"{"op":0,"s":3,"t":"INTERACTION_CREATE","d":{"id":"I-1"}}"#).expect("frame");
        assert!(matches!(broken, GatewayEvent::Undecodable(_)));

        assert_eq!(decode_frame(r#"{"op":11}"#).expect("ack").1, GatewayEvent::HeartbeatAck);
        assert_eq!(decode_frame(r#"{"op":7,"d":null}"#).expect("reconnect").1, GatewayEvent::Reconnect);
        assert!(matches!(decode_frame("not json"), Err(TransportError::Receive(_))));
    }

    #[test]
    fn outgoing_payloads_match_the_gateway_shape() {
        let identify = identify_payload("bot-token", 33283);
        assert_eq!(identify["op"], json!(2));
        assert_eq!(identify["d"]["token"], json!("bot-token"));
        assert_eq!(identify["d"]["intents"], json!(33283));

        assert_eq!(
            presence_payload("for tickets"),
            json!({
                "op": 3,
                "d": {
                    "since": null,
                    "activities": [{ "name": "for tickets", "type": 3 }],
                    "status": "online",
                    "afk": false,
                }
            })
        );
        assert_eq!(heartbeat_payload(Some(42)), json!({ "op": 1, "d": 42 }));
        assert_eq!(heartbeat_payload(None), json!({ "op": 1, "d": null }));
    }

    #[test]
    fn authentication_and_intent_closes_are_fatal() {
        assert!(is_fatal_close(4004));
        assert!(is_fatal_close(4014));
        assert!(!is_fatal_close(4000));
        assert!(!is_fatal_close(1001));
    }

    #[tokio::test]
    async fn handshake_sets_presence_and_delivers_interactions() {
        let (listener, transport) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = accept_async(stream).await.expect("handshake");

            send(&mut socket, json!({ "op": 10, "d": { "heartbeat_interval": 200 } })).await;
            let identify = receive(&mut socket).await;
            send(
                &mut socket,
                json!({ "op": 0, "s": 1, "t": "READY", "d": { "session_id": "S-1", "user": { "username": "bot" } } }),
            )
            .await;
            let presence = receive(&mut socket).await;
            let heartbeat = receive(&mut socket).await;
            send(&mut socket, json!({ "op": 11 })).await;
            send(&mut socket, interaction_create(2, "service_select")).await;
            send(&mut socket, json!({ "op": 7, "d": null })).await;
            (identify, presence, heartbeat, socket)
        });

        transport.connect().await.expect("connect");
        let interaction = transport.next_interaction().await.expect("receive").expect("interaction");
        assert_eq!(interaction.id, "I-77");
        assert_eq!(interaction.channel_id.0, "C-panel");

        let error = transport.next_interaction().await.expect_err("reconnect request");
        assert!(matches!(error, TransportError::Receive(_)));

        let (identify, presence, heartbeat, _socket) = server.await.expect("server task");
        assert_eq!(identify["op"], json!(2));
        assert_eq!(identify["d"]["token"], json!("bot-token"));
        assert_eq!(presence["d"]["activities"][0], json!({ "name": "for tickets", "type": 3 }));
        assert_eq!(heartbeat, json!({ "op": 1, "d": 1 }));

        transport.disconnect().await.expect("disconnect");
    }

    #[tokio::test]
    async fn rejected_tokens_are_not_retried() {
        let (listener, transport) = listen().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = accept_async(stream).await.expect("handshake");
            send(&mut socket, json!({ "op": 10, "d": { "heartbeat_interval": 45000 } })).await;
            receive(&mut socket).await;
            socket
                .close(Some(CloseFrame {
                    code: CloseCode::from(4004),
                    reason: "Authentication failed.".into(),
                }))
                .await
                .expect("close");
        });

        let error = transport.connect().await.expect_err("bad token");
        assert!(
            matches!(&error, TransportError::Rejected(message) if message.contains("4004")),
            "unexpected error: {error:?}"
        );
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn reading_before_connect_fails() {
        let (_listener, transport) = listen().await;
        let error = transport.next_interaction().await.expect_err("not connected");
        assert!(matches!(error, TransportError::Receive(_)));
        transport.disconnect().await.expect("disconnecting an idle transport is a no-op");
    }
}
