//! Socket.IO v4 packets carried over an Engine.IO v4 WebSocket.
//!
//! Each text frame starts with the Engine.IO type digit (`0` open, `1` close,
//! `2` ping, `3` pong, `4` message). Messages carry a Socket.IO packet whose
//! own type digit follows (`0` connect, `1` disconnect, `2` event,
//! `4` connect error), so an event looks like `42["join","d1"]`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::api::models::Message;
use crate::error::{ChatError, Result};

pub const EVENT_JOIN: &str = "join";
pub const EVENT_SEND_MESSAGE: &str = "sendMessage";
pub const EVENT_RECEIVE_MESSAGE: &str = "receiveMessage";

pub const PONG: &str = "3";

/// A named server event with its first argument.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    pub event: String,
    pub data: Value,
}

impl IncomingEvent {
    /// The message carried by a `receiveMessage` event, if this is one and it parses.
    pub fn into_message(self) -> Option<Message> {
        if self.event != EVENT_RECEIVE_MESSAGE {
            return None;
        }
        Message::from_json(&self.data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Value),
    Close,
    Ping,
    Pong,
    Connect,
    ConnectError(String),
    Disconnect,
    Event(IncomingEvent),
    Unknown(String),
}

pub fn decode_packet(text: &str) -> Packet {
    let unknown = || Packet::Unknown(text.to_string());
    let Some(kind) = text.chars().next() else {
        return unknown();
    };
    let rest = &text[kind.len_utf8()..];
    match kind {
        '0' => Packet::Open(serde_json::from_str(rest).unwrap_or(Value::Null)),
        '1' => Packet::Close,
        '2' => Packet::Ping,
        '3' => Packet::Pong,
        '4' => decode_socket_packet(rest).unwrap_or_else(unknown),
        _ => unknown(),
    }
}

fn decode_socket_packet(text: &str) -> Option<Packet> {
    let kind = text.chars().next()?;
    let rest = &text[kind.len_utf8()..];
    match kind {
        '0' => Some(Packet::Connect),
        '1' => Some(Packet::Disconnect),
        '2' => {
            // Optional "/nsp," prefix and ack id sit before the JSON array.
            let start = rest.find('[')?;
            let args: Vec<Value> = serde_json::from_str(&rest[start..]).ok()?;
            let mut args = args.into_iter();
            let event = args.next()?.as_str()?.to_string();
            let data = args.next().unwrap_or(Value::Null);
            Some(Packet::Event(IncomingEvent { event, data }))
        }
        '4' => Some(Packet::ConnectError(rest.to_string())),
        _ => None,
    }
}

/// Socket.IO CONNECT for the default namespace, with the token as auth payload.
pub fn connect_packet(token: Option<&str>) -> String {
    match token.filter(|t| !t.is_empty()) {
        Some(t) => format!("40{}", json!({ "token": t })),
        None => "40".to_string(),
    }
}

/// Turn a server address (`http://host:4000`) into the Engine.IO WebSocket URL.
pub fn socket_io_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base.trim()).map_err(|e| ChatError::Config(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ChatError::Config(format!("unsupported socket scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| ChatError::Config(format!("cannot use scheme '{}'", scheme)))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

/// Client to server events.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingEvent {
    Join(String),
    SendMessage(OutgoingMessage),
}

impl OutgoingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutgoingEvent::Join(_) => EVENT_JOIN,
            OutgoingEvent::SendMessage(_) => EVENT_SEND_MESSAGE,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let data = match self {
            OutgoingEvent::Join(room) => Value::String(room.clone()),
            OutgoingEvent::SendMessage(msg) => {
                serde_json::to_value(msg).map_err(|e| ChatError::Decode(e.to_string()))?
            }
        };
        Ok(format!("42{}", json!([self.name(), data])))
    }
}

/// Payload of a `sendMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for OutgoingMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id.clone(),
            from: msg.sender.clone(),
            to: msg.receiver.clone(),
            content: msg.content.clone(),
            created_at: msg.created_at,
        }
    }
}
