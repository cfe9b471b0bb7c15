//! Core data types for captured WebSocket messages
//!
//! - `Message`: one captured frame, either a preview or fully hydrated
//! - `MessageKey`: composite primary key (channel, message)
//! - `NewMessage`: what the producer hands to the store before an id exists
//! - `Direction` and `Payload`: classification and content

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite primary key of a captured message
///
/// Message ids are strictly increasing within a channel and are assigned
/// by the store, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageKey {
    pub channel_id: u32,
    pub message_id: u32,
}

impl MessageKey {
    pub fn new(channel_id: u32, message_id: u32) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.channel_id, self.message_id)
    }
}

/// Which side of the connection sent the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Client to server
    Outgoing,
    /// Server to client
    Incoming,
}

impl Direction {
    pub fn is_outgoing(&self) -> bool {
        matches!(self, Direction::Outgoing)
    }

    pub fn from_outgoing(outgoing: bool) -> Self {
        if outgoing {
            Direction::Outgoing
        } else {
            Direction::Incoming
        }
    }

    /// Arrow used by text renderings of the direction column
    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Outgoing => "→",
            Direction::Incoming => "←",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => write!(f, "outgoing"),
            Direction::Incoming => write!(f, "incoming"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Ok(Direction::Outgoing),
            "incoming" | "in" => Ok(Direction::Incoming),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// WebSocket opcodes (RFC 6455 §5.2)
pub mod opcode {
    pub const CONTINUATION: u8 = 0x0;
    pub const TEXT: u8 = 0x1;
    pub const BINARY: u8 = 0x2;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;

    /// Human-readable opcode name, as shown in the opcode column
    pub fn name(opcode: u8) -> &'static str {
        match opcode {
            CONTINUATION => "CONTINUATION",
            TEXT => "TEXT",
            BINARY => "BINARY",
            CLOSE => "CLOSE",
            PING => "PING",
            PONG => "PONG",
            _ => "UNKNOWN",
        }
    }
}

/// Frame content, either as sent or as a bounded preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Length of this payload in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Binary(_) => None,
        }
    }
}

/// A captured message
///
/// Rows loaded by a paged view carry a preview payload; the full payload
/// comes from a point lookup. `payload_length` always describes the full
/// payload, so `is_preview` can tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel_id: u32,
    pub message_id: u32,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub direction: Direction,
    pub opcode: u8,
    pub payload: Payload,
    /// Full payload length in bytes
    pub payload_length: u64,
}

impl Message {
    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.channel_id, self.message_id)
    }

    /// True when `payload` holds fewer bytes than the stored frame
    pub fn is_preview(&self) -> bool {
        (self.payload.len() as u64) < self.payload_length
    }

    pub fn readable_opcode(&self) -> &'static str {
        opcode::name(self.opcode)
    }
}

/// A message as handed to the store by the producer, before it has an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub channel_id: u32,
    pub timestamp: i64,
    pub direction: Direction,
    pub opcode: u8,
    pub payload: Payload,
}

impl NewMessage {
    /// Text frame stamped with the current time
    pub fn text(channel_id: u32, direction: Direction, text: impl Into<String>) -> Self {
        Self {
            channel_id,
            timestamp: Utc::now().timestamp_millis(),
            direction,
            opcode: opcode::TEXT,
            payload: Payload::Text(text.into()),
        }
    }

    /// Binary frame stamped with the current time
    pub fn binary(channel_id: u32, direction: Direction, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            channel_id,
            timestamp: Utc::now().timestamp_millis(),
            direction,
            opcode: opcode::BINARY,
            payload: Payload::Binary(bytes.into()),
        }
    }

    /// Builder: override the opcode (ping, pong, close, ...)
    pub fn opcode(mut self, opcode: u8) -> Self {
        self.opcode = opcode;
        self
    }

    /// Builder: set timestamp
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the store-assigned id
    pub fn into_message(self, message_id: u32) -> Message {
        let payload_length = self.payload.len() as u64;
        Message {
            channel_id: self.channel_id,
            message_id,
            timestamp: self.timestamp,
            direction: self.direction,
            opcode: self.opcode,
            payload: self.payload,
            payload_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(MessageKey::new(3, 17).to_string(), "3.17");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("out".parse::<Direction>().unwrap(), Direction::Outgoing);
        assert_eq!("Incoming".parse::<Direction>().unwrap(), Direction::Incoming);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_into_message_sets_length() {
        let msg = NewMessage::text(1, Direction::Outgoing, "hello").into_message(4);
        assert_eq!(msg.key(), MessageKey::new(1, 4));
        assert_eq!(msg.payload_length, 5);
        assert!(!msg.is_preview());
        assert_eq!(msg.readable_opcode(), "TEXT");
    }

    #[test]
    fn test_preview_detection() {
        let mut msg = NewMessage::binary(1, Direction::Incoming, vec![0u8; 64]).into_message(1);
        msg.payload = Payload::Binary(vec![0u8; 10]);
        assert!(msg.is_preview());
    }

    #[test]
    fn test_message_serialization() {
        let msg = NewMessage::text(2, Direction::Incoming, "{}")
            .timestamp(1_699_000_000_000)
            .into_message(1);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"direction\":\"incoming\""));
        let restored: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, msg);
    }
}
