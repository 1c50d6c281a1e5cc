use std::fmt;

use bytes::Bytes;

use crate::error::{CodecError, Result};

/// Control message type: channel open request.
pub const MESSAGE_TYPE_OPEN: u8 = 0x03;
/// Control message type: channel open acknowledgement.
pub const MESSAGE_TYPE_ACK: u8 = 0x02;

/// Delivery semantics requested for a channel.
///
/// The high bit of the wire value selects unordered delivery; the low bits
/// select how the reliability parameter is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelType {
    /// Ordered, retransmitted until delivered.
    Reliable = 0x00,
    /// Ordered, retransmitted at most `reliability_parameter` times.
    PartialReliableRexmit = 0x01,
    /// Ordered, retransmitted for at most `reliability_parameter` ms.
    PartialReliableTimed = 0x02,
    /// Unordered, retransmitted until delivered.
    ReliableUnordered = 0x80,
    /// Unordered, retransmitted at most `reliability_parameter` times.
    PartialReliableRexmitUnordered = 0x81,
    /// Unordered, retransmitted for at most `reliability_parameter` ms.
    PartialReliableTimedUnordered = 0x82,
}

impl ChannelType {
    /// Every channel type, in wire-value order.
    pub const ALL: [ChannelType; 6] = [
        ChannelType::Reliable,
        ChannelType::PartialReliableRexmit,
        ChannelType::PartialReliableTimed,
        ChannelType::ReliableUnordered,
        ChannelType::PartialReliableRexmitUnordered,
        ChannelType::PartialReliableTimedUnordered,
    ];

    /// Decode the one-byte wire enumerator.
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Reliable),
            0x01 => Ok(Self::PartialReliableRexmit),
            0x02 => Ok(Self::PartialReliableTimed),
            0x80 => Ok(Self::ReliableUnordered),
            0x81 => Ok(Self::PartialReliableRexmitUnordered),
            0x82 => Ok(Self::PartialReliableTimedUnordered),
            other => Err(CodecError::UnknownChannelType(other)),
        }
    }

    /// The one-byte wire enumerator.
    pub fn as_wire(self) -> u8 {
        self as u8
    }

    /// Returns false for the unordered family.
    pub fn is_ordered(self) -> bool {
        self.as_wire() & 0x80 == 0
    }

    /// Returns true if messages may be abandoned after a retransmission budget.
    pub fn is_rexmit_limited(self) -> bool {
        matches!(
            self,
            Self::PartialReliableRexmit | Self::PartialReliableRexmitUnordered
        )
    }

    /// Returns true if messages may be abandoned after a lifetime budget.
    pub fn is_lifetime_limited(self) -> bool {
        matches!(
            self,
            Self::PartialReliableTimed | Self::PartialReliableTimedUnordered
        )
    }

    /// Stable lowercase name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Reliable => "reliable",
            Self::PartialReliableRexmit => "rexmit",
            Self::PartialReliableTimed => "timed",
            Self::ReliableUnordered => "reliable-unordered",
            Self::PartialReliableRexmitUnordered => "rexmit-unordered",
            Self::PartialReliableTimedUnordered => "timed-unordered",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded channel open request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelMessage {
    /// Requested delivery semantics.
    pub channel_type: ChannelType,
    /// Scheduling priority; larger means lower priority.
    pub priority: u16,
    /// Retransmission count or lifetime in ms, depending on `channel_type`.
    pub reliability_parameter: u32,
    /// Channel label.
    pub label: String,
    /// Sub-protocol name; empty when unspecified.
    pub protocol: String,
}

/// In-band channel lifecycle message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Remote side requests a new channel on the envelope's stream.
    Open(OpenChannelMessage),
    /// Remote side acknowledges an open request.
    Ack,
}

/// Application data carried on an established channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserMessage {
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Binary(Bytes),
}

impl UserMessage {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    /// Returns true for a zero-length message.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data.as_ref(),
        }
    }

    /// Returns true for text messages.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl From<&str> for UserMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for UserMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for UserMessage {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for UserMessage {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(data))
    }
}

/// Result of classifying one association message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    /// Channel lifecycle message.
    Control(ControlMessage),
    /// Application data.
    User(UserMessage),
}
