use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{CodecError, Result};
use crate::message::{
    ChannelType, ControlMessage, OpenChannelMessage, ParsedMessage, UserMessage,
    MESSAGE_TYPE_ACK, MESSAGE_TYPE_OPEN,
};
use crate::ppid;

/// Fixed part of an open message: type (1) + channel type (1) + priority (2)
/// + reliability (4) + label length (2) + protocol length (2) = 12 bytes.
pub const OPEN_HEADER_SIZE: usize = 12;

/// Parses and serializes association messages.
pub trait MessageCodec: Send + Sync {
    /// Classify and decode one message by its payload protocol identifier.
    fn parse(&self, payload: &Bytes, ppid: u32) -> Result<ParsedMessage>;

    /// Serialize a control message. It is always sent with [`ppid::CONTROL`].
    fn encode_control(&self, message: &ControlMessage) -> Result<Bytes>;

    /// Serialize a user message, returning the payload protocol identifier to send it with.
    fn encode_user(&self, message: &UserMessage) -> (u32, Bytes);
}

/// Codec for the standard data channel establishment layout.
///
/// Open message wire format (all integers big-endian):
/// ```text
/// ┌──────┬─────────┬──────────┬─────────────┬───────────┬───────────┬───────┬──────────┐
/// │ 0x03 │ Channel │ Priority │ Reliability │ Label len │ Proto len │ Label │ Protocol │
/// │ (1B) │ type 1B │ (2B)     │ param (4B)  │ (2B)      │ (2B)      │       │          │
/// └──────┴─────────┴──────────┴─────────────┴───────────┴───────────┴───────┴──────────┘
/// ```
/// Ack is the single byte `0x02`. Empty user messages travel as one filler
/// byte under their dedicated identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcepCodec;

impl DcepCodec {
    /// Create a codec.
    pub fn new() -> Self {
        Self
    }
}

impl MessageCodec for DcepCodec {
    fn parse(&self, payload: &Bytes, ppid: u32) -> Result<ParsedMessage> {
        trace!(ppid, size = payload.len(), "parsing message");
        match ppid {
            ppid::CONTROL => parse_control(payload).map(ParsedMessage::Control),
            ppid::STRING => {
                let text = std::str::from_utf8(payload)
                    .map_err(|_| CodecError::InvalidUtf8("text message"))?;
                Ok(ParsedMessage::User(UserMessage::Text(text.to_string())))
            }
            ppid::BINARY => Ok(ParsedMessage::User(UserMessage::Binary(payload.clone()))),
            ppid::STRING_EMPTY => Ok(ParsedMessage::User(UserMessage::Text(String::new()))),
            ppid::BINARY_EMPTY => Ok(ParsedMessage::User(UserMessage::Binary(Bytes::new()))),
            other => Err(CodecError::UnknownPayloadProtocol(other)),
        }
    }

    fn encode_control(&self, message: &ControlMessage) -> Result<Bytes> {
        match message {
            ControlMessage::Ack => Ok(Bytes::from_static(&[MESSAGE_TYPE_ACK])),
            ControlMessage::Open(open) => encode_open(open),
        }
    }

    fn encode_user(&self, message: &UserMessage) -> (u32, Bytes) {
        match message {
            UserMessage::Text(text) if text.is_empty() => {
                (ppid::STRING_EMPTY, Bytes::from_static(&[0]))
            }
            UserMessage::Text(text) => (ppid::STRING, Bytes::copy_from_slice(text.as_bytes())),
            UserMessage::Binary(data) if data.is_empty() => {
                (ppid::BINARY_EMPTY, Bytes::from_static(&[0]))
            }
            UserMessage::Binary(data) => (ppid::BINARY, data.clone()),
        }
    }
}

fn parse_control(payload: &[u8]) -> Result<ControlMessage> {
    let Some(&message_type) = payload.first() else {
        return Err(CodecError::Empty);
    };

    match message_type {
        MESSAGE_TYPE_ACK => Ok(ControlMessage::Ack),
        MESSAGE_TYPE_OPEN => parse_open(payload).map(ControlMessage::Open),
        other => Err(CodecError::UnknownMessageType(other)),
    }
}

fn parse_open(payload: &[u8]) -> Result<OpenChannelMessage> {
    if payload.len() < OPEN_HEADER_SIZE {
        return Err(CodecError::Truncated {
            needed: OPEN_HEADER_SIZE,
            available: payload.len(),
        });
    }

    let mut header = &payload[1..OPEN_HEADER_SIZE];
    let channel_type = ChannelType::from_wire(header.get_u8())?;
    let priority = header.get_u16();
    let reliability_parameter = header.get_u32();
    let label_len = header.get_u16() as usize;
    let protocol_len = header.get_u16() as usize;

    let needed = OPEN_HEADER_SIZE + label_len + protocol_len;
    if payload.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            available: payload.len(),
        });
    }

    let label_end = OPEN_HEADER_SIZE + label_len;
    let label = std::str::from_utf8(&payload[OPEN_HEADER_SIZE..label_end])
        .map_err(|_| CodecError::InvalidUtf8("label"))?;
    let protocol = std::str::from_utf8(&payload[label_end..needed])
        .map_err(|_| CodecError::InvalidUtf8("protocol"))?;

    Ok(OpenChannelMessage {
        channel_type,
        priority,
        reliability_parameter,
        label: label.to_string(),
        protocol: protocol.to_string(),
    })
}

fn encode_open(open: &OpenChannelMessage) -> Result<Bytes> {
    let label_len = checked_field_len("label", &open.label)?;
    let protocol_len = checked_field_len("protocol", &open.protocol)?;

    let mut dst = BytesMut::with_capacity(OPEN_HEADER_SIZE + open.label.len() + open.protocol.len());
    dst.put_u8(MESSAGE_TYPE_OPEN);
    dst.put_u8(open.channel_type.as_wire());
    dst.put_u16(open.priority);
    dst.put_u32(open.reliability_parameter);
    dst.put_u16(label_len);
    dst.put_u16(protocol_len);
    dst.put_slice(open.label.as_bytes());
    dst.put_slice(open.protocol.as_bytes());
    Ok(dst.freeze())
}

fn checked_field_len(field: &'static str, value: &str) -> Result<u16> {
    u16::try_from(value.len()).map_err(|_| CodecError::FieldTooLong {
        field,
        len: value.len(),
        max: u16::MAX as usize,
    })
}
