//! Data channel message codec.
//!
//! Classifies an association message by its payload protocol identifier and
//! decodes it into either a control message (channel open / ack) or a user
//! message (text / binary). Serializes both directions.

pub mod codec;
pub mod error;
pub mod message;
pub mod ppid;

pub use codec::{DcepCodec, MessageCodec};
pub use error::{CodecError, Result};
pub use message::{
    ChannelType, ControlMessage, OpenChannelMessage, ParsedMessage, UserMessage,
    MESSAGE_TYPE_ACK, MESSAGE_TYPE_OPEN,
};
