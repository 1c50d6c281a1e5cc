use std::time::Duration;

use datachan_codec::CodecError;
use datachan_transport::TransportError;

/// Errors that can occur in dispatcher and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// The stream id is already bound to a live channel.
    #[error("stream id {0} already bound to a channel")]
    DuplicateStreamId(u16),

    /// No channel is registered for the stream id.
    #[error("no channel registered for stream id {0}")]
    UnknownStreamId(u16),

    /// A message could not be decoded or encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The channel is closed.
    #[error("channel {0} is closed")]
    ChannelClosed(u16),

    /// The channel's inbound queue is full.
    #[error("channel {0} inbound queue full")]
    InboxFull(u16),

    /// Receive timed out.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, StackError>;
