/// Errors that can occur while decoding or encoding channel messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A control message had no bytes at all.
    #[error("empty control message")]
    Empty,

    /// The payload protocol identifier is not one this codec handles.
    #[error("unsupported payload protocol identifier {0}")]
    UnknownPayloadProtocol(u32),

    /// The control message type byte is not recognized.
    #[error("unknown control message type 0x{0:02x}")]
    UnknownMessageType(u8),

    /// The channel type byte of an open message is not recognized.
    #[error("unknown channel type 0x{0:02x}")]
    UnknownChannelType(u8),

    /// The message ended before all declared fields were read.
    #[error("truncated message (needed {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// A text field or text message is not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A label or protocol is longer than its 16-bit length field allows.
    #[error("{field} too long ({len} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;
