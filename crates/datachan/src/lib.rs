//! Data channels multiplexed over one message-oriented association.
//!
//! datachan demultiplexes an association's inbound messages onto logical
//! channels keyed by stream id, handles the in-band open handshake that lets
//! either peer create a channel, and routes user messages to per-channel
//! queues.
//!
//! # Crate Structure
//!
//! - [`transport`]: Association endpoint contracts and an in-memory pair
//! - [`frame`]: Record framing to run an association over a byte stream
//! - [`codec`]: Control and user message encoding
//! - [`stack`]: Dispatcher, channel registry and channel lifecycle

/// Re-export transport types.
pub mod transport {
    pub use datachan_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use datachan_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use datachan_codec::*;
}

/// Re-export dispatcher and channel types.
pub mod stack {
    pub use datachan_stack::*;
}
