//! Data channel dispatcher and channel registry.
//!
//! One [`Dispatcher`] serves one association. It is bound as the
//! association's inbound handler and sees every message in transport order:
//!
//! - an open request creates a Remote channel on the message's stream id,
//!   unless that id is already bound
//! - a user message is queued on the channel bound to its stream id
//! - anything malformed or unroutable is dropped, logged and counted
//!
//! Local channels are created with [`Dispatcher::create_channel`] and
//! announced with [`DataChannel::announce`]. Both creation paths insert
//! through the same [`ChannelRegistry`] check-and-insert, so a local create
//! racing a remote open for the same stream id has exactly one winner.
//!
//! Inbound user messages never run application code on the delivery path.
//! Each channel owns a bounded queue that its consumer drains with
//! [`DataChannel::recv`] (or `recv_async` with the `async` feature) or a
//! listener thread from [`DataChannel::spawn_listener`].
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use datachan_codec::{ChannelType, UserMessage};
//! use datachan_stack::Dispatcher;
//! use datachan_transport::MemoryAssociation;
//!
//! let (a, b) = MemoryAssociation::pair();
//! let (a, b) = (Arc::new(a), Arc::new(b));
//! let left = Dispatcher::new(a.clone());
//! let right = Dispatcher::new(b.clone());
//! left.bind(a.as_ref()).unwrap();
//! right.bind(b.as_ref()).unwrap();
//!
//! let channel = left.create_channel(ChannelType::Reliable, 0, 0, 1, "chat").unwrap();
//! channel.announce().unwrap();
//! channel.send_text("hello").unwrap();
//!
//! let remote = right.channel(1).unwrap();
//! assert_eq!(remote.label(), "chat");
//! assert_eq!(
//!     remote.recv_timeout(Duration::from_secs(1)).unwrap(),
//!     UserMessage::from("hello")
//! );
//! a.close();
//! ```

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ChannelParameters, ChannelState, DataChannel, Origin, Reliability};
pub use config::{StackConfig, DEFAULT_INBOX_CAPACITY};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use dispatcher::Dispatcher;
pub use error::{Result, StackError};
pub use events::{ChannelEvent, MessageListener, NoopListener, StackListener};
pub use registry::ChannelRegistry;
