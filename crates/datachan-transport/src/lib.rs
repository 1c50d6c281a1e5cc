//! Association endpoint contracts.
//!
//! An association is one partially-reliable, message-oriented transport
//! session carrying many independently addressed streams. This crate defines
//! the two directions of that boundary:
//! - [`TransportEndpoint`] accepts outbound messages addressed to a stream id
//! - [`DeliveryHandler`] receives inbound messages, one call per message
//!
//! The delivery, ordering and retransmission machinery lives behind these
//! traits. [`MemoryAssociation`] links two endpoints in-process.

pub mod error;
pub mod memory;
pub mod sequence;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryAssociation;
pub use sequence::Sequencer;
pub use traits::{
    Association, DeliveryFlags, DeliveryHandler, InboundMessage, TransportEndpoint,
};
