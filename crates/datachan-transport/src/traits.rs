use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// Per-message delivery flags carried alongside the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeliveryFlags(u8);

impl DeliveryFlags {
    /// No flags set: ordered delivery.
    pub const NONE: Self = Self(0);
    /// The message was sent (or is to be sent) outside stream ordering.
    pub const UNORDERED: Self = Self(0x01);

    /// Build flags from their wire representation. Unknown bits are kept.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Wire representation of these flags.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if the unordered bit is set.
    pub const fn is_unordered(self) -> bool {
        self.0 & Self::UNORDERED.0 != 0
    }

    /// Combine two flag sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// One inbound application message, as handed over by the association.
///
/// The association has already reassembled the message and applied its
/// ordering rules; `ssn` and `tsn` are informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Stream the message arrived on.
    pub stream_id: u16,
    /// Payload protocol identifier attached by the sender.
    pub ppid: u32,
    /// Stream sequence number (meaningless for unordered messages).
    pub ssn: u16,
    /// Transmission sequence number of the first fragment.
    pub tsn: u32,
    /// Delivery flags.
    pub flags: DeliveryFlags,
    /// Message body.
    pub payload: Bytes,
}

impl InboundMessage {
    /// Create an ordered message with zeroed sequence metadata.
    pub fn new(stream_id: u16, ppid: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            ppid,
            ssn: 0,
            tsn: 0,
            flags: DeliveryFlags::NONE,
            payload: payload.into(),
        }
    }
}

/// Outbound side of an association.
pub trait TransportEndpoint: Send + Sync {
    /// Queue one message for transmission on `stream_id`.
    fn send(&self, stream_id: u16, ppid: u32, payload: Bytes, flags: DeliveryFlags) -> Result<()>;
}

/// An association that pushes inbound messages to a bound handler.
pub trait Association: TransportEndpoint {
    /// Bind the handler receiving every inbound message.
    fn set_handler(&self, handler: Arc<dyn DeliveryHandler>) -> Result<()>;
}

/// Inbound side of an association.
///
/// The association calls [`DeliveryHandler::handle`] once per received
/// message, from its own delivery context, in the order it produces them.
/// Implementations must return promptly: every stream of the association
/// shares the same delivery path.
pub trait DeliveryHandler: Send + Sync {
    /// Handle one inbound message.
    fn handle(&self, message: InboundMessage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_unordered_bit() {
        assert!(!DeliveryFlags::NONE.is_unordered());
        assert!(DeliveryFlags::UNORDERED.is_unordered());
        assert!(DeliveryFlags::from_bits(0x81).is_unordered());
        assert_eq!(DeliveryFlags::from_bits(0x80).bits(), 0x80);
    }

    #[test]
    fn flags_union_keeps_unknown_bits() {
        let flags = DeliveryFlags::from_bits(0x40).union(DeliveryFlags::UNORDERED);
        assert_eq!(flags.bits(), 0x41);
    }

    #[test]
    fn inbound_message_defaults() {
        let msg = InboundMessage::new(3, 51, "hi");
        assert_eq!(msg.stream_id, 3);
        assert_eq!(msg.ppid, 51);
        assert_eq!(msg.flags, DeliveryFlags::NONE);
        assert_eq!(msg.payload.as_ref(), b"hi");
    }
}
