use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::sequence::Sequencer;
use crate::traits::{
    Association, DeliveryFlags, DeliveryHandler, InboundMessage, TransportEndpoint,
};

/// One end of an in-process association.
///
/// [`MemoryAssociation::pair`] links two ends: a message sent on one end is
/// delivered synchronously to the handler bound on the other, inside the
/// sender's call. Sequence metadata is assigned per direction: TSNs increase
/// per message, SSNs increase per ordered message on each stream.
///
/// Messages sent from a single thread arrive in send order. Concurrent
/// senders on the same stream are not serialized against each other.
pub struct MemoryAssociation {
    link: Arc<Link>,
    side: usize,
}

struct Link {
    ends: [End; 2],
    closed: AtomicBool,
}

#[derive(Default)]
struct End {
    handler: Mutex<Option<Arc<dyn DeliveryHandler>>>,
    outbound: Mutex<Sequencer>,
}

impl MemoryAssociation {
    /// Create two linked ends of a fresh association.
    pub fn pair() -> (Self, Self) {
        let link = Arc::new(Link {
            ends: [End::default(), End::default()],
            closed: AtomicBool::new(false),
        });
        (
            Self {
                link: Arc::clone(&link),
                side: 0,
            },
            Self { link, side: 1 },
        )
    }

    /// Returns true if a handler is bound on this end.
    pub fn has_handler(&self) -> bool {
        self.link.ends[self.side].handler.lock().is_some()
    }

    /// Tear down the association for both ends.
    ///
    /// Bound handlers are released, so a handler that holds this association
    /// does not keep it alive.
    pub fn close(&self) {
        if !self.link.closed.swap(true, Ordering::SeqCst) {
            for end in &self.link.ends {
                end.handler.lock().take();
            }
            debug!(side = self.side, "memory association closed");
        }
    }

    /// Returns true once either end has closed the association.
    pub fn is_closed(&self) -> bool {
        self.link.closed.load(Ordering::SeqCst)
    }

    fn peer(&self) -> &End {
        &self.link.ends[1 - self.side]
    }
}

impl Association for MemoryAssociation {
    /// Bind the handler that receives every message the peer end sends.
    ///
    /// An end accepts exactly one handler for its lifetime.
    fn set_handler(&self, handler: Arc<dyn DeliveryHandler>) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut slot = self.link.ends[self.side].handler.lock();
        if slot.is_some() {
            return Err(TransportError::HandlerAlreadyBound);
        }
        *slot = Some(handler);
        Ok(())
    }
}

impl TransportEndpoint for MemoryAssociation {
    fn send(&self, stream_id: u16, ppid: u32, payload: Bytes, flags: DeliveryFlags) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let (ssn, tsn) = self.link.ends[self.side]
            .outbound
            .lock()
            .assign(stream_id, flags);

        // Clone out of the slot so the handler runs without the lock held;
        // it may well send on this association again.
        let handler = self
            .peer()
            .handler
            .lock()
            .clone()
            .ok_or(TransportError::NoHandler)?;

        trace!(stream_id, ppid, ssn, tsn, size = payload.len(), "memory delivery");
        handler.handle(InboundMessage {
            stream_id,
            ppid,
            ssn,
            tsn,
            flags,
            payload,
        });
        Ok(())
    }
}

impl fmt::Debug for MemoryAssociation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAssociation")
            .field("side", &self.side)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<InboundMessage>>,
    }

    impl DeliveryHandler for Recorder {
        fn handle(&self, message: InboundMessage) {
            self.received.lock().push(message);
        }
    }

    #[test]
    fn delivers_to_peer_handler() {
        let (left, right) = MemoryAssociation::pair();
        let recorder = Arc::new(Recorder::default());
        right.set_handler(recorder.clone()).unwrap();

        left.send(4, 51, Bytes::from_static(b"hello"), DeliveryFlags::NONE)
            .unwrap();

        let received = recorder.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].stream_id, 4);
        assert_eq!(received[0].ppid, 51);
        assert_eq!(received[0].payload.as_ref(), b"hello");
    }

    #[test]
    fn ssn_increments_per_stream_and_tsn_per_message() {
        let (left, right) = MemoryAssociation::pair();
        let recorder = Arc::new(Recorder::default());
        right.set_handler(recorder.clone()).unwrap();

        left.send(1, 53, Bytes::from_static(b"a"), DeliveryFlags::NONE)
            .unwrap();
        left.send(2, 53, Bytes::from_static(b"b"), DeliveryFlags::NONE)
            .unwrap();
        left.send(1, 53, Bytes::from_static(b"c"), DeliveryFlags::NONE)
            .unwrap();
        left.send(1, 53, Bytes::from_static(b"d"), DeliveryFlags::UNORDERED)
            .unwrap();

        let received = recorder.received.lock();
        let meta: Vec<(u16, u16, u32)> = received
            .iter()
            .map(|m| (m.stream_id, m.ssn, m.tsn))
            .collect();
        assert_eq!(meta, vec![(1, 0, 0), (2, 0, 1), (1, 1, 2), (1, 0, 3)]);
        assert!(received[3].flags.is_unordered());
    }

    #[test]
    fn second_handler_is_rejected() {
        let (_left, right) = MemoryAssociation::pair();
        right
            .set_handler(Arc::new(Recorder::default()))
            .expect("first bind should succeed");
        let err = right
            .set_handler(Arc::new(Recorder::default()))
            .unwrap_err();
        assert!(matches!(err, TransportError::HandlerAlreadyBound));
        assert!(right.has_handler());
    }

    #[test]
    fn send_without_peer_handler_fails() {
        let (left, _right) = MemoryAssociation::pair();
        let err = left
            .send(1, 51, Bytes::from_static(b"x"), DeliveryFlags::NONE)
            .unwrap_err();
        assert!(matches!(err, TransportError::NoHandler));
    }

    #[test]
    fn close_affects_both_ends() {
        let (left, right) = MemoryAssociation::pair();
        right.set_handler(Arc::new(Recorder::default())).unwrap();
        left.set_handler(Arc::new(Recorder::default())).unwrap();

        right.close();

        assert!(left.is_closed());
        assert!(!left.has_handler());
        assert!(!right.has_handler());
        let err = left
            .send(1, 51, Bytes::from_static(b"x"), DeliveryFlags::NONE)
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn handler_may_reply_inline() {
        struct Echo {
            back: MemoryAssociation,
        }
        impl DeliveryHandler for Echo {
            fn handle(&self, message: InboundMessage) {
                let _ = self.back.send(
                    message.stream_id,
                    message.ppid,
                    message.payload,
                    message.flags,
                );
            }
        }

        let (left, right) = MemoryAssociation::pair();
        let recorder = Arc::new(Recorder::default());
        left.set_handler(recorder.clone()).unwrap();
        right
            .set_handler(Arc::new(Echo {
                back: MemoryAssociation {
                    link: Arc::clone(&right.link),
                    side: right.side,
                },
            }))
            .unwrap();

        left.send(9, 51, Bytes::from_static(b"ping"), DeliveryFlags::NONE)
            .unwrap();

        let received = recorder.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload.as_ref(), b"ping");
    }
}
