//! Fakes shared by the unit tests of this crate.

use bytes::Bytes;
use datachan_transport::{DeliveryFlags, TransportEndpoint};
use parking_lot::Mutex;

use crate::events::{ChannelEvent, StackListener};

#[derive(Debug, Clone)]
pub(crate) struct SentMessage {
    pub stream_id: u16,
    pub ppid: u32,
    pub payload: Bytes,
    pub flags: DeliveryFlags,
}

/// Endpoint that records every outbound message and always succeeds.
#[derive(Debug, Default)]
pub(crate) struct RecordingEndpoint {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingEndpoint {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

impl TransportEndpoint for RecordingEndpoint {
    fn send(
        &self,
        stream_id: u16,
        ppid: u32,
        payload: Bytes,
        flags: DeliveryFlags,
    ) -> datachan_transport::Result<()> {
        self.sent.lock().push(SentMessage {
            stream_id,
            ppid,
            payload,
            flags,
        });
        Ok(())
    }
}

/// Listener that keeps a printable record of every event.
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<ChannelEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().clone()
    }
}

impl StackListener for RecordingListener {
    fn on_event(&self, event: &ChannelEvent) {
        self.events.lock().push(event.clone());
    }
}
