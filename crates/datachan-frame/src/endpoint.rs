use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use datachan_transport::{
    DeliveryFlags, DeliveryHandler, InboundMessage, Sequencer, TransportEndpoint, TransportError,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::reader::RecordReader;
use crate::writer::RecordWriter;

/// Outbound association endpoint over a byte stream.
///
/// Each [`TransportEndpoint::send`] writes one record. Writes from
/// concurrent senders are serialized so records never interleave.
pub struct StreamEndpoint<W> {
    writer: Mutex<RecordWriter<W>>,
    closed: AtomicBool,
}

impl<W: Write + Send> StreamEndpoint<W> {
    /// Wrap a record writer.
    pub fn new(writer: RecordWriter<W>) -> Self {
        Self {
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    /// Stop accepting outbound messages.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`StreamEndpoint::close`] was called or a write hit EOF.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<W: Write + Send> TransportEndpoint for StreamEndpoint<W> {
    fn send(
        &self,
        stream_id: u16,
        ppid: u32,
        payload: Bytes,
        flags: DeliveryFlags,
    ) -> datachan_transport::Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let result = self
            .writer
            .lock()
            .send(stream_id, ppid, flags, payload.as_ref());
        if let Err(FrameError::ConnectionClosed) = result {
            self.close();
        }
        result.map_err(TransportError::from)
    }
}

/// Read records until the stream ends, handing each one to `handler`.
///
/// Sequence metadata is reconstructed locally: records arrive in send order,
/// so numbering them on receipt reproduces the sender's SSNs and TSNs.
/// Returns the number of delivered messages on clean EOF.
pub fn pump<R: Read>(reader: &mut RecordReader<R>, handler: &dyn DeliveryHandler) -> Result<u64> {
    let mut sequencer = Sequencer::new();
    let mut delivered = 0u64;

    loop {
        let record = match reader.read_record() {
            Ok(record) => record,
            Err(FrameError::ConnectionClosed) => {
                debug!(delivered, "record stream closed");
                return Ok(delivered);
            }
            Err(err) => return Err(err),
        };

        let (ssn, tsn) = sequencer.assign(record.stream_id, record.flags);
        trace!(
            stream_id = record.stream_id,
            ppid = record.ppid,
            ssn,
            tsn,
            size = record.payload.len(),
            "record received"
        );
        handler.handle(InboundMessage {
            stream_id: record.stream_id,
            ppid: record.ppid,
            ssn,
            tsn,
            flags: record.flags,
            payload: record.payload,
        });
        delivered += 1;
    }
}
