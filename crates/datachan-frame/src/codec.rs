use bytes::{Buf, BufMut, Bytes, BytesMut};
use datachan_transport::DeliveryFlags;

use crate::error::{FrameError, Result};

/// Record header: magic (2) + length (4) + stream (2) + ppid (4) + flags (1) = 13 bytes.
pub const HEADER_SIZE: usize = 13;

/// Magic bytes: "DC" (0x44 0x43).
pub const MAGIC: [u8; 2] = [0x44, 0x43];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One association message as it travels over a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stream id the message is addressed to.
    pub stream_id: u16,
    /// Payload protocol identifier.
    pub ppid: u32,
    /// Delivery flags.
    pub flags: DeliveryFlags,
    /// The message payload.
    pub payload: Bytes,
}

impl Record {
    /// Create a new ordered record.
    pub fn new(stream_id: u16, ppid: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            ppid,
            flags: DeliveryFlags::NONE,
            payload: payload.into(),
        }
    }

    /// The total wire size of this record (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a record into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────┬──────────┬───────────┬─────────┬────────────────┐
/// │ Magic (2B) │ Length    │ Stream   │ PPID      │ Flags   │ Payload        │
/// │ 0x44 0x43  │ (4B LE)   │ (2B LE)  │ (4B LE)   │ (1B)    │ (Length bytes) │
/// │ "DC"       │           │          │           │         │                │
/// └────────────┴───────────┴──────────┴───────────┴─────────┴────────────────┘
/// ```
pub fn encode_record(
    stream_id: u16,
    ppid: u32,
    flags: DeliveryFlags,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u16_le(stream_id);
    dst.put_u32_le(ppid);
    dst.put_u8(flags.bits());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a record from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete record yet.
/// On success, consumes the record bytes from the buffer.
pub fn decode_record(src: &mut BytesMut, max_payload: usize) -> Result<Option<Record>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let payload_len = header.get_u32_le() as usize;
    let stream_id = header.get_u16_le();
    let ppid = header.get_u32_le();
    let flags = DeliveryFlags::from_bits(header.get_u8());

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Record {
        stream_id,
        ppid,
        flags,
        payload,
    }))
}

/// Configuration for record framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
