//! Record framing for carrying association messages over a byte stream.
//!
//! Every record is framed with:
//! - A 2-byte magic number ("DC") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian stream id
//! - A 4-byte little-endian payload protocol identifier
//! - A 1-byte delivery flags field
//!
//! [`StreamEndpoint`] sends records as a [`TransportEndpoint`] and [`pump`]
//! turns an incoming record stream into [`DeliveryHandler`] calls, so a
//! plain socket can stand in for a real association.
//!
//! [`TransportEndpoint`]: datachan_transport::TransportEndpoint
//! [`DeliveryHandler`]: datachan_transport::DeliveryHandler

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_record, encode_record, FrameConfig, Record, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use endpoint::{pump, StreamEndpoint};
pub use error::{FrameError, Result};
pub use reader::RecordReader;
pub use writer::RecordWriter;
