use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use datachan_transport::DeliveryFlags;

use crate::codec::{encode_record, FrameConfig, Record};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete records to any `Write` stream.
pub struct RecordWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> RecordWriter<T> {
    /// Create a new record writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new record writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete record (blocking).
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.send(
            record.stream_id,
            record.ppid,
            record.flags,
            record.payload.as_ref(),
        )
    }

    /// Encode and send a payload on a stream.
    pub fn send(
        &mut self,
        stream_id: u16,
        ppid: u32,
        flags: DeliveryFlags,
        payload: &[u8],
    ) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_record(stream_id, ppid, flags, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(unix)]
impl RecordWriter<std::os::unix::net::UnixStream> {
    /// Create a record writer for a Unix stream and apply the write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::decode_record;

    fn written(writer: RecordWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_multiple_records() {
        let mut writer = RecordWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(1, 51, DeliveryFlags::NONE, b"one").unwrap();
        writer
            .send(2, 53, DeliveryFlags::UNORDERED, b"two")
            .unwrap();

        let mut wire = written(writer);
        let r1 = decode_record(&mut wire, usize::MAX).unwrap().unwrap();
        let r2 = decode_record(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!((r1.stream_id, r1.ppid, r1.payload.as_ref()), (1, 51, b"one".as_ref()));
        assert_eq!((r2.stream_id, r2.ppid, r2.payload.as_ref()), (2, 53, b"two".as_ref()));
        assert!(r2.flags.is_unordered());
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = RecordWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer
            .send(1, 53, DeliveryFlags::NONE, b"oversized")
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn write_record_method() {
        let mut writer = RecordWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_record(&Record::new(2, 50, "abc")).unwrap();

        let mut wire = written(writer);
        let decoded = decode_record(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(decoded.stream_id, 2);
        assert_eq!(decoded.ppid, 50);
        assert_eq!(decoded.payload.as_ref(), b"abc");
    }

    #[test]
    fn zero_length_write_reports_closed() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = RecordWriter::new(Full);
        let err = writer.send(1, 51, DeliveryFlags::NONE, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }
}
