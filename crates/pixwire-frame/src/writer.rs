use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use pixwire_transport::{Closeable, NetStream};

use crate::accumulator::ByteAccumulator;
use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::content::{CONTENT_ENCODING_BINARY, CONTENT_TYPE_IMAGE};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// Encoded frames are queued in a bounded outbound buffer and drained as the
/// transport accepts bytes.
pub struct FrameWriter<T> {
    inner: T,
    scratch: BytesMut,
    queue: ByteAccumulator,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            queue: ByteAccumulator::new(config.max_message_size),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(
            &frame.metadata.content_type,
            &frame.metadata.content_encoding,
            frame.payload.as_ref(),
        )
    }

    /// Encode and send an image payload with `content-encoding: binary`.
    pub fn send_image(&mut self, payload: &[u8]) -> Result<()> {
        self.send(CONTENT_TYPE_IMAGE, CONTENT_ENCODING_BINARY, payload)
    }

    /// Encode and send a payload with explicit metadata fields.
    pub fn send(&mut self, content_type: &str, content_encoding: &str, payload: &[u8]) -> Result<()> {
        self.scratch.clear();
        encode_frame(content_type, content_encoding, payload, &mut self.scratch)?;

        if self.scratch.len() > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: self.scratch.len(),
                max: self.config.max_message_size,
            });
        }

        self.queue.append(&self.scratch)?;
        self.write_queued()?;
        self.flush()
    }

    fn write_queued(&mut self) -> Result<()> {
        while !self.queue.is_empty() {
            match self.inner.write(self.queue.peek()) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.queue.advance(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
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

    /// Bytes encoded but not yet accepted by the transport.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Closeable> FrameWriter<T> {
    /// Shut the underlying transport down in both directions.
    pub fn close(&self) -> Result<()> {
        self.inner.close().map_err(transport_to_frame_error)
    }
}

impl FrameWriter<NetStream> {
    /// Create a frame writer for `NetStream` and apply write timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{FrameDecoder, DEFAULT_MAX_MESSAGE_SIZE};

    fn decode_all(wire: &[u8]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_MESSAGE_SIZE);
        let mut frames = Vec::new();
        let mut next = decoder.feed(wire).unwrap();
        while let Some(frame) = next {
            frames.push(frame);
            next = decoder.next_frame().unwrap();
        }
        frames
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_image(b"hello").unwrap();

        let wire = writer.into_inner().into_inner();
        let frames = decode_all(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"hello");
        assert_eq!(frames[0].content_encoding(), CONTENT_ENCODING_BINARY);
    }

    #[test]
    fn write_frame_preserves_metadata() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame::with_encoding("png", b"pixels".to_vec());
        writer.write_frame(&frame).unwrap();

        let frames = decode_all(&writer.into_inner().into_inner());
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn write_multiple_frames_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_image(b"a").unwrap();
        writer.send_image(b"").unwrap();
        writer.send_image(b"c").unwrap();

        let frames = decode_all(&writer.into_inner().into_inner());
        let payloads: Vec<&[u8]> = frames.iter().map(|f| f.payload.as_ref()).collect();
        assert_eq!(payloads, vec![b"a".as_ref(), b"".as_ref(), b"c".as_ref()]);
    }

    #[test]
    fn rejects_oversized_message() {
        let cfg = FrameConfig {
            max_message_size: 64,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        let err = writer.send_image(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { max: 64, .. }));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(TrickleWriter::default());
        writer.send_image(b"trickled payload").unwrap();
        assert_eq!(writer.queued(), 0);

        let frames = decode_all(&writer.into_inner().written);
        assert_eq!(frames[0].payload.as_ref(), b"trickled payload");
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ClosedWriter);
        let err = writer.send_image(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(writer.queued() > 0);
    }

    #[test]
    fn write_error_propagates() {
        let mut writer = FrameWriter::new(BrokenPipe);
        let err = writer.send_image(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    /// Accepts at most three bytes per write call.
    #[derive(Default)]
    struct TrickleWriter {
        written: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(3);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ClosedWriter;

    impl Write for ClosedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
