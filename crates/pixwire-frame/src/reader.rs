use std::io::{ErrorKind, Read};

use pixwire_transport::NetStream;

use crate::codec::{Frame, FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Result of [`FrameReader::poll_frame`].
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete frame was decoded.
    Frame(Frame),
    /// The stream's read timeout fired before a frame completed. Any partial
    /// frame stays buffered.
    TimedOut,
}

/// Reads complete frames from any `Read` stream.
///
/// Partial reads are buffered internally; callers only ever see complete frames.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(config.max_message_size),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A read
    /// timeout surfaces as `FrameError::Io`.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// Read the next complete frame, reporting a read timeout as
    /// [`ReadOutcome::TimedOut`] instead of an error.
    pub fn poll_frame(&mut self) -> Result<ReadOutcome> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(ReadOutcome::Frame(frame));
            }
            match self.fill() {
                Ok(()) => {}
                Err(err) if err.is_timeout() => return Ok(ReadOutcome::TimedOut),
                Err(err) => return Err(err),
            }
        }
    }

    /// One transport read into the decoder. Never reads more than the
    /// decoder can hold.
    fn fill(&mut self) -> Result<()> {
        let room = self.decoder.remaining_capacity().min(READ_CHUNK_SIZE);
        if room == 0 {
            return Err(FrameError::CapacityExceeded {
                attempted: self.decoder.buffered().saturating_add(1),
                capacity: self.decoder.buffer_capacity(),
            });
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk[..room]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            return self.decoder.extend(&chunk[..read]);
        }
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.decoder.is_idle()
    }
}

impl FrameReader<NetStream> {
    /// Create a frame reader for `NetStream` and apply read timeout from config.
    pub fn with_config_net(inner: NetStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: pixwire_transport::TransportError) -> FrameError {
    match err {
        pixwire_transport::TransportError::Io(io)
        | pixwire_transport::TransportError::Accept(io) => FrameError::Io(io),
        pixwire_transport::TransportError::Bind { source, .. }
        | pixwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::BytesMut;
    use pixwire_transport::TcpTransport;

    use super::*;
    use crate::codec::encode_frame;
    use crate::content::{CONTENT_ENCODING_BINARY, CONTENT_TYPE_IMAGE};
    use crate::error::ProtocolError;

    fn wire_for(payloads: &[&[u8]]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for payload in payloads {
            encode_frame(CONTENT_TYPE_IMAGE, CONTENT_ENCODING_BINARY, payload, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire_for(&[b"hello"])));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), b"hello");
        assert!(reader.is_idle());
    }

    #[test]
    fn read_multiple_frames_in_order() {
        let mut reader = FrameReader::new(Cursor::new(wire_for(&[b"one", b"two", b"three"])));

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"three");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn read_frame_larger_than_one_chunk() {
        let payload = vec![0xAB; 200 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire_for(&[&payload])));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire_for(&[b"slow"]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let wire = wire_for(&[b"only-part-of-this"]);
        let mut reader = FrameReader::new(Cursor::new(wire[..wire.len() - 4].to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(!reader.is_idle());
    }

    #[test]
    fn protocol_error_in_stream() {
        let metadata = br#"{"byteorder":"little","content-type":"video/mp4","content-encoding":"binary","content-length":0}"#;
        let mut wire = (metadata.len() as u16).to_le_bytes().to_vec();
        wire.extend_from_slice(metadata);

        let mut reader = FrameReader::new(Cursor::new(wire));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Protocol(ProtocolError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let payload = vec![1u8; 512];
        let cfg = FrameConfig {
            max_message_size: 256,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire_for(&[&payload])), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Protocol(ProtocolError::MessageTooLarge { max: 256, .. })
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire_for(&[b"ok"])),
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn poll_reports_timeout_and_keeps_partial_frame() {
        let wire = wire_for(&[b"split"]);
        let (head, tail) = wire.split_at(5);
        let reader = ScriptedReader {
            steps: vec![
                Ok(head.to_vec()),
                Err(ErrorKind::WouldBlock),
                Ok(tail.to_vec()),
            ],
        };
        let mut framed = FrameReader::new(reader);

        assert!(matches!(framed.poll_frame().unwrap(), ReadOutcome::TimedOut));
        assert!(!framed.is_idle());
        match framed.poll_frame().unwrap() {
            ReadOutcome::Frame(frame) => assert_eq!(frame.payload.as_ref(), b"split"),
            ReadOutcome::TimedOut => panic!("expected a frame"),
        }
    }

    #[test]
    fn read_frame_propagates_timeout_as_io_error() {
        let reader = ScriptedReader {
            steps: vec![Err(ErrorKind::TimedOut)],
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn roundtrip_over_tcp() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let client = std::thread::spawn(move || {
            let stream = TcpTransport::connect(addr).unwrap();
            let mut writer = crate::writer::FrameWriter::new(stream);
            writer.send_image(b"over tcp").unwrap();
        });

        let (stream, _) = listener.accept().unwrap();
        let mut reader = FrameReader::new(stream);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"over tcp");

        client.join().unwrap();
    }

    #[test]
    fn applies_read_timeout_for_net_stream() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let _client = TcpTransport::connect(listener.local_addr()).unwrap();
        let (stream, _) = listener.accept().unwrap();

        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_net(stream, cfg).unwrap();
        assert!(matches!(reader.poll_frame().unwrap(), ReadOutcome::TimedOut));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    /// Replays a fixed script of chunks and errors, then EOF.
    struct ScriptedReader {
        steps: Vec<std::result::Result<Vec<u8>, ErrorKind>>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.steps.is_empty() {
                return Ok(0);
            }
            match self.steps.remove(0) {
                Ok(bytes) => {
                    assert!(bytes.len() <= buf.len());
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Err(kind) => Err(std::io::Error::from(kind)),
            }
        }
    }
}
