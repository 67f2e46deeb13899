/// Violations of frame well-formedness.
///
/// Any of these means the stream position can no longer be trusted; the
/// connection that produced it must be closed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The header declares a zero-length metadata block.
    #[error("header declares empty metadata")]
    EmptyMetadata,

    /// The metadata block is not UTF-8.
    #[error("metadata is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The metadata block is not a JSON object of the expected shape.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(#[from] serde_json::Error),

    /// A required metadata key is absent.
    #[error("metadata is missing required key \"{0}\"")]
    MissingField(&'static str),

    /// `byteorder` is something other than `"little"`.
    #[error("unsupported byteorder {0:?} (expected \"little\")")]
    UnsupportedByteOrder(String),

    /// `content-type` is something other than `"binary/image"`.
    #[error("unsupported content-type {0:?} (expected \"binary/image\")")]
    UnsupportedContentType(String),

    /// The declared message size exceeds the configured maximum.
    #[error("declared message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer sent bytes that do not form a valid frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Buffering the bytes would exceed the accumulator capacity.
    #[error("buffer capacity exceeded ({attempted} bytes, capacity {capacity})")]
    CapacityExceeded { attempted: usize, capacity: usize },

    /// Encoded metadata does not fit the 16-bit header field.
    #[error("metadata too large ({size} bytes, max 65535)")]
    MetadataTooLarge { size: usize },

    /// An outbound frame exceeds the configured maximum message size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Metadata could not be serialized.
    #[error("metadata encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// A previous error left the decoder at an unknown stream position.
    #[error("decoder poisoned by an earlier protocol error")]
    Poisoned,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for read/write timeouts configured on the underlying socket.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
