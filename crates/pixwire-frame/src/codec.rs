use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::accumulator::ByteAccumulator;
use crate::content::{
    is_supported_byteorder, is_supported_content_type, BYTEORDER_LITTLE, CONTENT_ENCODING_BINARY,
    CONTENT_TYPE_IMAGE,
};
use crate::error::{FrameError, ProtocolError, Result};

/// Frame header: metadata length (2, little-endian).
pub const HEADER_SIZE: usize = 2;

/// Largest metadata block the header can describe.
pub const MAX_METADATA_LEN: usize = u16::MAX as usize;

/// Default maximum message size (header + metadata + payload): 1 024 000 bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_024_000;

/// Decoded metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub byteorder: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
    #[serde(rename = "content-length")]
    pub content_length: usize,
}

/// Wire shape of the metadata block. Every key is optional here so a missing
/// key is reported by name instead of as a generic JSON error.
#[derive(Deserialize)]
struct RawMetadata {
    byteorder: Option<String>,
    #[serde(rename = "content-type")]
    content_type: Option<String>,
    #[serde(rename = "content-encoding")]
    content_encoding: Option<String>,
    #[serde(rename = "content-length")]
    content_length: Option<u64>,
}

impl Metadata {
    /// Metadata describing a payload of `content_length` bytes.
    pub fn new(
        content_type: impl Into<String>,
        content_encoding: impl Into<String>,
        content_length: usize,
    ) -> Self {
        Self {
            byteorder: BYTEORDER_LITTLE.to_string(),
            content_type: content_type.into(),
            content_encoding: content_encoding.into(),
            content_length,
        }
    }

    /// Parse and validate a metadata block.
    pub fn parse(text: &[u8]) -> std::result::Result<Self, ProtocolError> {
        let text = std::str::from_utf8(text)?;
        let raw: RawMetadata = serde_json::from_str(text)?;

        let byteorder = raw
            .byteorder
            .ok_or(ProtocolError::MissingField("byteorder"))?;
        let content_type = raw
            .content_type
            .ok_or(ProtocolError::MissingField("content-type"))?;
        let content_encoding = raw
            .content_encoding
            .ok_or(ProtocolError::MissingField("content-encoding"))?;
        let content_length = raw
            .content_length
            .ok_or(ProtocolError::MissingField("content-length"))?;

        if !is_supported_byteorder(&byteorder) {
            return Err(ProtocolError::UnsupportedByteOrder(byteorder));
        }
        if !is_supported_content_type(&content_type) {
            return Err(ProtocolError::UnsupportedContentType(content_type));
        }
        // Saturate on narrow targets; the decoder's size check rejects it.
        let content_length = usize::try_from(content_length).unwrap_or(usize::MAX);

        Ok(Self {
            byteorder,
            content_type,
            content_encoding,
            content_length,
        })
    }
}

/// A complete message: metadata plus exactly `content_length` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub metadata: Metadata,
    pub payload: Bytes,
}

impl Frame {
    /// An image frame with `content-encoding: binary`.
    pub fn image(payload: impl Into<Bytes>) -> Self {
        Self::with_encoding(CONTENT_ENCODING_BINARY, payload)
    }

    /// An image frame with an explicit content encoding.
    pub fn with_encoding(content_encoding: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            metadata: Metadata::new(CONTENT_TYPE_IMAGE, content_encoding, payload.len()),
            payload,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.metadata.content_type
    }

    pub fn content_encoding(&self) -> &str {
        &self.metadata.content_encoding
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────────┬──────────────────────────┬───────────────────────┐
/// │ Metadata len  │ Metadata (JSON, UTF-8)   │ Payload               │
/// │ (2B LE)       │ byteorder, content-type, │ (content-length bytes)│
/// │               │ content-encoding,        │                       │
/// │               │ content-length           │                       │
/// └───────────────┴──────────────────────────┴───────────────────────┘
/// ```
///
/// `byteorder` is always `"little"` and `content-length` is taken from
/// `payload`.
pub fn encode_frame(
    content_type: &str,
    content_encoding: &str,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let metadata = Metadata::new(content_type, content_encoding, payload.len());
    let text = serde_json::to_vec(&metadata).map_err(FrameError::Encode)?;
    let metadata_len =
        u16::try_from(text.len()).map_err(|_| FrameError::MetadataTooLarge { size: text.len() })?;

    dst.reserve(HEADER_SIZE + text.len() + payload.len());
    dst.put_u16_le(metadata_len);
    dst.put_slice(&text);
    dst.put_slice(payload);
    Ok(())
}

/// Reassembly cursor. Stages only move forward; a resolved stage is never
/// parsed again.
#[derive(Debug)]
enum ParseState {
    Header,
    Metadata { metadata_len: usize },
    Payload { metadata: Metadata },
}

/// Stateful frame decoder.
///
/// Bytes go in through [`feed`](Self::feed) in whatever chunks the transport
/// produced; complete frames come out one at a time, in order. After any
/// error the decoder refuses further input.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: ByteAccumulator,
    state: ParseState,
    max_message_size: usize,
    poisoned: bool,
}

impl FrameDecoder {
    /// Decoder whose buffer capacity equals the maximum message size.
    pub fn new(max_message_size: usize) -> Self {
        Self::with_buffer_capacity(max_message_size, max_message_size)
    }

    /// Decoder with an explicit buffer capacity.
    pub fn with_buffer_capacity(buffer_capacity: usize, max_message_size: usize) -> Self {
        Self {
            buf: ByteAccumulator::new(buffer_capacity),
            state: ParseState::Header,
            max_message_size,
            poisoned: false,
        }
    }

    /// Append `bytes` and try to complete one frame.
    ///
    /// Returns `Ok(None)` if more data is needed. When a frame is returned,
    /// any bytes past it stay buffered; call [`next_frame`](Self::next_frame)
    /// to drain further frames before feeding more input.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Option<Frame>> {
        self.extend(bytes)?;
        self.next_frame()
    }

    /// Append `bytes` without decoding.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(FrameError::Poisoned);
        }
        if let Err(err) = self.buf.append(bytes) {
            self.poisoned = true;
            return Err(err);
        }
        Ok(())
    }

    /// Try to complete one frame from already-buffered bytes.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.poisoned {
            return Err(FrameError::Poisoned);
        }
        match self.advance() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                ParseState::Header => {
                    let Some(header) = self.buf.drain(HEADER_SIZE) else {
                        return Ok(None);
                    };
                    let metadata_len = u16::from_le_bytes([header[0], header[1]]) as usize;
                    if metadata_len == 0 {
                        return Err(ProtocolError::EmptyMetadata.into());
                    }
                    self.check_size(HEADER_SIZE + metadata_len)?;
                    trace!(metadata_len, "decoded frame header");
                    self.state = ParseState::Metadata { metadata_len };
                }
                ParseState::Metadata { metadata_len } => {
                    let Some(text) = self.buf.drain(metadata_len) else {
                        return Ok(None);
                    };
                    let metadata = Metadata::parse(&text)?;
                    let total = (HEADER_SIZE + metadata_len).saturating_add(metadata.content_length);
                    self.check_size(total)?;
                    trace!(
                        content_length = metadata.content_length,
                        content_encoding = %metadata.content_encoding,
                        "decoded frame metadata"
                    );
                    self.state = ParseState::Payload { metadata };
                }
                ParseState::Payload { ref metadata } => {
                    let Some(payload) = self.buf.drain(metadata.content_length) else {
                        return Ok(None);
                    };
                    let ParseState::Payload { metadata } =
                        std::mem::replace(&mut self.state, ParseState::Header)
                    else {
                        unreachable!("state checked above");
                    };
                    return Ok(Some(Frame { metadata, payload }));
                }
            }
        }
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: self.max_message_size,
            }
            .into());
        }
        Ok(())
    }

    /// Bytes buffered but not yet consumed by a completed stage.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// How many more bytes the decoder can accept right now.
    pub fn remaining_capacity(&self) -> usize {
        self.buf.remaining_capacity()
    }

    /// Buffer capacity in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// True when no partial frame is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ParseState::Header) && self.buf.is_empty()
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size (header + metadata + payload). Default: 1 024 000 bytes.
    pub max_message_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
