//! Length-prefixed message framing for image payloads.
//!
//! This is the core value-add layer of pixwire. Every message is framed with:
//! - A 2-byte little-endian metadata length
//! - A UTF-8 JSON metadata object (`byteorder`, `content-type`,
//!   `content-encoding`, `content-length`)
//! - `content-length` bytes of opaque payload
//!
//! Bytes may arrive in arbitrary chunks; [`FrameDecoder`] carries partial
//! state across calls and hands out complete frames only.

pub mod accumulator;
pub mod codec;
pub mod content;
pub mod error;
pub mod reader;
pub mod writer;

pub use accumulator::ByteAccumulator;
pub use codec::{
    encode_frame, Frame, FrameConfig, FrameDecoder, Metadata, DEFAULT_MAX_MESSAGE_SIZE,
    HEADER_SIZE, MAX_METADATA_LEN,
};
pub use content::{BYTEORDER_LITTLE, CONTENT_ENCODING_BINARY, CONTENT_TYPE_IMAGE};
pub use error::{FrameError, ProtocolError, Result};
pub use reader::{FrameReader, ReadOutcome};
pub use writer::FrameWriter;
