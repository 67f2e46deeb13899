//! Recognized metadata values.
//!
//! Only little-endian image payloads are understood. Anything else is a
//! protocol error, not a message to be passed along.

/// The only accepted `byteorder` value.
pub const BYTEORDER_LITTLE: &str = "little";

/// The only accepted `content-type` value.
pub const CONTENT_TYPE_IMAGE: &str = "binary/image";

/// Default `content-encoding`. The field is informational and not validated.
pub const CONTENT_ENCODING_BINARY: &str = "binary";

/// Returns true if frames with this content type can be delivered.
pub fn is_supported_content_type(content_type: &str) -> bool {
    content_type == CONTENT_TYPE_IMAGE
}

/// Returns true if frames with this byte order can be delivered.
pub fn is_supported_byteorder(byteorder: &str) -> bool {
    byteorder == BYTEORDER_LITTLE
}
