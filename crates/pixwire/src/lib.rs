//! Length-prefixed image framing over TCP.
//!
//! pixwire moves opaque image payloads between a client and a server. Each
//! message is a little-endian `u16` metadata length, a JSON metadata block and
//! the payload. The server runs one thread per connection and evicts
//! connections that stay idle past a configured timeout.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listen/accept/connect and the stream type workers own
//! - [`frame`]: wire codec, bounded byte accumulator, blocking frame reader/writer
//! - [`peer`]: liveness registry, timeout supervisor, connection workers,
//!   the accepting server and the request/response client (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use pixwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pixwire_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use pixwire_peer::*;
}
