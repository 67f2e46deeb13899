//! TCP byte-stream transport.
//!
//! This is the lowest layer of pixwire. It knows nothing about frames: it
//! binds, accepts, connects, and hands out [`NetStream`] values that
//! implement `Read + Write` and can be shut down in both directions.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::TcpTransport;
pub use traits::{Closeable, NetStream};
