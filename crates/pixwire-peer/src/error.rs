/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pixwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] pixwire_frame::FrameError),

    /// The payload handler refused or failed to produce a response.
    #[error(transparent)]
    Handler(#[from] crate::handler::HandlerError),

    /// Peer disconnected.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A worker or supervisor thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
