//! Connection management for pixwire.
//!
//! The server side runs one worker thread per accepted connection, a single
//! supervisor thread that evicts idle connections from a shared liveness
//! registry, and the accept loop. Eviction is the only way a worker is
//! cancelled: it notices at its next round boundary and closes.
//!
//! The client side is a strict request/response connection.

pub mod acceptor;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod supervisor;
pub mod worker;

pub use acceptor::{Server, ShutdownHandle, WorkerHandle};
pub use client::Client;
pub use config::{ClientConfig, ServerConfig, DEFAULT_IDLE_TIMEOUT, DEFAULT_LISTEN_ADDR};
pub use error::{PeerError, Result};
pub use handler::{EchoHandler, EmptyHandler, HandlerError, HandlerResult, PayloadHandler};
pub use registry::{ConnectionId, ConnectionIdGenerator, LivenessRegistry};
pub use supervisor::{SupervisorHandle, TimeoutSupervisor};
pub use worker::{CloseReason, ConnectionWorker, WorkerState};
