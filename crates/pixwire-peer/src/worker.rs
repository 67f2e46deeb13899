use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

use pixwire_frame::{
    Frame, FrameError, FrameReader, FrameWriter, ProtocolError, ReadOutcome, CONTENT_TYPE_IMAGE,
};
use pixwire_transport::Closeable;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::handler::{HandlerError, PayloadHandler};
use crate::registry::{ConnectionId, LivenessRegistry};

/// Where a worker is within its request/response round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Between rounds.
    Active,
    /// Waiting for request bytes.
    ReadPending,
    /// A complete request has been decoded.
    Decoding,
    /// The payload handler is running.
    Dispatching,
    /// Writing the response.
    WritePending,
    /// Terminal. The transport has been shut down.
    Closed,
}

/// Why a worker stopped.
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its side of the connection.
    RemoteClosed,
    /// The supervisor evicted the connection for being idle.
    Evicted,
    /// A read or write on the socket failed.
    Transport(std::io::Error),
    /// The peer sent bytes that do not form a valid frame.
    Protocol(ProtocolError),
    /// Unconsumed bytes would have overflowed the receive buffer.
    CapacityExceeded { attempted: usize, capacity: usize },
    /// Any other framing failure, such as an oversized response.
    Framing(FrameError),
    /// The payload handler refused the request.
    Handler(HandlerError),
}

impl CloseReason {
    /// True for the two endings that are not failures.
    pub fn is_graceful(&self) -> bool {
        matches!(self, CloseReason::RemoteClosed | CloseReason::Evicted)
    }
}

impl From<FrameError> for CloseReason {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => CloseReason::RemoteClosed,
            FrameError::Protocol(err) => CloseReason::Protocol(err),
            FrameError::CapacityExceeded {
                attempted,
                capacity,
            } => CloseReason::CapacityExceeded {
                attempted,
                capacity,
            },
            FrameError::Io(err) => CloseReason::Transport(err),
            other => CloseReason::Framing(other),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::RemoteClosed => f.write_str("remote closed"),
            CloseReason::Evicted => f.write_str("evicted after idle timeout"),
            CloseReason::Transport(err) => write!(f, "transport error: {err}"),
            CloseReason::Protocol(err) => write!(f, "protocol error: {err}"),
            CloseReason::CapacityExceeded {
                attempted,
                capacity,
            } => write!(
                f,
                "receive buffer capacity exceeded ({attempted} bytes, capacity {capacity})"
            ),
            CloseReason::Framing(err) => write!(f, "framing error: {err}"),
            CloseReason::Handler(err) => write!(f, "{err}"),
        }
    }
}

/// Owns one connection and serves it until it closes.
///
/// Each round reads one request frame, hands it to the [`PayloadHandler`],
/// writes the response and refreshes the connection's liveness entry.
/// Requests on one connection are answered strictly in order.
///
/// The worker stops at the next round boundary once its registry entry is
/// evicted. A worker blocked in a read notices only when the read returns,
/// either with data or because the socket read timeout fired.
pub struct ConnectionWorker<R, W> {
    id: ConnectionId,
    token: CancellationToken,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    registry: Arc<LivenessRegistry>,
    handler: Arc<dyn PayloadHandler>,
    state: WorkerState,
    rounds: u64,
}

impl<R, W> ConnectionWorker<R, W>
where
    R: Read,
    W: Write + Closeable,
{
    /// Worker for a connection already present in `registry` under `id`.
    ///
    /// `token` must be the one returned when `id` was inserted.
    pub fn new(
        id: ConnectionId,
        token: CancellationToken,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        registry: Arc<LivenessRegistry>,
        handler: Arc<dyn PayloadHandler>,
    ) -> Self {
        Self {
            id,
            token,
            reader,
            writer,
            registry,
            handler,
            state: WorkerState::Active,
            rounds: 0,
        }
    }

    /// Insert `id` into `registry` as live now and build its worker.
    pub fn register(
        id: ConnectionId,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        registry: Arc<LivenessRegistry>,
        handler: Arc<dyn PayloadHandler>,
    ) -> Self {
        let token = registry.insert(id, Instant::now());
        Self::new(id, token, reader, writer, registry, handler)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Completed request/response rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Serve the connection until it closes.
    ///
    /// On return the worker is [`WorkerState::Closed`], the transport is shut
    /// down in both directions and the registry entry is gone.
    pub fn run(&mut self) -> CloseReason {
        let span = tracing::info_span!("connection", connection = %self.id);
        let _guard = span.enter();
        debug!("worker started");

        let reason = self.serve();
        self.transition(WorkerState::Closed);

        self.registry.remove(self.id);
        if let Err(err) = self.writer.close() {
            debug!(error = %err, "transport shutdown failed");
        }

        if reason.is_graceful() {
            info!(rounds = self.rounds, %reason, "connection closed");
        } else {
            warn!(rounds = self.rounds, %reason, "connection closed");
        }
        reason
    }

    fn serve(&mut self) -> CloseReason {
        loop {
            if self.token.is_cancelled() {
                return CloseReason::Evicted;
            }

            self.transition(WorkerState::ReadPending);
            let request = match self.reader.poll_frame() {
                Ok(ReadOutcome::Frame(frame)) => frame,
                Ok(ReadOutcome::TimedOut) => {
                    self.transition(WorkerState::Active);
                    continue;
                }
                Err(err) => return err.into(),
            };

            self.transition(WorkerState::Decoding);
            // Evicted while blocked in the read: the request arrived too late.
            if self.token.is_cancelled() {
                return CloseReason::Evicted;
            }

            if let Err(reason) = self.round(&request) {
                return reason;
            }

            self.rounds += 1;
            self.registry.refresh(self.id, Instant::now());
            self.transition(WorkerState::Active);
        }
    }

    fn round(&mut self, request: &Frame) -> Result<(), CloseReason> {
        trace!(
            content_encoding = request.content_encoding(),
            payload_len = request.payload.len(),
            "request received"
        );

        self.transition(WorkerState::Dispatching);
        let response = self.handler.handle(request).map_err(CloseReason::Handler)?;

        self.transition(WorkerState::WritePending);
        self.writer
            .send(CONTENT_TYPE_IMAGE, request.content_encoding(), &response)
            .map_err(CloseReason::from)?;

        trace!(payload_len = response.len(), "response sent");
        Ok(())
    }

    fn transition(&mut self, next: WorkerState) {
        trace!(from = ?self.state, to = ?next, "worker state");
        self.state = next;
    }
}
