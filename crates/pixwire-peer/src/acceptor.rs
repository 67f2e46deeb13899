use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pixwire_frame::{FrameReader, FrameWriter};
use pixwire_transport::{NetStream, TcpTransport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{PeerError, Result};
use crate::handler::PayloadHandler;
use crate::registry::{ConnectionId, ConnectionIdGenerator, LivenessRegistry};
use crate::supervisor::{SupervisorHandle, TimeoutSupervisor};
use crate::worker::{CloseReason, ConnectionWorker};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Accepts connections and runs one [`ConnectionWorker`] thread per connection.
///
/// Binding also starts the idle-timeout supervisor. It runs until the server
/// is dropped; workers that are still serving when that happens keep going
/// until their peers close.
pub struct Server {
    transport: TcpTransport,
    config: ServerConfig,
    registry: Arc<LivenessRegistry>,
    handler: Arc<dyn PayloadHandler>,
    ids: ConnectionIdGenerator,
    running: Arc<AtomicBool>,
    _supervisor: SupervisorHandle,
}

impl Server {
    /// Bind `config.listen_addr` and start the supervisor.
    pub fn bind(config: ServerConfig, handler: Arc<dyn PayloadHandler>) -> Result<Self> {
        let transport = TcpTransport::bind(config.listen_addr.as_str())?;
        let registry = Arc::new(LivenessRegistry::new());
        let supervisor = TimeoutSupervisor::new(
            Arc::clone(&registry),
            config.idle_timeout,
            config.sweep_period(),
        )
        .spawn()?;

        Ok(Self {
            transport,
            config,
            registry,
            handler,
            ids: ConnectionIdGenerator::new(),
            running: Arc::new(AtomicBool::new(true)),
            _supervisor: supervisor,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The registry shared by this server's workers and supervisor.
    pub fn registry(&self) -> Arc<LivenessRegistry> {
        Arc::clone(&self.registry)
    }

    /// Handle that stops [`serve`](Self::serve) from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            wake_addr: wake_addr(self.local_addr()),
        }
    }

    /// Accept connections until shut down.
    ///
    /// Accept failures and worker failures are logged and never end the loop.
    pub fn serve(&self) {
        info!(
            addr = %self.local_addr(),
            idle_timeout = ?self.config.idle_timeout,
            max_message_size = self.config.max_message_size,
            "server ready"
        );

        while self.running.load(Ordering::SeqCst) {
            let (stream, peer) = match self.transport.accept() {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };

            if !self.running.load(Ordering::SeqCst) {
                debug!(%peer, "dropping connection accepted during shutdown");
                break;
            }

            if let Err(err) = self.spawn_worker(stream, peer) {
                warn!(%peer, error = %err, "failed to start connection worker");
            }
        }

        info!(live_connections = self.registry.len(), "server stopped accepting");
    }

    /// Register an accepted connection and start its worker thread.
    ///
    /// The registry entry is removed again if the worker cannot be started.
    pub fn spawn_worker(&self, stream: NetStream, peer: SocketAddr) -> Result<WorkerHandle> {
        let id = self.ids.next_id();
        let token = self.registry.insert(id, Instant::now());

        match self.start_worker(id, token, stream) {
            Ok(thread) => {
                info!(connection = %id, %peer, "connection accepted");
                Ok(WorkerHandle { id, peer, thread })
            }
            Err(err) => {
                self.registry.remove(id);
                Err(err)
            }
        }
    }

    fn start_worker(
        &self,
        id: ConnectionId,
        token: CancellationToken,
        stream: NetStream,
    ) -> Result<JoinHandle<CloseReason>> {
        stream.set_nodelay(true)?;
        let frame_config = self.config.frame_config();
        let reader = FrameReader::with_config_net(stream.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_net(stream, frame_config)?;

        let mut worker = ConnectionWorker::new(
            id,
            token,
            reader,
            writer,
            Arc::clone(&self.registry),
            Arc::clone(&self.handler),
        );

        thread::Builder::new()
            .name(format!("pixwire-{id}"))
            .spawn(move || worker.run())
            .map_err(PeerError::Spawn)
    }
}

/// A running connection worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: ConnectionId,
    peer: SocketAddr,
    thread: JoinHandle<CloseReason>,
}

impl WorkerHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker to finish. `None` if it panicked.
    pub fn join(self) -> Option<CloseReason> {
        self.thread.join().ok()
    }
}

/// Stops a [`Server`]'s accept loop from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Ask the accept loop to stop. Idempotent.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // accept() has no timeout; a throwaway connection unblocks it.
        if let Err(err) = TcpTransport::connect_timeout(self.wake_addr, WAKE_TIMEOUT) {
            debug!(error = %err, "wake-up connection failed");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }
}

/// Connectable address for a listener bound to `local`.
fn wake_addr(local: SocketAddr) -> SocketAddr {
    match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local.port())
        }
        _ => local,
    }
}
