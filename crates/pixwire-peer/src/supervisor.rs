use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{PeerError, Result};
use crate::registry::{ConnectionId, LivenessRegistry};

/// Periodically evicts idle connections from a [`LivenessRegistry`].
///
/// Owns no connection state of its own. Eviction removes the registry entry
/// and cancels the worker's token; closing the socket is left to the worker.
#[derive(Debug, Clone)]
pub struct TimeoutSupervisor {
    registry: Arc<LivenessRegistry>,
    idle_timeout: Duration,
    period: Duration,
}

impl TimeoutSupervisor {
    pub fn new(registry: Arc<LivenessRegistry>, idle_timeout: Duration, period: Duration) -> Self {
        Self {
            registry,
            idle_timeout,
            period,
        }
    }

    /// Run one sweep at `now` and log every eviction.
    pub fn sweep_once(&self, now: Instant) -> Vec<ConnectionId> {
        let evicted = self.registry.sweep(now, self.idle_timeout);
        for id in &evicted {
            info!(connection = %id, idle_timeout = ?self.idle_timeout, "evicting idle connection");
        }
        evicted
    }

    /// Start sweeping every `period` on a dedicated thread.
    pub fn spawn(self) -> Result<SupervisorHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let period = self.period;

        let thread = thread::Builder::new()
            .name("pixwire-supervisor".to_string())
            .spawn(move || {
                debug!(?period, idle_timeout = ?self.idle_timeout, "supervisor started");
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.sweep_once(Instant::now());
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("supervisor stopped");
            })
            .map_err(PeerError::Spawn)?;

        Ok(SupervisorHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Stops the supervisor thread when shut down or dropped.
#[derive(Debug)]
pub struct SupervisorHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Stop sweeping and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
