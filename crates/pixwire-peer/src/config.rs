use std::time::Duration;

use pixwire_frame::{FrameConfig, DEFAULT_MAX_MESSAGE_SIZE};

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:65432";

/// Default idle timeout before a connection is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `0.0.0.0:65432`.
    pub listen_addr: String,
    /// Maximum gap between successful rounds before a connection is evicted.
    pub idle_timeout: Duration,
    /// How often the supervisor sweeps. `None` sweeps once per `idle_timeout`.
    pub sweep_period: Option<Duration>,
    /// Maximum message size (header + metadata + payload), both directions.
    pub max_message_size: usize,
    /// Socket read timeout used as a cancellation check interval while a
    /// worker waits for data. `None` blocks until the peer sends or closes.
    pub poll_interval: Option<Duration>,
    /// Socket write timeout for responses.
    pub write_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_period: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            poll_interval: Some(Duration::from_secs(1)),
            write_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Effective supervisor period.
    pub fn sweep_period(&self) -> Duration {
        self.sweep_period.unwrap_or(self.idle_timeout)
    }

    /// Frame settings applied to every accepted connection.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_message_size: self.max_message_size,
            read_timeout: self.poll_interval,
            write_timeout: self.write_timeout,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on the TCP handshake.
    pub connect_timeout: Duration,
    /// Upper bound on each blocking read or write. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Maximum message size (header + metadata + payload), both directions.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(30)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_message_size: self.max_message_size,
            read_timeout: self.request_timeout,
            write_timeout: self.request_timeout,
        }
    }
}
