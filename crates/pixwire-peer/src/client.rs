use std::fmt::Display;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use pixwire_frame::{Frame, FrameError, FrameReader, FrameWriter, CONTENT_ENCODING_BINARY};
use pixwire_transport::{NetStream, TcpTransport};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{PeerError, Result};

/// Request/response connection to a pixwire server.
///
/// One request is outstanding at a time. Any error ends the session; the
/// caller must reconnect to continue.
pub struct Client {
    reader: FrameReader<NetStream>,
    writer: FrameWriter<NetStream>,
    peer: SocketAddr,
    request_timeout: Option<Duration>,
}

impl Client {
    /// Connect with default configuration.
    pub fn connect<A>(addr: A) -> Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        Self::connect_with_config(addr, &ClientConfig::default())
    }

    /// Connect with explicit configuration.
    pub fn connect_with_config<A>(addr: A, config: &ClientConfig) -> Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        let stream = TcpTransport::connect_timeout(addr, config.connect_timeout)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        let frame_config = config.frame_config();
        let reader = FrameReader::with_config_net(stream.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_net(stream, frame_config)?;

        debug!(%peer, "client connected");
        Ok(Self {
            reader,
            writer,
            peer,
            request_timeout: config.request_timeout,
        })
    }

    /// Send an image with `content-encoding: binary` and wait for the response.
    pub fn request(&mut self, payload: &[u8]) -> Result<Frame> {
        self.request_with_encoding(payload, CONTENT_ENCODING_BINARY)
    }

    /// Send an image with an explicit content encoding and wait for the response.
    pub fn request_with_encoding(&mut self, payload: &[u8], content_encoding: &str) -> Result<Frame> {
        self.send(&Frame::with_encoding(content_encoding, payload.to_vec()))?;
        self.recv()
    }

    /// Send one frame without waiting.
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame).map_err(|err| self.session_error(err))
    }

    /// Wait for the next frame from the server.
    pub fn recv(&mut self) -> Result<Frame> {
        self.reader.read_frame().map_err(|err| self.session_error(err))
    }

    fn session_error(&self, err: FrameError) -> PeerError {
        match err {
            FrameError::ConnectionClosed => {
                PeerError::Disconnected(format!("{} closed the connection", self.peer))
            }
            err if err.is_timeout() => match self.request_timeout {
                Some(timeout) => PeerError::Timeout(timeout),
                None => PeerError::Frame(err),
            },
            err => PeerError::Frame(err),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Shut the connection down in both directions.
    pub fn close(self) -> Result<()> {
        self.writer.close()?;
        debug!(peer = %self.peer, "client closed");
        Ok(())
    }
}
