use std::fmt::Display;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::NetStream;

/// TCP listening endpoint.
///
/// Provides bind/accept/connect over IPv4 or IPv6. The standard library
/// listener already enables `SO_REUSEADDR` on Unix, so a restarted server can
/// rebind while old connections sit in `TIME_WAIT`.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (e.g. `"0.0.0.0:65432"`; port 0 picks a free port).
    pub fn bind<A>(addr: A) -> Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(NetStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((NetStream::from_tcp(stream), peer))
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect<A>(addr: A) -> Result<NetStream>
    where
        A: ToSocketAddrs + Display,
    {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(%addr, "connected over tcp");
        Ok(NetStream::from_tcp(stream))
    }

    /// Connect with an upper bound on how long the TCP handshake may take.
    ///
    /// Every resolved address is tried in order; the last failure is reported.
    pub fn connect_timeout<A>(addr: A, timeout: Duration) -> Result<NetStream>
    where
        A: ToSocketAddrs + Display,
    {
        let resolved = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;

        let mut last_err = None;
        for candidate in resolved {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    debug!(peer = %candidate, "connected over tcp");
                    return Ok(NetStream::from_tcp(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        match last_err {
            Some(source) => Err(TransportError::Connect {
                addr: addr.to_string(),
                source,
            }),
            None => Err(TransportError::Unresolved(addr.to_string())),
        }
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Closeable;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let handle = std::thread::spawn(move || {
            let mut client = TcpTransport::connect(addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let (mut server, peer) = listener.accept().unwrap();
        assert!(peer.ip().is_loopback());
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port nobody is listening on.
        let addr = TcpTransport::bind("127.0.0.1:0").unwrap().local_addr();
        let result = TcpTransport::connect(addr);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_bind_rejects_garbage_address() {
        let result = TcpTransport::bind("not-an-address");
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_connect_timeout_reaches_listener() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let stream = TcpTransport::connect_timeout(addr, Duration::from_secs(2)).unwrap();
        let (_server, peer) = listener.accept().unwrap();
        assert_eq!(stream.local_addr().unwrap(), peer);
    }

    #[test]
    fn test_close_signals_eof_to_remote() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr();

        let client = TcpTransport::connect(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        client.close().unwrap();
        // Closing twice is harmless.
        client.close().unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }
}
