//! Minimal echo server with a short idle timeout.
//!
//! Run with:
//!   cargo run --example echo-server --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- send --server 127.0.0.1:65432 photos/

use std::sync::Arc;
use std::time::Duration;

use pixwire::frame::Frame;
use pixwire::peer::{HandlerResult, Server, ServerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:65432".to_string(),
        idle_timeout: Duration::from_secs(5),
        ..ServerConfig::default()
    };

    let handler = |request: &Frame| -> HandlerResult {
        eprintln!(
            "Received {} bytes ({})",
            request.payload.len(),
            request.content_encoding()
        );
        Ok(request.payload.clone())
    };

    let server = Server::bind(config, Arc::new(handler))?;
    eprintln!("Listening on {}", server.local_addr());
    server.serve();
    Ok(())
}
