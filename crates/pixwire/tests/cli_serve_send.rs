#![cfg(feature = "cli")]

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pixwire_peer::Client;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pixwire-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_port() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .expect("ephemeral bind should work")
        .local_addr()
        .expect("bound listener has an address")
}

fn wait_for_server(addr: SocketAddr, timeout: Duration) {
    let start = Instant::now();
    loop {
        if let Ok(client) = Client::connect(addr) {
            let _ = client.close();
            return;
        }
        if start.elapsed() >= timeout {
            panic!("server did not come up on {addr}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

struct ServerProcess(Child);

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_server(addr: SocketAddr, extra: &[&str]) -> ServerProcess {
    let child = Command::new(env!("CARGO_BIN_EXE_pixwire"))
        .args(["--log-level", "error", "serve", "--listen"])
        .arg(addr.to_string())
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start");
    let server = ServerProcess(child);
    wait_for_server(addr, Duration::from_secs(5));
    server
}

#[test]
fn send_directory_to_echo_server_reports_each_file() {
    let addr = free_port();
    let _server = spawn_server(addr, &[]);

    let dir = unique_temp_dir("send");
    std::fs::write(dir.join("b.jpg"), vec![0xFF; 300]).unwrap();
    std::fs::write(dir.join("a.jpg"), vec![0xD8; 100]).unwrap();
    std::fs::write(dir.join("skip.png"), b"png").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_pixwire"))
        .args(["--log-level", "error", "--format", "json", "send", "--server"])
        .arg(addr.to_string())
        .arg(&dir)
        .output()
        .expect("send should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be json");
    let exchanges = report["exchanges"].as_array().expect("exchanges array");
    assert_eq!(exchanges.len(), 2);
    assert!(exchanges[0]["file"].as_str().unwrap().ends_with("a.jpg"));
    assert_eq!(exchanges[0]["request_bytes"], 100);
    assert_eq!(exchanges[0]["response_bytes"], 100);
    assert_eq!(exchanges[1]["response_bytes"], 300);
    assert_eq!(report["total_request_bytes"], 400);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_responder_acknowledges_with_no_payload() {
    let addr = free_port();
    let _server = spawn_server(addr, &["--respond", "empty"]);

    let mut client = Client::connect(addr).unwrap();
    let response = client.request(&[1, 2, 3]).unwrap();
    assert!(response.payload.is_empty());
    client.close().unwrap();
}

#[test]
fn idle_client_is_disconnected() {
    let addr = free_port();
    let _server = spawn_server(
        addr,
        &["--idle-timeout", "200ms", "--sweep-period", "50ms", "--poll-interval", "50ms"],
    );

    let mut client = Client::connect(addr).unwrap();
    client.request(b"first").unwrap();
    thread::sleep(Duration::from_millis(800));
    assert!(client.request(b"too late").is_err());
}

#[test]
fn send_to_closed_port_is_transport_error() {
    let addr = free_port();
    let dir = unique_temp_dir("refused");
    let file = dir.join("x.jpg");
    std::fs::write(&file, b"x").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_pixwire"))
        .args(["--log-level", "error", "send", "--connect-timeout", "1s", "--server"])
        .arg(addr.to_string())
        .arg(&file)
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_without_images_is_usage_error() {
    let dir = unique_temp_dir("empty");
    let output = Command::new(env!("CARGO_BIN_EXE_pixwire"))
        .args(["--log-level", "error", "send"])
        .arg(&dir)
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_pixwire"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("pixwire {}", env!("CARGO_PKG_VERSION"))
    );
}
