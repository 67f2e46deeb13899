use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use pixwire_frame::{CONTENT_ENCODING_BINARY, DEFAULT_MAX_MESSAGE_SIZE};
use pixwire_peer::DEFAULT_LISTEN_ADDR;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and answer every image frame.
    Serve(ServeArgs),
    /// Send image files to a server, one request per file.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// What the server answers with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ResponseMode {
    /// The request payload, unchanged.
    Echo,
    /// An empty payload.
    Empty,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PIXWIRE_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,
    /// Evict connections idle for longer than this (e.g. 10s, 500ms).
    #[arg(long, env = "PIXWIRE_IDLE_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub idle_timeout: Duration,
    /// How often to look for idle connections. Defaults to the idle timeout.
    #[arg(long, value_parser = parse_duration)]
    pub sweep_period: Option<Duration>,
    /// Largest accepted message, header and metadata included.
    #[arg(long, env = "PIXWIRE_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
    /// How long a worker blocks in one read before rechecking for eviction.
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub poll_interval: Duration,
    /// Response payload.
    #[arg(long, value_enum, default_value_t = ResponseMode::Echo)]
    pub respond: ResponseMode,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Image files, or directories whose `.jpg` files are sent in name order.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Server address.
    #[arg(long, short = 's', env = "PIXWIRE_SERVER", default_value = "127.0.0.1:65432")]
    pub server: String,
    /// `content-encoding` to declare for every payload.
    #[arg(long, default_value = CONTENT_ENCODING_BINARY)]
    pub encoding: String,
    /// Maximum time to wait for each response (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    pub timeout: Duration,
    /// Maximum time to wait for the TCP connection.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub connect_timeout: Duration,
    /// Largest message sent or accepted, header and metadata included.
    #[arg(long, env = "PIXWIRE_MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `10s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
