use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use pixwire_peer::{Client, ClientConfig};

use crate::cmd::SendArgs;
use crate::exit::{io_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{millis, print_report, Exchange, OutputFormat, SendReport};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let files = collect_images(&args.paths)?;
    if files.is_empty() {
        return Err(CliError::new(USAGE, "no .jpg files found"));
    }

    let config = ClientConfig {
        connect_timeout: args.connect_timeout,
        request_timeout: Some(args.timeout),
        max_message_size: args.max_message_size,
    };

    let started = Instant::now();
    let mut client = Client::connect_with_config(args.server.as_str(), &config)
        .map_err(|err| peer_error("connect failed", err))?;

    let mut exchanges = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        let payload = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;

        let round = Instant::now();
        let response = client
            .request_with_encoding(&payload, &args.encoding)
            .map_err(|err| peer_error(&format!("request for {} failed", path.display()), err))?;

        tracing::info!(
            file = %path.display(),
            sent = payload.len(),
            received = response.payload.len(),
            "{} / {} files sent",
            index + 1,
            files.len()
        );

        exchanges.push(Exchange {
            file: path.display().to_string(),
            content_encoding: response.content_encoding().to_string(),
            request_bytes: payload.len(),
            response_bytes: response.payload.len(),
            elapsed_ms: millis(round.elapsed()),
        });
    }

    client
        .close()
        .map_err(|err| peer_error("close failed", err))?;

    let report = SendReport::new(args.server, exchanges, started.elapsed());
    print_report(&report, format);
    Ok(SUCCESS)
}

/// Expand directories to their `.jpg` files in name order; keep explicit
/// files as given.
fn collect_images(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let meta = fs::metadata(path)
            .map_err(|err| io_error(&format!("cannot access {}", path.display()), err))?;
        if meta.is_dir() {
            files.extend(jpg_files_in(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn jpg_files_in(dir: &Path) -> CliResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|err| io_error(&format!("cannot list {}", dir.display()), err))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| io_error(&format!("cannot list {}", dir.display()), err))?
            .path();
        if path.is_file() && is_jpg(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_jpg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
}
