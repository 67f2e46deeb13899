use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one request/response round.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub file: String,
    pub content_encoding: String,
    pub request_bytes: usize,
    pub response_bytes: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SendReport {
    pub server: String,
    pub exchanges: Vec<Exchange>,
    pub total_request_bytes: usize,
    pub total_response_bytes: usize,
    pub elapsed_ms: u64,
}

impl SendReport {
    pub fn new(server: String, exchanges: Vec<Exchange>, elapsed: Duration) -> Self {
        Self {
            server,
            total_request_bytes: exchanges.iter().map(|e| e.request_bytes).sum(),
            total_response_bytes: exchanges.iter().map(|e| e.response_bytes).sum(),
            exchanges,
            elapsed_ms: millis(elapsed),
        }
    }
}

pub fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

pub fn print_report(report: &SendReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FILE", "ENCODING", "SENT", "RECEIVED", "MS"]);
            for exchange in &report.exchanges {
                table.add_row(vec![
                    exchange.file.clone(),
                    exchange.content_encoding.clone(),
                    exchange.request_bytes.to_string(),
                    exchange.response_bytes.to_string(),
                    exchange.elapsed_ms.to_string(),
                ]);
            }
            table.add_row(vec![
                format!("total ({} files)", report.exchanges.len()),
                String::new(),
                report.total_request_bytes.to_string(),
                report.total_response_bytes.to_string(),
                report.elapsed_ms.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for exchange in &report.exchanges {
                println!(
                    "{} sent={} received={} ({} ms)",
                    exchange.file,
                    exchange.request_bytes,
                    exchange.response_bytes,
                    exchange.elapsed_ms
                );
            }
            println!(
                "{} files to {} in {} ms",
                report.exchanges.len(),
                report.server,
                report.elapsed_ms
            );
        }
    }
}
