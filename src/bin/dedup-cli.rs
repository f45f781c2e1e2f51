use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use reqwest::Method;
use serde::Serialize;

use request_dedup::config::{load_config, ClientConfig};
use request_dedup::dedup::{DedupError, DedupManager, DedupSettings};
use request_dedup::http::{
    RequestDescriptor, ReqwestTransport, SimulatedTransport, Transport, TransportResponse,
};
use request_dedup::lifecycle::{forward_signals, spawn_teardown, Shutdown};
use request_dedup::observability::init_logging;

#[derive(Parser)]
#[command(name = "dedup-cli")]
#[command(about = "Fire bursts of identical requests through the dedup manager", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a burst of identical requests to a real server
    Send {
        /// Request URL (relative URLs need transport.base_url)
        url: String,

        #[arg(short = 'X', long, default_value = "POST")]
        method: String,

        /// JSON body
        #[arg(short, long)]
        data: Option<String>,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_query)]
        query: Vec<(String, String)>,

        /// Header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// How many identical requests to fire at once
        #[arg(short = 'n', long, default_value_t = 2)]
        repeat: usize,

        /// Opt the requests out of deduplication
        #[arg(long)]
        no_dedup: bool,
    },
    /// Run a burst against a simulated transport
    Simulate {
        /// Simulated server latency
        #[arg(long, default_value_t = 300)]
        latency_ms: u64,

        /// How many identical requests to fire at once
        #[arg(short = 'n', long, default_value_t = 3)]
        repeat: usize,

        /// Resubmit once more after the burst settles
        #[arg(long)]
        resubmit: bool,
    },
}

#[derive(Debug, Serialize)]
struct AttemptReport {
    attempt: usize,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AttemptReport {
    fn new(attempt: usize, result: Result<TransportResponse, DedupError>) -> Self {
        match result {
            Ok(resp) => Self {
                attempt,
                outcome: "ok",
                status: Some(resp.status),
                error: None,
            },
            Err(e) => Self {
                attempt,
                outcome: if e.is_duplicate() {
                    "duplicate"
                } else if e.is_cancellation() {
                    "cancelled"
                } else {
                    "error"
                },
                status: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct BurstSummary {
    attempts: Vec<AttemptReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resubmission: Option<AttemptReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport_calls: Option<usize>,
    pending_after: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    init_logging(&config.observability)?;
    let settings = DedupSettings::from_config(&config.dedup)?;

    let summary = match cli.command {
        Commands::Send {
            url,
            method,
            data,
            query,
            headers,
            repeat,
            no_dedup,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut descriptor = RequestDescriptor::new(method, url);
            if let Some(data) = data {
                descriptor = descriptor.with_body(serde_json::from_str(&data)?);
            }
            for (key, value) in query {
                descriptor = descriptor.with_query(key, value);
            }
            for (name, value) in headers {
                descriptor = descriptor.with_header(name, value);
            }
            if no_dedup {
                descriptor = descriptor.skip_dedup();
            }

            let transport = ReqwestTransport::new(&config.transport)?;
            let manager = Arc::new(DedupManager::new(transport, settings));
            run(manager, descriptor, repeat, false).await
        }
        Commands::Simulate {
            latency_ms,
            repeat,
            resubmit,
        } => {
            let transport = SimulatedTransport::new(Duration::from_millis(latency_ms));
            let manager = Arc::new(DedupManager::new(transport.clone(), settings));
            let descriptor =
                RequestDescriptor::post("/orders").with_json(&serde_json::json!({"id": 1}))?;

            let mut summary = run(manager, descriptor, repeat, resubmit).await;
            summary.transport_calls = Some(transport.calls());
            summary
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Fire `repeat` identical sends concurrently; Ctrl+C cancels whatever is pending.
async fn run<T>(
    manager: Arc<DedupManager<T>>,
    descriptor: RequestDescriptor,
    repeat: usize,
    resubmit: bool,
) -> BurstSummary
where
    T: Transport + 'static,
{
    let shutdown = Arc::new(Shutdown::new());
    let _teardown = spawn_teardown(manager.clone(), shutdown.subscribe());
    let _signals = forward_signals(shutdown.clone());

    let sends = (0..repeat.max(1)).map(|_| manager.send(descriptor.clone()));
    let attempts: Vec<AttemptReport> = join_all(sends)
        .await
        .into_iter()
        .enumerate()
        .map(|(i, result)| AttemptReport::new(i + 1, result))
        .collect();

    let resubmission = if resubmit {
        Some(AttemptReport::new(attempts.len() + 1, manager.send(descriptor).await))
    } else {
        None
    };

    BurstSummary {
        attempts,
        resubmission,
        transport_calls: None,
        pending_after: manager.pending_count(),
    }
}

fn parse_query(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected 'Name: value', got '{}'", raw))
}
