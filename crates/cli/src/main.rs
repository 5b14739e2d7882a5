//! Steward command line.
//!
//! Reconciles object-storage account records against the identity service.
//!
//! # Usage
//!
//! ```bash
//! # Merge per-node collector files into one deduplicated table
//! steward merge node1_accounts.csv node2_accounts.csv --output merged.csv
//!
//! # Verify the merged table against the configured identity endpoints
//! steward --config steward.toml verify --input merged.csv --output verified.csv --header
//! ```

mod config;

use std::{
    io::IsTerminal,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use steward_identity::{
    GatewayConfig, GatewayError, IdentityEndpoint, IdentityGateway, RestEndpoint,
};
use steward_recon::{Verifier, merge};
use steward_types::{FieldSchema, format_table, header};

use crate::config::{Config, ConfigError};

#[derive(Parser)]
#[command(name = "steward", version, about = "Object-storage account reconciliation")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "STEWARD_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge per-node collector files into one deduplicated account table.
    Merge {
        /// Collector output files, one per storage node.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write the merged table here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Prefix the output with a header row.
        #[arg(long)]
        header: bool,
    },
    /// Verify a merged account table against the identity backends.
    Verify {
        /// Merged table produced by `steward merge`.
        #[arg(long, short)]
        input: PathBuf,
        /// Write the classified table here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Prefix the output with a header row.
        #[arg(long)]
        header: bool,
        /// Emit the collected nine-field schema instead of the full table.
        #[arg(long)]
        collected_only: bool,
    },
}

/// Top-level error type for the binary, wrapping startup and I/O failures.
#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Gateway(GatewayError),
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "configuration error: {}", e),
            CliError::Gateway(e) => write!(f, "identity gateway error: {}", e),
            CliError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for CliError {}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    init_logging();

    let config = Config::load(cli.config.as_deref()).map_err(CliError::Config)?;

    if let Some(metrics_addr) = config.metrics_addr {
        init_metrics_exporter(metrics_addr);
    }

    match cli.command {
        Command::Merge { inputs, output, header } => run_merge(&config, &inputs, output, header),
        Command::Verify { input, output, header, collected_only } => {
            run_verify(&config, &input, output, header, collected_only).await
        },
    }
}

fn run_merge(
    config: &Config,
    inputs: &[PathBuf],
    output: Option<PathBuf>,
    with_header: bool,
) -> Result<(), CliError> {
    let mut contents = String::new();
    for path in inputs {
        contents.push_str(&read_file(path)?);
        contents.push('\n');
    }

    let outcome = merge(&contents, config.delimiter_char());
    let table = format_table(
        &outcome.records,
        FieldSchema::Collected,
        config.delimiter_char(),
        with_header,
    );
    emit(output.as_deref(), &table)
}

async fn run_verify(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    with_header: bool,
    collected_only: bool,
) -> Result<(), CliError> {
    let gateway = Arc::new(build_gateway(config)?);

    if !config.scrape.is_empty() {
        let scraped = gateway.bulk_scrape().await;
        tracing::info!(domains = scraped, "bulk scrape completed");
    }

    let delimiter = config.delimiter_char();
    let contents = read_file(input)?;
    // The input may carry the optional header row; drop it before merging.
    let contents = contents
        .strip_prefix(&format!("{}\n", header(FieldSchema::Collected, delimiter)))
        .unwrap_or(&contents);

    // Merging is idempotent, and re-merging restores sorted domain runs
    // even if the input was assembled by hand.
    let outcome = merge(contents, delimiter);

    let verifier = Verifier::builder()
        .gateway(gateway)
        .default_domain_fallback(config.default_domain_fallback)
        .build();
    let mut records = outcome.records;
    verifier.verify(&mut records).await;

    let table = format_table(&records, output_schema(collected_only), delimiter, with_header);
    emit(output.as_deref(), &table)
}

/// Output schema for `verify`: the full table by default, or the collected
/// nine fields when the output should feed back into `merge`.
fn output_schema(collected_only: bool) -> FieldSchema {
    if collected_only { FieldSchema::Collected } else { FieldSchema::Full }
}

/// Builds the gateway from configured REST endpoints. Fatal when no
/// endpoint is configured at all.
fn build_gateway(config: &Config) -> Result<IdentityGateway, CliError> {
    let build = |configs: &[steward_identity::EndpointConfig]| {
        configs
            .iter()
            .map(|c| {
                RestEndpoint::new(c.clone()).map(|e| Arc::new(e) as Arc<dyn IdentityEndpoint>)
            })
            .collect::<Result<Vec<_>, _>>()
    };

    let verify = build(&config.verify).map_err(CliError::Gateway)?;
    let scrape = build(&config.scrape).map_err(CliError::Gateway)?;

    IdentityGateway::new(verify, scrape, GatewayConfig { call_timeout: config.call_timeout() })
        .map_err(CliError::Gateway)
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|source| CliError::Io { path: path.to_path_buf(), source })
}

fn emit(output: Option<&Path>, table: &str) -> Result<(), CliError> {
    match output {
        Some(path) => std::fs::write(path, table)
            .map_err(|source| CliError::Io { path: path.to_path_buf(), source }),
        None => {
            print!("{table}");
            Ok(())
        },
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn init_metrics_exporter(addr: SocketAddr) {
    if let Err(err) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::warn!(%addr, error = %err, "metrics exporter failed to start");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_collected_only_flag_selects_schema() {
        let cli = Cli::try_parse_from([
            "steward", "verify", "--input", "merged.csv", "--collected-only",
        ])
        .expect("parse");
        match cli.command {
            Command::Verify { collected_only, .. } => assert!(collected_only),
            _ => panic!("expected verify subcommand"),
        }

        assert_eq!(output_schema(true), FieldSchema::Collected);
        assert_eq!(output_schema(false), FieldSchema::Full);
    }

    #[test]
    fn test_verify_defaults_to_full_schema() {
        let cli = Cli::try_parse_from(["steward", "verify", "--input", "merged.csv"])
            .expect("parse");
        match cli.command {
            Command::Verify { collected_only, .. } => assert!(!collected_only),
            _ => panic!("expected verify subcommand"),
        }
    }
}
