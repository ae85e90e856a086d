//! Tallystore Command-Line Client
//!
//! Records counter, gauge and histogram updates into an on-disk tallystore
//! database and collects them back out.

mod commands;
mod formatter;

use clap::Parser;
use commands::Command;
use std::path::PathBuf;
use tallystore_core::storage::DEFAULT_PREFIX;
use tallystore_core::{MetricsAdapter, StorageConfig};
use tracing_subscriber::EnvFilter;

/// Default database directory.
pub const DEFAULT_DATA_PATH: &str = "./tally_data";

/// Default page cache size in megabytes.
pub const DEFAULT_CACHE_MB: u64 = 64;

/// Default flush interval in milliseconds.
pub const DEFAULT_FLUSH_MS: u64 = 500;

/// Tallystore Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "tallystore")]
#[command(version, about = "Record and collect metrics in a shared store")]
pub struct Args {
    /// Path to the database storage directory
    #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Key prefix of the metric namespace
    #[arg(short, long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Page cache size in megabytes
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    pub cache_mb: u64,

    /// Flush interval in milliseconds. Set to 0 to flush only on exit.
    #[arg(long, default_value_t = DEFAULT_FLUSH_MS)]
    pub flush_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Convert command-line arguments to storage configuration.
    pub fn storage_config(&self) -> StorageConfig {
        let flush_every_ms = if self.flush_ms == 0 {
            None
        } else {
            Some(self.flush_ms)
        };

        StorageConfig::new(&self.data_path)
            .with_prefix(&self.prefix)
            .with_cache_capacity(self.cache_mb * 1024 * 1024)
            .with_flush_every_ms(flush_every_ms)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tallystore=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run one command. Returns `false` when it completed with reported problems.
fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    tracing::debug!(
        data_path = %args.data_path.display(),
        prefix = %args.prefix,
        "using metric store"
    );
    let adapter = MetricsAdapter::open(args.storage_config());

    let outcome = commands::execute(&adapter, args.command)?;
    adapter.flush()?;

    if !outcome.output.is_empty() {
        print!("{}", outcome.output);
        if !outcome.output.ends_with('\n') {
            println!();
        }
    }
    for problem in &outcome.problems {
        eprintln!("Error: {}", problem);
    }

    Ok(outcome.problems.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::GaugeOp;
    use crate::formatter::OutputFormat;
    use tallystore_core::MetricKind;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["tallystore", "collect"]).unwrap();
        let config = args.storage_config();

        assert_eq!(config.path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.prefix, DEFAULT_PREFIX);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_MB * 1024 * 1024);
        assert_eq!(config.flush_every_ms, Some(DEFAULT_FLUSH_MS));
        assert!(matches!(
            args.command,
            Command::Collect {
                format: OutputFormat::Text,
                kind: None
            }
        ));
    }

    #[test]
    fn test_storage_args() {
        let args = Args::try_parse_from([
            "tallystore",
            "--data-path",
            "/var/lib/tally",
            "--prefix",
            "app",
            "--cache-mb",
            "8",
            "--flush-ms",
            "0",
            "wipe",
            "--yes",
        ])
        .unwrap();
        let config = args.storage_config();

        assert_eq!(config.path, PathBuf::from("/var/lib/tally"));
        assert_eq!(config.prefix, "app");
        assert_eq!(config.cache_capacity, 8 * 1024 * 1024);
        assert_eq!(config.flush_every_ms, None);
        assert!(matches!(args.command, Command::Wipe { yes: true }));
    }

    #[test]
    fn test_update_subcommands() {
        let args = Args::try_parse_from([
            "tallystore", "inc", "hits", "-l", "color=blue", "--label", "size=xl",
        ])
        .unwrap();
        match args.command {
            Command::Inc {
                metric,
                value,
                float,
            } => {
                assert_eq!(metric.name, "hits");
                assert_eq!(metric.labels.len(), 2);
                assert_eq!(metric.labels[1], ("size".to_string(), "xl".to_string()));
                assert_eq!(value, 1.0);
                assert!(!float);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::try_parse_from(["tallystore", "gauge", "dec", "queue", "-3"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Gauge { op: GaugeOp::Dec, value, .. } if value == -3.0
        ));

        let args = Args::try_parse_from([
            "tallystore",
            "observe",
            "latency",
            "0.3",
            "--buckets",
            "0.1,0.5,1",
        ])
        .unwrap();
        match args.command {
            Command::Observe { buckets, value, .. } => {
                assert_eq!(buckets, vec![0.1, 0.5, 1.0]);
                assert_eq!(value, 0.3);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let args = Args::try_parse_from([
            "tallystore", "collect", "--format", "json", "--kind", "histogram",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Command::Collect {
                format: OutputFormat::Json,
                kind: Some(MetricKind::Histogram)
            }
        ));
    }

    #[test]
    fn test_invalid_args() {
        assert!(Args::try_parse_from(["tallystore", "inc", "hits", "-l", "novalue"]).is_err());
        assert!(Args::try_parse_from(["tallystore", "observe", "latency", "1"]).is_err());
        assert!(Args::try_parse_from(["tallystore", "collect", "--kind", "summary"]).is_err());
    }

    #[test]
    fn test_run_against_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let args =
            Args::try_parse_from(["tallystore", "--data-path", path, "inc", "hits", "5"]).unwrap();
        assert!(run(args).unwrap());

        let args = Args::try_parse_from(["tallystore", "--data-path", path, "collect"]).unwrap();
        let adapter = MetricsAdapter::open(args.storage_config());
        let collection = adapter.collect().unwrap();
        assert_eq!(
            collection.family(MetricKind::Counter, "hits").unwrap().samples[0].value,
            5.0
        );
    }
}
