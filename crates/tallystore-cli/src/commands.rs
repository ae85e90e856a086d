//! Subcommands and their execution against a metrics adapter.

use clap::{Args, Subcommand, ValueEnum};
use tallystore_core::{
    HistogramUpdate, MetricKind, MetricStore, MetricsAdapter, ScalarUpdate, UpdateCommand,
};

use crate::formatter::{format_families, OutputFormat};

/// Tallystore subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Increment a counter
    Inc {
        #[command(flatten)]
        metric: MetricArgs,

        /// Amount to add
        #[arg(default_value_t = 1.0, allow_negative_numbers = true)]
        value: f64,

        /// Add a floating-point amount instead of an integer one
        #[arg(long)]
        float: bool,
    },

    /// Set, increment or decrement a gauge
    Gauge {
        /// Gauge operation
        #[arg(value_enum)]
        op: GaugeOp,

        #[command(flatten)]
        metric: MetricArgs,

        /// Operand of the operation
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// Record a histogram observation
    Observe {
        #[command(flatten)]
        metric: MetricArgs,

        /// Observed value
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Ascending bucket upper bounds, comma separated
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        buckets: Vec<f64>,
    },

    /// Collect and print registered metrics
    Collect {
        /// Output format
        #[arg(long, default_value = "text", value_enum)]
        format: OutputFormat,

        /// Only collect metrics of this type
        #[arg(long)]
        kind: Option<MetricKind>,
    },

    /// Delete every metric in the namespace
    Wipe {
        /// Confirm the irreversible deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Gauge operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GaugeOp {
    Set,
    Inc,
    Dec,
}

/// Identity and labels shared by every update subcommand.
#[derive(Args, Debug)]
pub struct MetricArgs {
    /// Metric name
    pub name: String,

    /// Help text stored with the metric on its first write
    #[arg(long, default_value = "")]
    pub describe: String,

    /// Label as name=value; repeat for several labels
    #[arg(short, long = "label", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,
}

impl MetricArgs {
    fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|(name, _)| name.clone()).collect()
    }

    fn label_values(&self) -> Vec<String> {
        self.labels.iter().map(|(_, value)| value.clone()).collect()
    }

    fn scalar(&self, command: UpdateCommand, value: f64) -> ScalarUpdate {
        ScalarUpdate::new(&self.name, command, value)
            .with_help(&self.describe)
            .with_labels(self.label_names(), self.label_values())
    }
}

/// Parse a `name=value` label argument.
pub fn parse_label(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    if name.is_empty() {
        return Err(format!("label name is empty in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Result of a command: text for stdout plus problems for stderr.
#[derive(Debug, Default)]
pub struct Outcome {
    pub output: String,
    pub problems: Vec<String>,
}

impl Outcome {
    fn message(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            problems: Vec::new(),
        }
    }
}

/// Execute a command against an adapter.
pub fn execute<S: MetricStore>(
    adapter: &MetricsAdapter<S>,
    command: Command,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    match command {
        Command::Inc {
            metric,
            value,
            float,
        } => {
            let command = if float {
                UpdateCommand::IncrementFloat
            } else {
                UpdateCommand::IncrementInteger
            };
            adapter.update_counter(&metric.scalar(command, value))?;
            Ok(Outcome::default())
        }
        Command::Gauge { op, metric, value } => {
            let update = match op {
                GaugeOp::Set => metric.scalar(UpdateCommand::Set, value),
                GaugeOp::Inc => metric.scalar(UpdateCommand::IncrementFloat, value),
                GaugeOp::Dec => metric.scalar(UpdateCommand::IncrementFloat, -value),
            };
            adapter.update_gauge(&update)?;
            Ok(Outcome::default())
        }
        Command::Observe {
            metric,
            value,
            buckets,
        } => {
            let update = HistogramUpdate::new(&metric.name, buckets, value)
                .with_help(&metric.describe)
                .with_labels(metric.label_names(), metric.label_values());
            adapter.update_histogram(&update)?;
            Ok(Outcome::default())
        }
        Command::Collect { format, kind } => {
            let collection = match kind {
                Some(kind) => adapter.collect_kind(kind)?,
                None => adapter.collect()?,
            };

            let problems = collection
                .failures
                .iter()
                .map(|failure| format!("{} {}: {}", failure.kind, failure.key, failure.error))
                .collect();

            Ok(Outcome {
                output: format_families(&collection.families, format)?,
                problems,
            })
        }
        Command::Wipe { yes } => {
            if !yes {
                return Err("refusing to wipe without --yes".into());
            }
            let removed = adapter.wipe_all()?;
            Ok(Outcome::message(format!(
                "Removed {} entries under prefix '{}'",
                removed,
                adapter.keys().prefix()
            )))
        }
    }
}
