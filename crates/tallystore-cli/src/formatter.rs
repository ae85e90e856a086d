//! Output formatters for collected metrics.

use clap::ValueEnum;
use comfy_table::Table;
use tallystore_core::exposition::{format_value, render_text};
use tallystore_core::MetricFamily;

/// Output format for collected metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Prometheus text exposition format
    Text,
    /// JSON format
    Json,
    /// ASCII table format
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

/// Format collected families in the requested format.
pub fn format_families(
    families: &[MetricFamily],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(render_text(families)),
        OutputFormat::Json => serde_json::to_string_pretty(families),
        OutputFormat::Table => Ok(format_table(families)),
    }
}

fn format_table(families: &[MetricFamily]) -> String {
    if families.iter().all(|family| family.samples.is_empty()) {
        return "No metrics".to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["Type", "Sample", "Labels", "Value"]);

    for family in families {
        for sample in &family.samples {
            let labels: Vec<String> = family
                .label_names
                .iter()
                .chain(&sample.label_names)
                .zip(&sample.label_values)
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();

            table.add_row(vec![
                family.kind.to_string(),
                sample.name.clone(),
                labels.join(", "),
                format_value(sample.value),
            ]);
        }
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tallystore_core::{MetricKind, Sample};

    fn hits() -> MetricFamily {
        MetricFamily {
            kind: MetricKind::Counter,
            name: "hits".to_string(),
            help: "Total hits".to_string(),
            label_names: vec!["color".to_string()],
            buckets: None,
            samples: vec![Sample::new("hits", vec![], vec!["blue".to_string()], 3.0)],
        }
    }

    #[test]
    fn test_text_format() {
        let output = format_families(&[hits()], OutputFormat::Text).unwrap();
        assert!(output.starts_with("# HELP hits Total hits\n"));
        assert!(output.contains("hits{color=\"blue\"} 3\n"));
    }

    #[test]
    fn test_json_format() {
        let output = format_families(&[hits()], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["type"], "counter");
        assert_eq!(value[0]["samples"][0]["labelValues"][0], "blue");
        assert_eq!(value[0]["samples"][0]["value"], 3.0);
    }

    #[test]
    fn test_table_format() {
        let output = format_families(&[hits()], OutputFormat::Table).unwrap();
        assert!(output.contains("color=blue"));
        assert!(output.contains("counter"));

        assert_eq!(format_families(&[], OutputFormat::Table).unwrap(), "No metrics");
    }
}
