//! Prometheus text exposition of collected families.

use crate::metrics::MetricFamily;

/// Render families in the Prometheus text format.
pub fn render_text(families: &[MetricFamily]) -> String {
    let mut out = String::new();

    for family in families {
        out.push_str(&format!(
            "# HELP {} {}\n",
            family.name,
            escape_help(&family.help)
        ));
        out.push_str(&format!("# TYPE {} {}\n", family.name, family.kind));

        for sample in &family.samples {
            let labels: Vec<String> = family
                .label_names
                .iter()
                .chain(&sample.label_names)
                .zip(&sample.label_values)
                .map(|(name, value)| format!("{}=\"{}\"", name, escape_label_value(value)))
                .collect();

            out.push_str(&sample.name);
            if !labels.is_empty() {
                out.push('{');
                out.push_str(&labels.join(","));
                out.push('}');
            }
            out.push_str(&format!(" {}\n", format_value(sample.value)));
        }

        out.push('\n');
    }

    out
}

/// Render a sample value; infinities and NaN use the exposition spellings.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
