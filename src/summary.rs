use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::path::Path;

use crate::metrics::{RunReport, TrendStats};
use crate::profile::ThresholdOutcome;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";

pub fn use_colors(no_color: bool) -> bool {
    !no_color && std::io::stdout().is_terminal()
}

/// Render the human-readable run summary. The custom error-rate line is
/// emitted only when the metric exists.
pub fn render_text(report: &RunReport, outcomes: &[ThresholdOutcome], colors: bool) -> String {
    let paint = |code: &str, text: String| {
        if colors {
            format!("{code}{text}{RESET}")
        } else {
            text
        }
    };
    let indent = " ";

    let mut out = String::from("\n");
    out += &format!("{indent}{}\n", paint(BOLD, "Test Summary".to_string()));
    out += &format!("{indent}============\n\n");

    out += &format!("{indent}Duration: {}ms\n", report.run_duration_ms);
    out += &format!("{indent}VUs: {}\n", report.peak_vus);
    out += &format!("{indent}Iterations: {}\n\n", report.iterations);

    out += &format!("{indent}HTTP Metrics:\n");
    out += &format!("{indent}  Requests: {}\n", report.total_requests);
    out += &format!("{indent}  Failed: {:.2}%\n", report.failed_rate * 100.0);
    out += &format!(
        "{indent}  Duration (avg): {:.2}ms\n",
        report.request_duration.mean
    );
    out += &format!(
        "{indent}  Duration (p95): {}ms\n",
        report.request_duration.p95
    );
    out += &format!(
        "{indent}  Duration (p99): {}ms\n\n",
        report.request_duration.p99
    );

    out += &trend_block(indent, "Homepage Load (ms)", &report.homepage_load_time);
    out += &trend_block(
        indent,
        "Product Page Load (ms)",
        &report.product_page_load_time,
    );
    out += &trend_block(indent, "Checkout (ms)", &report.checkout_time);

    out += &format!("{indent}Thresholds:\n");
    for outcome in outcomes {
        let mark = if outcome.passed {
            paint(GREEN, "PASS".to_string())
        } else {
            paint(RED, "FAIL".to_string())
        };
        out += &format!("{indent}  [{mark}] {}\n", outcome.label);
    }

    if let Some(rate) = report.error_rate {
        out += &format!("\n{indent}Error Rate: {:.2}%\n", rate * 100.0);
    }

    out
}

fn trend_block(indent: &str, title: &str, stats: &TrendStats) -> String {
    let mut out = format!("{indent}{title}:\n");
    if stats.count == 0 {
        out += &format!("{indent}  No data\n\n");
        return out;
    }
    out += &format!("{indent}  Count: {}\n", stats.count);
    out += &format!("{indent}  Min:   {}\n", stats.min);
    out += &format!("{indent}  Mean:  {:.2}\n", stats.mean);
    out += &format!("{indent}  p50:   {}\n", stats.p50);
    out += &format!("{indent}  p95:   {}\n", stats.p95);
    out += &format!("{indent}  p99:   {}\n", stats.p99);
    out += &format!("{indent}  Max:   {}\n\n", stats.max);
    out
}

/// Serialize the report verbatim to the JSON artifact, creating the parent
/// directory when needed.
pub fn write_artifact(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating artifact directory {}", parent.display()))?;
        }
    }
    let json = sonic_rs::to_string(report).context("serializing run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("writing summary artifact {}", path.display()))?;
    Ok(())
}
