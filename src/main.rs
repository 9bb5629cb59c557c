use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;

use shop_bench::config::Config;
use shop_bench::metrics::Metrics;
use shop_bench::profile::evaluate;
use shop_bench::{runner, summary};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Print banner
    info!("════════════════════════════════════════════════════════════");
    info!("          STOREFRONT USER-JOURNEY LOAD BENCHMARK");
    info!("════════════════════════════════════════════════════════════");
    info!("Target: {}", config.base_url);
    info!("Stages: {}", config.stages);
    info!(
        "Branches: checkout {:.0}%, search {:.0}%",
        config.checkout_rate * 100.0,
        config.search_rate * 100.0
    );
    info!(
        "Thresholds: p95<{}ms, p99<{}ms, failed<{:.2}%, errors<{:.2}%",
        config.threshold_p95_ms,
        config.threshold_p99_ms,
        config.threshold_failed_rate * 100.0,
        config.threshold_error_rate * 100.0
    );
    info!("════════════════════════════════════════════════════════════");

    // Requests carry no client-side timeout; latency budgets are evaluated
    // against the recorded distributions after the run.
    let client = reqwest::Client::builder()
        .build()
        .context("building HTTP client")?;

    let metrics = Metrics::new();
    let run_duration = runner::run(
        client,
        config.base_url.clone(),
        config.stages.clone(),
        config.journey_profile(),
        metrics.clone(),
        Duration::from_secs(config.shutdown_grace),
    )
    .await?;

    let report = metrics.report(run_duration);
    let outcomes = evaluate(&config.thresholds(), &report);

    print!(
        "{}",
        summary::render_text(&report, &outcomes, summary::use_colors(config.no_color))
    );
    summary::write_artifact(&report, &config.summary_path)?;
    info!(
        "summary artifact written to {}",
        config.summary_path.display()
    );

    if outcomes.iter().any(|outcome| !outcome.passed) {
        info!("run finished with failed thresholds");
        std::process::exit(1);
    }

    info!("run finished, all thresholds passed");
    Ok(())
}
