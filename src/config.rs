use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::journey::JourneyProfile;
use crate::profile::{RampProfile, Thresholds};

#[derive(Parser, Debug)]
#[command(name = "shop-bench")]
#[command(about = "Storefront user-journey load benchmark", long_about = None)]
pub struct Config {
    /// Storefront base URL
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080", value_parser = parse_base_url)]
    pub base_url: String,

    /// Ramp profile as comma-separated duration:target stages
    #[arg(
        long,
        env = "STAGES",
        default_value = "30s:10,1m:50,2m:50,30s:100,1m:100,30s:0"
    )]
    pub stages: RampProfile,

    /// Probability that an iteration proceeds to checkout
    #[arg(long, env = "CHECKOUT_RATE", default_value = "0.25")]
    pub checkout_rate: f64,

    /// Probability that an iteration runs a catalog search
    #[arg(long, env = "SEARCH_RATE", default_value = "0.1")]
    pub search_rate: f64,

    /// Think-time unit in seconds (0 disables pauses)
    #[arg(long, env = "THINK_TIME", default_value = "1.0")]
    pub think_time: f64,

    /// p95 bound on request duration in milliseconds
    #[arg(long, env = "THRESHOLD_P95_MS", default_value = "1000")]
    pub threshold_p95_ms: u64,

    /// p99 bound on request duration in milliseconds
    #[arg(long, env = "THRESHOLD_P99_MS", default_value = "2000")]
    pub threshold_p99_ms: u64,

    /// Maximum failed-request rate
    #[arg(long, env = "THRESHOLD_FAILED_RATE", default_value = "0.01")]
    pub threshold_failed_rate: f64,

    /// Maximum custom error rate
    #[arg(long, env = "THRESHOLD_ERROR_RATE", default_value = "0.05")]
    pub threshold_error_rate: f64,

    /// Path of the JSON summary artifact
    #[arg(
        long,
        env = "SUMMARY_PATH",
        default_value = "results/load-test-summary.json"
    )]
    pub summary_path: PathBuf,

    /// Disable ANSI colors in the text summary
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Grace period in seconds for virtual users to wind down at run end
    #[arg(long, env = "SHUTDOWN_GRACE", default_value = "30")]
    pub shutdown_grace: u64,
}

fn parse_base_url(s: &str) -> std::result::Result<String, String> {
    let url = Url::parse(s).map_err(|err| format!("invalid base URL: {err}"))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported URL scheme '{other}'")),
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("checkout rate", self.checkout_rate),
            ("search rate", self.search_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be within [0, 1], got {value}");
            }
        }
        if !self.think_time.is_finite() || self.think_time < 0.0 {
            bail!("think time must be a non-negative number of seconds");
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            p95_ms: self.threshold_p95_ms,
            p99_ms: self.threshold_p99_ms,
            max_failed_rate: self.threshold_failed_rate,
            max_error_rate: self.threshold_error_rate,
        }
    }

    pub fn journey_profile(&self) -> JourneyProfile {
        JourneyProfile {
            checkout_probability: self.checkout_rate,
            search_probability: self.search_rate,
            think_time: Duration::from_secs_f64(self.think_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_validated_and_normalized() {
        assert_eq!(
            parse_base_url("http://localhost:8080").unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(
            parse_base_url("https://shop.example.com/").unwrap(),
            "https://shop.example.com"
        );
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("ftp://shop.example.com").is_err());
    }

    #[test]
    fn defaults_parse_and_validate() {
        let config = Config::try_parse_from(["shop-bench"]).unwrap();
        config.validate().unwrap();
        assert_eq!(config.stages, RampProfile::default());
        assert_eq!(config.threshold_p95_ms, 1000);
        assert_eq!(config.threshold_p99_ms, 2000);

        let journey = config.journey_profile();
        assert_eq!(journey.checkout_probability, 0.25);
        assert_eq!(journey.search_probability, 0.1);
        assert_eq!(journey.think_time, Duration::from_secs(1));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let config =
            Config::try_parse_from(["shop-bench", "--checkout-rate", "1.5"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_stages_fail_at_parse_time() {
        assert!(Config::try_parse_from(["shop-bench", "--stages", "fast:10"]).is_err());
    }
}
