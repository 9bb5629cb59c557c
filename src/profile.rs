use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::metrics::RunReport;

/// One segment of the ramp: hold `duration` while moving toward `target`
/// concurrent virtual users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageParseError {
    #[error("empty stage list")]
    Empty,
    #[error("invalid stage segment '{0}', expected '<duration>:<target>'")]
    Segment(String),
    #[error("invalid duration '{0}', expected e.g. 30s, 2m or 500ms")]
    Duration(String),
    #[error("invalid virtual-user target '{0}'")]
    Target(String),
}

/// Ordered ramp segments with piecewise-linear interpolation between targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampProfile {
    stages: Vec<Stage>,
}

impl RampProfile {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Virtual-user target at `elapsed`, interpolated linearly from the
    /// previous stage's target (0 before the first stage begins).
    pub fn target_at(&self, elapsed: Duration) -> usize {
        let mut from = 0f64;
        let mut offset = Duration::ZERO;
        for stage in &self.stages {
            let end = offset + stage.duration;
            if elapsed < end {
                let span = stage.duration.as_secs_f64();
                if span == 0.0 {
                    return stage.target;
                }
                let frac = (elapsed - offset).as_secs_f64() / span;
                return (from + (stage.target as f64 - from) * frac).round() as usize;
            }
            from = stage.target as f64;
            offset = end;
        }
        self.stages.last().map(|s| s.target).unwrap_or(0)
    }
}

impl Default for RampProfile {
    /// The standard profile: ramp to 10, climb to 50 and hold, spike to 100
    /// and hold, then wind down.
    fn default() -> Self {
        Self::new(vec![
            Stage { duration: Duration::from_secs(30), target: 10 },
            Stage { duration: Duration::from_secs(60), target: 50 },
            Stage { duration: Duration::from_secs(120), target: 50 },
            Stage { duration: Duration::from_secs(30), target: 100 },
            Stage { duration: Duration::from_secs(60), target: 100 },
            Stage { duration: Duration::from_secs(30), target: 0 },
        ])
    }
}

impl FromStr for RampProfile {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut stages = Vec::new();
        for segment in s.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (duration, target) = segment
                .split_once(':')
                .ok_or_else(|| StageParseError::Segment(segment.to_string()))?;
            let duration = parse_duration(duration)?;
            let target = target
                .trim()
                .parse::<usize>()
                .map_err(|_| StageParseError::Target(target.trim().to_string()))?;
            stages.push(Stage { duration, target });
        }
        if stages.is_empty() {
            return Err(StageParseError::Empty);
        }
        Ok(Self { stages })
    }
}

impl fmt::Display for RampProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", format_duration(stage.duration), stage.target)?;
        }
        Ok(())
    }
}

fn parse_duration(s: &str) -> Result<Duration, StageParseError> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| StageParseError::Duration(s.to_string()))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| StageParseError::Duration(s.to_string()))
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .map_err(|_| StageParseError::Duration(s.to_string()))
    } else {
        Err(StageParseError::Duration(s.to_string()))
    }
}

fn format_duration(d: Duration) -> String {
    if d.subsec_millis() > 0 {
        format!("{}ms", d.as_millis())
    } else if d.as_secs() >= 60 && d.as_secs() % 60 == 0 {
        format!("{}m", d.as_secs() / 60)
    } else {
        format!("{}s", d.as_secs())
    }
}

/// Pass/fail bounds evaluated against the final report.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_failed_rate: f64,
    pub max_error_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            p95_ms: 1000,
            p99_ms: 2000,
            max_failed_rate: 0.01,
            max_error_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdOutcome {
    pub label: String,
    pub passed: bool,
}

/// Evaluate the configured thresholds against a finished run. The error-rate
/// bound is only checked when the metric exists.
pub fn evaluate(thresholds: &Thresholds, report: &RunReport) -> Vec<ThresholdOutcome> {
    let mut outcomes = vec![
        ThresholdOutcome {
            label: format!(
                "http_req_duration p95 {}ms < {}ms",
                report.request_duration.p95, thresholds.p95_ms
            ),
            passed: report.request_duration.p95 < thresholds.p95_ms,
        },
        ThresholdOutcome {
            label: format!(
                "http_req_duration p99 {}ms < {}ms",
                report.request_duration.p99, thresholds.p99_ms
            ),
            passed: report.request_duration.p99 < thresholds.p99_ms,
        },
        ThresholdOutcome {
            label: format!(
                "http_req_failed rate {:.2}% < {:.2}%",
                report.failed_rate * 100.0,
                thresholds.max_failed_rate * 100.0
            ),
            passed: report.failed_rate < thresholds.max_failed_rate,
        },
    ];
    if let Some(rate) = report.error_rate {
        outcomes.push(ThresholdOutcome {
            label: format!(
                "errors rate {:.2}% < {:.2}%",
                rate * 100.0,
                thresholds.max_error_rate * 100.0
            ),
            passed: rate < thresholds.max_error_rate,
        });
    }
    outcomes
}
