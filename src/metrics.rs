use hdrhistogram::Histogram;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Named duration trends the journey records into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTrend {
    Homepage,
    ProductPage,
    Checkout,
}

/// Recording seam between the journey and the metrics backend.
///
/// The journey only ever writes observations; aggregation and percentile
/// computation happen behind this trait. Tests substitute an in-memory
/// recorder to assert on exactly what was written.
pub trait Recorder: Send + Sync {
    /// Per-request accounting, called exactly once per HTTP call.
    fn add_request(&self, duration_ms: u64, failed: bool);

    /// Outcome of a journey check; feeds the custom error rate.
    fn add_check(&self, passed: bool);

    /// One sample into a named duration trend.
    fn add_trend(&self, trend: PageTrend, duration_ms: u64);
}

#[derive(Clone)]
pub struct Metrics {
    request_duration: Arc<Mutex<Histogram<u64>>>,
    homepage_load_time: Arc<Mutex<Histogram<u64>>>,
    product_page_load_time: Arc<Mutex<Histogram<u64>>>,
    checkout_time: Arc<Mutex<Histogram<u64>>>,
    total_requests: Arc<AtomicU64>,
    failed_requests: Arc<AtomicU64>,
    checks_total: Arc<AtomicU64>,
    checks_failed: Arc<AtomicU64>,
    iterations: Arc<AtomicU64>,
    active_vus: Arc<AtomicUsize>,
    peak_vus: Arc<AtomicUsize>,
}

fn new_histogram() -> Arc<Mutex<Histogram<u64>>> {
    Arc::new(Mutex::new(
        Histogram::<u64>::new_with_bounds(1, 60_000, 3).unwrap(),
    ))
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            request_duration: new_histogram(),
            homepage_load_time: new_histogram(),
            product_page_load_time: new_histogram(),
            checkout_time: new_histogram(),
            total_requests: Arc::new(AtomicU64::new(0)),
            failed_requests: Arc::new(AtomicU64::new(0)),
            checks_total: Arc::new(AtomicU64::new(0)),
            checks_failed: Arc::new(AtomicU64::new(0)),
            iterations: Arc::new(AtomicU64::new(0)),
            active_vus: Arc::new(AtomicUsize::new(0)),
            peak_vus: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn vu_started(&self) {
        let active = self.active_vus.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_vus.fetch_max(active, Ordering::Relaxed);
    }

    pub fn vu_stopped(&self) {
        self.active_vus.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn add_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_vus(&self) -> usize {
        self.active_vus.load(Ordering::Relaxed)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Snapshot the accumulated observations into an owned report.
    pub fn report(&self, run_duration: Duration) -> RunReport {
        let total = self.total_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let failed_rate = if total > 0 {
            failed as f64 / total as f64
        } else {
            0.0
        };

        // The error-rate metric only exists once a check has been recorded;
        // the summary must cope with it being absent.
        let checks = self.checks_total.load(Ordering::Relaxed);
        let error_rate = if checks > 0 {
            Some(self.checks_failed.load(Ordering::Relaxed) as f64 / checks as f64)
        } else {
            None
        };

        RunReport {
            run_duration_ms: run_duration.as_millis() as u64,
            peak_vus: self.peak_vus.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            total_requests: total,
            failed_requests: failed,
            failed_rate,
            request_duration: snapshot(&self.request_duration),
            homepage_load_time: snapshot(&self.homepage_load_time),
            product_page_load_time: snapshot(&self.product_page_load_time),
            checkout_time: snapshot(&self.checkout_time),
            error_rate,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for Metrics {
    fn add_request(&self, duration_ms: u64, failed: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut hist) = self.request_duration.lock() {
            hist.record(duration_ms.max(1)).ok();
        }
    }

    fn add_check(&self, passed: bool) {
        self.checks_total.fetch_add(1, Ordering::Relaxed);
        if !passed {
            self.checks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn add_trend(&self, trend: PageTrend, duration_ms: u64) {
        let hist = match trend {
            PageTrend::Homepage => &self.homepage_load_time,
            PageTrend::ProductPage => &self.product_page_load_time,
            PageTrend::Checkout => &self.checkout_time,
        };
        if let Ok(mut hist) = hist.lock() {
            hist.record(duration_ms.max(1)).ok();
        }
    }
}

fn snapshot(hist: &Mutex<Histogram<u64>>) -> TrendStats {
    hist.lock()
        .map(|h| TrendStats::from_histogram(&h))
        .unwrap_or_else(|_| TrendStats::empty())
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendStats {
    pub count: u64,
    pub min: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
}

impl TrendStats {
    fn empty() -> Self {
        Self {
            count: 0,
            min: 0,
            mean: 0.0,
            p50: 0,
            p95: 0,
            p99: 0,
            max: 0,
        }
    }

    fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.is_empty() {
            return Self::empty();
        }
        Self {
            count: hist.len(),
            min: hist.min(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            max: hist.max(),
        }
    }
}

/// Aggregated results of a full run, serialized verbatim into the JSON artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_duration_ms: u64,
    pub peak_vus: usize,
    pub iterations: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub failed_rate: f64,
    pub request_duration: TrendStats,
    pub homepage_load_time: TrendStats,
    pub product_page_load_time: TrendStats,
    pub checkout_time: TrendStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
}
