use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{header, header_regex, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shop_bench::catalog::SEARCH_TERMS;
use shop_bench::journey::{run_iteration, JourneyProfile};
use shop_bench::metrics::{Metrics, PageTrend, Recorder};

#[derive(Default)]
struct TestRecorder {
    requests: Mutex<Vec<(u64, bool)>>,
    checks: Mutex<Vec<bool>>,
    trends: Mutex<Vec<(PageTrend, u64)>>,
}

impl Recorder for TestRecorder {
    fn add_request(&self, duration_ms: u64, failed: bool) {
        self.requests.lock().unwrap().push((duration_ms, failed));
    }

    fn add_check(&self, passed: bool) {
        self.checks.lock().unwrap().push(passed);
    }

    fn add_trend(&self, trend: PageTrend, duration_ms: u64) {
        self.trends.lock().unwrap().push((trend, duration_ms));
    }
}

fn no_think_profile(checkout: f64, search: f64) -> JourneyProfile {
    JourneyProfile {
        checkout_probability: checkout,
        search_probability: search,
        think_time: Duration::ZERO,
    }
}

/// Mount a healthy storefront: every journey endpoint answers the way the
/// checks expect.
async fn mount_storefront(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>our product catalog</html>"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex("^/product/[A-Z0-9]+$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<button>Add to Cart</button>"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cart"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(302))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Your Cart"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cart/checkout"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Order Confirmation"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_journey_hits_core_pages() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let recorder = TestRecorder::default();
    let mut rng = StdRng::seed_from_u64(1);
    run_iteration(
        &reqwest::Client::new(),
        &server.uri(),
        &no_think_profile(0.0, 0.0),
        &recorder,
        &mut rng,
    )
    .await;

    let requests = recorder.requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|(_, failed)| !failed));

    let checks = recorder.checks.lock().unwrap();
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|&passed| passed));

    let trends = recorder.trends.lock().unwrap();
    assert!(trends.iter().any(|(t, _)| *t == PageTrend::Homepage));
    assert!(trends.iter().any(|(t, _)| *t == PageTrend::ProductPage));
    assert!(trends.iter().all(|(t, _)| *t != PageTrend::Checkout));
}

#[tokio::test]
async fn session_cookie_rides_every_request() {
    let server = MockServer::start().await;

    // Only answer when the session cookie is present; a missing cookie turns
    // into a 404 and fails the journey checks below.
    let cookie = || header_regex("cookie", "^shop_session-id=session-");
    Mock::given(method("GET"))
        .and(path("/"))
        .and(cookie())
        .respond_with(ResponseTemplate::new(200).set_body_string("product"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex("^/product/[A-Z0-9]+$"))
        .and(cookie())
        .respond_with(ResponseTemplate::new(200).set_body_string("Add to Cart"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cart"))
        .and(cookie())
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(cookie())
        .respond_with(ResponseTemplate::new(200).set_body_string("Cart"))
        .mount(&server)
        .await;

    let recorder = TestRecorder::default();
    let mut rng = StdRng::seed_from_u64(2);
    run_iteration(
        &reqwest::Client::new(),
        &server.uri(),
        &no_think_profile(0.0, 0.0),
        &recorder,
        &mut rng,
    )
    .await;

    let checks = recorder.checks.lock().unwrap();
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|&passed| passed));
}

#[tokio::test]
async fn checkout_branch_records_wall_clock_elapsed() {
    let server = MockServer::start().await;

    // Slow down checkout only; mounted first so it wins over the storefront
    // default. The recorded trend must reflect the wait.
    Mock::given(method("POST"))
        .and(path("/cart/checkout"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Order Confirmation")
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;
    mount_storefront(&server).await;

    let recorder = TestRecorder::default();
    let mut rng = StdRng::seed_from_u64(3);
    run_iteration(
        &reqwest::Client::new(),
        &server.uri(),
        &no_think_profile(1.0, 0.0),
        &recorder,
        &mut rng,
    )
    .await;

    assert_eq!(recorder.requests.lock().unwrap().len(), 5);

    let checks = recorder.checks.lock().unwrap();
    assert_eq!(checks.len(), 5);
    assert!(checks.iter().all(|&passed| passed));

    let trends = recorder.trends.lock().unwrap();
    let (_, checkout_ms) = trends
        .iter()
        .find(|(t, _)| *t == PageTrend::Checkout)
        .expect("checkout trend sample");
    assert!(*checkout_ms >= 150, "checkout_ms={checkout_ms}");
}

#[tokio::test]
async fn search_failure_stays_out_of_error_rate() {
    let server = MockServer::start().await;

    // Search responses fail while the rest of the storefront is healthy.
    for term in SEARCH_TERMS {
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("search", term))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
    }
    mount_storefront(&server).await;

    let recorder = TestRecorder::default();
    let mut rng = StdRng::seed_from_u64(4);
    run_iteration(
        &reqwest::Client::new(),
        &server.uri(),
        &no_think_profile(0.0, 1.0),
        &recorder,
        &mut rng,
    )
    .await;

    let requests = recorder.requests.lock().unwrap();
    assert_eq!(requests.len(), 5);
    let (_, search_failed) = requests.last().unwrap();
    assert!(search_failed, "search request should count as failed");

    // The failed search moved no check: the error rate only saw the four
    // core steps, all green.
    let checks = recorder.checks.lock().unwrap();
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|&passed| passed));
}

#[tokio::test]
async fn homepage_failure_is_recorded_not_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_storefront(&server).await;

    let recorder = TestRecorder::default();
    let mut rng = StdRng::seed_from_u64(5);
    run_iteration(
        &reqwest::Client::new(),
        &server.uri(),
        &no_think_profile(0.0, 0.0),
        &recorder,
        &mut rng,
    )
    .await;

    let checks = recorder.checks.lock().unwrap();
    assert_eq!(checks.len(), 4);
    assert!(!checks[0], "homepage check should fail");
    assert!(checks[1..].iter().all(|&passed| passed));

    let requests = recorder.requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(requests[0].1, "homepage request should count as failed");
}

#[tokio::test]
async fn metrics_aggregate_a_full_journey() {
    let server = MockServer::start().await;
    mount_storefront(&server).await;

    let metrics = Metrics::new();
    let mut rng = StdRng::seed_from_u64(6);
    run_iteration(
        &reqwest::Client::new(),
        &server.uri(),
        &no_think_profile(0.0, 0.0),
        &metrics,
        &mut rng,
    )
    .await;

    let report = metrics.report(Duration::from_secs(1));
    assert_eq!(report.total_requests, 4);
    assert_eq!(report.failed_requests, 0);
    assert_eq!(report.error_rate, Some(0.0));
    assert_eq!(report.homepage_load_time.count, 1);
    assert_eq!(report.product_page_load_time.count, 1);
    assert_eq!(report.checkout_time.count, 0);
}
