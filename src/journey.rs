use rand::Rng;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::catalog::{random_product, random_search_term};
use crate::metrics::{PageTrend, Recorder};

const PAGE_LOAD_BUDGET: Duration = Duration::from_millis(1000);
const CHECKOUT_BUDGET: Duration = Duration::from_millis(3000);

/// Behavior knobs for one simulated shopper.
#[derive(Debug, Clone)]
pub struct JourneyProfile {
    /// Probability that an iteration proceeds to checkout.
    pub checkout_probability: f64,
    /// Probability that an iteration runs a catalog search.
    pub search_probability: f64,
    /// Length of one think-time unit. Zero disables pauses entirely.
    pub think_time: Duration,
}

impl Default for JourneyProfile {
    fn default() -> Self {
        Self {
            checkout_probability: 0.25,
            search_probability: 0.10,
            think_time: Duration::from_secs(1),
        }
    }
}

// =============================================================================
// Checks
// =============================================================================

pub fn homepage_check(status: u16, body: &str, duration: Duration) -> bool {
    status == 200 && body.contains("product") && duration < PAGE_LOAD_BUDGET
}

pub fn product_page_check(status: u16, body: &str, duration: Duration) -> bool {
    status == 200 && body.contains("Add to Cart") && duration < PAGE_LOAD_BUDGET
}

pub fn add_to_cart_check(status: u16) -> bool {
    status == 200 || status == 302
}

pub fn cart_view_check(status: u16, body: &str) -> bool {
    status == 200 && (body.contains("Cart") || body.contains("Empty"))
}

pub fn checkout_check(status: u16, elapsed: Duration) -> bool {
    (status == 200 || status == 302) && elapsed < CHECKOUT_BUDGET
}

pub fn search_check(status: u16) -> bool {
    status == 200
}

/// Engine-level failure classification: anything outside 2xx/3xx, including
/// transport errors surfaced as status 0.
pub fn request_failed(status: u16) -> bool {
    !(200..400).contains(&status)
}

// =============================================================================
// Session & payloads
// =============================================================================

/// Correlation token carried as a cookie across one iteration. Time plus a
/// random suffix keeps concurrent iterations apart; this is not a credential.
pub fn session_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("session-{}-{:08x}", now_ms, rng.random::<u32>())
}

#[derive(Debug, Serialize)]
struct CartPayload<'a> {
    product_id: &'a str,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct CheckoutPayload {
    email: String,
    street_address: &'static str,
    zip_code: &'static str,
    city: &'static str,
    state: &'static str,
    country: &'static str,
    credit_card_number: &'static str,
    credit_card_expiration_month: &'static str,
    credit_card_expiration_year: &'static str,
    credit_card_cvv: &'static str,
}

impl CheckoutPayload {
    fn for_session(session: &str) -> Self {
        Self {
            email: format!("user{session}@example.com"),
            street_address: "123 Main St",
            zip_code: "12345",
            city: "San Francisco",
            state: "CA",
            country: "US",
            credit_card_number: "4111-1111-1111-1111",
            credit_card_expiration_month: "12",
            credit_card_expiration_year: "2025",
            credit_card_cvv: "123",
        }
    }
}

// =============================================================================
// HTTP plumbing
// =============================================================================

struct PageResponse {
    status: u16,
    body: String,
    elapsed: Duration,
}

impl PageResponse {
    fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Issue a request and normalize the outcome. Transport errors become a
/// status-0 response with an empty body so the journey keeps walking.
async fn fetch(builder: reqwest::RequestBuilder) -> PageResponse {
    let started = Instant::now();
    let (status, body) = match builder.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            match response.text().await {
                Ok(body) => (status, body),
                Err(err) => {
                    debug!("failed to read response body: {err}");
                    (status, String::new())
                }
            }
        }
        Err(err) => {
            debug!("request failed: {err}");
            (0, String::new())
        }
    };
    PageResponse {
        status,
        body,
        elapsed: started.elapsed(),
    }
}

async fn post_json<T: Serialize>(
    client: &Client,
    url: String,
    cookie: &str,
    payload: &T,
) -> PageResponse {
    let body = sonic_rs::to_string(payload).unwrap_or_default();
    fetch(
        client
            .post(url)
            .header(COOKIE, cookie)
            .header(CONTENT_TYPE, "application/json")
            .body(body),
    )
    .await
}

async fn pause(profile: &JourneyProfile, units: f64) {
    let think = profile.think_time.mul_f64(units);
    if !think.is_zero() {
        tokio::time::sleep(think).await;
    }
}

// =============================================================================
// The journey
// =============================================================================

/// One full shopper iteration: homepage, product page, add to cart, cart
/// view, then an optional checkout and an optional search. Every request is
/// recorded exactly once; check failures feed the error rate (search
/// excepted) and never abort the iteration.
pub async fn run_iteration<R: Rng>(
    client: &Client,
    base_url: &str,
    profile: &JourneyProfile,
    recorder: &dyn Recorder,
    rng: &mut R,
) {
    let session = session_id(rng);
    let cookie = format!("shop_session-id={session}");

    // Homepage
    let response = fetch(client.get(base_url).header(COOKIE, &cookie)).await;
    recorder.add_request(response.elapsed_ms(), request_failed(response.status));
    recorder.add_check(homepage_check(
        response.status,
        &response.body,
        response.elapsed,
    ));
    recorder.add_trend(PageTrend::Homepage, response.elapsed_ms());
    pause(profile, 1.0).await;

    // Product detail page
    let product_id = random_product(rng);
    let response = fetch(
        client
            .get(format!("{base_url}/product/{product_id}"))
            .header(COOKIE, &cookie),
    )
    .await;
    recorder.add_request(response.elapsed_ms(), request_failed(response.status));
    recorder.add_check(product_page_check(
        response.status,
        &response.body,
        response.elapsed,
    ));
    recorder.add_trend(PageTrend::ProductPage, response.elapsed_ms());
    pause(profile, 2.0).await;

    // Add to cart
    let quantity: u32 = rng.random_range(1..=3);
    let payload = CartPayload {
        product_id,
        quantity,
    };
    let response = post_json(client, format!("{base_url}/cart"), &cookie, &payload).await;
    recorder.add_request(response.elapsed_ms(), request_failed(response.status));
    recorder.add_check(add_to_cart_check(response.status));
    pause(profile, 1.0).await;

    // Cart view
    let response = fetch(client.get(format!("{base_url}/cart")).header(COOKIE, &cookie)).await;
    recorder.add_request(response.elapsed_ms(), request_failed(response.status));
    recorder.add_check(cart_view_check(response.status, &response.body));
    pause(profile, 2.0).await;

    // Checkout, for a fraction of shoppers. The recorded duration is the
    // wall-clock time of the whole sub-step, not the transport timing.
    if rng.random_bool(profile.checkout_probability) {
        let started = Instant::now();
        let payload = CheckoutPayload::for_session(&session);
        let response = post_json(
            client,
            format!("{base_url}/cart/checkout"),
            &cookie,
            &payload,
        )
        .await;
        let elapsed = started.elapsed();
        recorder.add_request(response.elapsed_ms(), request_failed(response.status));
        recorder.add_check(checkout_check(response.status, elapsed));
        recorder.add_trend(PageTrend::Checkout, elapsed.as_millis() as u64);
        pause(profile, 3.0).await;
    }

    // Search, for a smaller fraction. Its check deliberately stays out of
    // the aggregate error rate.
    if rng.random_bool(profile.search_probability) {
        let term = random_search_term(rng);
        let response = fetch(
            client
                .get(format!("{base_url}/?search={term}"))
                .header(COOKIE, &cookie),
        )
        .await;
        recorder.add_request(response.elapsed_ms(), request_failed(response.status));
        if !search_check(response.status) {
            debug!(status = response.status, "search returned non-200");
        }
        pause(profile, 1.0).await;
    }

    // Reading pause between iterations.
    let units = rng.random_range(1.0..4.0);
    pause(profile, units).await;
}
