//! A fake content-management site for exercising the harness: fixed page
//! routes with jittered latency, a fixed-delay route, a rate-limited route
//! that starts failing under pressure, and per-path hit counters the tests
//! can assert round-robin coverage against.
use axum::{
    debug_handler,
    extract::{OriginalUri, Path},
    http::{HeaderMap, StatusCode},
    response::Html,
    routing::get,
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand_distr::{Distribution, LogNormal};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

pub async fn run(addr: SocketAddr) {
    let app = Router::new()
        .route("/", get(page))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/limited/:max_tps", get(limited))
        .route("/*page", get(page))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Serve a CMS-ish page after a log-normally jittered delay. Paths under
/// `/missing/` 404, everything else is content.
#[debug_handler]
pub async fn page(
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<([(&'static str, &'static str); 1], Html<String>), StatusCode> {
    counter!("mock-server.rps").increment(1);
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    record_hit(uri.path());

    let jitter = {
        // Median ~15ms with a longish tail; rng dropped before the await.
        let lognormal = LogNormal::new((0.015f64).ln(), 0.4).unwrap();
        lognormal.sample(&mut rand::thread_rng())
    };
    tokio::time::sleep(Duration::from_secs_f64(jitter)).await;

    if uri.path().starts_with("/missing/") {
        return Err(StatusCode::NOT_FOUND);
    }

    // A logged-in cookie bypasses the pretend cache layer.
    let cache = if headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("wordpress_logged_in"))
        .unwrap_or(false)
    {
        "BYPASS"
    } else {
        "HIT"
    };

    Ok((
        [("x-mock-cache", cache)],
        Html(format!("<html><body><h1>{}</h1></body></html>", uri.path())),
    ))
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

lazy_static! {
    static ref LIMITED_MAP: Arc<RwLock<HashMap<u32, Arc<DefaultDirectRateLimiter>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Succeeds within the per-key request budget, 500s beyond it: a backend
/// that collapses under load.
#[debug_handler]
pub async fn limited(Path(max_tps): Path<u32>) -> Result<(), StatusCode> {
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);

    let read = LIMITED_MAP.read().unwrap().get(&max_tps).cloned();
    let limiter = if let Some(limiter) = read {
        limiter
    } else {
        let limiter = Arc::new(rate_limiter(max_tps));
        LIMITED_MAP
            .write()
            .unwrap()
            .insert(max_tps, limiter.clone());
        limiter
    };

    match limiter.check() {
        Ok(_) => Ok(()),
        Err(_) => {
            debug!("limited route over budget");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/** Utils **/

pub fn rate_limiter(tps: u32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(NonZeroU32::new(tps).unwrap()))
}

/** Hit counters **/

lazy_static! {
    static ref HITS: Arc<RwLock<HashMap<String, u64>>> = Arc::new(RwLock::new(HashMap::new()));
}

fn record_hit(path: &str) {
    *HITS
        .write()
        .unwrap()
        .entry(path.to_string())
        .or_insert(0) += 1;
}

pub fn hit_count(path: &str) -> u64 {
    HITS.read().unwrap().get(path).copied().unwrap_or(0)
}

pub fn reset_hits() {
    HITS.write().unwrap().clear();
}

/** RPS Printer **/

static RPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn rps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = RPS_MEASURE.fetch_min(0, Ordering::Relaxed);
        println!("{requests} RPS");
    }
}
