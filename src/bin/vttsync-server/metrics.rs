use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts as PromOpts, Registry,
    TextEncoder,
};

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_in_flight_requests: IntGauge,
    acquisitions_total: IntCounterVec,
    acquisition_duration_seconds: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            PromOpts::new(
                "vttsync_http_requests_total",
                "Total HTTP requests served by vttsync-server.",
            ),
            &["route", "status"],
        )
        .expect("metrics definition must be valid");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "vttsync_http_request_duration_seconds",
                "HTTP request latency in seconds.",
            ),
            &["route", "status"],
        )
        .expect("metrics definition must be valid");

        let http_in_flight_requests = IntGauge::new(
            "vttsync_http_in_flight_requests",
            "Current number of in-flight HTTP requests.",
        )
        .expect("metrics definition must be valid");

        let acquisitions_total = IntCounterVec::new(
            PromOpts::new(
                "vttsync_acquisitions_total",
                "Media acquisitions by outcome (`ok` or an error kind).",
            ),
            &["outcome"],
        )
        .expect("metrics definition must be valid");

        // Extraction of a long video can take minutes.
        let acquisition_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "vttsync_acquisition_duration_seconds",
                "Media acquisition wall time in seconds.",
            )
            .buckets(vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["outcome"],
        )
        .expect("metrics definition must be valid");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(http_in_flight_requests.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(acquisitions_total.clone()))
            .expect("metrics must register");
        registry
            .register(Box::new(acquisition_duration_seconds.clone()))
            .expect("metrics must register");

        Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_in_flight_requests,
            acquisitions_total,
            acquisition_duration_seconds,
        }
    })
}

pub fn init() {
    let _ = metrics();
}

pub fn record_acquisition(outcome: &str, elapsed: Duration) {
    metrics()
        .acquisitions_total
        .with_label_values(&[outcome])
        .inc();
    metrics()
        .acquisition_duration_seconds
        .with_label_values(&[outcome])
        .observe(elapsed.as_secs_f64());
}

pub async fn prometheus_metrics() -> Response {
    let families = metrics().registry.gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        )],
        buf,
    )
        .into_response()
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or_else(|| req.uri().path())
        .to_owned();

    if route == "/metrics" || route == "/healthz" {
        return next.run(req).await;
    }

    let start = Instant::now();

    let in_flight = InFlight::start();
    let response = next.run(req).await;
    drop(in_flight);

    let status = response.status().as_u16().to_string();
    metrics()
        .http_requests_total
        .with_label_values(&[route.as_str(), status.as_str()])
        .inc();
    metrics()
        .http_request_duration_seconds
        .with_label_values(&[route.as_str(), status.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}

/// Holds the in-flight gauge up; dropping it (including when a timed-out request is
/// abandoned) brings it back down.
struct InFlight;

impl InFlight {
    fn start() -> Self {
        metrics().http_in_flight_requests.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics().http_in_flight_requests.dec();
    }
}
