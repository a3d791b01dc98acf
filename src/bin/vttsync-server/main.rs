use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::level_filters::LevelFilter;
use tracing::{Level, error, info};

mod metrics;

use vttsync::cli::AcquisitionArgs;
use vttsync::cue_encoder::{CueEncoder, write_cues};
use vttsync::json_array_encoder::JsonArrayEncoder;
use vttsync::sanitize::{clean, strip_preamble};
use vttsync::vtt_encoder::{VttEncoder, vtt_file_name};
use vttsync::{Acquirer, Cue, ErrorKind, MediaArtifact, OutputType, locator, vtt_parser};

#[derive(Parser, Debug)]
#[command(name = "vttsync-server")]
#[command(about = "HTTP server for video audio acquisition and WebVTT caption utilities")]
struct Params {
    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", env = "PORT", default_value_t = 3001)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 50 * 1024 * 1024)]
    max_bytes: usize,

    /// Abort requests that take longer than this many seconds (0 disables the limit).
    #[arg(long = "request-timeout-secs", default_value_t = 600)]
    request_timeout_secs: u64,

    #[command(flatten)]
    acquisition: AcquisitionArgs,
}

#[derive(Clone)]
struct AppState {
    acquirer: Arc<Acquirer>,
    /// Cancelled on shutdown; every acquisition runs under a child token.
    shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    success: bool,
    data: MediaArtifact,
}

#[derive(Debug, Deserialize)]
struct CuesQuery {
    #[serde(default, alias = "output_type")]
    output: Option<String>,
    /// Source media name; when present the response is offered as a `.vtt`/`.json` download.
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    strip_preamble: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ActiveRequest {
    document: String,
    time: f64,
}

#[derive(Debug, Serialize)]
struct ActiveResponse {
    index: Option<usize>,
    cue: Option<Cue>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
    kind: Option<&'static str>,
    details: Option<String>,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: None,
            details: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            kind: None,
            details: None,
        }
    }
}

impl From<vttsync::Error> for AppError {
    fn from(err: vttsync::Error) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.user_message(),
            kind: Some(kind.as_str()),
            details: err.diagnostics().map(str::to_owned),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            kind: self.kind,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    vttsync::logging::init_with_default(LevelFilter::INFO);

    if let Err(err) = run().await {
        error!(error = ?err, "vttsync-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    metrics::init();

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let opts = params.acquisition.to_opts();
    info!(
        extractor = %opts.program.display(),
        temp_dir = %opts.temp_dir.display(),
        keep_temp_files = opts.keep_temp_files,
        "acquisition configured"
    );

    let shutdown = CancellationToken::new();
    let state = AppState {
        acquirer: Arc::new(Acquirer::new(opts)),
        shutdown: shutdown.clone(),
    };

    let mut app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/api/process-youtube", post(process_youtube))
        .route("/v1/cues", post(cues))
        .route("/v1/cues/active", post(active_cue))
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(params.max_bytes));

    if let Some(timeout) = request_timeout_layer(params.request_timeout_secs) {
        // Dropping a timed-out handler kills its extractor and removes its temp files.
        app = app.layer(timeout);
    }

    let app = app.layer(
        TraceLayer::new_for_http()
            .make_span_with(
                DefaultMakeSpan::new()
                    .level(Level::INFO)
                    .include_headers(false),
            )
            .on_response(DefaultOnResponse::new().level(Level::INFO))
            .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
    );

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    Ok(())
}

/// `408 Request Timeout` after `secs` seconds; `None` when `secs` is 0.
fn request_timeout_layer(secs: u64) -> Option<TimeoutLayer> {
    (secs > 0).then(|| {
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
    })
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down; cancelling in-flight acquisitions");
    shutdown.cancel();
}

async fn root() -> &'static str {
    "vttsync-server: POST /api/process-youtube {\"url\": ...}, POST /v1/cues, POST /v1/cues/active"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn process_youtube(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> std::result::Result<Json<ProcessResponse>, AppError> {
    let url = request.url.unwrap_or_default();
    let cancel = state.shutdown.child_token();

    let started = Instant::now();
    let result = state.acquirer.acquire(&url, &cancel).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.kind().as_str(),
    };
    metrics::record_acquisition(outcome, started.elapsed());

    let artifact = result?;
    Ok(Json(ProcessResponse {
        success: true,
        data: artifact,
    }))
}

async fn cues(
    Query(query): Query<CuesQuery>,
    body: String,
) -> std::result::Result<Response, AppError> {
    let output_type = OutputType::parse(query.output.as_deref())
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let cleaned = clean(&body);
    let document = if query.strip_preamble.unwrap_or(false) {
        strip_preamble(&cleaned)
    } else {
        &cleaned
    };
    let cues = vtt_parser::parse(document);
    let encoded =
        encode_cues(&cues, output_type).map_err(|err| AppError::internal(err.to_string()))?;

    let mut response = (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(output_type.content_type()),
        )],
        encoded,
    )
        .into_response();

    if let Some(disposition) = query
        .name
        .as_deref()
        .and_then(|name| content_disposition(name, output_type))
    {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}

async fn active_cue(Json(request): Json<ActiveRequest>) -> Json<ActiveResponse> {
    let cues = vtt_parser::parse(&clean(&request.document));
    let index = locator::locate_index(&cues, request.time);
    Json(ActiveResponse {
        index,
        cue: index.and_then(|i| cues.get(i).cloned()),
    })
}

fn encode_cues(cues: &[Cue], output_type: OutputType) -> vttsync::Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder: Box<dyn CueEncoder + '_> = match output_type {
            OutputType::Json => Box::new(JsonArrayEncoder::new(&mut out)),
            OutputType::Vtt => Box::new(VttEncoder::new(&mut out)),
        };
        write_cues(&mut *encoder, cues)?;
    }
    Ok(out)
}

fn content_disposition(source_name: &str, output_type: OutputType) -> Option<HeaderValue> {
    let vtt_name = vtt_file_name(source_name);
    let file_name = match output_type {
        OutputType::Vtt => vtt_name,
        OutputType::Json => format!("{}.json", vtt_name.trim_end_matches(".vtt")),
    };
    let file_name: String = file_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_maps_to_bad_request() {
        let err = AppError::from(vttsync::Error::InvalidRequest);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.kind, Some("invalid_request"));
    }

    #[test]
    fn extraction_failure_carries_diagnostics() {
        let err = AppError::from(vttsync::Error::ExtractionFailed {
            diagnostics: "ERROR: Video unavailable".to_owned(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, Some("extraction_failed"));
        assert_eq!(err.details.as_deref(), Some("ERROR: Video unavailable"));
    }

    #[test]
    fn encode_cues_supports_both_formats() -> anyhow::Result<()> {
        let cues = vec![Cue::new(1.0, 3.5, "Hello world")];

        let vtt = String::from_utf8(encode_cues(&cues, OutputType::Vtt)?)?;
        assert_eq!(vtt, "WEBVTT\n\n00:00:01.000 --> 00:00:03.500\nHello world\n\n");

        let json: Vec<Cue> = serde_json::from_slice(&encode_cues(&cues, OutputType::Json)?)?;
        assert_eq!(json, cues);
        Ok(())
    }

    #[test]
    fn zero_request_timeout_disables_the_layer() {
        assert!(request_timeout_layer(0).is_none());
        assert!(request_timeout_layer(600).is_some());
    }

    #[tokio::test]
    async fn slow_requests_time_out_with_408() -> anyhow::Result<()> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "done"
                }),
            )
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_millis(50),
            ));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move { axum::serve(listener, app).await });

        let mut stream = tokio::net::TcpStream::connect(addr).await?;
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await?;
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(10), stream.read_to_string(&mut response))
            .await??;

        assert!(response.starts_with("HTTP/1.1 408"), "{response}");
        server.abort();
        Ok(())
    }

    #[test]
    fn content_disposition_names_the_download() {
        let header = content_disposition("lecture.mp4", OutputType::Vtt).expect("valid header");
        assert_eq!(header, "attachment; filename=\"lecture.vtt\"");

        let header = content_disposition("clip \"1\".mp3", OutputType::Json).expect("valid header");
        assert_eq!(header, "attachment; filename=\"clip 1.json\"");
    }
}
