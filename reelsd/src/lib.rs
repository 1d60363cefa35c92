use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::info;

use reels_core::{
    load_reels_config, ClearReport, ProcessorError, Reel, ReelProcessor, ReelStore, StorageLayout,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Reel processing and caching daemon", long_about = None)]
pub struct Cli {
    /// Path to reels.toml
    #[arg(long, default_value = "configs/reels.toml")]
    pub config: PathBuf,
    /// Listen address override (host:port)
    #[arg(long)]
    pub listen: Option<SocketAddr>,
    /// Storage directory override
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,
    /// Temporary download directory override
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("config error: {0}")]
    Config(#[from] reels_core::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] reels_core::StoreError),
    #[error("invalid listen address {0}")]
    ListenAddress(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ReelProcessor>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<ProcessorError> for ApiError {
    fn from(error: ProcessorError) -> Self {
        match error {
            ProcessorError::InvalidUrl(_) => ApiError::bad_request(error.to_string()),
            ProcessorError::Download(_)
            | ProcessorError::Transcode(_)
            | ProcessorError::Probe(_)
            | ProcessorError::Store(_) => ApiError::internal(error.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateReelRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReelResponse {
    pub id: String,
    pub video_url: String,
    pub audio_url: Option<String>,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl ReelResponse {
    fn from_reel(reel: Reel) -> Self {
        let Reel { id, metadata } = reel;
        let audio_url = metadata
            .has_audio
            .then(|| format!("/reel/{id}.wav"));
        Self {
            video_url: format!("/reel/{id}.mp4"),
            audio_url,
            duration: metadata.duration,
            width: metadata.width,
            height: metadata.height,
            id,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reel", post(create_reel))
        .route("/reel/{file}", get(get_reel_asset))
        .route("/storage/clear", post(clear_storage))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_reel(
    State(state): State<AppState>,
    Json(request): Json<CreateReelRequest>,
) -> ApiResult<Json<ReelResponse>> {
    let reel = state.processor.create(&request.url).await?;
    Ok(Json(ReelResponse::from_reel(reel)))
}

/// One handler serves both artifact kinds: axum path parameters span whole
/// segments, so the extension is split off here instead of in the route.
async fn get_reel_asset(
    State(state): State<AppState>,
    AxumPath(file): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let store = state.processor.store();
    let (path, content_type) = match file.rsplit_once('.') {
        Some((id, "mp4")) => (store.video_path(id), "video/mp4"),
        Some((id, "wav")) => (store.audio_path(id), "audio/wav"),
        _ => return Err(ApiError::not_found("unknown reel asset")),
    };
    stream_file(path, content_type, Some(&headers)).await
}

async fn clear_storage(State(state): State<AppState>) -> ApiResult<Json<ClearReport>> {
    let report = state.processor.clear().await?;
    Ok(Json(report))
}

async fn stream_file(
    path: PathBuf,
    content_type: &'static str,
    headers: Option<&HeaderMap>,
) -> ApiResult<Response> {
    let mut file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let size = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("file not found"))?
        .len();

    let range = headers
        .and_then(|headers| headers.get(header::RANGE))
        .and_then(|value| parse_range_header(value, size));

    let mut response = if let Some((start, end)) = range {
        if start >= size {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                range_unsatisfiable_value(size),
            );
            response
        } else {
            let end = end.min(size.saturating_sub(1));
            let length = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|_| ApiError::not_found("file not found"))?;
            let stream = ReaderStream::new(file.take(length));
            let mut response = Body::from_stream(stream).into_response();
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                header_value(format!("bytes {start}-{end}/{size}")),
            );
            response.headers_mut().insert(
                header::CONTENT_LENGTH,
                header_value(length.to_string()),
            );
            response
        }
    } else {
        Body::from_stream(ReaderStream::new(file)).into_response()
    };

    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    Ok(response)
}

fn header_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn range_unsatisfiable_value(size: u64) -> HeaderValue {
    header_value(format!("bytes */{size}"))
}

/// Parses a single `bytes=start-end` range. Multipart ranges are not
/// supported and fall back to a full response.
fn parse_range_header(value: &HeaderValue, size: u64) -> Option<(u64, u64)> {
    let value = value.to_str().ok()?;
    let ranges = value.strip_prefix("bytes=")?;
    if ranges.contains(',') {
        return None;
    }
    let (start, end) = ranges.split_once('-')?;
    if start.is_empty() {
        // suffix form: the last N bytes
        let count: u64 = end.parse().ok()?;
        if count == 0 {
            return None;
        }
        return Some((size.saturating_sub(count), size.saturating_sub(1)));
    }
    let start: u64 = start.parse().ok()?;
    let end = if end.is_empty() {
        size.saturating_sub(1)
    } else {
        end.parse().ok()?
    };
    if end < start {
        return None;
    }
    Some((start, end))
}

pub async fn run(cli: Cli) -> Result<(), ServeError> {
    let mut config = load_reels_config(&cli.config)?;
    if let Some(dir) = cli.storage_dir {
        config.paths.storage_dir = dir.to_string_lossy().to_string();
    }
    if let Some(dir) = cli.tmp_dir {
        config.paths.tmp_dir = dir.to_string_lossy().to_string();
    }

    let layout = StorageLayout::from_config(&config);
    layout.ensure_directories()?;
    let store = ReelStore::new(layout);
    let processor = Arc::new(ReelProcessor::new(&config, store, None));

    let addr = match cli.listen {
        Some(addr) => addr,
        None => {
            let candidate = format!(
                "{}:{}",
                config.server.listen_host, config.server.listen_port
            );
            candidate
                .parse()
                .map_err(|_| ServeError::ListenAddress(candidate))?
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "reelsd listening");
    axum::serve(listener, router(AppState { processor }))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install ctrl-c handler");
    }
}
