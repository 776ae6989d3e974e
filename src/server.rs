//! HTTP surface of the relay.
//!
//! `POST /api/analyze` answers with a `text/event-stream` whose frames are
//! `data: <json>\n\n`. Request problems are reported inside the stream as an `error` event,
//! never as an HTTP status.

use crate::error::RelayError;
use crate::orchestrator::Analyzer;
use crate::progress::{event_stream, ProgressEvent};
use crate::source::{AnalysisRequest, InputMode, UploadedVideo};
use crate::video_info::VideoInfoClient;
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

const SERVICE_NAME: &str = "lecture-relay";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub video_info: Arc<VideoInfoClient>,
}

/// Build the router with CORS open to any origin.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state
        .analyzer
        .settings()
        .server
        .max_upload_mb
        .saturating_mul(1024 * 1024);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/youtube-info", post(youtube_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

// === Request Types ===

#[derive(Deserialize)]
struct VideoInfoRequest {
    #[serde(default)]
    url: Option<String>,
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": SERVICE_NAME }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "has_api_key": state.analyzer.settings().gemini.has_api_key(),
    }))
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events: BoxStream<'static, ProgressEvent> = match multipart {
        Ok(multipart) => match read_form(multipart).await {
            Ok(request) => {
                info!("Analysis requested ({})", request.input_mode);
                state.analyzer.stream(request).boxed()
            }
            Err(e) => failed(e).boxed(),
        },
        Err(rejection) => failed(RelayError::InvalidInput(format!(
            "Invalid form data: {}",
            rejection.body_text()
        )))
        .boxed(),
    };

    Sse::new(events.filter_map(|event| async move {
        match Event::default().json_data(&event) {
            Ok(frame) => Some(Ok::<_, Infallible>(frame)),
            Err(e) => {
                warn!("Failed to serialize event: {}", e);
                None
            }
        }
    }))
}

async fn youtube_info(
    State(state): State<AppState>,
    Json(req): Json<VideoInfoRequest>,
) -> impl IntoResponse {
    let Some(url) = req.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
        return bad_request("A URL is required.");
    };
    let Some(video_id) = state.analyzer.resolver().resolve(url) else {
        return bad_request("Not a valid YouTube URL.");
    };

    let info = state.video_info.lookup(&video_id).await;
    debug!("Video info for {}: {} views", video_id, info.views);
    Json(info).into_response()
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// A stream holding a single error event.
fn failed(error: RelayError) -> impl Stream<Item = ProgressEvent> + Send + 'static {
    event_stream(move |_sink| async move { Err::<String, _>(error) })
}

/// Collect the multipart form into an analysis request.
async fn read_form(mut multipart: Multipart) -> Result<AnalysisRequest, RelayError> {
    let mut prompt = String::new();
    let mut input_mode = None;
    let mut youtube_url = None;
    let mut video_file = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "prompt" => prompt = field.text().await.map_err(form_error)?,
            "inputMode" => input_mode = Some(field.text().await.map_err(form_error)?),
            "youtubeUrl" => youtube_url = Some(field.text().await.map_err(form_error)?),
            "videoFile" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(form_error)?;
                if !bytes.is_empty() {
                    video_file = Some(UploadedVideo {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => debug!("Ignoring form field {}", other),
        }
    }

    Ok(AnalysisRequest {
        prompt,
        input_mode: InputMode::from_field(input_mode.as_deref()),
        youtube_url,
        video_file,
    })
}

fn form_error(e: axum::extract::multipart::MultipartError) -> RelayError {
    RelayError::InvalidInput(format!("Invalid form data: {}", e.body_text()))
}
