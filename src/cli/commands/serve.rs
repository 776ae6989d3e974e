//! HTTP server for browser clients.
//!
//! Serves the analysis stream and the video-info lookup.

use crate::audio::CookieFile;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Analyzer;
use crate::server::{build_router, AppState};
use crate::video_info::VideoInfoClient;
use std::sync::Arc;
use tracing::warn;

/// Run the HTTP server.
pub async fn run_serve(host: Option<&str>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or(&settings.server.host).to_string();
    let port = port.unwrap_or(settings.server.port);

    // The cookie file lives as long as the server.
    let cookies = match CookieFile::from_config(
        settings.download.cookies_base64.as_deref(),
        &settings.temp_dir(),
    ) {
        Ok(cookies) => cookies,
        Err(e) => {
            warn!("Ignoring YouTube cookies: {}", e);
            Output::warning("YouTube cookies could not be decoded; continuing without them.");
            None
        }
    };

    let has_api_key = settings.gemini.has_api_key();
    let video_info = VideoInfoClient::new(&settings.download.user_agent)?;
    let analyzer = Analyzer::new(Arc::new(settings), cookies.as_ref())?;

    let app = build_router(AppState {
        analyzer: Arc::new(analyzer),
        video_info: Arc::new(video_info),
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lecture Relay");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    if !has_api_key {
        Output::warning("GEMINI_API_KEY is not set; analyses will fail until it is.");
    }
    if cookies.is_some() {
        Output::info("YouTube cookies loaded.");
    }
    println!();
    println!("Endpoints:");
    Output::kv("Service", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Analyze (SSE)", "POST /api/analyze");
    Output::kv("Video info", "POST /api/youtube-info");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    drop(cookies);
    Ok(())
}
