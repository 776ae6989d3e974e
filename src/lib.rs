//! Lecture Relay - lecture video analysis over Gemini
//!
//! A backend that takes a lecture (a YouTube URL or an uploaded file) and a prompt, gets a
//! text or media representation of it, asks Gemini for an analysis, and streams progress
//! and the result back to the client as server-sent events.
//!
//! # Architecture
//!
//! - `source` - Request types and the YouTube URL resolver
//! - `captions` - Caption retrieval with ordered fallback strategies
//! - `audio` - Audio download via yt-dlp with a built-in fallback
//! - `chunking` - Transcript segmentation for map-reduce
//! - `provider` - Generative-AI provider abstraction and the Gemini client
//! - `orchestrator` - The analysis state machine
//! - `progress` - Progress events and the event stream
//! - `server` - HTTP endpoints
//! - `video_info` - Channel name and view count lookup
//! - `config` - Settings and prompt templates
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use lecture_relay::config::Settings;
//! use lecture_relay::orchestrator::Analyzer;
//! use lecture_relay::source::AnalysisRequest;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Arc::new(Settings::load()?);
//!     let analyzer = Arc::new(Analyzer::new(settings, None)?);
//!
//!     let request = AnalysisRequest::youtube("Summarize the lecture", "https://youtu.be/dQw4w9WgXcQ");
//!     let mut events = Box::pin(analyzer.stream(request));
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod captions;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod server;
pub mod source;
pub mod video_info;

pub use config::Settings;
pub use error::{RelayError, Result};
