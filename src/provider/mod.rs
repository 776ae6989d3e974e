//! Generative-AI provider abstraction.
//!
//! The orchestrator only needs four things from a provider: generate text from a list of
//! parts, upload a file, look up its processing state, and delete it afterwards.

mod gemini;

pub use gemini::GeminiClient;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One piece of model input.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// A remote media reference: an uploaded file URI or a public video URL.
    FileData {
        uri: String,
        mime_type: Option<String>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn media(media: &UploadedMedia) -> Self {
        Part::FileData {
            uri: media.uri.clone(),
            mime_type: Some(media.mime_type.clone()),
        }
    }

    pub fn remote_video(url: impl Into<String>) -> Self {
        Part::FileData {
            uri: url.into(),
            mime_type: None,
        }
    }
}

/// Server-side processing state of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingState {
    Processing,
    Active,
    Failed,
}

/// A file stored with the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: ProcessingState,
}

impl UploadedMedia {
    pub fn is_processing(&self) -> bool {
        self.state == ProcessingState::Processing
    }
}

/// Trait for generative-AI backends.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Model identifier, recorded on every generation call's log line.
    fn model(&self) -> &str;

    /// Whether public video URLs can be passed as media parts without uploading.
    fn supports_remote_media(&self) -> bool;

    /// Run one generation call and return the response text.
    async fn generate(&self, parts: Vec<Part>) -> Result<String>;

    async fn upload_file(&self, path: &Path, mime_type: &str, display_name: &str)
        -> Result<UploadedMedia>;

    async fn get_file(&self, name: &str) -> Result<UploadedMedia>;

    async fn delete_file(&self, name: &str) -> Result<()>;
}
