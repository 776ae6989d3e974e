//! Error types for the lecture relay.

use thiserror::Error;

/// Library-level error type for relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Caption retrieval failed: {0}")]
    Captions(String),

    #[error("Audio download failed: {0}")]
    AudioDownload(String),

    /// Every acquisition method failed. The message is user-facing.
    #[error("{0}")]
    DownloadExhausted(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Gemini API error: {0}")]
    Provider(String),

    #[error("Gemini could not process the uploaded media: {0}")]
    ProcessingFailed(String),

    #[error("The analysis result was empty.")]
    EmptyAnalysis,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl RelayError {
    /// Short, stable name for the error family.
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "ConfigError",
            RelayError::InvalidInput(_) => "InvalidInput",
            RelayError::VideoNotFound(_) => "VideoNotFound",
            RelayError::Captions(_) => "CaptionError",
            RelayError::AudioDownload(_) | RelayError::DownloadExhausted(_) => "DownloadError",
            RelayError::ToolNotFound(_) | RelayError::ToolFailed(_) => "ToolError",
            RelayError::Provider(_) => "ProviderError",
            RelayError::ProcessingFailed(_) => "ProcessingFailed",
            RelayError::EmptyAnalysis => "EmptyAnalysis",
            RelayError::Io(_) => "IoError",
            RelayError::Json(_) => "JsonError",
            RelayError::TomlParse(_) => "TomlError",
            RelayError::Http(_) => "HttpError",
            RelayError::Base64(_) => "DecodeError",
        }
    }

    /// Text carried by the terminal `error` event of an analysis stream.
    pub fn client_message(&self) -> String {
        match self {
            RelayError::InvalidInput(msg) | RelayError::DownloadExhausted(msg) => msg.clone(),
            RelayError::EmptyAnalysis => self.to_string(),
            other => format!("{}: {}", other.category(), other),
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_pass_through() {
        let err = RelayError::InvalidInput("A YouTube URL is required.".into());
        assert_eq!(err.client_message(), "A YouTube URL is required.");
    }

    #[test]
    fn test_provider_errors_carry_category() {
        let err = RelayError::Provider("quota exceeded".into());
        assert_eq!(
            err.client_message(),
            "ProviderError: Gemini API error: quota exceeded"
        );
    }
}
