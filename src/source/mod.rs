//! Analysis inputs: request shape, uploaded files and video references.

mod local;
mod youtube;

pub use local::load_local_video;
pub use youtube::VideoResolver;

use serde::{Deserialize, Serialize};

/// MIME type assumed for uploads that do not declare one.
pub const DEFAULT_UPLOAD_MIME: &str = "video/mp4";

/// Where the lecture comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Youtube,
    Upload,
}

impl InputMode {
    /// Parse the `inputMode` form field. Anything other than `youtube` selects upload mode.
    pub fn from_field(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            None => InputMode::Youtube,
            Some(v) if v.is_empty() || v == "youtube" => InputMode::Youtube,
            Some(_) => InputMode::Upload,
        }
    }
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::Youtube => write!(f, "youtube"),
            InputMode::Upload => write!(f, "upload"),
        }
    }
}

/// A video file sent by the client.
#[derive(Debug, Clone)]
pub struct UploadedVideo {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedVideo {
    /// Declared MIME type, defaulting to `video/mp4`.
    pub fn mime_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|m| !m.is_empty() && *m != "application/octet-stream")
            .unwrap_or(DEFAULT_UPLOAD_MIME)
    }

    /// File-name suffix used for the staging file, including the leading dot.
    pub fn suffix(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| std::path::Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| ".mp4".to_string())
    }

    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("upload")
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / (1024.0 * 1024.0)
    }
}

/// One client request to analyze a lecture.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub input_mode: InputMode,
    pub youtube_url: Option<String>,
    pub video_file: Option<UploadedVideo>,
}

impl AnalysisRequest {
    pub fn youtube(prompt: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            input_mode: InputMode::Youtube,
            youtube_url: Some(url.into()),
            video_file: None,
        }
    }

    pub fn upload(prompt: impl Into<String>, file: UploadedVideo) -> Self {
        Self {
            prompt: prompt.into(),
            input_mode: InputMode::Upload,
            youtube_url: None,
            video_file: Some(file),
        }
    }
}

/// An 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(String);

impl VideoId {
    pub(crate) fn new_unchecked(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_mode_parsing() {
        assert_eq!(InputMode::from_field(None), InputMode::Youtube);
        assert_eq!(InputMode::from_field(Some("youtube")), InputMode::Youtube);
        assert_eq!(InputMode::from_field(Some(" YouTube ")), InputMode::Youtube);
        assert_eq!(InputMode::from_field(Some("upload")), InputMode::Upload);
        assert_eq!(InputMode::from_field(Some("file")), InputMode::Upload);
    }

    #[test]
    fn test_uploaded_video_defaults() {
        let video = UploadedVideo {
            file_name: None,
            content_type: None,
            bytes: vec![0; 16],
        };
        assert_eq!(video.mime_type(), "video/mp4");
        assert_eq!(video.suffix(), ".mp4");

        let video = UploadedVideo {
            file_name: Some("lecture.webm".to_string()),
            content_type: Some("video/webm".to_string()),
            bytes: Vec::new(),
        };
        assert_eq!(video.mime_type(), "video/webm");
        assert_eq!(video.suffix(), ".webm");
    }
}
