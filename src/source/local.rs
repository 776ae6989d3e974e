//! Local media files used as upload-mode input from the command line.

use super::UploadedVideo;
use crate::error::{RelayError, Result};
use std::path::Path;

/// Supported audio file extensions with their MIME types.
const AUDIO_EXTENSIONS: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("aac", "audio/aac"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/ogg"),
    ("m4a", "audio/mp4"),
];

/// Supported video file extensions with their MIME types.
const VIDEO_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("3gp", "video/3gpp"),
];

/// Guess the MIME type of a media file from its extension.
fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    AUDIO_EXTENSIONS
        .iter()
        .chain(VIDEO_EXTENSIONS.iter())
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Read a local audio/video file into an upload.
pub async fn load_local_video(path: &Path) -> Result<UploadedVideo> {
    if !path.is_file() {
        return Err(RelayError::InvalidInput(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let mime = mime_for(path).ok_or_else(|| {
        RelayError::InvalidInput(format!(
            "Unsupported media file: {}",
            path.display()
        ))
    })?;

    let bytes = tokio::fs::read(path).await?;

    Ok(UploadedVideo {
        file_name: path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string()),
        content_type: Some(mime.to_string()),
        bytes,
    })
}
