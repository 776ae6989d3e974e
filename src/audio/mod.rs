//! Audio acquisition for lectures without usable captions.
//!
//! Two independent downloaders are tried in order: the `yt-dlp` subprocess, then a
//! library-only fallback. Both report progress over a bounded channel so the request task
//! can relay it while the download runs.

mod cookies;
mod native;
mod progress;
mod ytdlp;

pub use cookies::CookieFile;
pub use native::NativeDownloader;
pub use progress::{DownloadProgress, LineEvent, ProgressParser};
pub use ytdlp::YtDlpDownloader;

use crate::config::Settings;
use crate::error::{RelayError, Result};
use crate::source::VideoId;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Downloaded audio held in memory.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `"webm"`.
    pub extension: String,
}

impl AudioArtifact {
    pub fn mime_type(&self) -> String {
        mime_for_extension(&self.extension)
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / (1024.0 * 1024.0)
    }
}

/// MIME type for an audio file extension.
pub fn mime_for_extension(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_lowercase();
    match ext.as_str() {
        "mp3" => "audio/mpeg".to_string(),
        "m4a" => "audio/mp4".to_string(),
        "webm" => "audio/webm".to_string(),
        "opus" | "ogg" => "audio/ogg".to_string(),
        "wav" => "audio/wav".to_string(),
        "flac" => "audio/flac".to_string(),
        "aac" => "audio/aac".to_string(),
        other => format!("audio/{}", other),
    }
}

/// Trait for audio download backends.
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Download the audio track of `video_id`, reporting progress as it goes.
    async fn download(
        &self,
        video_id: &VideoId,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<AudioArtifact>;
}

/// Primary downloader with an optional independent fallback.
pub struct AudioAcquirer {
    primary: Arc<dyn AudioDownloader>,
    fallback: Option<Arc<dyn AudioDownloader>>,
    cookies_configured: bool,
}

impl AudioAcquirer {
    pub fn new(
        primary: Arc<dyn AudioDownloader>,
        fallback: Option<Arc<dyn AudioDownloader>>,
        cookies_configured: bool,
    ) -> Self {
        Self {
            primary,
            fallback,
            cookies_configured,
        }
    }

    /// yt-dlp first, then the library fallback when enabled.
    pub fn from_settings(settings: &Settings, cookie_path: Option<PathBuf>) -> Self {
        let cookies_configured = cookie_path.is_some();
        let primary: Arc<dyn AudioDownloader> = Arc::new(
            YtDlpDownloader::from_settings(&settings.download, cookie_path)
                .with_scratch_dir(settings.temp_dir()),
        );
        let fallback: Option<Arc<dyn AudioDownloader>> = if settings.download.fallback_enabled {
            Some(Arc::new(NativeDownloader::from_settings(&settings.download)))
        } else {
            None
        };
        Self::new(primary, fallback, cookies_configured)
    }

    /// Try each downloader once. Exhaustion yields a user-facing message.
    #[instrument(skip(self, progress), fields(video_id = %video_id))]
    pub async fn acquire(
        &self,
        video_id: &VideoId,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<AudioArtifact> {
        let downloaders = std::iter::once(&self.primary).chain(self.fallback.iter());

        for downloader in downloaders {
            info!("Downloading audio with {}", downloader.name());
            match downloader.download(video_id, progress).await {
                Ok(artifact) if !artifact.bytes.is_empty() => {
                    info!(
                        "{} produced {:.1} MB of {}",
                        downloader.name(),
                        artifact.size_mb(),
                        artifact.extension
                    );
                    return Ok(artifact);
                }
                Ok(_) => warn!("{} produced an empty file", downloader.name()),
                Err(e) => warn!("{} failed: {}", downloader.name(), e),
            }
        }

        Err(RelayError::DownloadExhausted(exhausted_message(
            self.cookies_configured,
        )))
    }
}

/// Message shown when captions are missing and every download method failed.
pub fn exhausted_message(cookies_configured: bool) -> String {
    let mut message = String::from(
        "This video has no captions and its audio could not be downloaded. \
         YouTube is most likely blocking downloads from this server. \
         Try another video URL, try again later, or upload the video file directly.",
    );
    if !cookies_configured {
        message.push_str(
            " (Administrator: configuring YouTube cookies via YOUTUBE_COOKIES_BASE64 may help.)",
        );
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VideoResolver;
    use std::sync::Mutex;

    struct ScriptedDownloader {
        name: &'static str,
        outcome: Option<Vec<u8>>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl AudioDownloader for ScriptedDownloader {
        fn name(&self) -> &str {
            self.name
        }

        async fn download(
            &self,
            _video_id: &VideoId,
            progress: &mpsc::Sender<DownloadProgress>,
        ) -> Result<AudioArtifact> {
            self.calls.lock().unwrap().push(self.name);
            let _ = progress.send(DownloadProgress::complete()).await;
            match &self.outcome {
                Some(bytes) => Ok(AudioArtifact {
                    bytes: bytes.clone(),
                    extension: "m4a".into(),
                }),
                None => Err(RelayError::AudioDownload("HTTP Error 403".into())),
            }
        }
    }

    fn scripted(
        name: &'static str,
        outcome: Option<Vec<u8>>,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn AudioDownloader> {
        Arc::new(ScriptedDownloader {
            name,
            outcome,
            calls: calls.clone(),
        })
    }

    fn video() -> VideoId {
        VideoResolver::new().resolve("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let acquirer = AudioAcquirer::new(
            scripted("primary", Some(vec![1, 2, 3]), &calls),
            Some(scripted("fallback", Some(vec![9]), &calls)),
            true,
        );
        let (tx, _rx) = mpsc::channel(16);

        let artifact = acquirer.acquire(&video(), &tx).await.unwrap();
        assert_eq!(artifact.bytes, vec![1, 2, 3]);
        assert_eq!(*calls.lock().unwrap(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_fallback_after_primary_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let acquirer = AudioAcquirer::new(
            scripted("primary", None, &calls),
            Some(scripted("fallback", Some(vec![9]), &calls)),
            true,
        );
        let (tx, _rx) = mpsc::channel(16);

        let artifact = acquirer.acquire(&video(), &tx).await.unwrap();
        assert_eq!(artifact.bytes, vec![9]);
        assert_eq!(*calls.lock().unwrap(), vec!["primary", "fallback"]);
    }

    #[tokio::test]
    async fn test_exhaustion_message() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let acquirer = AudioAcquirer::new(
            scripted("primary", None, &calls),
            Some(scripted("fallback", Some(Vec::new()), &calls)),
            false,
        );
        let (tx, _rx) = mpsc::channel(16);

        let err = acquirer.acquire(&video(), &tx).await.unwrap_err();
        assert!(matches!(err, RelayError::DownloadExhausted(_)));
        let message = err.client_message();
        assert!(message.contains("no captions"));
        assert!(message.contains("upload the video file"));
        assert!(message.contains("YOUTUBE_COOKIES_BASE64"));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_cookie_hint_only_without_cookies() {
        assert!(!exhausted_message(true).contains("cookies"));
        assert!(exhausted_message(false).contains("cookies"));
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("mp3"), "audio/mpeg");
        assert_eq!(mime_for_extension(".M4A"), "audio/mp4");
        assert_eq!(mime_for_extension("opus"), "audio/ogg");
        assert_eq!(mime_for_extension("xyz"), "audio/xyz");
    }
}
