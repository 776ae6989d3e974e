//! In-process audio download with `rusty_ytdl`, used when yt-dlp fails.

use super::progress::DownloadProgress;
use super::{AudioArtifact, AudioDownloader};
use crate::config::DownloadSettings;
use crate::error::{RelayError, Result};
use crate::source::VideoId;
use async_trait::async_trait;
use futures::FutureExt;
use rusty_ytdl::{Video, VideoOptions, VideoQuality, VideoSearchOptions};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Streams the best audio-only format into memory.
pub struct NativeDownloader {
    timeout: Duration,
}

impl NativeDownloader {
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        if settings.proxy.is_some() {
            debug!("Proxy settings apply to yt-dlp only");
        }
        Self {
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        }
    }

    async fn fetch(
        &self,
        video_id: &VideoId,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<Vec<u8>> {
        let options = VideoOptions {
            quality: VideoQuality::HighestAudio,
            filter: VideoSearchOptions::Audio,
            ..Default::default()
        };
        let video = Video::new_with_options(video_id.watch_url().as_str(), options)
            .map_err(|e| RelayError::AudioDownload(e.to_string()))?;

        // rusty_ytdl can panic on unexpected player responses
        let stream = AssertUnwindSafe(video.stream())
            .catch_unwind()
            .await
            .map_err(|_| RelayError::AudioDownload("rusty_ytdl panicked".into()))?
            .map_err(|e| RelayError::AudioDownload(e.to_string()))?;

        let total = stream.content_length();
        let mut bytes = Vec::with_capacity(total);
        let mut last_reported = 0u32;

        while let Some(chunk) = stream
            .chunk()
            .await
            .map_err(|e| RelayError::AudioDownload(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);

            if total > 0 {
                let percent = (bytes.len() as f64 / total as f64 * 100.0).min(100.0);
                if percent as u32 > last_reported {
                    last_reported = percent as u32;
                    let _ = progress
                        .send(DownloadProgress {
                            percent,
                            size: Some(format!("{:.2}MiB", total as f64 / (1024.0 * 1024.0))),
                            ..Default::default()
                        })
                        .await;
                }
            }
        }

        Ok(bytes)
    }
}

#[async_trait]
impl AudioDownloader for NativeDownloader {
    fn name(&self) -> &str {
        "rusty_ytdl"
    }

    #[instrument(skip(self, progress), fields(video_id = %video_id))]
    async fn download(
        &self,
        video_id: &VideoId,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<AudioArtifact> {
        let bytes = match tokio::time::timeout(self.timeout, self.fetch(video_id, progress)).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("rusty_ytdl timed out");
                return Err(RelayError::AudioDownload(format!(
                    "Download timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if bytes.is_empty() {
            return Err(RelayError::AudioDownload("Empty audio stream".into()));
        }

        let extension = sniff_extension(&bytes).to_string();
        let _ = progress.send(DownloadProgress::complete()).await;
        Ok(AudioArtifact { bytes, extension })
    }
}

/// Container type from magic bytes: Matroska/WebM or ISO-BMFF.
fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&EBML_MAGIC) {
        "webm"
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        "m4a"
    } else {
        "mp4"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_extension() {
        assert_eq!(sniff_extension(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), "webm");
        assert_eq!(sniff_extension(b"\x00\x00\x00\x18ftypdash"), "m4a");
        assert_eq!(sniff_extension(b"\x00\x01\x02"), "mp4");
        assert_eq!(sniff_extension(&[]), "mp4");
    }

    #[test]
    fn test_timeout_from_settings() {
        let settings = DownloadSettings {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(
            NativeDownloader::from_settings(&settings).timeout,
            Duration::from_secs(1)
        );
    }
}
