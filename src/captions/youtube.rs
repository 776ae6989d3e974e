//! YouTube captions through `yt-transcript-rs`.

use super::{CaptionResult, CaptionSource, CaptionTrack};
use crate::error::{RelayError, Result};
use crate::source::VideoId;
use async_trait::async_trait;
use tracing::debug;
use yt_transcript_rs::YouTubeTranscriptApi;

/// Caption source backed by YouTube's public transcript endpoints.
pub struct YoutubeCaptions {
    api: YouTubeTranscriptApi,
}

impl YoutubeCaptions {
    pub fn new() -> Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| RelayError::Captions(e.to_string()))?;
        Ok(Self { api })
    }
}

#[async_trait]
impl CaptionSource for YoutubeCaptions {
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> Result<CaptionResult> {
        let languages: Vec<&str> = languages.iter().map(String::as_str).collect();
        let fetched = self
            .api
            .fetch_transcript(video_id.as_str(), &languages, false)
            .await
            .map_err(|e| RelayError::Captions(e.to_string()))?;

        let text = fetched
            .parts()
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Fetched {} caption snippets", fetched.parts().len());

        Ok(CaptionResult {
            text,
            language_code: fetched.language_code.clone(),
        })
    }

    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>> {
        let list = self
            .api
            .list_transcripts(video_id.as_str())
            .await
            .map_err(|e| RelayError::Captions(e.to_string()))?;

        Ok(list
            .transcripts()
            .into_iter()
            .map(|t| CaptionTrack {
                language: t.language.clone(),
                language_code: t.language_code.clone(),
                is_generated: t.is_generated,
            })
            .collect())
    }
}
