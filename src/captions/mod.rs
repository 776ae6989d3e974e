//! Caption retrieval for YouTube lectures.
//!
//! Captions are the cheap path: when a usable track exists the lecture is analyzed as text
//! and no media ever leaves YouTube. Retrieval runs an ordered list of strategies and stops
//! at the first one that yields usable text; a failing strategy only means "nothing from
//! this attempt".

mod youtube;

pub use youtube::YoutubeCaptions;

use crate::config::CaptionSettings;
use crate::error::Result;
use crate::source::VideoId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Caption text and the language it was fetched in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionResult {
    pub text: String,
    pub language_code: String,
}

impl CaptionResult {
    /// Captions must be longer than `min_chars` characters to be worth analyzing.
    pub fn is_usable(&self, min_chars: usize) -> bool {
        self.text.chars().count() > min_chars
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A caption track advertised for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub language: String,
    pub language_code: String,
    pub is_generated: bool,
}

/// Trait for caption backends.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch the first available track among `languages`, in preference order.
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> Result<CaptionResult>;

    /// List every caption track of a video.
    async fn list_tracks(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>>;
}

/// One way of obtaining captions.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionStrategy {
    /// A single query for the preferred languages.
    Preferred(Vec<String>),
    /// Enumerate all tracks and fetch each until one is usable.
    AnyTrack,
}

/// Runs caption strategies in order against a caption source.
pub struct CaptionFetcher {
    source: Arc<dyn CaptionSource>,
    strategies: Vec<CaptionStrategy>,
    min_chars: usize,
}

impl CaptionFetcher {
    /// Preferred languages first, then any track.
    pub fn new(source: Arc<dyn CaptionSource>, settings: &CaptionSettings) -> Self {
        let mut strategies = Vec::new();
        if !settings.languages.is_empty() {
            strategies.push(CaptionStrategy::Preferred(settings.languages.clone()));
        }
        strategies.push(CaptionStrategy::AnyTrack);

        Self {
            source,
            strategies,
            min_chars: settings.min_chars,
        }
    }

    pub fn strategies(&self) -> &[CaptionStrategy] {
        &self.strategies
    }

    /// Return the first usable captions, or None when every strategy came up empty.
    #[instrument(skip(self), fields(video_id = %video_id))]
    pub async fn fetch(&self, video_id: &VideoId) -> Option<CaptionResult> {
        for strategy in &self.strategies {
            if let Some(found) = self.attempt(strategy, video_id).await {
                info!(
                    "Captions found ({}): {} characters",
                    found.language_code,
                    found.char_count()
                );
                return Some(found);
            }
        }

        warn!("No usable captions for {}", video_id);
        None
    }

    async fn attempt(&self, strategy: &CaptionStrategy, video_id: &VideoId) -> Option<CaptionResult> {
        match strategy {
            CaptionStrategy::Preferred(languages) => {
                match self.source.fetch(video_id, languages).await {
                    Ok(found) if found.is_usable(self.min_chars) => Some(found),
                    Ok(found) => {
                        info!(
                            "Preferred captions too short ({} characters)",
                            found.char_count()
                        );
                        None
                    }
                    Err(e) => {
                        info!("Preferred captions ({}) unavailable: {}", languages.join("/"), e);
                        None
                    }
                }
            }
            CaptionStrategy::AnyTrack => {
                let tracks = match self.source.list_tracks(video_id).await {
                    Ok(tracks) => tracks,
                    Err(e) => {
                        info!("Caption track listing failed: {}", e);
                        return None;
                    }
                };

                for track in tracks {
                    info!(
                        "Available: {} ({}, auto={})",
                        track.language, track.language_code, track.is_generated
                    );
                    let languages = [track.language_code.clone()];
                    match self.source.fetch(video_id, &languages).await {
                        Ok(found) if found.is_usable(self.min_chars) => return Some(found),
                        Ok(_) => continue,
                        Err(e) => {
                            info!("Track {} failed: {}", track.language_code, e);
                            continue;
                        }
                    }
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::source::VideoResolver;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Tracks keyed by language code; a missing key fails the fetch.
    struct FakeSource {
        tracks: HashMap<String, String>,
        listing_fails: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(tracks: &[(&str, &str)]) -> Self {
            Self {
                tracks: tracks
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                listing_fails: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CaptionSource for FakeSource {
        async fn fetch(&self, _video_id: &VideoId, languages: &[String]) -> Result<CaptionResult> {
            self.calls.lock().unwrap().push(languages.join(","));
            languages
                .iter()
                .find_map(|lang| {
                    self.tracks.get(lang).map(|text| CaptionResult {
                        text: text.clone(),
                        language_code: lang.clone(),
                    })
                })
                .ok_or_else(|| RelayError::Captions("no transcript found".into()))
        }

        async fn list_tracks(&self, _video_id: &VideoId) -> Result<Vec<CaptionTrack>> {
            if self.listing_fails {
                return Err(RelayError::Captions("transcripts disabled".into()));
            }
            let mut codes: Vec<_> = self.tracks.keys().cloned().collect();
            codes.sort();
            Ok(codes
                .into_iter()
                .map(|code| CaptionTrack {
                    language: code.clone(),
                    language_code: code,
                    is_generated: true,
                })
                .collect())
        }
    }

    fn video() -> VideoId {
        VideoResolver::new().resolve("dQw4w9WgXcQ").unwrap()
    }

    fn long_text(prefix: &str) -> String {
        format!("{} {}", prefix, "lecture content ".repeat(10))
    }

    #[tokio::test]
    async fn test_preferred_language_wins() {
        let (korean, german) = (long_text("korean"), long_text("german"));
        let source = Arc::new(FakeSource::new(&[("ko", &korean), ("de", &german)]));
        let fetcher = CaptionFetcher::new(source.clone(), &CaptionSettings::default());

        let found = fetcher.fetch(&video()).await.unwrap();
        assert_eq!(found.language_code, "ko");
        assert_eq!(source.calls.lock().unwrap().as_slice(), ["ko,en"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_any_track() {
        let japanese = long_text("japanese");
        let source = Arc::new(FakeSource::new(&[("de", "too short"), ("ja", &japanese)]));
        let fetcher = CaptionFetcher::new(source.clone(), &CaptionSettings::default());

        let found = fetcher.fetch(&video()).await.unwrap();
        assert_eq!(found.language_code, "ja");
        assert_eq!(
            source.calls.lock().unwrap().as_slice(),
            ["ko,en", "de", "ja"]
        );
    }

    #[tokio::test]
    async fn test_errors_are_not_fatal() {
        let mut source = FakeSource::new(&[]);
        source.listing_fails = true;
        let fetcher = CaptionFetcher::new(Arc::new(source), &CaptionSettings::default());

        assert!(fetcher.fetch(&video()).await.is_none());
    }

    #[test]
    fn test_usable_threshold_is_exclusive() {
        let at_limit = CaptionResult {
            text: "가".repeat(50),
            language_code: "ko".into(),
        };
        assert!(!at_limit.is_usable(50));

        let over = CaptionResult {
            text: "가".repeat(51),
            language_code: "ko".into(),
        };
        assert!(over.is_usable(50));
    }

    #[test]
    fn test_strategy_order() {
        let fetcher = CaptionFetcher::new(
            Arc::new(FakeSource::new(&[])),
            &CaptionSettings::default(),
        );
        assert_eq!(
            fetcher.strategies(),
            &[
                CaptionStrategy::Preferred(vec!["ko".into(), "en".into()]),
                CaptionStrategy::AnyTrack
            ]
        );
    }
}
