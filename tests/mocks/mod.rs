//! Hand-written backends for the analyzer's seams.
//!
//! Each mock records what it was asked to do so tests can assert call order.

#![allow(dead_code)]

use async_trait::async_trait;
use lecture_relay::audio::{AudioAcquirer, AudioArtifact, AudioDownloader, DownloadProgress};
use lecture_relay::captions::{CaptionResult, CaptionSource, CaptionTrack};
use lecture_relay::config::{Prompts, Settings};
use lecture_relay::error::{RelayError, Result};
use lecture_relay::orchestrator::{Analyzer, Timings};
use lecture_relay::progress::ProgressEvent;
use lecture_relay::provider::{GenerativeProvider, Part, ProcessingState, UploadedMedia};
use lecture_relay::source::VideoId;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// === Captions ===

/// Caption source with a fixed preferred-language answer and a list of other tracks.
pub struct MockCaptions {
    preferred: Option<CaptionResult>,
    tracks: Vec<(CaptionTrack, CaptionResult)>,
    pub requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockCaptions {
    pub fn none() -> Self {
        Self {
            preferred: None,
            tracks: Vec::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_text(text: &str, language_code: &str) -> Self {
        Self {
            preferred: Some(CaptionResult {
                text: text.to_string(),
                language_code: language_code.to_string(),
            }),
            ..Self::none()
        }
    }

    /// Only a non-preferred track exists.
    pub fn with_other_track(text: &str, language_code: &str) -> Self {
        let track = CaptionTrack {
            language: language_code.to_string(),
            language_code: language_code.to_string(),
            is_generated: true,
        };
        let result = CaptionResult {
            text: text.to_string(),
            language_code: language_code.to_string(),
        };
        Self {
            tracks: vec![(track, result)],
            ..Self::none()
        }
    }
}

#[async_trait]
impl CaptionSource for MockCaptions {
    async fn fetch(&self, _video_id: &VideoId, languages: &[String]) -> Result<CaptionResult> {
        self.requests.lock().unwrap().push(languages.to_vec());

        if let Some(preferred) = &self.preferred {
            if languages.contains(&preferred.language_code) {
                return Ok(preferred.clone());
            }
        }
        self.tracks
            .iter()
            .find(|(track, _)| languages.contains(&track.language_code))
            .map(|(_, result)| result.clone())
            .ok_or_else(|| RelayError::Captions("no transcript in requested languages".into()))
    }

    async fn list_tracks(&self, _video_id: &VideoId) -> Result<Vec<CaptionTrack>> {
        Ok(self.tracks.iter().map(|(track, _)| track.clone()).collect())
    }
}

// === Downloads ===

/// Downloader that reports the given percentages, then succeeds or fails.
pub struct MockDownloader {
    name: String,
    percents: Vec<f64>,
    artifact: Option<AudioArtifact>,
    pub calls: Arc<Mutex<usize>>,
}

impl MockDownloader {
    pub fn succeeding(name: &str, percents: &[f64], bytes: &[u8], extension: &str) -> Self {
        Self {
            name: name.to_string(),
            percents: percents.to_vec(),
            artifact: Some(AudioArtifact {
                bytes: bytes.to_vec(),
                extension: extension.to_string(),
            }),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failing(name: &str, percents: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            percents: percents.to_vec(),
            artifact: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AudioDownloader for MockDownloader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn download(
        &self,
        _video_id: &VideoId,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<AudioArtifact> {
        *self.calls.lock().unwrap() += 1;
        for percent in &self.percents {
            let update = DownloadProgress {
                percent: *percent,
                size: Some("3.0MiB".into()),
                speed: None,
                eta: None,
            };
            let _ = progress.send(update).await;
        }
        self.artifact
            .clone()
            .ok_or_else(|| RelayError::AudioDownload(format!("{}: HTTP Error 403", self.name)))
    }
}

// === Provider ===

/// One call made against the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Generate(Vec<Part>),
    Upload { mime_type: String, display_name: String },
    GetFile(String),
    Delete(String),
}

/// Provider whose generations answer `summary-<n>`, numbered from 1.
pub struct MockProvider {
    pub calls: Arc<Mutex<Vec<ProviderCall>>>,
    remote_media: bool,
    remote_fails: bool,
    empty_text: bool,
    generate_delay: Duration,
    states: Mutex<VecDeque<ProcessingState>>,
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            remote_media: false,
            remote_fails: false,
            empty_text: false,
            generate_delay: Duration::ZERO,
            states: Mutex::new(VecDeque::from([ProcessingState::Active])),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Accept public video URLs; `fails` makes those calls error out.
    pub fn with_remote_media(mut self, fails: bool) -> Self {
        self.remote_media = true;
        self.remote_fails = fails;
        self
    }

    pub fn with_empty_text(mut self) -> Self {
        self.empty_text = true;
        self
    }

    pub fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    /// States returned by successive `get_file` calls; the last one repeats.
    pub fn with_states(self, states: &[ProcessingState]) -> Self {
        *self.states.lock().unwrap() = states.iter().copied().collect();
        self
    }

    pub fn recorded(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Contents of every staged file at the time it was uploaded.
    pub fn uploaded_bytes(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> Vec<Vec<Part>> {
        self.recorded()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Generate(parts) => Some(parts),
                _ => None,
            })
            .collect()
    }

    fn next_state(&self) -> ProcessingState {
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            states.pop_front().unwrap_or(ProcessingState::Active)
        } else {
            states.front().copied().unwrap_or(ProcessingState::Active)
        }
    }
}

fn is_remote(parts: &[Part]) -> bool {
    parts.iter().any(|part| {
        matches!(part, Part::FileData { mime_type: None, .. })
    })
}

#[async_trait]
impl GenerativeProvider for MockProvider {
    fn model(&self) -> &str {
        "mock-model"
    }

    fn supports_remote_media(&self) -> bool {
        self.remote_media
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ProviderCall::Generate(parts.clone()));
            calls
                .iter()
                .filter(|c| matches!(c, ProviderCall::Generate(_)))
                .count()
        };

        if !self.generate_delay.is_zero() {
            tokio::time::sleep(self.generate_delay).await;
        }
        if self.remote_fails && is_remote(&parts) {
            return Err(RelayError::Provider("remote media rejected (400)".into()));
        }
        if self.empty_text {
            return Ok("  ".into());
        }
        Ok(format!("summary-{}-end", count))
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedMedia> {
        assert!(path.exists(), "staged file must exist during upload");
        self.uploads.lock().unwrap().push(std::fs::read(path).unwrap());
        self.calls.lock().unwrap().push(ProviderCall::Upload {
            mime_type: mime_type.to_string(),
            display_name: display_name.to_string(),
        });
        Ok(UploadedMedia {
            name: "files/mock-1".into(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/mock-1".into(),
            mime_type: mime_type.to_string(),
            state: ProcessingState::Processing,
        })
    }

    async fn get_file(&self, name: &str) -> Result<UploadedMedia> {
        self.calls
            .lock()
            .unwrap()
            .push(ProviderCall::GetFile(name.to_string()));
        Ok(UploadedMedia {
            name: name.to_string(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/mock-1".into(),
            mime_type: "audio/mp4".into(),
            state: self.next_state(),
        })
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ProviderCall::Delete(name.to_string()));
        Ok(())
    }
}

// === Assembly ===

/// Settings with an API key and a private scratch directory.
pub fn test_settings(temp_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.gemini.api_key = Some("test-key".into());
    settings.general.temp_dir = temp_dir.to_string_lossy().into_owned();
    settings
}

pub fn fast_timings() -> Timings {
    Timings {
        keepalive: Duration::from_secs(10),
        poll: Duration::from_millis(1),
        processing_timeout: Duration::from_secs(5),
    }
}

pub fn analyzer(
    settings: Settings,
    captions: Option<MockCaptions>,
    downloaders: (MockDownloader, MockDownloader),
    provider: Arc<MockProvider>,
) -> Arc<Analyzer> {
    analyzer_with_timings(settings, captions, downloaders, provider, fast_timings())
}

pub fn analyzer_with_timings(
    settings: Settings,
    captions: Option<MockCaptions>,
    downloaders: (MockDownloader, MockDownloader),
    provider: Arc<MockProvider>,
    timings: Timings,
) -> Arc<Analyzer> {
    let captions = captions.map(|c| Arc::new(c) as Arc<dyn CaptionSource>);
    let acquirer = AudioAcquirer::new(Arc::new(downloaders.0), Some(Arc::new(downloaders.1)), false);
    Arc::new(
        Analyzer::with_components(Arc::new(settings), Prompts::default(), captions, acquirer, provider)
            .with_timings(timings),
    )
}

/// Percent values of every progress event, in order.
pub fn percents(events: &[ProgressEvent]) -> Vec<u8> {
    events.iter().filter_map(|e| e.percent()).collect()
}

/// Percent of every progress event with the given step name.
pub fn step_percents(events: &[ProgressEvent], name: &str) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { step, percent, .. } if step == name => Some(*percent),
            _ => None,
        })
        .collect()
}

pub fn steps(events: &[ProgressEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { step, .. } => Some(step.clone()),
            _ => None,
        })
        .collect()
}

pub fn assert_well_formed(events: &[ProgressEvent]) {
    let percents = percents(events);
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "percent went backwards: {:?}",
        percents
    );
    assert_eq!(
        events.iter().filter(|e| e.is_terminal()).count(),
        1,
        "exactly one terminal event"
    );
    assert!(events.last().is_some_and(|e| e.is_terminal()));
}

/// A transcript of `sentences` short numbered sentences.
pub fn lecture_text(sentences: usize) -> String {
    (1..=sentences)
        .map(|i| format!("Sentence number {:02} covers the topic. ", i))
        .collect::<String>()
        .trim_end()
        .to_string()
}
