//! Analysis orchestrator for the lecture relay.
//!
//! Drives one request from input validation to the final analysis text: captions first,
//! then the media path (direct URL hand-off, audio download, upload, processing wait,
//! generation), or the upload path for user-supplied files. Progress is reported through
//! a [`ProgressSink`] at every stage.

use crate::audio::{AudioAcquirer, AudioArtifact, CookieFile, DownloadProgress};
use crate::captions::{CaptionFetcher, CaptionResult, CaptionSource, YoutubeCaptions};
use crate::chunking::split_transcript;
use crate::config::{Prompts, Settings};
use crate::error::{RelayError, Result};
use crate::progress::{event_stream, keepalive_percent, ProgressEvent, ProgressSink};
use crate::provider::{GeminiClient, GenerativeProvider, Part, ProcessingState, UploadedMedia};
use crate::source::{AnalysisRequest, InputMode, UploadedVideo, VideoId, VideoResolver};
use futures::Stream;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

const STEP_CAPTIONS: &str = "Fetching captions";
const STEP_CAPTION_ANALYSIS: &str = "Analyzing captions";
const STEP_DIRECT: &str = "Analyzing video";
const STEP_DOWNLOAD: &str = "Downloading audio";
const STEP_PREPARE: &str = "Preparing file";
const STEP_UPLOAD: &str = "Uploading to Gemini";
const STEP_PROCESSING: &str = "Waiting for processing";
const STEP_ANALYSIS: &str = "Analyzing with Gemini";
const STEP_DONE: &str = "Analysis complete";

/// Download progress updates buffered between the downloader and the request task.
const DOWNLOAD_PROGRESS_BUFFER: usize = 32;

/// Direct URL hand-off. The ceiling must not exceed [`DOWNLOAD_BASE`].
const DIRECT_URL: (u8, u8) = (15, 20);

/// Start of the audio download band.
const DOWNLOAD_BASE: u8 = 20;

/// Percent bands of the upload/wait/generate sequence.
#[derive(Debug, Clone, Copy)]
struct MediaPlan {
    upload: u8,
    wait: (u8, u8),
    analysis: (u8, u8),
}

/// Audio that was downloaded because the video had no captions.
const DOWNLOADED_AUDIO: MediaPlan = MediaPlan {
    upload: 40,
    wait: (50, 65),
    analysis: (70, 90),
};

/// A file the client uploaded itself.
const CLIENT_UPLOAD: MediaPlan = MediaPlan {
    upload: 20,
    wait: (40, 55),
    analysis: (60, 90),
};

/// Intervals that pace a request.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Keep-alive cadence while a generation call runs.
    pub keepalive: Duration,
    /// Delay between processing-state polls.
    pub poll: Duration,
    /// Upper bound on waiting for an uploaded file to become active.
    pub processing_timeout: Duration,
}

impl Timings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            keepalive: settings.keepalive_interval(),
            poll: settings.poll_interval(),
            processing_timeout: settings.processing_timeout(),
        }
    }
}

/// Runs lecture analyses.
pub struct Analyzer {
    settings: Arc<Settings>,
    prompts: Prompts,
    resolver: VideoResolver,
    captions: Option<CaptionFetcher>,
    acquirer: AudioAcquirer,
    provider: Arc<dyn GenerativeProvider>,
    timings: Timings,
}

impl Analyzer {
    /// Create an analyzer with the production backends.
    ///
    /// `cookies` must outlive the analyzer; the downloader refers to its path.
    pub fn new(settings: Arc<Settings>, cookies: Option<&CookieFile>) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let caption_source: Option<Arc<dyn CaptionSource>> = if settings.captions.enabled {
            Some(Arc::new(YoutubeCaptions::new()?))
        } else {
            info!("Caption retrieval disabled");
            None
        };

        let acquirer =
            AudioAcquirer::from_settings(&settings, cookies.map(|c| c.path().to_path_buf()));
        let provider = Arc::new(GeminiClient::from_settings(&settings.gemini)?);

        Ok(Self::with_components(
            settings,
            prompts,
            caption_source,
            acquirer,
            provider,
        ))
    }

    /// Create an analyzer with custom components.
    pub fn with_components(
        settings: Arc<Settings>,
        prompts: Prompts,
        caption_source: Option<Arc<dyn CaptionSource>>,
        acquirer: AudioAcquirer,
        provider: Arc<dyn GenerativeProvider>,
    ) -> Self {
        let captions = caption_source.map(|source| CaptionFetcher::new(source, &settings.captions));
        let timings = Timings::from_settings(&settings);

        Self {
            settings,
            prompts,
            resolver: VideoResolver::new(),
            captions,
            acquirer,
            provider,
            timings,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn resolver(&self) -> &VideoResolver {
        &self.resolver
    }

    /// Run `request` in the background and stream its events.
    pub fn stream(
        self: &Arc<Self>,
        request: AnalysisRequest,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let analyzer = Arc::clone(self);
        let span = info_span!("analysis", request_id = %Uuid::new_v4());
        event_stream(move |mut sink| {
            async move { analyzer.run(request, &mut sink).await }.instrument(span)
        })
    }

    /// Validate and run one request, returning the analysis text.
    #[instrument(skip_all, fields(mode = %request.input_mode))]
    pub async fn run(&self, request: AnalysisRequest, sink: &mut ProgressSink) -> Result<String> {
        if !self.settings.gemini.has_api_key() {
            return Err(RelayError::Config(
                "GEMINI_API_KEY is not configured on the server.".into(),
            ));
        }

        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(RelayError::InvalidInput("A prompt is required.".into()));
        }

        match request.input_mode {
            InputMode::Youtube => {
                let url = request
                    .youtube_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| RelayError::InvalidInput("A YouTube URL is required.".into()))?;
                let video_id = self.resolver.resolve(url).ok_or_else(|| {
                    RelayError::InvalidInput(format!("Invalid YouTube URL: {}", url))
                })?;
                self.analyze_youtube(&video_id, prompt, sink).await
            }
            InputMode::Upload => {
                let file = request
                    .video_file
                    .as_ref()
                    .filter(|f| !f.bytes.is_empty())
                    .ok_or_else(|| RelayError::InvalidInput("A video file is required.".into()))?;
                self.analyze_upload(file, prompt, sink).await
            }
        }
    }

    #[instrument(skip(self, prompt, sink), fields(video_id = %video_id))]
    async fn analyze_youtube(
        &self,
        video_id: &VideoId,
        prompt: &str,
        sink: &mut ProgressSink,
    ) -> Result<String> {
        if let Some(fetcher) = &self.captions {
            sink.progress(STEP_CAPTIONS, 10, "Fetching YouTube captions...")
                .await;
            if let Some(captions) = fetcher.fetch(video_id).await {
                return self.analyze_transcript(&captions, prompt, sink).await;
            }
        }

        self.analyze_media(video_id, prompt, sink).await
    }

    /// Text path: single pass, or map-reduce when the transcript is too long.
    async fn analyze_transcript(
        &self,
        captions: &CaptionResult,
        prompt: &str,
        sink: &mut ProgressSink,
    ) -> Result<String> {
        sink.progress(
            STEP_CAPTION_ANALYSIS,
            30,
            format!(
                "Got {} characters of captions ({}), analyzing with Gemini...",
                captions.char_count(),
                captions.language_code
            ),
        )
        .await;

        let segments = split_transcript(&captions.text, self.settings.analysis.chunk_chars);
        let analysis = if segments.len() == 1 {
            let request = self.prompts.single_pass(prompt, &captions.text);
            self.generate_with_keepalive(vec![Part::text(request)], sink, STEP_CAPTION_ANALYSIS, (30, 85))
                .await?
        } else {
            self.map_reduce(&segments, prompt, sink).await?
        };

        self.finish(analysis, sink).await
    }

    /// Summarize each segment in order, then combine the summaries in one call.
    async fn map_reduce(
        &self,
        segments: &[String],
        prompt: &str,
        sink: &mut ProgressSink,
    ) -> Result<String> {
        let total = segments.len();
        let batch_size = self.settings.analysis.batch_size.max(1);
        info!("Long transcript: {} sections in batches of {}", total, batch_size);

        let mut summaries = Vec::with_capacity(total);
        for (batch_index, batch) in segments.chunks(batch_size).enumerate() {
            info!("Map batch {}/{}", batch_index + 1, total.div_ceil(batch_size));
            for segment in batch {
                let index = summaries.len();
                let band = (
                    (30 + 50 * index / total) as u8,
                    (30 + 50 * (index + 1) / total) as u8,
                );
                sink.progress(
                    STEP_CAPTION_ANALYSIS,
                    band.0,
                    format!("Analyzing section {}/{}...", index + 1, total),
                )
                .await;

                let request = self.prompts.map_segment(segment);
                let summary = self
                    .generate_with_keepalive(vec![Part::text(request)], sink, STEP_CAPTION_ANALYSIS, band)
                    .await?;
                summaries.push(summary);
            }
        }

        sink.progress(
            STEP_CAPTION_ANALYSIS,
            80,
            format!("Combining {} section analyses...", total),
        )
        .await;
        let request = self.prompts.reduce(prompt, &summaries);
        self.generate_with_keepalive(vec![Part::text(request)], sink, STEP_CAPTION_ANALYSIS, (80, 90))
            .await
    }

    /// Media path for a video without usable captions.
    async fn analyze_media(
        &self,
        video_id: &VideoId,
        prompt: &str,
        sink: &mut ProgressSink,
    ) -> Result<String> {
        if self.settings.gemini.direct_youtube_urls && self.provider.supports_remote_media() {
            sink.progress(
                STEP_DIRECT,
                DIRECT_URL.0,
                "No captions, sending the video URL to Gemini...",
            )
            .await;
            let parts = vec![Part::remote_video(video_id.watch_url()), Part::text(prompt)];
            match self
                .generate_with_keepalive(parts, sink, STEP_DIRECT, DIRECT_URL)
                .await
            {
                Ok(text) if !text.trim().is_empty() => return self.finish(text, sink).await,
                Ok(_) => warn!("Direct URL analysis returned no text, downloading instead"),
                Err(e) => warn!("Direct URL analysis failed, downloading instead: {}", e),
            }
        }

        sink.progress(STEP_DOWNLOAD, DOWNLOAD_BASE, "No captions, downloading audio...")
            .await;
        let artifact = self.download_audio(video_id, sink).await?;

        let staged = self.stage(&artifact.bytes, &format!(".{}", artifact.extension))?;
        let mime_type = artifact.mime_type();
        let size_mb = artifact.size_mb();
        drop(artifact);

        self.upload_and_generate(
            staged,
            &mime_type,
            &format!("yt_{}", video_id),
            size_mb,
            prompt,
            sink,
            DOWNLOADED_AUDIO,
        )
        .await
    }

    /// Run the audio acquirer while relaying its progress to the client.
    async fn download_audio(
        &self,
        video_id: &VideoId,
        sink: &mut ProgressSink,
    ) -> Result<AudioArtifact> {
        let (tx, mut rx) = mpsc::channel(DOWNLOAD_PROGRESS_BUFFER);
        let download = self.acquirer.acquire(video_id, &tx);
        tokio::pin!(download);

        let outcome = loop {
            tokio::select! {
                outcome = &mut download => break outcome,
                Some(update) = rx.recv() => relay_download(sink, &update).await,
            }
        };
        while let Ok(update) = rx.try_recv() {
            relay_download(sink, &update).await;
        }

        outcome
    }

    /// Upload mode: the client sent the media itself.
    async fn analyze_upload(
        &self,
        file: &UploadedVideo,
        prompt: &str,
        sink: &mut ProgressSink,
    ) -> Result<String> {
        sink.progress(
            STEP_PREPARE,
            10,
            format!("Processing uploaded file {}...", file.display_name()),
        )
        .await;

        let staged = self.stage(&file.bytes, &file.suffix())?;
        self.upload_and_generate(
            staged,
            file.mime_type(),
            file.display_name(),
            file.size_mb(),
            prompt,
            sink,
            CLIENT_UPLOAD,
        )
        .await
    }

    /// Write bytes to a scoped temporary file.
    fn stage(&self, bytes: &[u8], suffix: &str) -> Result<NamedTempFile> {
        let dir = self.settings.temp_dir();
        std::fs::create_dir_all(&dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(suffix)
            .tempfile_in(&dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }

    /// Upload the staged file, wait for processing, generate, and delete the remote copy.
    /// The staged file is removed as soon as the upload finishes, successful or not.
    #[allow(clippy::too_many_arguments)]
    async fn upload_and_generate(
        &self,
        staged: NamedTempFile,
        mime_type: &str,
        display_name: &str,
        size_mb: f64,
        prompt: &str,
        sink: &mut ProgressSink,
        plan: MediaPlan,
    ) -> Result<String> {
        sink.progress(
            STEP_UPLOAD,
            plan.upload,
            format!("Uploading {} ({:.1} MB) to Gemini...", display_name, size_mb),
        )
        .await;

        let uploaded = self
            .provider
            .upload_file(staged.path(), mime_type, display_name)
            .await;
        if let Err(e) = staged.close() {
            warn!("Failed to remove staged file: {}", e);
        }
        let media = uploaded?;

        let outcome = self.wait_and_generate(&media, prompt, sink, plan).await;

        if let Err(e) = self.provider.delete_file(&media.name).await {
            warn!("Failed to delete {} from Gemini: {}", media.name, e);
        }

        self.finish(outcome?, sink).await
    }

    async fn wait_and_generate(
        &self,
        media: &UploadedMedia,
        prompt: &str,
        sink: &mut ProgressSink,
        plan: MediaPlan,
    ) -> Result<String> {
        let media = self.wait_until_processed(media, sink, plan.wait).await?;

        sink.progress(STEP_ANALYSIS, plan.analysis.0, "Gemini is analyzing the media...")
            .await;
        let parts = vec![Part::media(&media), Part::text(prompt)];
        self.generate_with_keepalive(parts, sink, STEP_ANALYSIS, plan.analysis)
            .await
    }

    /// Poll until the file leaves PROCESSING. FAILED and timeouts are terminal.
    async fn wait_until_processed(
        &self,
        media: &UploadedMedia,
        sink: &mut ProgressSink,
        (base, ceiling): (u8, u8),
    ) -> Result<UploadedMedia> {
        sink.progress(STEP_PROCESSING, base, "Gemini is processing the media...")
            .await;

        let started = Instant::now();
        let mut current = media.clone();
        let mut polls = 0u32;

        while current.is_processing() {
            if started.elapsed() >= self.timings.processing_timeout {
                return Err(RelayError::Provider(format!(
                    "{} was still processing after {}s",
                    current.name,
                    self.timings.processing_timeout.as_secs()
                )));
            }

            tokio::time::sleep(self.timings.poll).await;
            polls += 1;
            current = self.provider.get_file(&current.name).await?;
            sink.progress(
                STEP_PROCESSING,
                keepalive_percent(base, ceiling, polls),
                format!(
                    "Gemini is processing the media... ({}s)",
                    started.elapsed().as_secs()
                ),
            )
            .await;
        }

        if current.state == ProcessingState::Failed {
            return Err(RelayError::ProcessingFailed(current.name));
        }
        info!("{} is active after {} polls", current.name, polls);
        Ok(current)
    }

    async fn generate_with_keepalive(
        &self,
        parts: Vec<Part>,
        sink: &mut ProgressSink,
        step: &str,
        band: (u8, u8),
    ) -> Result<String> {
        debug!(model = self.provider.model(), step, parts = parts.len(), "Generation call");
        let call = self.provider.generate(parts);
        sink.keepalive(call, self.timings.keepalive, step, band, |elapsed| {
            format!("The model is still working... ({}s)", elapsed.as_secs())
        })
        .await
    }

    /// Reject empty output, then announce completion.
    async fn finish(&self, analysis: String, sink: &mut ProgressSink) -> Result<String> {
        if analysis.trim().is_empty() {
            return Err(RelayError::EmptyAnalysis);
        }
        sink.progress(STEP_DONE, 95, "Preparing the result...").await;
        Ok(analysis)
    }
}

/// Downloader percent maps onto 20-40 of the overall request.
async fn relay_download(sink: &mut ProgressSink, update: &DownloadProgress) {
    let percent = DOWNLOAD_BASE + (update.percent.clamp(0.0, 100.0) * 0.2) as u8;
    sink.progress(STEP_DOWNLOAD, percent, update.detail()).await;
}
