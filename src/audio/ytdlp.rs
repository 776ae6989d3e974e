//! Audio download through the `yt-dlp` command-line tool.

use super::progress::{DownloadProgress, LineEvent, ProgressParser};
use super::{AudioArtifact, AudioDownloader};
use crate::config::DownloadSettings;
use crate::error::{RelayError, Result};
use crate::source::VideoId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Runs `yt-dlp -x` in a scratch directory and reads back the extracted audio.
pub struct YtDlpDownloader {
    binary: String,
    user_agent: String,
    extractor_args: String,
    proxy: Option<String>,
    cookie_path: Option<PathBuf>,
    scratch_root: Option<PathBuf>,
    timeout: Duration,
    parser: ProgressParser,
}

impl YtDlpDownloader {
    pub fn from_settings(settings: &DownloadSettings, cookie_path: Option<PathBuf>) -> Self {
        Self {
            binary: settings.ytdlp_path.clone(),
            user_agent: settings.user_agent.clone(),
            extractor_args: settings.extractor_args.clone(),
            proxy: settings.proxy.clone().filter(|p| !p.trim().is_empty()),
            cookie_path,
            scratch_root: None,
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            parser: ProgressParser::new(),
        }
    }

    /// Create per-download scratch directories under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_root = Some(dir);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_args(&self, template: &Path, url: &str) -> Vec<String> {
        let mut args = vec![
            "-x".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
        ];
        if !self.extractor_args.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(self.extractor_args.clone());
        }
        args.extend(
            [
                "--no-check-certificates",
                "--no-cache-dir",
                "--geo-bypass",
                "--socket-timeout",
                "30",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        if let Some(cookies) = &self.cookie_path {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args.push(url.to_string());
        args
    }

    /// Relay output lines until both pipes close, then wait for exit.
    /// Returns the exit status and the last `ERROR` line seen.
    async fn monitor(
        &self,
        child: &mut Child,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<(ExitStatus, Option<String>)> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RelayError::ToolFailed("yt-dlp stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RelayError::ToolFailed("yt-dlp stderr unavailable".into()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_done, mut err_done) = (false, false);
        let mut last_error = None;

        while !(out_done && err_done) {
            let (line, from_stdout) = tokio::select! {
                line = out_lines.next_line(), if !out_done => (line?, true),
                line = err_lines.next_line(), if !err_done => (line?, false),
            };

            let Some(line) = line else {
                if from_stdout {
                    out_done = true;
                } else {
                    err_done = true;
                }
                continue;
            };

            match self.parser.parse_line(&line) {
                LineEvent::Progress(p) => {
                    let _ = progress.send(p).await;
                }
                LineEvent::Extracted => {
                    let _ = progress.send(DownloadProgress::complete()).await;
                }
                LineEvent::Error(message) => {
                    warn!("yt-dlp: {}", message);
                    last_error = Some(message);
                }
                LineEvent::Other => debug!("yt-dlp: {}", line),
            }
        }

        let status = child.wait().await?;
        Ok((status, last_error))
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    #[instrument(skip(self, progress), fields(video_id = %video_id))]
    async fn download(
        &self,
        video_id: &VideoId,
        progress: &mpsc::Sender<DownloadProgress>,
    ) -> Result<AudioArtifact> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ytdl_");
        let scratch = match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let template = scratch.path().join(format!("yt_{}.%(ext)s", video_id));

        let mut command = Command::new(&self.binary);
        command
            .args(self.build_args(&template, &video_id.watch_url()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RelayError::ToolNotFound(self.binary.clone()));
            }
            Err(e) => {
                return Err(RelayError::AudioDownload(format!(
                    "yt-dlp execution failed: {e}"
                )));
            }
        };

        info!("yt-dlp started for {}", video_id);

        let (status, last_error) =
            match tokio::time::timeout(self.timeout, self.monitor(&mut child, progress)).await {
                Ok(outcome) => outcome?,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill yt-dlp: {}", e);
                    }
                    return Err(RelayError::AudioDownload(format!(
                        "yt-dlp timed out after {}s",
                        self.timeout.as_secs()
                    )));
                }
            };

        if !status.success() {
            let reason = last_error.unwrap_or_else(|| format!("yt-dlp exited with {status}"));
            return Err(RelayError::AudioDownload(reason));
        }

        let path = find_download(scratch.path(), video_id)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("m4a")
            .to_lowercase();
        let bytes = tokio::fs::read(&path).await?;

        Ok(AudioArtifact { bytes, extension })
    }
}

/// Locates the extracted audio file by its `yt_<id>.` prefix, ignoring partial downloads.
fn find_download(dir: &Path, video_id: &VideoId) -> Result<PathBuf> {
    let prefix = format!("yt_{}.", video_id);
    let entries = std::fs::read_dir(dir)
        .map_err(|e| RelayError::AudioDownload(format!("Cannot read directory: {e}")))?;

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&prefix) && !n.ends_with(".part") && !n.ends_with(".ytdl"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::AudioDownload("Audio file not found after download".into()))
}
