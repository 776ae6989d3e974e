//! Analyze command: run one analysis locally and show its progress stream.

use crate::audio::CookieFile;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Analyzer;
use crate::progress::ProgressEvent;
use crate::source::{load_local_video, AnalysisRequest};
use anyhow::Result;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;

/// Run the analyze command.
pub async fn run_analyze(
    input: &str,
    prompt: Option<&str>,
    prompt_file: Option<&str>,
    output: Option<&str>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Analyze, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'lecture-relay doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let prompt = read_prompt(prompt, prompt_file).await?;
    let request = build_request(input, prompt).await?;

    if request.video_file.is_none() && !preflight::downloader_available(&settings) {
        Output::warning(&format!(
            "{} not found; videos without captions will use the built-in downloader.",
            settings.download.ytdlp_path
        ));
    }

    let cookies = CookieFile::from_config(
        settings.download.cookies_base64.as_deref(),
        &settings.temp_dir(),
    )?;
    let analyzer = Arc::new(Analyzer::new(Arc::new(settings), cookies.as_ref())?);

    Output::info(&format!("Analyzing: {}", input));
    let bar = Output::progress_bar(100, "Starting...");

    let mut events = Box::pin(analyzer.stream(request));
    let mut outcome = None;
    while let Some(event) = events.next().await {
        match event {
            ProgressEvent::Progress { step, percent, detail } => {
                bar.set_position(u64::from(percent));
                bar.set_message(format!("{}: {}", step, detail));
            }
            ProgressEvent::Result { analysis } => outcome = Some(Ok(analysis)),
            ProgressEvent::Error { message } => outcome = Some(Err(message)),
        }
    }

    match outcome {
        Some(Ok(analysis)) => {
            bar.finish_with_message("Analysis complete");
            write_analysis(&analysis, output).await
        }
        Some(Err(message)) => {
            bar.abandon_with_message("Analysis failed");
            Output::error(&message);
            Err(anyhow::anyhow!(message))
        }
        None => {
            bar.abandon();
            Err(anyhow::anyhow!("Analysis ended without a result"))
        }
    }
}

/// A path to an existing file selects upload mode; anything else is a YouTube reference.
async fn build_request(input: &str, prompt: String) -> Result<AnalysisRequest> {
    let path = Path::new(input);
    if path.is_file() {
        let video = load_local_video(path).await?;
        Output::kv("File", &format!("{} ({:.1} MB)", video.display_name(), video.size_mb()));
        Ok(AnalysisRequest::upload(prompt, video))
    } else {
        Ok(AnalysisRequest::youtube(prompt, input))
    }
}

async fn read_prompt(prompt: Option<&str>, prompt_file: Option<&str>) -> Result<String> {
    if let Some(path) = prompt_file {
        let expanded = Settings::expand_path(path);
        return tokio::fs::read_to_string(&expanded)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read prompt file {}: {}", expanded.display(), e));
    }
    Ok(prompt.unwrap_or_default().to_string())
}

async fn write_analysis(analysis: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            let path = Settings::expand_path(path);
            tokio::fs::write(&path, analysis).await?;
            Output::success(&format!("Analysis written to {}", path.display()));
        }
        None => {
            println!();
            println!("{}", analysis);
        }
    }
    Ok(())
}
