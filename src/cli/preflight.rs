//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{RelayError, Result};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// A local analysis needs the API key up front.
    Analyze,
    /// The server starts without a key and reports it per request.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Analyze => {
            check_api_key(settings)?;
            check_temp_dir(settings)?;
        }
        Operation::Serve => {
            check_temp_dir(settings)?;
        }
    }
    Ok(())
}

/// Whether the downloader binary answers `--version`.
///
/// A missing downloader is not fatal since the built-in fallback can still fetch audio.
pub fn downloader_available(settings: &Settings) -> bool {
    check_tool(&settings.download.ytdlp_path).is_ok()
}

fn check_api_key(settings: &Settings) -> Result<()> {
    if settings.gemini.has_api_key() {
        Ok(())
    } else {
        Err(RelayError::Config(
            "GEMINI_API_KEY not set. Set it with: export GEMINI_API_KEY='...'".to_string(),
        ))
    }
}

fn check_temp_dir(settings: &Settings) -> Result<()> {
    let dir = settings.temp_dir();
    std::fs::create_dir_all(&dir).map_err(|e| {
        RelayError::Config(format!("Temp directory {} is not usable: {}", dir.display(), e))
    })
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(RelayError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(RelayError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(RelayError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
