//! Netscape cookie files for yt-dlp, materialized from base64 configuration.

use crate::error::{RelayError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// A cookie file that lives as long as this value.
pub struct CookieFile {
    file: NamedTempFile,
}

impl CookieFile {
    /// Decode `encoded` into a temporary cookie file under `dir`. Whitespace inside the value
    /// is ignored so that wrapped environment values still decode.
    pub fn from_base64(encoded: &str, dir: &Path) -> Result<Self> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = STANDARD.decode(compact.as_bytes())?;
        if decoded.is_empty() {
            return Err(RelayError::Config("Cookie value decodes to nothing".into()));
        }

        std::fs::create_dir_all(dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("cookies_")
            .suffix(".txt")
            .tempfile_in(dir)?;
        file.write_all(&decoded)?;
        file.flush()?;

        info!("Cookie file written ({} bytes)", decoded.len());
        Ok(Self { file })
    }

    /// Build from optional configuration; a missing or blank value yields no cookie file.
    pub fn from_config(encoded: Option<&str>, dir: &Path) -> Result<Option<Self>> {
        match encoded.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => Self::from_base64(value, dir).map(Some),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
