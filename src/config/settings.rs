//! Configuration settings for the lecture relay.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub gemini: GeminiSettings,
    pub captions: CaptionSettings,
    pub download: DownloadSettings,
    pub analysis: AnalysisSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for temporary files (downloads, upload staging, cookies).
    pub temp_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir()
                .join("lecture-relay")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_mb: 1024,
        }
    }
}

/// Generative-AI provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// API key (usually supplied through `GEMINI_API_KEY`).
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// REST endpoint root.
    pub base_url: String,
    /// Hand YouTube URLs straight to the model before downloading anything.
    pub direct_youtube_urls: bool,
    /// Interval between processing-state polls of an uploaded file.
    pub poll_interval_secs: u64,
    /// Give up waiting for an uploaded file after this many seconds.
    pub processing_timeout_secs: u64,
    /// Per-request timeout. None lets generation run as long as the provider allows.
    pub request_timeout_secs: Option<u64>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            direct_youtube_urls: true,
            poll_interval_secs: 3,
            processing_timeout_secs: 600,
            request_timeout_secs: None,
        }
    }
}

impl GeminiSettings {
    /// Whether a non-empty API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

/// Caption retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    pub enabled: bool,
    /// Preferred languages, queried together before enumerating every track.
    pub languages: Vec<String>,
    /// Captions at or below this many characters are treated as unusable.
    pub min_chars: usize,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: vec!["ko".to_string(), "en".to_string()],
            min_chars: 50,
        }
    }
}

/// Audio download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Path or name of the yt-dlp binary.
    pub ytdlp_path: String,
    /// Proxy URL for downloads (`YTDLP_PROXY`).
    pub proxy: Option<String>,
    /// Base64-encoded Netscape cookies.txt (`YOUTUBE_COOKIES_BASE64`).
    pub cookies_base64: Option<String>,
    /// Kill the downloader after this many seconds.
    pub timeout_secs: u64,
    /// Retry with the built-in downloader when yt-dlp fails.
    pub fallback_enabled: bool,
    pub user_agent: String,
    pub extractor_args: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            proxy: None,
            cookies_base64: None,
            timeout_secs: 600,
            fallback_enabled: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            extractor_args: "youtube:player_client=web_creator,mweb,tv".to_string(),
        }
    }
}

/// Analysis pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Transcripts longer than this are summarized with map-reduce.
    pub chunk_chars: usize,
    /// Map-phase calls are grouped into batches of this size.
    pub batch_size: usize,
    /// Interval between keep-alive progress events during generation.
    pub keepalive_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            chunk_chars: 100_000,
            batch_size: 3,
            keepalive_secs: 10,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory holding an `analysis.toml` that overrides the default templates.
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied after the file is read.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply process-environment overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(proxy) = get("YTDLP_PROXY") {
            self.download.proxy = Some(proxy);
        }
        if let Some(cookies) = get("YOUTUBE_COOKIES_BASE64") {
            self.download.cookies_base64 = Some(cookies);
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lecture-relay")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Settings as TOML with secrets redacted.
    pub fn to_redacted_toml(&self) -> crate::error::Result<String> {
        let mut shown = self.clone();
        if shown.gemini.has_api_key() {
            shown.gemini.api_key = Some("<redacted>".to_string());
        }
        if shown.download.cookies_base64.is_some() {
            shown.download.cookies_base64 = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| crate::error::RelayError::Config(e.to_string()))
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.analysis.keepalive_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.gemini.poll_interval_secs.max(1))
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini.processing_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.gemini.model, "gemini-2.0-flash");
        assert_eq!(settings.captions.languages, vec!["ko", "en"]);
        assert_eq!(settings.captions.min_chars, 50);
        assert_eq!(settings.analysis.chunk_chars, 100_000);
        assert_eq!(settings.analysis.batch_size, 3);
        assert!(!settings.gemini.has_api_key());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("GEMINI_API_KEY", "secret"),
            ("YTDLP_PROXY", "socks5://127.0.0.1:1080"),
            ("PORT", "9001"),
            ("GEMINI_MODEL", ""),
        ]);
        let mut settings = Settings::default();
        settings.apply_env(|k| vars.get(k).cloned());

        assert!(settings.gemini.has_api_key());
        assert_eq!(settings.download.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(settings.server.port, 9001);
        // Empty values leave the default in place.
        assert_eq!(settings.gemini.model, "gemini-2.0-flash");
    }

    #[test]
    fn test_partial_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [analysis]
            chunk_chars = 5000

            [captions]
            languages = ["en"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.analysis.chunk_chars, 5000);
        assert_eq!(settings.analysis.batch_size, 3);
        assert_eq!(settings.captions.languages, vec!["en"]);
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_redacted_output_hides_secrets() {
        let mut settings = Settings::default();
        settings.gemini.api_key = Some("secret-key".to_string());
        let shown = settings.to_redacted_toml().unwrap();
        assert!(!shown.contains("secret-key"));
        assert!(shown.contains("<redacted>"));
    }
}
