//! Doctor command - verify system requirements and configuration.

use crate::audio::CookieFile;
use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Lecture Relay Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections = [
        ("Downloader", vec![check_downloader(settings)]),
        ("Gemini", vec![check_gemini_api_key(settings)]),
        ("Directories", vec![check_temp_dir(settings)]),
        ("YouTube Access", vec![check_cookies(settings), check_proxy(settings)]),
        ("Configuration", vec![check_config_file()]),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before starting the relay.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! The relay is ready to use.");
    }

    Ok(())
}

/// A missing yt-dlp is a warning: the built-in downloader still works when enabled.
fn check_downloader(settings: &Settings) -> CheckResult {
    let binary = &settings.download.ytdlp_path;
    let missing = |message: &str| {
        if settings.download.fallback_enabled {
            CheckResult::warning(binary, message, install_hint_ytdlp())
        } else {
            CheckResult::error(binary, message, install_hint_ytdlp())
        }
    };

    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok(binary, &version)
        }
        Ok(_) => missing("installed but not working"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => missing("not found"),
        Err(e) => missing(&format!("error: {}", e)),
    }
}

fn check_gemini_api_key(settings: &Settings) -> CheckResult {
    match settings.gemini.api_key.as_deref() {
        Some(key) if key.len() > 12 => {
            let masked = format!("{}...{}", &key[..4], &key[key.len() - 4..]);
            CheckResult::ok(
                "GEMINI_API_KEY",
                &format!("configured ({}), model {}", masked, settings.gemini.model),
            )
        }
        Some(key) if !key.is_empty() => CheckResult::warning(
            "GEMINI_API_KEY",
            "set but unusually short",
            "Copy the full key from Google AI Studio",
        ),
        _ => CheckResult::error(
            "GEMINI_API_KEY",
            "not set",
            "Set with: export GEMINI_API_KEY='...'",
        ),
    }
}

fn check_temp_dir(settings: &Settings) -> CheckResult {
    let dir = settings.temp_dir();
    if dir.is_dir() {
        CheckResult::ok("Temp directory", &dir.display().to_string())
    } else if dir.exists() {
        CheckResult::error(
            "Temp directory",
            &format!("{} is not a directory", dir.display()),
            "Point general.temp_dir at a writable directory",
        )
    } else {
        CheckResult::warning(
            "Temp directory",
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first use",
        )
    }
}

fn check_cookies(settings: &Settings) -> CheckResult {
    match CookieFile::from_config(
        settings.download.cookies_base64.as_deref(),
        &settings.temp_dir(),
    ) {
        Ok(Some(_)) => CheckResult::ok("Cookies", "YOUTUBE_COOKIES_BASE64 decodes"),
        Ok(None) => CheckResult::warning(
            "Cookies",
            "not configured",
            "YouTube may block downloads from servers; set YOUTUBE_COOKIES_BASE64",
        ),
        Err(e) => CheckResult::error(
            "Cookies",
            &format!("invalid: {}", e),
            "Encode a Netscape cookies.txt with: base64 -w0 cookies.txt",
        ),
    }
}

fn check_proxy(settings: &Settings) -> CheckResult {
    match settings.download.proxy.as_deref() {
        Some(proxy) => CheckResult::ok("Proxy", proxy),
        None => CheckResult::ok("Proxy", "not configured"),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to override them", config_path.display()),
        )
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_api_key_checks() {
        let mut settings = Settings::default();
        settings.gemini.api_key = None;
        assert_eq!(check_gemini_api_key(&settings).status, CheckStatus::Error);

        settings.gemini.api_key = Some("short".into());
        assert_eq!(check_gemini_api_key(&settings).status, CheckStatus::Warning);

        settings.gemini.api_key = Some("AIzaSyExampleExampleExample".into());
        let result = check_gemini_api_key(&settings);
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(!result.message.contains("ExampleExample"));
    }

    #[test]
    fn test_missing_downloader_depends_on_fallback() {
        let mut settings = Settings::default();
        settings.download.ytdlp_path = "definitely-not-a-real-downloader".into();
        assert_eq!(check_downloader(&settings).status, CheckStatus::Warning);

        settings.download.fallback_enabled = false;
        assert_eq!(check_downloader(&settings).status, CheckStatus::Error);
    }

    #[test]
    fn test_cookie_checks() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = tmp.path().to_string_lossy().into_owned();
        settings.download.cookies_base64 = None;
        assert_eq!(check_cookies(&settings).status, CheckStatus::Warning);

        settings.download.cookies_base64 = Some("not base64 !!".into());
        assert_eq!(check_cookies(&settings).status, CheckStatus::Error);

        settings.download.cookies_base64 = Some("IyBOZXRzY2FwZQ==".into());
        assert_eq!(check_cookies(&settings).status, CheckStatus::Ok);
    }
}
