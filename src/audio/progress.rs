//! Parsing of yt-dlp's `--newline` progress output.

use regex::Regex;

/// Download progress reported by an audio downloader.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadProgress {
    /// Completion in percent, 0.0 to 100.0.
    pub percent: f64,
    pub size: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl DownloadProgress {
    pub fn complete() -> Self {
        Self {
            percent: 100.0,
            ..Default::default()
        }
    }

    /// Human-readable detail line, e.g. `"45.2% of 12.3MiB at 1.2MiB/s, ETA 00:08"`.
    pub fn detail(&self) -> String {
        let mut detail = format!("{:.1}%", self.percent);
        if let Some(size) = &self.size {
            detail.push_str(&format!(" of {}", size));
        }
        if let Some(speed) = &self.speed {
            detail.push_str(&format!(" at {}", speed));
        }
        if let Some(eta) = &self.eta {
            detail.push_str(&format!(", ETA {}", eta));
        }
        detail
    }
}

/// What a single line of yt-dlp output tells us.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    Progress(DownloadProgress),
    /// Post-processing started, the download itself is done.
    Extracted,
    Error(String),
    Other,
}

/// Line classifier for yt-dlp output.
pub struct ProgressParser {
    progress_regex: Regex,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self {
            progress_regex: Regex::new(
                r"\[download\]\s+([\d.]+)%\s+of\s+~?\s*([\d.]+\s*\w+)(?:\s+at\s+([\d.]+\s*\w+/s))?(?:\s+ETA\s+(\S+))?",
            )
            .expect("Invalid regex"),
        }
    }

    pub fn parse_line(&self, line: &str) -> LineEvent {
        let line = line.trim();

        if let Some(caps) = self.progress_regex.captures(line) {
            let percent = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
                .clamp(0.0, 100.0);
            return LineEvent::Progress(DownloadProgress {
                percent,
                size: caps.get(2).map(|m| m.as_str().to_string()),
                speed: caps.get(3).map(|m| m.as_str().to_string()),
                eta: caps.get(4).map(|m| m.as_str().to_string()),
            });
        }

        if line.contains("[ExtractAudio]") {
            return LineEvent::Extracted;
        }

        if line.contains("ERROR") {
            return LineEvent::Error(line.to_string());
        }

        LineEvent::Other
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_progress_line() {
        let parser = ProgressParser::new();
        let event = parser.parse_line("[download]  45.2% of 12.34MiB at  1.20MiB/s ETA 00:08");
        assert_eq!(
            event,
            LineEvent::Progress(DownloadProgress {
                percent: 45.2,
                size: Some("12.34MiB".into()),
                speed: Some("1.20MiB/s".into()),
                eta: Some("00:08".into()),
            })
        );
    }

    #[test]
    fn test_estimated_size_without_speed() {
        let parser = ProgressParser::new();
        match parser.parse_line("[download]   3.0% of ~ 50.00MiB") {
            LineEvent::Progress(p) => {
                assert_eq!(p.percent, 3.0);
                assert_eq!(p.size.as_deref(), Some("50.00MiB"));
                assert!(p.speed.is_none());
                assert!(p.eta.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_other_lines() {
        let parser = ProgressParser::new();
        assert_eq!(
            parser.parse_line("[ExtractAudio] Destination: yt_abc.opus"),
            LineEvent::Extracted
        );
        assert_eq!(
            parser.parse_line("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
            LineEvent::Error("ERROR: [youtube] abc: Sign in to confirm you're not a bot".into())
        );
        assert_eq!(
            parser.parse_line("[youtube] Extracting URL"),
            LineEvent::Other
        );
    }

    #[test]
    fn test_detail_formatting() {
        let progress = DownloadProgress {
            percent: 45.2,
            size: Some("12MiB".into()),
            speed: None,
            eta: Some("00:08".into()),
        };
        assert_eq!(progress.detail(), "45.2% of 12MiB, ETA 00:08");
        assert_eq!(DownloadProgress::complete().detail(), "100.0%");
    }
}
