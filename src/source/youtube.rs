//! YouTube video reference resolution.

use super::VideoId;
use regex::Regex;

/// Characters a real identifier can end with: the id encodes 64 bits in 11 base64 digits,
/// so the two low bits of the final digit are always zero.
const FINAL_CHARS: &str = "AEIMQUYcgkosw048";

/// Resolves URLs and bare strings to YouTube video identifiers.
pub struct VideoResolver {
    url_regex: Regex,
    bare_regex: Regex,
}

impl VideoResolver {
    pub fn new() -> Self {
        // Watch, short-link, embed, legacy /v/, live and shorts URLs on any youtube host
        let url_regex = Regex::new(
            r"(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|embed/|v/|live/|shorts/)|youtu\.be/)([a-zA-Z0-9_-]{11})",
        )
        .expect("Invalid regex");

        let bare_regex = Regex::new(r"^([a-zA-Z0-9_-]{11})$").expect("Invalid regex");

        Self {
            url_regex,
            bare_regex,
        }
    }

    /// Extract the video identifier from a URL or bare ID.
    ///
    /// URL patterns are tried before the bare form; the first match wins.
    pub fn resolve(&self, input: &str) -> Option<VideoId> {
        let input = input.trim();

        if let Some(caps) = self.url_regex.captures(input) {
            return caps.get(1).map(|m| VideoId::new_unchecked(m.as_str()));
        }

        let caps = self.bare_regex.captures(input)?;
        let candidate = caps.get(1)?.as_str();
        if Self::plausible_bare_id(candidate) {
            Some(VideoId::new_unchecked(candidate))
        } else {
            None
        }
    }

    /// A bare string must look like an encoded id rather than a hyphenated word.
    fn plausible_bare_id(candidate: &str) -> bool {
        let ends_well = candidate
            .chars()
            .last()
            .is_some_and(|c| FINAL_CHARS.contains(c));
        let has_mixed = candidate
            .chars()
            .any(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        ends_well && has_mixed
    }
}

impl Default for VideoResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(input: &str) -> Option<String> {
        VideoResolver::new()
            .resolve(input)
            .map(|id| id.as_str().to_string())
    }

    #[test]
    fn test_extract_video_id() {
        let expected = Some("dQw4w9WgXcQ".to_string());

        assert_eq!(resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), expected);
        assert_eq!(resolve("https://youtu.be/dQw4w9WgXcQ"), expected);
        assert_eq!(resolve("https://youtube.com/embed/dQw4w9WgXcQ"), expected);
        assert_eq!(resolve("https://www.youtube.com/live/dQw4w9WgXcQ?si=abc"), expected);
        assert_eq!(resolve("https://youtube.com/v/dQw4w9WgXcQ"), expected);
        assert_eq!(resolve("https://www.youtube.com/shorts/dQw4w9WgXcQ"), expected);
        assert_eq!(resolve("https://m.youtube.com/watch?v=dQw4w9WgXcQ"), expected);
        assert_eq!(
            resolve("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42"),
            expected
        );
        assert_eq!(resolve("  dQw4w9WgXcQ  "), expected);
    }

    #[test]
    fn test_url_form_accepts_any_identifier_shape() {
        assert_eq!(
            resolve("https://www.youtube.com/watch?v=abcdefghijk"),
            Some("abcdefghijk".to_string())
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(resolve("not-a-video"), None);
        assert_eq!(resolve("not-a-video-id"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("https://vimeo.com/123456789"), None);
        assert_eq!(resolve("https://www.youtube.com/watch?v=short"), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = VideoResolver::new();
        let url = "https://youtu.be/dQw4w9WgXcQ?t=10";
        let first = resolver.resolve(url).unwrap();
        let second = resolver.resolve(url).unwrap();
        assert_eq!(first, second);
        // Resolving the canonical URL yields the same id again.
        assert_eq!(resolver.resolve(&first.watch_url()), Some(first));
    }
}
