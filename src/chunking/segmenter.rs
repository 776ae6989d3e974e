//! Character-bounded transcript segmentation.
//!
//! Lengths are counted in characters, not bytes, so Korean and other multi-byte
//! transcripts are split at the same places as ASCII ones.

/// Split `text` into segments of at most `max_chars` characters, in reading order.
///
/// Each cut is made after the last `". "` sentence end inside the window; failing that,
/// after the last space; failing that, exactly at the limit. A boundary only counts when it
/// lies at or past the halfway point of the window. Concatenating the segments always
/// reproduces `text`.
pub fn split_transcript(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut remaining = text;

    loop {
        // Byte offset of the first character beyond the limit
        let limit_byte = match remaining.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                if !remaining.is_empty() || segments.is_empty() {
                    segments.push(remaining.to_string());
                }
                break;
            }
        };

        let window = &remaining[..limit_byte];
        let cut = boundary_cut(window, ". ", max_chars)
            .or_else(|| boundary_cut(window, " ", max_chars))
            .unwrap_or(limit_byte);

        segments.push(remaining[..cut].to_string());
        remaining = &remaining[cut..];
    }

    segments
}

/// Byte offset just past the first character of the last `separator` in `window`, if that
/// separator starts at or beyond half of `max_chars`.
fn boundary_cut(window: &str, separator: &str, max_chars: usize) -> Option<usize> {
    let at = window.rfind(separator)?;
    let chars_before = window[..at].chars().count();
    if chars_before * 2 < max_chars {
        return None;
    }
    // Both separators start with a one-byte ASCII character.
    Some(at + 1)
}
