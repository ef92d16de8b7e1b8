//! Blank-line segmentation for plain-text documents

use crate::segment::ExtractedSegment;
use once_cell::sync::Lazy;
use regex::Regex;

static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\r?\n){2,}").unwrap());

/// Split on runs of two or more newlines; every segment is on page 1
pub fn segment_text(content: &str) -> Vec<ExtractedSegment> {
    BLANK_LINES_RE
        .split(content)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| ExtractedSegment::plain(p, 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_blocks() {
        let segments = segment_text("First block\nstill first.\n\nSecond block.\n");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "First block\nstill first.");
        assert_eq!(segments[1].text, "Second block.");
        assert!(segments.iter().all(|s| s.page_number == 1));
        assert!(segments.iter().all(|s| s.position_data.is_none() && s.style_data.is_none()));
    }

    #[test]
    fn test_crlf_and_long_gaps() {
        let segments = segment_text("a\r\n\r\nb\n\n\n\nc");
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_whitespace_only() {
        assert!(segment_text("  \n\n \n\n").is_empty());
        assert!(segment_text("").is_empty());
    }
}
