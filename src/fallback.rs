//! Byte-level text recovery for PDFs the structural parser cannot handle
//!
//! Scans `stream ... endstream` regions for text-show operators, unescapes
//! the literal strings and splits the recovered text into segments. Streams
//! that inflate as zlib data are scanned decompressed.

use crate::segment::ExtractedSegment;
use flate2::read::ZlibDecoder;
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::io::Read;

static STREAM_RE: Lazy<BytesRegex> =
    Lazy::new(|| BytesRegex::new(r"(?s-u)stream\r?\n?(.*?)endstream").unwrap());

/// `(literal) Tj` or `[array] TJ`
static TEXT_SHOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\(((?:\\.|[^\\)])*)\)\s*Tj|\[([^\]]*)\]\s*TJ").unwrap()
});

static LITERAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\(((?:\\.|[^\\)])*)\)").unwrap());

static PARAGRAPH_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Unescape a PDF literal string body
///
/// Handles `\n`, `\r`, `\t`, `\(`, `\)`, `\\` and three-digit octal codes.
/// Any other escape is kept verbatim.
pub fn unescape_pdf_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            Some(p @ ('(' | ')' | '\\')) => {
                chars.next();
                out.push(p);
            }
            Some(d) if d.is_digit(8) => {
                let digits: String = chars.clone().take(3).collect();
                let code = if digits.len() == 3 && digits.chars().all(|ch| ch.is_digit(8)) {
                    u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32)
                } else {
                    None
                };
                match code {
                    Some(ch) => {
                        for _ in 0..3 {
                            chars.next();
                        }
                        out.push(ch);
                    }
                    None => out.push('\\'),
                }
            }
            _ => out.push('\\'),
        }
    }

    out
}

/// Inflate a zlib stream body, or `None` if it is not zlib data
fn inflate(body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let result = ZlibDecoder::new(body).read_to_end(&mut out);
    // A truncated stream still yields its decoded prefix
    if result.is_ok() || !out.is_empty() {
        Some(out)
    } else {
        None
    }
}

/// Text fragments shown by the operators in one content stream
pub fn text_fragments(content: &str) -> Vec<String> {
    TEXT_SHOW_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let raw = if let Some(literal) = caps.get(1) {
                unescape_pdf_string(literal.as_str())
            } else {
                let array = caps.get(2)?.as_str();
                LITERAL_RE
                    .captures_iter(array)
                    .filter_map(|lit| lit.get(1))
                    .map(|lit| unescape_pdf_string(lit.as_str()))
                    .collect::<String>()
            };
            if raw.trim().is_empty() {
                None
            } else {
                Some(raw)
            }
        })
        .collect()
}

/// Recover all shown text from raw PDF bytes, space-joined
pub fn scan_streams(bytes: &[u8]) -> String {
    let mut fragments = Vec::new();
    let mut stream_count = 0usize;

    for caps in STREAM_RE.captures_iter(bytes) {
        let Some(body) = caps.get(1) else {
            continue;
        };
        stream_count += 1;
        let inflated = inflate(body.as_bytes());
        let content = String::from_utf8_lossy(inflated.as_deref().unwrap_or(body.as_bytes()));
        fragments.extend(text_fragments(&content));
    }

    log::debug!(
        "Byte-level scan: {} streams, {} text fragments",
        stream_count,
        fragments.len()
    );

    fragments.join(" ")
}

/// Whether the text contains a blank-line paragraph boundary
pub fn has_paragraph_break(text: &str) -> bool {
    PARAGRAPH_BREAK_RE.is_match(text)
}

/// One page-1 segment per blank-line separated paragraph
pub fn split_paragraphs(text: &str) -> Vec<ExtractedSegment> {
    PARAGRAPH_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| ExtractedSegment::plain(p, 1))
        .collect()
}

/// One page-1 segment per sentence (`.`, `!` or `?` followed by whitespace)
pub fn split_sentences(text: &str) -> Vec<ExtractedSegment> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END_RE.find_iter(text) {
        // Terminators are ASCII, so the sentence ends one byte into the match
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| ExtractedSegment::plain(s, 1))
        .collect()
}

/// The whole text as a single page-1 segment, if it has content
pub fn whole_blob(text: &str) -> Vec<ExtractedSegment> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![ExtractedSegment::plain(trimmed, 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_unescape_controls_and_parens() {
        assert_eq!(unescape_pdf_string(r"a\nb\tc\rd"), "a\nb\tc\rd");
        assert_eq!(unescape_pdf_string(r"\(see\)"), "(see)");
        assert_eq!(unescape_pdf_string(r"back\\slash"), r"back\slash");
    }

    #[test]
    fn test_unescape_octal() {
        assert_eq!(unescape_pdf_string(r"caf\351"), "café");
        assert_eq!(unescape_pdf_string(r"\101BC"), "ABC");
        // Fewer than three digits stays verbatim
        assert_eq!(unescape_pdf_string(r"x\12"), r"x\12");
    }

    #[test]
    fn test_unknown_escape_kept() {
        assert_eq!(unescape_pdf_string(r"\q"), r"\q");
        assert_eq!(unescape_pdf_string("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_text_fragments() {
        let content = r"BT /F1 12 Tf (Hello) Tj [(Wor) -20 (ld)] TJ (  ) Tj (a \(b\)) Tj ET";
        assert_eq!(text_fragments(content), vec!["Hello", "World", "a (b)"]);
    }

    #[test]
    fn test_scan_raw_stream() {
        let pdf = b"%PDF-1.4\n1 0 obj << /Length 30 >>\nstream\nBT (Hello) Tj ET\nendstream\nendobj";
        assert_eq!(scan_streams(pdf), "Hello");
    }

    #[test]
    fn test_scan_compressed_stream() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"BT (Packed text.) Tj ET").unwrap();
        let body = encoder.finish().unwrap();

        let mut pdf = b"1 0 obj << /Filter /FlateDecode >>\nstream\n".to_vec();
        pdf.extend_from_slice(&body);
        pdf.extend_from_slice(b"\nendstream\nendobj");
        assert_eq!(scan_streams(&pdf), "Packed text.");
    }

    #[test]
    fn test_scan_without_text_is_empty() {
        assert_eq!(scan_streams(b"%PDF-1.4\nstream\n0 0 m 10 10 l S\nendstream"), "");
        assert_eq!(scan_streams(b""), "");
    }

    #[test]
    fn test_split_paragraphs() {
        let text = "First block.\n\nSecond block.\r\n  \r\nThird.";
        assert!(has_paragraph_break(text));
        let segs = split_paragraphs(text);
        let texts: Vec<&str> = segs.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["First block.", "Second block.", "Third."]);
        assert!(segs.iter().all(|s| s.page_number == 1));
    }

    #[test]
    fn test_split_sentences() {
        let text = "One. Two! Three? Four";
        assert!(!has_paragraph_break(text));
        let texts: Vec<String> = split_sentences(text).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn test_split_sentences_keeps_decimals() {
        let texts: Vec<String> = split_sentences("Pi is 3.14 roughly.")
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, vec!["Pi is 3.14 roughly."]);
    }

    #[test]
    fn test_whole_blob() {
        assert_eq!(whole_blob("  text  ")[0].text, "text");
        assert!(whole_blob(" \n ").is_empty());
    }
}
