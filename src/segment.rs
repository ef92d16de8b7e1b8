//! Segments: the output unit of extraction
//!
//! Converts paragraphs into [`ExtractedSegment`]s with serialized position and
//! style payloads, provides the per-page concatenation fallback, and builds
//! the rows handed to persistence.

use crate::config::ExtractionConfig;
use crate::layout::{group_into_lines, group_into_paragraphs, Paragraph};
use crate::model::ParsedDocument;
use crate::runs::{collect_runs, item_text, FontStyle, FontWeight};
use crate::PdfError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Font family reported for every paragraph; not derived from the PDF
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";
/// Text colour reported for every paragraph
pub const DEFAULT_COLOR: &str = "#000000";
/// Line height reported for every paragraph
pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;

/// Horizontal alignment of a paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Position payload: `{x, y, width, height}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Style payload consumed by the review UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: String,
    pub color: String,
    pub text_align: TextAlign,
    pub line_height: f32,
}

/// One translation unit produced by extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedSegment {
    /// Non-empty, trimmed
    pub text: String,
    /// 1-based
    pub page_number: u32,
    /// Serialized [`Position`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_data: Option<String>,
    /// Serialized [`Style`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_data: Option<String>,
}

impl ExtractedSegment {
    /// Segment without layout metadata
    pub fn plain(text: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            page_number,
            position_data: None,
            style_data: None,
        }
    }

    pub fn position(&self) -> Result<Option<Position>, PdfError> {
        self.position_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(PdfError::from)
    }

    pub fn style(&self) -> Result<Option<Style>, PdfError> {
        self.style_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(PdfError::from)
    }
}

impl Paragraph {
    /// Serialize as a segment with position and style payloads
    pub fn to_segment(&self, page_number: u32) -> Result<ExtractedSegment, PdfError> {
        let position = Position {
            x: self.bounds.x,
            y: self.bounds.y,
            width: self.bounds.width,
            height: self.bounds.height,
        };
        let style = Style {
            font_size: self.style.font_size,
            font_weight: self.style.font_weight,
            font_style: self.style.font_style,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: DEFAULT_COLOR.to_string(),
            text_align: TextAlign::Left,
            line_height: DEFAULT_LINE_HEIGHT,
        };

        Ok(ExtractedSegment {
            text: self.text.clone(),
            page_number,
            position_data: Some(serde_json::to_string(&position)?),
            style_data: Some(serde_json::to_string(&style)?),
        })
    }
}

/// Group every page into paragraph segments, in reading order
pub fn emit_segments(
    doc: &ParsedDocument,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractedSegment>, PdfError> {
    let mut segments = Vec::new();

    for (page_idx, page) in doc.pages.iter().enumerate() {
        let page_number = page_idx as u32 + 1;
        let runs = collect_runs(page, config.default_font_size);
        let run_count = runs.len();
        let lines = group_into_lines(runs, config);
        let paragraphs = group_into_paragraphs(&lines, config);

        log::debug!(
            "Page {}: {} runs, {} lines, {} paragraphs",
            page_number,
            run_count,
            lines.len(),
            paragraphs.len()
        );

        for paragraph in &paragraphs {
            segments.push(paragraph.to_segment(page_number)?);
        }
    }

    Ok(segments)
}

/// One segment per page holding every run's text, space-joined
///
/// Pages without any visible run contribute nothing.
pub fn concatenate_pages(doc: &ParsedDocument) -> Vec<ExtractedSegment> {
    doc.pages
        .iter()
        .enumerate()
        .filter_map(|(page_idx, page)| {
            let texts: Vec<String> = page.texts.iter().filter_map(item_text).collect();
            if texts.is_empty() {
                return None;
            }
            let text = texts.join(" ").trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(ExtractedSegment::plain(text, page_idx as u32 + 1))
        })
        .collect()
}

/// A segment row as stored by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub id: Uuid,
    pub document_id: String,
    /// 0-based position in the extraction output
    pub segment_index: usize,
    pub page_number: u32,
    pub source_text: String,
    pub position_data: Option<String>,
    pub style_data: Option<String>,
}

/// Assign identities and ordering to extracted segments
pub fn into_records(document_id: &str, segments: Vec<ExtractedSegment>) -> Vec<SegmentRecord> {
    segments
        .into_iter()
        .enumerate()
        .map(|(segment_index, seg)| SegmentRecord {
            id: Uuid::new_v4(),
            document_id: document_id.to_string(),
            segment_index,
            page_number: seg.page_number,
            source_text: seg.text,
            position_data: seg.position_data,
            style_data: seg.style_data,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlyphRun, ParsedPage, ParsedText};

    fn text(raw: &str, x: f32, y: f32) -> ParsedText {
        ParsedText {
            x,
            y,
            w: 6.0,
            runs: vec![GlyphRun {
                text: raw.to_string(),
                style_index: -1,
                text_style: [0.0, 12.0, 0.0, 0.0],
            }],
        }
    }

    fn page(texts: Vec<ParsedText>) -> ParsedPage {
        ParsedPage {
            width: 76.5,
            height: 99.0,
            texts,
        }
    }

    #[test]
    fn test_style_json_shape() {
        let style = Style {
            font_size: 12.0,
            font_weight: FontWeight::Bold,
            font_style: FontStyle::Italic,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            color: DEFAULT_COLOR.to_string(),
            text_align: TextAlign::Left,
            line_height: DEFAULT_LINE_HEIGHT,
        };
        let value = serde_json::to_value(&style).unwrap();
        assert_eq!(value["fontWeight"], "bold");
        assert_eq!(value["fontStyle"], "italic");
        assert_eq!(value["fontFamily"], "Helvetica");
        assert_eq!(value["color"], "#000000");
        assert_eq!(value["textAlign"], "left");
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_emit_two_paragraphs() {
        let doc = ParsedDocument {
            pages: vec![page(vec![
                text("Second%20paragraph.", 5.0, 150.0),
                text("Hello%20world.", 5.0, 100.0),
            ])],
        };
        let segments = emit_segments(&doc, &ExtractionConfig::default()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world.");
        assert_eq!(segments[1].text, "Second paragraph.");

        let position = segments[0].position().unwrap().unwrap();
        assert_eq!(position.x, 5.0);
        assert_eq!(position.y, 100.0);
        assert_eq!(position.height, 50.0);
        let style = segments[1].style().unwrap().unwrap();
        assert_eq!(style.font_size, 12.0);
        assert_eq!(style.text_align, TextAlign::Left);
    }

    #[test]
    fn test_pages_numbered_from_one() {
        let doc = ParsedDocument {
            pages: vec![
                page(vec![text("first", 1.0, 1.0)]),
                page(vec![]),
                page(vec![text("third", 1.0, 1.0)]),
            ],
        };
        let segments = emit_segments(&doc, &ExtractionConfig::default()).unwrap();
        let pages: Vec<u32> = segments.iter().map(|s| s.page_number).collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn test_concatenate_pages_skips_empty() {
        let doc = ParsedDocument {
            pages: vec![
                page(vec![text("%20", 1.0, 1.0)]),
                page(vec![text("b", 9.0, 1.0), text("a", 1.0, 1.0)]),
            ],
        };
        let segments = concatenate_pages(&doc);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].page_number, 2);
        // Emission order, not reading order
        assert_eq!(segments[0].text, "b a");
        assert!(segments[0].position_data.is_none());
        assert!(segments[0].style_data.is_none());
    }

    #[test]
    fn test_plain_segment_has_no_payloads() {
        let seg = ExtractedSegment::plain("x", 1);
        assert_eq!(seg.position().unwrap(), None);
        assert_eq!(seg.style().unwrap(), None);
    }

    #[test]
    fn test_records_indexed_in_order() {
        let records = into_records(
            "doc-1",
            vec![ExtractedSegment::plain("a", 1), ExtractedSegment::plain("b", 2)],
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].segment_index, 0);
        assert_eq!(records[1].segment_index, 1);
        assert_eq!(records[1].source_text, "b");
        assert_ne!(records[0].id, records[1].id);

        let value = serde_json::to_value(&records[0]).unwrap();
        assert!(value["position_data"].is_null());
        assert!(value["style_data"].is_null());
    }
}
