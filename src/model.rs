//! Structural page model produced by a [`crate::structural::StructuralParser`]
//!
//! Field names follow the page/text-item JSON layout emitted by common
//! PDF-to-JSON converters, so an externally produced model can be loaded with
//! [`ParsedDocument::from_json`]. Glyph strings are percent-encoded.

use crate::PdfError;
use serde::{Deserialize, Serialize};

/// A parsed document: one entry per page, in page order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    #[serde(rename = "Pages", default)]
    pub pages: Vec<ParsedPage>,
}

/// One page of text items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPage {
    #[serde(rename = "Width", default)]
    pub width: f32,
    #[serde(rename = "Height", default)]
    pub height: f32,
    #[serde(rename = "Texts", default)]
    pub texts: Vec<ParsedText>,
}

/// A positioned text item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedText {
    pub x: f32,
    /// Top-down: larger values are further down the page
    pub y: f32,
    #[serde(default)]
    pub w: f32,
    #[serde(rename = "R", default)]
    pub runs: Vec<GlyphRun>,
}

/// A glyph string and its typographic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRun {
    /// Percent-encoded text
    #[serde(rename = "T")]
    pub text: String,
    /// Style index, unused by the segmenter
    #[serde(rename = "S", default)]
    pub style_index: i32,
    /// `[fontFaceId, fontSize, bold, italic]`
    #[serde(rename = "TS", default)]
    pub text_style: [f32; 4],
}

impl GlyphRun {
    pub fn font_face_id(&self) -> f32 {
        self.text_style[0]
    }

    pub fn font_size(&self) -> f32 {
        self.text_style[1]
    }

    pub fn is_bold(&self) -> bool {
        self.text_style[2] != 0.0
    }

    pub fn is_italic(&self) -> bool {
        self.text_style[3] != 0.0
    }
}

impl ParsedDocument {
    /// Load a page model from its JSON form
    pub fn from_json(json: &str) -> Result<Self, PdfError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_collaborator_layout() {
        let json = r#"{
            "Pages": [{
                "Width": 38.25,
                "Height": 49.5,
                "Texts": [
                    {"x": 3.0, "y": 4.5, "w": 10.2, "R": [{"T": "Hello%20world", "S": -1, "TS": [0, 12, 1, 0]}]}
                ]
            }]
        }"#;
        let doc = ParsedDocument::from_json(json).unwrap();
        assert_eq!(doc.page_count(), 1);
        let text = &doc.pages[0].texts[0];
        assert_eq!(text.runs[0].text, "Hello%20world");
        assert_eq!(text.runs[0].font_size(), 12.0);
        assert!(text.runs[0].is_bold());
        assert!(!text.runs[0].is_italic());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ParsedDocument::from_json("not json"),
            Err(PdfError::Json(_))
        ));
    }
}
