//! Text-run collection from the structural page model

use crate::model::{ParsedPage, ParsedText};
use serde::{Deserialize, Serialize};

/// Font weight of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Font style of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// One decoded, positioned text fragment on a page
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
}

/// Percent-decode a glyph string, keeping the raw string if it is not valid UTF-8
pub fn decode_glyph_text(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => {
            log::debug!("Glyph string is not valid percent-encoded UTF-8: {:?}", raw);
            raw.to_string()
        }
    }
}

/// Decoded text of an item's first glyph run, if it has visible content
pub fn item_text(item: &ParsedText) -> Option<String> {
    let run = item.runs.first()?;
    let text = decode_glyph_text(&run.text);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Collect the text runs of one page, skipping whitespace-only items
///
/// A zero font size is replaced with `default_font_size`.
pub fn collect_runs(page: &ParsedPage, default_font_size: f32) -> Vec<TextRun> {
    page.texts
        .iter()
        .filter_map(|item| {
            let text = item_text(item)?;
            let glyphs = item.runs.first()?;
            let font_size = if glyphs.font_size() > 0.0 {
                glyphs.font_size()
            } else {
                default_font_size
            };

            Some(TextRun {
                text,
                x: item.x,
                y: item.y,
                width: item.w,
                font_size,
                font_weight: if glyphs.is_bold() {
                    FontWeight::Bold
                } else {
                    FontWeight::Normal
                },
                font_style: if glyphs.is_italic() {
                    FontStyle::Italic
                } else {
                    FontStyle::Normal
                },
            })
        })
        .collect()
}
