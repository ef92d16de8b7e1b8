//! Line and paragraph grouping over the text runs of a page
//!
//! Runs are put into reading order (top to bottom, then left to right within
//! a visual row), split into lines on vertical steps and merged into
//! paragraphs while consecutive lines stay within the paragraph gap.

use crate::config::ExtractionConfig;
use crate::runs::{FontStyle, FontWeight, TextRun};

/// A line of text (grouped runs, left to right)
#[derive(Debug, Clone)]
pub struct TextLine {
    pub runs: Vec<TextRun>,
    /// y of the first run
    pub y: f32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Largest `x + width` over the line's runs
    pub fn right_edge(&self) -> f32 {
        self.runs
            .iter()
            .map(|r| r.x + r.width)
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Typographic attributes taken from a paragraph's first run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStyle {
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
}

impl From<&TextRun> for RunStyle {
    fn from(run: &TextRun) -> Self {
        Self {
            font_size: run.font_size,
            font_weight: run.font_weight,
            font_style: run.font_style,
        }
    }
}

/// Approximate paragraph geometry
///
/// `width` and `height` are measured against the line that closed the
/// paragraph: the first line of the next paragraph, or the paragraph's own
/// last line at the end of the page. Height therefore excludes the closing
/// line's own height, and a trailing single-line paragraph has height 0.
///
/// Older uploads stored a fixed 500x20 box for the last paragraph on a page.
/// That placeholder is not reproduced: every box here is measured, so
/// consumers drawing highlights should apply their own minimum height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A paragraph candidate on one page
#[derive(Debug, Clone)]
pub struct Paragraph {
    /// Space-joined, trimmed line texts
    pub text: String,
    pub bounds: BoundingBox,
    pub style: RunStyle,
    pub line_count: usize,
}

/// Sort runs top to bottom, breaking near-ties in y by x
///
/// Runs whose y differs from the preceding run by less than
/// `same_row_tolerance` form one visual row and are ordered left to right,
/// whatever order the content stream emitted them in.
pub fn sort_reading_order(runs: &mut [TextRun], same_row_tolerance: f32) {
    runs.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut start = 0;
    while start < runs.len() {
        let mut end = start + 1;
        while end < runs.len() && (runs[end].y - runs[end - 1].y).abs() < same_row_tolerance {
            end += 1;
        }
        runs[start..end].sort_by(|a, b| a.x.total_cmp(&b.x));
        start = end;
    }
}

/// Group the runs of one page into lines
pub fn group_into_lines(mut runs: Vec<TextRun>, config: &ExtractionConfig) -> Vec<TextLine> {
    sort_reading_order(&mut runs, config.same_row_tolerance);

    let mut lines: Vec<TextLine> = Vec::new();
    let mut last_y: Option<f32> = None;

    for run in runs {
        let starts_line = match last_y {
            Some(prev) => (run.y - prev).abs() > config.line_tolerance,
            None => true,
        };
        last_y = Some(run.y);

        if starts_line || lines.is_empty() {
            lines.push(TextLine {
                y: run.y,
                runs: vec![run],
            });
        } else if let Some(line) = lines.last_mut() {
            line.runs.push(run);
        }
    }

    lines
}

/// Paragraph under construction
struct ParagraphBuilder {
    texts: Vec<String>,
    anchor_x: f32,
    anchor_y: f32,
    style: RunStyle,
    line_count: usize,
}

impl ParagraphBuilder {
    fn start(line: &TextLine, first: &TextRun) -> Self {
        Self {
            texts: Vec::new(),
            anchor_x: first.x,
            anchor_y: line.y,
            style: RunStyle::from(first),
            line_count: 0,
        }
    }

    fn push(&mut self, line: &TextLine) {
        self.texts.push(line.text());
        self.line_count += 1;
    }

    fn finish(self, closing_line: &TextLine) -> Option<Paragraph> {
        let text = self.texts.join(" ").trim().to_string();
        if text.is_empty() {
            return None;
        }

        Some(Paragraph {
            text,
            bounds: BoundingBox {
                x: self.anchor_x,
                y: self.anchor_y,
                width: closing_line.right_edge() - self.anchor_x,
                height: closing_line.y - self.anchor_y,
            },
            style: self.style,
            line_count: self.line_count,
        })
    }
}

/// Merge consecutive lines into paragraphs
///
/// A paragraph closes when the next line sits more than
/// `config.paragraph_gap` below the previous one.
pub fn group_into_paragraphs(lines: &[TextLine], config: &ExtractionConfig) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Option<ParagraphBuilder> = None;

    for (idx, line) in lines.iter().enumerate() {
        let Some(first) = line.runs.first() else {
            continue;
        };
        let prev_y = if idx > 0 { lines[idx - 1].y } else { line.y };
        let y_gap = line.y - prev_y;

        if y_gap > config.paragraph_gap {
            if let Some(builder) = current.take() {
                paragraphs.extend(builder.finish(line));
            }
        }

        current
            .get_or_insert_with(|| ParagraphBuilder::start(line, first))
            .push(line);
    }

    if let (Some(builder), Some(last)) = (current, lines.last()) {
        paragraphs.extend(builder.finish(last));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, x: f32, y: f32) -> TextRun {
        TextRun {
            text: text.to_string(),
            x,
            y,
            width: text.len() as f32 * 0.5,
            font_size: 12.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
        }
    }

    #[test]
    fn test_same_row_ordered_by_x() {
        let config = ExtractionConfig::default();
        let runs = vec![run("world", 10.0, 5.2), run("Hello", 2.0, 5.0)];
        let lines = group_into_lines(runs, &config);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "Hello world");
        assert_eq!(lines[0].y, 5.0);
    }

    #[test]
    fn test_line_break_on_vertical_step() {
        let config = ExtractionConfig::default();
        let runs = vec![
            run("third", 2.0, 8.0),
            run("first", 2.0, 5.0),
            run("second", 2.0, 6.5),
        ];
        let lines = group_into_lines(runs, &config);
        let texts: Vec<String> = lines.iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_step_within_tolerance_stays_on_line() {
        let config = ExtractionConfig::default();
        // 0.8 apart: beyond the row tie-break but within the line tolerance
        let runs = vec![run("b", 1.0, 5.8), run("a", 9.0, 5.0)];
        let lines = group_into_lines(runs, &config);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "a b");
    }

    #[test]
    fn test_single_stray_run() {
        let lines = group_into_lines(vec![run("alone", 3.0, 3.0)], &ExtractionConfig::default());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].runs.len(), 1);
    }

    #[test]
    fn test_paragraph_gap_threshold() {
        let config = ExtractionConfig::default();
        let lines = group_into_lines(
            vec![
                run("one", 2.0, 10.0),
                run("two", 2.0, 12.0),
                run("three", 2.0, 14.5),
            ],
            &config,
        );
        let paragraphs = group_into_paragraphs(&lines, &config);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text, "one two");
        assert_eq!(paragraphs[0].line_count, 2);
        assert_eq!(paragraphs[1].text, "three");
    }

    #[test]
    fn test_bounding_box_uses_closing_line() {
        let config = ExtractionConfig::default();
        let mut wide = run("next", 4.0, 20.0);
        wide.width = 30.0;
        let lines = group_into_lines(
            vec![run("top", 2.0, 10.0), run("more", 2.0, 11.5), wide],
            &config,
        );
        let paragraphs = group_into_paragraphs(&lines, &config);
        assert_eq!(paragraphs.len(), 2);

        let first = paragraphs[0].bounds;
        assert_eq!(first.x, 2.0);
        assert_eq!(first.y, 10.0);
        assert_eq!(first.width, 32.0);
        assert_eq!(first.height, 10.0);

        let last = paragraphs[1].bounds;
        assert_eq!(last.height, 0.0);
        assert_eq!(last.width, 30.0);
    }

    #[test]
    fn test_style_from_anchor_run() {
        let config = ExtractionConfig::default();
        let mut heading = run("Heading", 2.0, 10.0);
        heading.font_size = 18.0;
        heading.font_weight = FontWeight::Bold;
        let lines = group_into_lines(vec![heading, run("body", 2.0, 11.0)], &config);
        let paragraphs = group_into_paragraphs(&lines, &config);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].style.font_size, 18.0);
        assert_eq!(paragraphs[0].style.font_weight, FontWeight::Bold);
    }

    #[test]
    fn test_no_lines_no_paragraphs() {
        assert!(group_into_paragraphs(&[], &ExtractionConfig::default()).is_empty());
    }
}
