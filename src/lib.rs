//! Layout-aware PDF text extraction and segmentation
//!
//! This crate turns uploaded documents into translation units ("segments"):
//! - Structural parsing of PDF content streams into positioned text runs
//! - Geometric grouping of runs into lines and paragraphs with position/style metadata
//! - A layered fallback chain down to raw byte-level text recovery
//! - Blank-line segmentation for plain-text documents

pub mod config;
pub mod extractor;
pub mod fallback;
pub mod layout;
pub mod model;
pub mod plaintext;
pub mod runs;
pub mod segment;
pub mod structural;

pub use config::ExtractionConfig;
pub use extractor::{DocumentKind, ExtractionReport, Extractor, Tier};
pub use model::ParsedDocument;
pub use segment::{into_records, ExtractedSegment, Position, SegmentRecord, Style};
pub use structural::{LopdfParser, StructuralParser};

use std::path::Path;

/// Extract segments from a PDF file with the default configuration
///
/// Returns an empty list when no text can be recovered; only I/O failures are errors.
pub fn extract_segments<P: AsRef<Path>>(path: P) -> Result<Vec<ExtractedSegment>, PdfError> {
    Extractor::default().extract(path)
}

/// Segment a PDF or plain-text file with the default configuration
pub fn segment_file<P: AsRef<Path>>(path: P) -> Result<Vec<ExtractedSegment>, PdfError> {
    Extractor::default().segment_file(path)
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File is {size} bytes, larger than the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF is encrypted")]
    Encrypted,
    #[error("Invalid PDF structure")]
    InvalidStructure,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}
