//! Document extraction with a layered fallback chain
//!
//! The [`Extractor`] walks an explicit sequence of tiers, from structural
//! parsing with geometric grouping down to splitting raw recovered text. Each
//! tier either yields segments or hands over to the next one; reaching
//! [`Tier::Empty`] is a normal outcome, not an error.

use crate::config::ExtractionConfig;
use crate::fallback;
use crate::model::ParsedDocument;
use crate::plaintext;
use crate::segment::{concatenate_pages, emit_segments, ExtractedSegment};
use crate::structural::{parse_with_deadline, LopdfParser, ParseOutcome, StructuralParser};
use crate::PdfError;
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Stages of the extraction chain, from highest to lowest fidelity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    StructuralParse,
    GeometricGrouping,
    PageConcatenation,
    ByteLevelScan,
    ParagraphSplit,
    SentenceSplit,
    WholeBlob,
    Empty,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::StructuralParse => "structural_parse",
            Tier::GeometricGrouping => "geometric_grouping",
            Tier::PageConcatenation => "page_concatenation",
            Tier::ByteLevelScan => "byte_level_scan",
            Tier::ParagraphSplit => "paragraph_split",
            Tier::SentenceSplit => "sentence_split",
            Tier::WholeBlob => "whole_blob",
            Tier::Empty => "empty",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segments plus the tier that produced them
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub segments: Vec<ExtractedSegment>,
    pub tier: Tier,
}

/// A tier together with the data it works on
enum Stage {
    StructuralParse,
    GeometricGrouping(ParsedDocument),
    PageConcatenation(ParsedDocument),
    ByteLevelScan,
    ParagraphSplit(String),
    SentenceSplit(String),
    WholeBlob(String),
}

impl Stage {
    fn tier(&self) -> Tier {
        match self {
            Stage::StructuralParse => Tier::StructuralParse,
            Stage::GeometricGrouping(_) => Tier::GeometricGrouping,
            Stage::PageConcatenation(_) => Tier::PageConcatenation,
            Stage::ByteLevelScan => Tier::ByteLevelScan,
            Stage::ParagraphSplit(_) => Tier::ParagraphSplit,
            Stage::SentenceSplit(_) => Tier::SentenceSplit,
            Stage::WholeBlob(_) => Tier::WholeBlob,
        }
    }
}

enum Step {
    Next(Stage),
    Done(Vec<ExtractedSegment>),
    Exhausted,
}

/// Kind of uploaded document, decided by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    /// `.pdf` and `.docx` are recognised; anything else is treated as text
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        match ext.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            _ => DocumentKind::Text,
        }
    }
}

/// Extraction component; construct once and share across calls
pub struct Extractor {
    parser: Arc<dyn StructuralParser>,
    config: ExtractionConfig,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

impl Extractor {
    /// Extractor backed by the lopdf structural parser
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_parser(Arc::new(LopdfParser::default()), config)
    }

    pub fn with_parser(parser: Arc<dyn StructuralParser>, config: ExtractionConfig) -> Self {
        Self { parser, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract segments from a PDF on disk
    ///
    /// Only I/O problems (including an oversized file) are errors; every
    /// parsing failure is absorbed by the fallback chain.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ExtractedSegment>, PdfError> {
        Ok(self.extract_with_report(path)?.segments)
    }

    /// Like [`Extractor::extract`], also reporting the tier that produced the result
    pub fn extract_with_report<P: AsRef<Path>>(&self, path: P) -> Result<ExtractionReport, PdfError> {
        let path = path.as_ref();
        log::info!("Extracting PDF content from: {}", path.display());
        let bytes = self.read_file(path)?;
        Ok(self.extract_mem(bytes))
    }

    /// Extract segments from an in-memory PDF
    pub fn extract_mem(&self, bytes: Vec<u8>) -> ExtractionReport {
        let bytes: Arc<[u8]> = Arc::from(bytes);
        self.run_chain(Stage::StructuralParse, &bytes)
    }

    /// Segment an already parsed page model
    ///
    /// No raw bytes are available, so the chain ends after page concatenation.
    pub fn extract_from_model(&self, doc: ParsedDocument) -> ExtractionReport {
        let no_bytes: Arc<[u8]> = Arc::from(Vec::new());
        self.run_chain(Stage::GeometricGrouping(doc), &no_bytes)
    }

    /// Segment any supported upload, choosing the strategy by extension
    pub fn segment_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ExtractedSegment>, PdfError> {
        let path = path.as_ref();
        match DocumentKind::from_path(path) {
            DocumentKind::Pdf => self.extract(path),
            DocumentKind::Text => {
                let bytes = self.read_file(path)?;
                let segments = plaintext::segment_text(&String::from_utf8_lossy(&bytes));
                log::info!(
                    "Split {} into {} text segments",
                    path.display(),
                    segments.len()
                );
                Ok(segments)
            }
            DocumentKind::Docx => {
                log::warn!("DOCX extraction is not supported: {}", path.display());
                Ok(Vec::new())
            }
        }
    }

    /// Segment several documents in parallel; results keep input order
    ///
    /// Documents run on a dedicated pool. Each worker blocks on its parse
    /// deadline, and lopdf schedules its own parallel work on the global
    /// pool, so sharing that pool would starve the parses.
    pub fn extract_many<P>(&self, paths: &[P]) -> Vec<Result<Vec<ExtractedSegment>, PdfError>>
    where
        P: AsRef<Path> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("segment-batch-{}", i))
            .build();
        match pool {
            Ok(pool) => pool.install(|| paths.par_iter().map(|p| self.segment_file(p)).collect()),
            Err(e) => {
                log::warn!("Failed to start batch pool, extracting sequentially: {}", e);
                paths.iter().map(|p| self.segment_file(p)).collect()
            }
        }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, PdfError> {
        let size = fs::metadata(path)?.len();
        if size > self.config.max_file_size {
            return Err(PdfError::FileTooLarge {
                size,
                limit: self.config.max_file_size,
            });
        }
        Ok(fs::read(path)?)
    }

    fn run_chain(&self, start: Stage, bytes: &Arc<[u8]>) -> ExtractionReport {
        let mut stage = start;
        loop {
            let tier = stage.tier();
            match self.step(stage, bytes) {
                Step::Next(next) => {
                    log::debug!("Tier {} yielded nothing, moving to {}", tier, next.tier());
                    stage = next;
                }
                Step::Done(segments) => {
                    log::info!("Extracted {} segments via {}", segments.len(), tier);
                    return ExtractionReport { segments, tier };
                }
                Step::Exhausted => {
                    log::warn!("No text found in PDF, extraction chain exhausted");
                    return ExtractionReport {
                        segments: Vec::new(),
                        tier: Tier::Empty,
                    };
                }
            }
        }
    }

    fn step(&self, stage: Stage, bytes: &Arc<[u8]>) -> Step {
        match stage {
            Stage::StructuralParse => {
                match parse_with_deadline(
                    Arc::clone(&self.parser),
                    Arc::clone(bytes),
                    self.config.parse_timeout,
                ) {
                    ParseOutcome::Ready(doc) => {
                        log::info!("PDF parsed, pages: {}", doc.page_count());
                        Step::Next(Stage::GeometricGrouping(doc))
                    }
                    ParseOutcome::Failed(msg) => {
                        log::error!("PDF parsing error: {}", msg);
                        Step::Next(Stage::ByteLevelScan)
                    }
                    ParseOutcome::TimedOut(limit) => {
                        log::error!("PDF parsing timed out after {:?}", limit);
                        Step::Next(Stage::ByteLevelScan)
                    }
                }
            }
            Stage::GeometricGrouping(doc) => match emit_segments(&doc, &self.config) {
                Ok(segments) if !segments.is_empty() => Step::Done(segments),
                Ok(_) => {
                    log::warn!("No paragraphs found, concatenating page text");
                    Step::Next(Stage::PageConcatenation(doc))
                }
                Err(e) => {
                    log::error!("Error extracting segments: {}", e);
                    Step::Next(Stage::ByteLevelScan)
                }
            },
            Stage::PageConcatenation(doc) => {
                let segments = concatenate_pages(&doc);
                if segments.is_empty() {
                    log::warn!("No segments extracted, trying fallback method");
                    Step::Next(Stage::ByteLevelScan)
                } else {
                    Step::Done(segments)
                }
            }
            Stage::ByteLevelScan => {
                log::info!("Using fallback text extraction method");
                let text = fallback::scan_streams(bytes);
                if text.trim().is_empty() {
                    Step::Exhausted
                } else if fallback::has_paragraph_break(&text) {
                    Step::Next(Stage::ParagraphSplit(text))
                } else {
                    Step::Next(Stage::SentenceSplit(text))
                }
            }
            Stage::ParagraphSplit(text) => {
                let segments = fallback::split_paragraphs(&text);
                if segments.is_empty() {
                    Step::Next(Stage::SentenceSplit(text))
                } else {
                    Step::Done(segments)
                }
            }
            Stage::SentenceSplit(text) => {
                let segments = fallback::split_sentences(&text);
                if segments.is_empty() {
                    Step::Next(Stage::WholeBlob(text))
                } else {
                    Step::Done(segments)
                }
            }
            Stage::WholeBlob(text) => {
                let segments = fallback::whole_blob(&text);
                if segments.is_empty() {
                    Step::Exhausted
                } else {
                    Step::Done(segments)
                }
            }
        }
    }
}
