//! CLI tool for splitting a document into translation segments

use pdf_segmenter::{into_records, DocumentKind, ExtractionConfig, Extractor, Tier};
use std::env;
use std::path::Path;
use std::process;
use std::time::Instant;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <file> [--json]", args[0]);
        eprintln!();
        eprintln!("Splits a PDF or text file into translation segments.");
        eprintln!("With --json, prints the segment rows as they would be stored.");
        process::exit(1);
    }

    let path = Path::new(&args[1]);
    let json_output = args.get(2).map(|a| a == "--json").unwrap_or(false);

    let extractor = Extractor::new(ExtractionConfig::from_env());
    let start = Instant::now();

    let result = match DocumentKind::from_path(path) {
        DocumentKind::Pdf => extractor
            .extract_with_report(path)
            .map(|report| (report.segments, Some(report.tier))),
        _ => extractor.segment_file(path).map(|segments| (segments, None)),
    };

    let (segments, tier) = match result {
        Ok(found) => found,
        Err(e) => {
            if json_output {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            process::exit(1);
        }
    };
    let elapsed = start.elapsed();

    if json_output {
        let document_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let output = serde_json::json!({
            "tier": tier.map(|t| t.as_str()),
            "processing_time_ms": elapsed.as_millis() as u64,
            "segments": into_records(&document_id, segments),
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Document Segmentation");
    println!("=====================");
    println!("File: {}", path.display());
    if let Some(tier) = tier {
        println!("Tier: {}", tier);
        if tier != Tier::GeometricGrouping {
            println!("Note: layout grouping failed, segments carry no position data.");
        }
    }
    println!("Segments: {}", segments.len());
    println!("Processing time: {}ms", elapsed.as_millis());
    println!();

    for (idx, segment) in segments.iter().enumerate() {
        let preview: String = segment.text.chars().take(100).collect();
        println!("[{:>4}] p{:<3} {}", idx, segment.page_number, preview);
    }
}
