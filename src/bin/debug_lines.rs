//! Debug tool: Print lines, y gaps and paragraph breaks per page
//!
//! Usage: debug_lines <pdf_file> [page_number]
//!
//! Runs only the structural parse and geometric grouping, showing each line's
//! y coordinate, gap from the previous line, first-run font size and weight,
//! and whether the gap exceeds the paragraph threshold.

use pdf_segmenter::layout::group_into_lines;
use pdf_segmenter::runs::{collect_runs, FontWeight};
use pdf_segmenter::{ExtractionConfig, LopdfParser, StructuralParser};
use std::env;
use std::fs;
use std::process;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [page_number]", args[0]);
        eprintln!();
        eprintln!("Prints y positions and gaps between consecutive text lines.");
        eprintln!("If page_number is given, only that page is shown.");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let filter_page: Option<usize> = args.get(2).and_then(|s| s.parse().ok());
    let config = ExtractionConfig::from_env();

    let bytes = match fs::read(pdf_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            process::exit(1);
        }
    };

    let doc = match LopdfParser::default().parse(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Structural parse failed: {}", e);
            eprintln!("Extraction would fall back to the byte-level scan.");
            process::exit(1);
        }
    };

    eprintln!(
        "Line tolerance: {:.1}, paragraph gap: {:.1}",
        config.line_tolerance, config.paragraph_gap
    );
    eprintln!();

    for (page_idx, page) in doc.pages.iter().enumerate() {
        let page_number = page_idx + 1;
        if filter_page.is_some_and(|fp| fp != page_number) {
            continue;
        }

        let runs = collect_runs(page, config.default_font_size);
        let run_count = runs.len();
        let lines = group_into_lines(runs, &config);

        println!(
            "===== PAGE {} ({} runs, {} lines) =====",
            page_number,
            run_count,
            lines.len()
        );
        println!(
            "{:>8} {:>8} {:>6} {:>5}  {}",
            "Y", "Gap", "Font", "Bold", "Text (first 80 chars)"
        );
        println!("{}", "-".repeat(110));

        let mut prev_y: Option<f32> = None;
        let mut paragraphs = usize::from(!lines.is_empty());

        for line in &lines {
            let font_size = line.runs.first().map(|r| r.font_size).unwrap_or(0.0);
            let is_bold = line
                .runs
                .first()
                .is_some_and(|r| r.font_weight == FontWeight::Bold);
            let display_text: String = line.text().chars().take(80).collect();

            let (gap_str, marker) = match prev_y {
                Some(py) => {
                    let gap = line.y - py;
                    let is_para = gap > config.paragraph_gap;
                    if is_para {
                        paragraphs += 1;
                    }
                    (
                        format!("{:8.2}", gap),
                        if is_para { " <<PARA>>" } else { "" },
                    )
                }
                None => ("     ---".to_string(), ""),
            };

            println!(
                "{:8.2} {} {:6.1} {:>5}  {}{}",
                line.y,
                gap_str,
                font_size,
                if is_bold { "B" } else { "" },
                display_text,
                marker
            );

            prev_y = Some(line.y);
        }

        println!();
        println!("  Paragraphs on page {}: {}", page_number, paragraphs);
        println!();
    }
}
