//! Report writing
//!
//! Persists finished results in the agreed formats: a machine-readable JSON
//! record, the concatenated plain text, and a human-readable summary that
//! lists per-page word counts and confidence and enumerates failed pages with
//! their reasons.

use crate::result::{BookResult, PageRecord, PageResult};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the machine-readable record
pub const RESULTS_FILE: &str = "results.json";

/// File name of the concatenated text
pub const FULL_TEXT_FILE: &str = "full_text.txt";

/// File name of the human-readable summary
pub const SUMMARY_FILE: &str = "summary.txt";

const RULE: &str = "============================================================";

/// Report writing error
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Write the full artifact set for a book run
pub fn write_book(result: &BookResult, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let json_path = output_dir.join(RESULTS_FILE);
    std::fs::write(&json_path, serde_json::to_string_pretty(result)?)?;

    let text_path = output_dir.join(FULL_TEXT_FILE);
    std::fs::write(&text_path, &result.full_text)?;

    let summary_path = output_dir.join(SUMMARY_FILE);
    std::fs::write(&summary_path, book_summary(result))?;

    Ok(vec![json_path, text_path, summary_path])
}

/// Write the artifact set for a single-page run
pub fn write_page(result: &PageResult, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let json_path = output_dir.join(RESULTS_FILE);
    std::fs::write(&json_path, serde_json::to_string_pretty(result)?)?;

    let text_path = output_dir.join(FULL_TEXT_FILE);
    std::fs::write(&text_path, &result.text)?;

    Ok(vec![json_path, text_path])
}

/// Render the human-readable book summary
pub fn book_summary(result: &BookResult) -> String {
    let info = &result.book_info;
    let stats = &result.statistics;

    let mut out = String::new();
    out.push_str("OCR PROCESSING SUMMARY\n");
    out.push_str(RULE);
    out.push_str("\n\n");
    out.push_str(&format!("Date: {}\n", info.processing_date));
    out.push_str(&format!("Book type: {}\n", info.book_type.tag()));
    out.push_str(&format!("Languages: {}\n\n", info.languages.join(", ")));
    out.push_str(&format!("Total pages: {}\n", info.total_pages));
    out.push_str(&format!("Successful pages: {}\n", info.successful_pages));
    out.push_str(&format!("Failed pages: {}\n\n", info.failed_pages));
    out.push_str(&format!("Total words: {}\n", stats.total_words));
    out.push_str(&format!(
        "Average words/page: {:.1}\n",
        stats.average_words_per_page
    ));
    out.push_str(&format!(
        "Average confidence: {:.2}%\n\n",
        stats.average_confidence * 100.0
    ));
    out.push_str(RULE);
    out.push_str("\n\nPER-PAGE DETAIL:\n\n");

    for page in &result.pages {
        match page {
            PageRecord::Success {
                page_number,
                metrics,
                ..
            } => {
                out.push_str(&format!(
                    "Page {}: {} words, confidence {:.2}%\n",
                    page_number,
                    metrics.word_count,
                    metrics.average_confidence * 100.0
                ));
            }
            PageRecord::Failed {
                page_number, error, ..
            } => {
                out.push_str(&format!("Page {}: ERROR - {}\n", page_number, error));
            }
        }
    }

    out
}
