//! Result types
//!
//! Value objects describing the outcome of page and book processing. They are
//! owned by the caller once returned; the pipeline keeps no reference to
//! them. All types serialize to the JSON shapes written by the report writer.

use crate::profile::BookType;
use crate::recognize::Detection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Width and height of the source image, before any downscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Aggregate metrics for one processed page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Number of text fragments the engine returned
    pub detection_count: usize,
    /// Arithmetic mean of detection confidences; 0.0 when there are none
    pub average_confidence: f64,
    /// Whitespace-delimited token count of the page text
    pub word_count: usize,
    /// Original image dimensions
    pub image_dimensions: ImageDimensions,
}

/// Outcome of processing a single image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Source image path
    pub image_path: PathBuf,
    /// Concatenated text in reading order
    pub text: String,
    /// Detections sorted top-to-bottom, left-to-right
    pub detections: Vec<Detection>,
    /// Page metrics
    pub metrics: PageMetrics,
    /// Creation timestamp (RFC 3339)
    pub timestamp: String,
}

/// Per-slot outcome inside a book run: each page either succeeded or carries
/// an error record, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRecord {
    Success {
        page_number: usize,
        filename: String,
        text: String,
        metrics: PageMetrics,
    },
    Failed {
        page_number: usize,
        filename: String,
        error: String,
    },
}

impl PageRecord {
    /// 1-based position in the filename-sorted page list
    pub fn page_number(&self) -> usize {
        match self {
            PageRecord::Success { page_number, .. } | PageRecord::Failed { page_number, .. } => {
                *page_number
            }
        }
    }

    /// Source file name
    pub fn filename(&self) -> &str {
        match self {
            PageRecord::Success { filename, .. } | PageRecord::Failed { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PageRecord::Success { .. })
    }
}

/// Book-level run information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookInfo {
    pub total_pages: usize,
    pub successful_pages: usize,
    pub failed_pages: usize,
    /// Run timestamp (RFC 3339)
    pub processing_date: String,
    pub book_type: BookType,
    pub languages: Vec<String>,
}

/// Statistics over the successful pages of a book; zero-valued when no page
/// succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookStatistics {
    pub total_detections: usize,
    pub total_words: usize,
    pub average_words_per_page: f64,
    pub average_confidence: f64,
}

/// Outcome of processing a directory of page images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookResult {
    pub book_info: BookInfo,
    pub statistics: BookStatistics,
    /// Per-page records in filename-sorted page order
    pub pages: Vec<PageRecord>,
    /// Successful pages' text joined with page-break markers
    pub full_text: String,
}
