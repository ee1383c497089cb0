//! bookscan-ocr - Text extraction for scanned book pages
//!
//! An OCR pipeline for scanned or photographed book pages, modern or aged.
//! Pages are conditioned by an adaptive preprocessing stage and handed to an
//! external detect-and-recognize engine; results come back as ordered,
//! confidence-scored text with page and book level statistics.
//!
//! # Features
//!
//! - **Profiles** ([`profile`]) - Per-book-type preprocessing and detection parameters
//! - **Preprocessing** ([`preprocess`]) - Contrast equalization, binarization, denoising
//! - **Deskew** ([`deskew`]) - Detect and correct page tilt
//! - **Border Removal** ([`crop`]) - Crop scans to their page content
//! - **Recognition** ([`recognize`]) - External engine adapter behind a trait
//! - **Pipeline** ([`pipeline`]) - Page and book orchestration with partial-failure tracking
//! - **Reports** ([`report`]) - JSON, plain-text, and summary artifacts
//! - **Configuration** ([`config`]) - Layered TOML configuration
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bookscan_ocr::{
//!     BookType, OcrPipeline, BookOptions, RecognizerConfig, SilentProgress,
//!     SubprocessRecognizer,
//! };
//! use std::path::Path;
//!
//! let recognizer = SubprocessRecognizer::new(RecognizerConfig::default()).unwrap();
//! let pipeline = OcrPipeline::new(recognizer, BookType::Ancient, vec!["es".into()]);
//!
//! let result = pipeline
//!     .process_book(Path::new("./book_images"), &BookOptions::default(), &SilentProgress)
//!     .unwrap();
//! println!(
//!     "{}/{} pages succeeded",
//!     result.book_info.successful_pages, result.book_info.total_pages
//! );
//! ```
//!
//! # Architecture
//!
//! ```text
//! Page Image -> Resize Guard -> Contrast -> Binarize -> Denoise
//!                                   |
//!                           Deskew -> Border Crop
//!                                   |
//!                     Recognition Engine (external process)
//!                                   |
//!                 Reading Order -> Metrics -> Page/Book Results
//! ```

pub mod cli;
pub mod config;
pub mod crop;
pub mod deskew;
pub mod pipeline;
pub mod preprocess;
pub mod profile;
pub mod recognize;
pub mod report;
pub mod result;
pub mod util;

// Re-exports for convenience
pub use cli::{create_page_progress_bar, create_spinner, Cli, Commands, ExitCode, ProcessArgs};
pub use config::{CliOverrides, Config, ConfigError, RunSettings};
pub use pipeline::{
    BookError, BookOptions, OcrPipeline, PageError, PageOptions, ProgressCallback, SilentProgress,
};
pub use profile::{BinarizationMethod, BookProfile, BookType};
pub use recognize::{
    ComputeDevice, Detection, Point, Quad, RecognizerConfig, RecognizerError, SubprocessRecognizer,
    TextRecognizer,
};
pub use result::{
    BookInfo, BookResult, BookStatistics, ImageDimensions, PageMetrics, PageRecord, PageResult,
};
