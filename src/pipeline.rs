//! Processing pipeline
//!
//! Orchestrates page and book processing: decode, resize guard,
//! preprocessing, recognition, reading-order assembly, and metric
//! aggregation. The pipeline owns its recognizer for its whole lifetime and
//! processes pages strictly sequentially; recognition engines are generally
//! not safe to invoke concurrently on one loaded model instance.
//!
//! ## Page steps
//!
//! 1. Decode the image (fail fast on unreadable files)
//! 2. Downscale when the longer side exceeds 2000 px
//! 3. Contrast enhancement, binarization, denoise
//! 4. Deskew, border crop
//! 5. Detect and recognize text
//! 6. Sort detections into reading order and assemble text and metrics
//!
//! ## Book runs
//!
//! Pages are discovered by extension, sorted by filename, and processed in
//! order. A page failure is recorded and the run continues: one unreadable
//! page must not lose the rest of the book.

use crate::crop;
use crate::deskew;
use crate::preprocess;
use crate::profile::{BookProfile, BookType};
use crate::recognize::{Detection, RecognizerError, TextRecognizer};
use crate::report::{self, ReportError};
use crate::result::{
    BookInfo, BookResult, BookStatistics, ImageDimensions, PageMetrics, PageRecord, PageResult,
};
use crate::util;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longer image side above which pages are downscaled before processing
pub const MAX_DIMENSION: u32 = 2000;

/// Default page file extensions (matched case-insensitively)
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

/// Progress callback for pipeline steps
pub trait ProgressCallback: Send + Sync {
    /// Called when a new step starts
    fn on_step_start(&self, step: &str);
    /// Called to report progress within a step
    fn on_step_progress(&self, current: usize, total: usize);
    /// Called when a step completes
    fn on_step_complete(&self, step: &str, message: &str);
    /// Called for debug/verbose messages
    fn on_debug(&self, message: &str);
}

/// No-op progress callback (silent mode)
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {
    fn on_step_start(&self, _step: &str) {}
    fn on_step_progress(&self, _current: usize, _total: usize) {}
    fn on_step_complete(&self, _step: &str, _message: &str) {}
    fn on_debug(&self, _message: &str) {}
}

/// Page processing error
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Recognition failed: {0}")]
    Recognition(#[from] RecognizerError),

    #[error("Failed to save preprocessed image: {0}")]
    Save(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Book processing error
#[derive(Debug, Error)]
pub enum BookError {
    #[error("No page images found in {0}")]
    NoImagesFound(PathBuf),

    #[error("Not a directory: {0}")]
    InvalidInput(PathBuf),

    #[error("Report writing failed: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for a single-page run
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Run the preprocessing chain before recognition
    pub preprocess: bool,
    /// Persist the preprocessed image next to the results
    pub save_preprocessed: bool,
    /// Directory for saved artifacts
    pub output_dir: Option<PathBuf>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            preprocess: true,
            save_preprocessed: false,
            output_dir: None,
        }
    }
}

/// Options for a book run
#[derive(Debug, Clone)]
pub struct BookOptions {
    /// Run the preprocessing chain on each page
    pub preprocess: bool,
    /// Persist preprocessed images
    pub save_preprocessed: bool,
    /// Directory for reports and saved artifacts; reports are written only
    /// when set
    pub output_dir: Option<PathBuf>,
    /// Page file extensions to pick up
    pub extensions: Vec<String>,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self {
            preprocess: true,
            save_preprocessed: false,
            output_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// OCR pipeline for book pages
///
/// Holds the recognizer (expensive to construct) together with the profile
/// selected for the whole run. Results are handed back by value; the pipeline
/// keeps no reference to them.
pub struct OcrPipeline<R: TextRecognizer> {
    recognizer: R,
    book_type: BookType,
    profile: BookProfile,
    languages: Vec<String>,
}

impl<R: TextRecognizer> OcrPipeline<R> {
    /// Create a pipeline for the given book type and language set
    pub fn new(recognizer: R, book_type: BookType, languages: Vec<String>) -> Self {
        let profile = BookProfile::for_type(book_type);
        Self {
            recognizer,
            book_type,
            profile,
            languages,
        }
    }

    /// Active profile
    pub fn profile(&self) -> &BookProfile {
        &self.profile
    }

    /// Selected book type
    pub fn book_type(&self) -> BookType {
        self.book_type
    }

    /// Process a single page image.
    ///
    /// Fails fast when the image cannot be decoded; recognition errors
    /// propagate to the caller. Metrics always report the original image
    /// dimensions, even when the working copy was downscaled.
    pub fn process_page<P: ProgressCallback>(
        &self,
        image_path: &Path,
        options: &PageOptions,
        progress: &P,
    ) -> Result<PageResult, PageError> {
        progress.on_step_start(&format!("Processing {}", display_name(image_path)));

        let decoded = image::open(image_path).map_err(|e| PageError::Decode {
            path: image_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let original_dimensions = ImageDimensions {
            width: decoded.width(),
            height: decoded.height(),
        };

        let working = match util::downscale_to_max(&decoded, MAX_DIMENSION) {
            Some(resized) => {
                progress.on_debug(&format!(
                    "Downscaled to {}x{}",
                    resized.width(),
                    resized.height()
                ));
                resized
            }
            None => decoded,
        };

        let recognition_input = if options.preprocess {
            let prepared = preprocess::prepare(&working.to_luma8(), &self.profile);
            let (straightened, angle) = deskew::deskew(&prepared);
            progress.on_debug(&format!("Deskewed by {:.2} degrees", angle));
            let cropped = crop::crop_to_content(&straightened);

            if options.save_preprocessed {
                if let Some(output_dir) = &options.output_dir {
                    let saved = save_preprocessed(&cropped, image_path, output_dir)?;
                    progress.on_debug(&format!("Saved preprocessed image to {}", saved.display()));
                }
            }

            DynamicImage::ImageLuma8(cropped)
        } else {
            working
        };

        let mut detections = self.recognizer.detect(&recognition_input, &self.profile)?;
        sort_reading_order(&mut detections);

        let text = detections
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let metrics = PageMetrics {
            detection_count: detections.len(),
            average_confidence: average_confidence(&detections),
            word_count: text.split_whitespace().count(),
            image_dimensions: original_dimensions,
        };

        progress.on_step_complete(
            "Page",
            &format!(
                "{} detections, confidence {:.2}",
                metrics.detection_count, metrics.average_confidence
            ),
        );

        Ok(PageResult {
            image_path: image_path.to_path_buf(),
            text,
            detections,
            metrics,
            timestamp: chrono::Local::now().to_rfc3339(),
        })
    }

    /// Process every page image in a directory.
    ///
    /// Pages run sequentially in filename order. Failed pages become error
    /// records inside the result instead of aborting the run; statistics are
    /// computed over successful pages only. When an output directory is set,
    /// the finished result is handed to the report writer.
    pub fn process_book<P: ProgressCallback>(
        &self,
        images_dir: &Path,
        options: &BookOptions,
        progress: &P,
    ) -> Result<BookResult, BookError> {
        if !images_dir.is_dir() {
            return Err(BookError::InvalidInput(images_dir.to_path_buf()));
        }

        let image_files = collect_page_files(images_dir, &options.extensions)?;
        if image_files.is_empty() {
            return Err(BookError::NoImagesFound(images_dir.to_path_buf()));
        }

        let total = image_files.len();
        progress.on_step_start(&format!("Processing book: {} pages", total));

        let page_options = PageOptions {
            preprocess: options.preprocess,
            save_preprocessed: options.save_preprocessed,
            output_dir: options.output_dir.clone(),
        };

        let mut pages = Vec::with_capacity(total);
        let mut full_text = String::new();
        let mut total_detections = 0usize;
        let mut total_words = 0usize;
        let mut confidences = Vec::new();

        for (index, path) in image_files.iter().enumerate() {
            let page_number = index + 1;
            let filename = display_name(path);

            match self.process_page(path, &page_options, progress) {
                Ok(result) => {
                    total_detections += result.metrics.detection_count;
                    total_words += result.metrics.word_count;
                    confidences.push(result.metrics.average_confidence);

                    full_text.push_str(&format!(
                        "\n\n--- PAGE {} ---\n\n{}",
                        page_number, result.text
                    ));
                    pages.push(PageRecord::Success {
                        page_number,
                        filename,
                        text: result.text,
                        metrics: result.metrics,
                    });
                }
                Err(e) => {
                    progress.on_debug(&format!("Page {} failed: {}", page_number, e));
                    pages.push(PageRecord::Failed {
                        page_number,
                        filename,
                        error: e.to_string(),
                    });
                }
            }

            progress.on_step_progress(page_number, total);
        }

        let successful_pages = pages.iter().filter(|p| p.is_success()).count();
        let failed_pages = total - successful_pages;

        let statistics = BookStatistics {
            total_detections,
            total_words,
            average_words_per_page: if successful_pages > 0 {
                total_words as f64 / successful_pages as f64
            } else {
                0.0
            },
            average_confidence: if confidences.is_empty() {
                0.0
            } else {
                confidences.iter().sum::<f64>() / confidences.len() as f64
            },
        };

        let result = BookResult {
            book_info: BookInfo {
                total_pages: total,
                successful_pages,
                failed_pages,
                processing_date: chrono::Local::now().to_rfc3339(),
                book_type: self.book_type,
                languages: self.languages.clone(),
            },
            statistics,
            pages,
            full_text,
        };

        progress.on_step_complete(
            "Book",
            &format!("{}/{} pages succeeded", successful_pages, total),
        );

        if let Some(output_dir) = &options.output_dir {
            report::write_book(&result, output_dir)?;
        }

        Ok(result)
    }
}

/// Stable reading-order sort: top-left corner y first, then x.
///
/// Stability keeps engine order for exact ties, which approximates
/// top-to-bottom, left-to-right reading on a single-column page.
pub fn sort_reading_order(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        let ka = a.region.top_left();
        let kb = b.region.top_left();
        ka.y.partial_cmp(&kb.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ka.x.partial_cmp(&kb.x).unwrap_or(std::cmp::Ordering::Equal))
    });
}

/// Mean detection confidence; exactly 0.0 for an empty set
fn average_confidence(detections: &[Detection]) -> f64 {
    if detections.is_empty() {
        return 0.0;
    }
    detections.iter().map(|d| d.confidence).sum::<f64>() / detections.len() as f64
}

/// Enumerate, deduplicate, and filename-sort the page images of a directory
fn collect_page_files(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && util::has_allowed_extension(path, extensions))
        .collect();

    files.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
    files.dedup();
    Ok(files)
}

/// Save the preprocessed image as `<stem>_preprocessed.<ext>` under the
/// output directory
fn save_preprocessed(
    image: &image::GrayImage,
    source: &Path,
    output_dir: &Path,
) -> Result<PathBuf, PageError> {
    std::fs::create_dir_all(output_dir)?;

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());

    let target = output_dir.join(format!("{}_preprocessed.{}", stem, extension));
    image
        .save(&target)
        .map_err(|e| PageError::Save(e.to_string()))?;
    Ok(target)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognize::{Quad, Result as RecognizerResult};
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Recognizer stub returning canned detections and recording the
    /// dimensions it was handed
    struct StubRecognizer {
        detections: Vec<Detection>,
        seen_dimensions: Mutex<Option<(u32, u32)>>,
    }

    impl StubRecognizer {
        fn with_detections(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                seen_dimensions: Mutex::new(None),
            }
        }

        fn empty() -> Self {
            Self::with_detections(vec![])
        }
    }

    impl TextRecognizer for StubRecognizer {
        fn detect(
            &self,
            image: &DynamicImage,
            _profile: &BookProfile,
        ) -> RecognizerResult<Vec<Detection>> {
            *self.seen_dimensions.lock().unwrap() = Some((image.width(), image.height()));
            Ok(self.detections.clone())
        }
    }

    fn detection(text: &str, confidence: f64, x: f64, y: f64) -> Detection {
        Detection {
            text: text.to_string(),
            confidence,
            region: Quad::from_rect(x, y, 80.0, 20.0),
        }
    }

    fn write_page(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([240, 240, 240]))
            .save(&path)
            .unwrap();
        path
    }

    fn no_preprocess() -> PageOptions {
        PageOptions {
            preprocess: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_reading_order_sorts_by_row_then_column() {
        let mut detections = vec![
            detection("third", 0.9, 10.0, 200.0),
            detection("second", 0.9, 300.0, 50.0),
            detection("first", 0.9, 10.0, 50.0),
        ];

        sort_reading_order(&mut detections);

        let texts: Vec<&str> = detections.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_reading_order_is_stable_on_ties() {
        let mut detections = vec![
            detection("a", 0.9, 40.0, 100.0),
            detection("b", 0.8, 40.0, 100.0),
            detection("c", 0.7, 40.0, 100.0),
        ];

        sort_reading_order(&mut detections);

        let texts: Vec<&str> = detections.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_process_page_assembles_text_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let page = write_page(temp.path(), "page.png", 200, 150);

        let recognizer = StubRecognizer::with_detections(vec![
            detection("mundo", 0.8, 120.0, 10.0),
            detection("hola", 0.9, 10.0, 10.0),
        ]);
        let pipeline = OcrPipeline::new(recognizer, BookType::Modern, vec!["es".to_string()]);

        let result = pipeline
            .process_page(&page, &no_preprocess(), &SilentProgress)
            .unwrap();

        assert_eq!(result.text, "hola mundo");
        assert_eq!(result.metrics.detection_count, 2);
        assert_eq!(result.metrics.word_count, 2);
        assert!((result.metrics.average_confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_process_page_zero_detections_zero_confidence() {
        let temp = tempfile::tempdir().unwrap();
        let page = write_page(temp.path(), "blank.png", 100, 100);

        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Modern,
            vec!["es".to_string()],
        );
        let result = pipeline
            .process_page(&page, &no_preprocess(), &SilentProgress)
            .unwrap();

        assert_eq!(result.metrics.detection_count, 0);
        assert_eq!(result.metrics.average_confidence, 0.0);
        assert_eq!(result.metrics.word_count, 0);
        assert_eq!(result.text, "");
    }

    #[test]
    fn test_process_page_decode_failure() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.jpg");
        std::fs::write(&path, b"this is not an image").unwrap();

        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Modern,
            vec!["es".to_string()],
        );
        let result = pipeline.process_page(&path, &no_preprocess(), &SilentProgress);

        assert!(matches!(result, Err(PageError::Decode { .. })));
    }

    #[test]
    fn test_oversized_page_downscaled_but_metrics_keep_original() {
        let temp = tempfile::tempdir().unwrap();
        let page = write_page(temp.path(), "wide.png", 2500, 1000);

        let recognizer = StubRecognizer::empty();
        let pipeline = OcrPipeline::new(recognizer, BookType::Modern, vec!["es".to_string()]);
        let result = pipeline
            .process_page(&page, &no_preprocess(), &SilentProgress)
            .unwrap();

        assert_eq!(result.metrics.image_dimensions.width, 2500);
        assert_eq!(result.metrics.image_dimensions.height, 1000);

        let seen = pipeline.recognizer.seen_dimensions.lock().unwrap().unwrap();
        assert_eq!(seen, (2000, 800));
    }

    #[test]
    fn test_process_page_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let page = write_page(temp.path(), "page.png", 150, 150);

        let recognizer =
            StubRecognizer::with_detections(vec![detection("texto fijo", 0.75, 5.0, 5.0)]);
        let pipeline = OcrPipeline::new(recognizer, BookType::Modern, vec!["es".to_string()]);

        let first = pipeline
            .process_page(&page, &no_preprocess(), &SilentProgress)
            .unwrap();
        let second = pipeline
            .process_page(&page, &no_preprocess(), &SilentProgress)
            .unwrap();

        assert_eq!(first.text, second.text);
        assert_eq!(
            first.metrics.detection_count,
            second.metrics.detection_count
        );
        assert_eq!(
            first.metrics.average_confidence,
            second.metrics.average_confidence
        );
    }

    #[test]
    fn test_process_book_partial_failure() {
        let temp = tempfile::tempdir().unwrap();
        write_page(temp.path(), "page_1.png", 100, 100);
        std::fs::write(temp.path().join("page_2.png"), b"corrupted bytes").unwrap();
        write_page(temp.path(), "page_3.png", 100, 100);

        let recognizer = StubRecognizer::with_detections(vec![detection("ok", 0.9, 0.0, 0.0)]);
        let pipeline = OcrPipeline::new(recognizer, BookType::Modern, vec!["es".to_string()]);

        let options = BookOptions {
            preprocess: false,
            ..Default::default()
        };
        let result = pipeline
            .process_book(temp.path(), &options, &SilentProgress)
            .unwrap();

        assert_eq!(result.book_info.total_pages, 3);
        assert_eq!(result.book_info.successful_pages, 2);
        assert_eq!(result.book_info.failed_pages, 1);

        assert!(result.pages[0].is_success());
        assert!(!result.pages[1].is_success());
        assert!(result.pages[2].is_success());
        assert_eq!(result.pages[1].page_number(), 2);
        assert_eq!(result.pages[1].filename(), "page_2.png");

        assert!(result.full_text.contains("--- PAGE 1 ---"));
        assert!(!result.full_text.contains("--- PAGE 2 ---"));
        assert!(result.full_text.contains("--- PAGE 3 ---"));
    }

    #[test]
    fn test_process_book_empty_directory() {
        let temp = tempfile::tempdir().unwrap();

        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Modern,
            vec!["es".to_string()],
        );
        let result = pipeline.process_book(temp.path(), &BookOptions::default(), &SilentProgress);

        assert!(matches!(result, Err(BookError::NoImagesFound(_))));
    }

    #[test]
    fn test_process_book_rejects_non_directory() {
        let temp = tempfile::tempdir().unwrap();
        let file = write_page(temp.path(), "single.png", 50, 50);

        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Modern,
            vec!["es".to_string()],
        );
        let result = pipeline.process_book(&file, &BookOptions::default(), &SilentProgress);

        assert!(matches!(result, Err(BookError::InvalidInput(_))));
    }

    #[test]
    fn test_process_book_filename_order_and_extension_filter() {
        let temp = tempfile::tempdir().unwrap();
        write_page(temp.path(), "b_second.png", 60, 60);
        write_page(temp.path(), "a_first.png", 60, 60);
        std::fs::write(temp.path().join("notes.txt"), b"not a page").unwrap();

        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Modern,
            vec!["es".to_string()],
        );
        let options = BookOptions {
            preprocess: false,
            ..Default::default()
        };
        let result = pipeline
            .process_book(temp.path(), &options, &SilentProgress)
            .unwrap();

        assert_eq!(result.book_info.total_pages, 2);
        assert_eq!(result.pages[0].filename(), "a_first.png");
        assert_eq!(result.pages[0].page_number(), 1);
        assert_eq!(result.pages[1].filename(), "b_second.png");
        assert_eq!(result.pages[1].page_number(), 2);
    }

    #[test]
    fn test_process_book_all_failed_zero_statistics() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("bad_1.jpg"), b"garbage").unwrap();
        std::fs::write(temp.path().join("bad_2.jpg"), b"garbage").unwrap();

        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Modern,
            vec!["es".to_string()],
        );
        let options = BookOptions {
            preprocess: false,
            ..Default::default()
        };
        let result = pipeline
            .process_book(temp.path(), &options, &SilentProgress)
            .unwrap();

        assert_eq!(result.book_info.successful_pages, 0);
        assert_eq!(result.book_info.failed_pages, 2);
        assert_eq!(result.statistics.average_words_per_page, 0.0);
        assert_eq!(result.statistics.average_confidence, 0.0);
        assert!(result.full_text.is_empty());
    }

    #[test]
    fn test_save_preprocessed_naming() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("out");
        let page = write_page(temp.path(), "scan_007.jpg", 64, 64);

        let recognizer = StubRecognizer::empty();
        let pipeline = OcrPipeline::new(recognizer, BookType::Modern, vec!["es".to_string()]);
        let options = PageOptions {
            preprocess: true,
            save_preprocessed: true,
            output_dir: Some(output.clone()),
        };

        pipeline
            .process_page(&page, &options, &SilentProgress)
            .unwrap();

        assert!(output.join("scan_007_preprocessed.jpg").exists());
    }

    #[test]
    fn test_pipeline_uses_selected_profile() {
        let pipeline = OcrPipeline::new(
            StubRecognizer::empty(),
            BookType::Ancient,
            vec!["es".to_string()],
        );

        assert_eq!(pipeline.book_type(), BookType::Ancient);
        assert_eq!(pipeline.profile(), &BookProfile::ancient());
    }
}
