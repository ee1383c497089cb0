//! Book-type profiles
//!
//! A profile bundles the preprocessing and recognition tuning parameters for
//! one category of source material. Two built-in variants exist: `modern`
//! (recent print, light correction) and `ancient` (degraded paper, stronger
//! contrast and denoising, lower detection thresholds to catch faint ink).
//!
//! # Example
//!
//! ```rust
//! use bookscan_ocr::profile::{BookProfile, BookType, BinarizationMethod};
//!
//! let profile = BookProfile::for_type(BookType::Ancient);
//! assert!(matches!(profile.binarization_method, BinarizationMethod::Adaptive));
//! ```

use serde::{Deserialize, Serialize};

/// Source material category selecting a preprocessing profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    /// Recent print in good condition
    #[default]
    Modern,
    /// Aged or deteriorated material (stains, yellowed paper, faint ink)
    Ancient,
}

impl BookType {
    /// Resolve a user-supplied tag to a book type.
    ///
    /// Unrecognized tags fall back to `Modern`. This mirrors the historical
    /// behavior of the pipeline and is intentional: a misspelled tag degrades
    /// to the lighter correction path instead of failing the run.
    pub fn resolve(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "ancient" => BookType::Ancient,
            _ => BookType::Modern,
        }
    }

    /// Tag string used in reports and configuration files
    pub fn tag(&self) -> &'static str {
        match self {
            BookType::Modern => "modern",
            BookType::Ancient => "ancient",
        }
    }
}

/// Binarization strategy applied during preprocessing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinarizationMethod {
    /// Single global threshold chosen by Otsu's method
    #[default]
    Otsu,
    /// Per-neighborhood Gaussian-weighted mean threshold; handles uneven
    /// lighting and stains that defeat a global threshold
    Adaptive,
}

/// Tuning parameters for one book type
///
/// Immutable once constructed; selected at pipeline construction and applied
/// to every page the pipeline processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookProfile {
    /// CLAHE clip limit
    pub contrast_enhancement: f32,
    /// Non-local-means filtering strength
    pub denoise_strength: f32,
    /// Binarization strategy
    pub binarization_method: BinarizationMethod,
    /// Minimum text size forwarded to the recognition engine (pixels)
    pub min_text_size: u32,
    /// Text detection threshold forwarded to the recognition engine
    pub text_threshold: f64,
    /// Low-text bound forwarded to the recognition engine
    pub low_text: f64,
}

impl Default for BookProfile {
    fn default() -> Self {
        Self::modern()
    }
}

impl BookProfile {
    /// Profile for recent print in good condition
    pub fn modern() -> Self {
        Self {
            contrast_enhancement: 1.2,
            denoise_strength: 10.0,
            binarization_method: BinarizationMethod::Otsu,
            min_text_size: 10,
            text_threshold: 0.7,
            low_text: 0.4,
        }
    }

    /// Profile for aged or deteriorated material
    pub fn ancient() -> Self {
        Self {
            contrast_enhancement: 2.0,
            denoise_strength: 15.0,
            binarization_method: BinarizationMethod::Adaptive,
            min_text_size: 8,
            text_threshold: 0.6,
            low_text: 0.3,
        }
    }

    /// Profile for a given book type
    pub fn for_type(book_type: BookType) -> Self {
        match book_type {
            BookType::Modern => Self::modern(),
            BookType::Ancient => Self::ancient(),
        }
    }

    /// Profile for a user-supplied tag, falling back to `modern` for
    /// unrecognized tags
    pub fn for_tag(tag: &str) -> Self {
        Self::for_type(BookType::resolve(tag))
    }
}
