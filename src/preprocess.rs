//! Image preprocessing module
//!
//! Conditions a raw page scan for recognition: local contrast enhancement,
//! binarization, and denoising. The parameters for each step come from the
//! active [`BookProfile`](crate::profile::BookProfile), so a single code path
//! serves both clean modern prints and degraded older material.
//!
//! Deskew and border cropping are separate steps (see [`crate::deskew`] and
//! [`crate::crop`]); they operate on the output of this module and can be
//! toggled independently by the page pipeline.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookscan_ocr::preprocess;
//! use bookscan_ocr::profile::BookProfile;
//!
//! let img = image::open("page.png").unwrap().to_luma8();
//! let prepared = preprocess::prepare(&img, &BookProfile::ancient());
//! ```

use crate::profile::{BinarizationMethod, BookProfile};
use image::{GrayImage, Luma};

/// Tile grid dimension for local contrast enhancement
const TILE_GRID: u32 = 8;

/// Neighborhood size for adaptive thresholding
const ADAPTIVE_BLOCK_SIZE: u32 = 11;

/// Constant subtracted from the local mean during adaptive thresholding
const ADAPTIVE_OFFSET: f64 = 2.0;

/// Patch radius for non-local-means denoising (7x7 patches)
const NLM_PATCH_RADIUS: i32 = 3;

/// Search window radius for non-local-means denoising (21x21 window)
const NLM_SEARCH_RADIUS: i32 = 10;

/// Prepare a grayscale page image for recognition.
///
/// Steps run in fixed order, each feeding the next:
/// 1. tile-based contrast equalization (clip limit from the profile)
/// 2. binarization (global Otsu or local Gaussian mean, per the profile)
/// 3. non-local-means denoising (strength from the profile)
///
/// Pure function of (image, profile): the same inputs always produce a
/// bit-identical output.
pub fn prepare(gray: &GrayImage, profile: &BookProfile) -> GrayImage {
    let enhanced = equalize_contrast(gray, profile.contrast_enhancement);

    let binary = match profile.binarization_method {
        BinarizationMethod::Otsu => {
            let threshold = otsu_threshold(&enhanced);
            binarize(&enhanced, threshold)
        }
        BinarizationMethod::Adaptive => adaptive_threshold(&enhanced),
    };

    denoise(&binary, profile.denoise_strength)
}

/// Contrast-limited local histogram equalization over a fixed 8x8 tile grid.
///
/// Each tile gets its own clipped-histogram lookup table; pixel values are
/// bilinearly interpolated between the four surrounding tile tables so tile
/// seams stay invisible. The clip limit bounds how much any single intensity
/// can be amplified, which keeps noise in flat paper regions under control.
pub fn equalize_contrast(gray: &GrayImage, clip_limit: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(TILE_GRID).max(1);
    let tile_h = height.div_ceil(TILE_GRID).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    // One lookup table per tile.
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let tile_pixels = ((x1 - x0) * (y1 - y0)) as f64;
            let clip_count = ((clip_limit as f64 * tile_pixels / 256.0) as u32).max(1);

            // Clip the histogram and redistribute the excess uniformly.
            let mut excess = 0u32;
            for bin in histogram.iter_mut() {
                if *bin > clip_count {
                    excess += *bin - clip_count;
                    *bin = clip_count;
                }
            }
            let bonus = excess / 256;
            let mut residual = excess % 256;
            for bin in histogram.iter_mut() {
                *bin += bonus;
                if residual > 0 {
                    *bin += 1;
                    residual -= 1;
                }
            }

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let scale = 255.0 / tile_pixels;
            let mut cumulative = 0u32;
            for (value, bin) in histogram.iter().enumerate() {
                cumulative += *bin;
                lut[value] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let lut_at = |tx: u32, ty: u32, value: u8| -> f64 {
        luts[(ty * tiles_x + tx) as usize][value as usize] as f64
    };

    let mut result = GrayImage::new(width, height);
    for y in 0..height {
        // Position in tile-center coordinates.
        let fy = (y as f64 + 0.5) / tile_h as f64 - 0.5;
        let ty0 = fy.floor().max(0.0) as u32;
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let wy = (fy - fy.floor()).clamp(0.0, 1.0);
        let wy = if fy < 0.0 { 0.0 } else { wy };

        for x in 0..width {
            let fx = (x as f64 + 0.5) / tile_w as f64 - 0.5;
            let tx0 = fx.floor().max(0.0) as u32;
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let wx = (fx - fx.floor()).clamp(0.0, 1.0);
            let wx = if fx < 0.0 { 0.0 } else { wx };

            let value = gray.get_pixel(x, y).0[0];
            let top = lut_at(tx0, ty0, value) * (1.0 - wx) + lut_at(tx1, ty0, value) * wx;
            let bottom = lut_at(tx0, ty1, value) * (1.0 - wx) + lut_at(tx1, ty1, value) * wx;
            let mixed = top * (1.0 - wy) + bottom * wy;

            result.put_pixel(x, y, Luma([mixed.round().clamp(0.0, 255.0) as u8]));
        }
    }

    result
}

/// Compute the global threshold that maximizes inter-class variance between
/// foreground and background intensities (Otsu's method).
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.width() as f64 * gray.height() as f64;
    if total == 0.0 {
        return 0;
    }

    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut background_weight = 0.0f64;
    let mut background_sum = 0.0f64;

    for (threshold, &count) in histogram.iter().enumerate() {
        background_weight += count as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }

        background_sum += threshold as f64 * count as f64;
        let mean_background = background_sum / background_weight;
        let mean_foreground = (weighted_sum - background_sum) / foreground_weight;
        let between_class =
            background_weight * foreground_weight * (mean_background - mean_foreground).powi(2);

        if between_class > best_variance {
            best_variance = between_class;
            best_threshold = threshold as u8;
        }
    }

    best_threshold
}

/// Apply a global threshold: pixels above it become white, the rest black
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = if pixel.0[0] > threshold { 255 } else { 0 };
        binary.put_pixel(x, y, Luma([value]));
    }
    binary
}

/// Local Gaussian-weighted mean thresholding.
///
/// Each pixel is compared against the Gaussian-weighted mean of its 11x11
/// neighborhood minus a small constant. Lighting and stains vary across aged
/// pages, so a per-neighborhood threshold separates ink where a single global
/// threshold fails.
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let kernel = gaussian_kernel(ADAPTIVE_BLOCK_SIZE);
    let radius = (ADAPTIVE_BLOCK_SIZE / 2) as i32;

    // Separable convolution with replicated borders.
    let mut horizontal = vec![0.0f64; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = (x as i32 + k as i32 - radius).clamp(0, width as i32 - 1) as u32;
                sum += gray.get_pixel(sx, y).0[0] as f64 * weight;
            }
            horizontal[(y * width + x) as usize] = sum;
        }
    }

    let mut binary = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut mean = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = (y as i32 + k as i32 - radius).clamp(0, height as i32 - 1) as u32;
                mean += horizontal[(sy * width + x) as usize] * weight;
            }
            let value = if gray.get_pixel(x, y).0[0] as f64 > mean - ADAPTIVE_OFFSET {
                255
            } else {
                0
            };
            binary.put_pixel(x, y, Luma([value]));
        }
    }

    binary
}

/// Normalized 1D Gaussian kernel for a given odd window size
fn gaussian_kernel(size: u32) -> Vec<f64> {
    let sigma = 0.3 * ((size - 1) as f64 * 0.5 - 1.0) + 0.8;
    let radius = (size / 2) as i32;

    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-(i as f64).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();

    let sum: f64 = kernel.iter().sum();
    for weight in kernel.iter_mut() {
        *weight /= sum;
    }
    kernel
}

/// Non-local-means denoising.
///
/// For every pixel, candidate pixels inside a 21x21 search window are weighted
/// by the similarity of their surrounding 7x7 patches; similar patches
/// elsewhere on the page average out paper texture and foxing without eroding
/// glyph edges the way a plain blur would. `strength` is the filtering
/// parameter `h`: larger values smooth more aggressively.
///
/// Patch distances are computed per window offset through an integral image
/// over squared differences, which keeps the cost linear in the number of
/// offsets rather than quadratic in patch size.
pub fn denoise(gray: &GrayImage, strength: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || strength <= 0.0 {
        return gray.clone();
    }

    let w = width as i32;
    let h = height as i32;
    let h2 = (strength as f64) * (strength as f64);

    let sample = |x: i32, y: i32| -> f64 {
        let cx = x.clamp(0, w - 1) as u32;
        let cy = y.clamp(0, h - 1) as u32;
        gray.get_pixel(cx, cy).0[0] as f64
    };

    let mut weights = vec![0.0f64; (width * height) as usize];
    let mut accumulated = vec![0.0f64; (width * height) as usize];
    let mut squared_diff = vec![0.0f64; (width * height) as usize];
    let mut integral = vec![0.0f64; ((width + 1) * (height + 1)) as usize];
    let stride = (width + 1) as usize;

    for dy in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
        for dx in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
            // Squared difference image for this displacement.
            for y in 0..h {
                for x in 0..w {
                    let diff = sample(x, y) - sample(x + dx, y + dy);
                    squared_diff[(y * w + x) as usize] = diff * diff;
                }
            }

            // Integral image, one row/column of zero padding.
            for y in 0..h as usize {
                let mut row_sum = 0.0;
                for x in 0..w as usize {
                    row_sum += squared_diff[y * w as usize + x];
                    integral[(y + 1) * stride + (x + 1)] = integral[y * stride + (x + 1)] + row_sum;
                }
            }

            for y in 0..h {
                for x in 0..w {
                    let x0 = (x - NLM_PATCH_RADIUS).max(0) as usize;
                    let y0 = (y - NLM_PATCH_RADIUS).max(0) as usize;
                    let x1 = ((x + NLM_PATCH_RADIUS + 1).min(w)) as usize;
                    let y1 = ((y + NLM_PATCH_RADIUS + 1).min(h)) as usize;

                    let sum = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                        - integral[y1 * stride + x0]
                        + integral[y0 * stride + x0];
                    let count = ((x1 - x0) * (y1 - y0)) as f64;
                    let distance = sum / count.max(1.0);

                    let weight = (-distance / h2).exp();
                    let idx = (y * w + x) as usize;
                    weights[idx] += weight;
                    accumulated[idx] += weight * sample(x + dx, y + dy);
                }
            }
        }
    }

    let mut result = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let value = if weights[idx] > 0.0 {
                (accumulated[idx] / weights[idx]).round().clamp(0.0, 255.0) as u8
            } else {
                gray.get_pixel(x as u32, y as u32).0[0]
            };
            result.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    result
}
