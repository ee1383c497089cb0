//! Skew detection and correction
//!
//! Scanned pages are rarely perfectly square on the platen. This module
//! estimates the page tilt from the minimum-area bounding rectangle of all
//! foreground pixels and rotates the image about its center to make text
//! lines horizontal.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookscan_ocr::deskew;
//!
//! let binary = image::open("binary_page.png").unwrap().to_luma8();
//! let (corrected, angle) = deskew::deskew(&binary);
//! println!("rotated by {:.2} degrees", angle);
//! ```

use image::{GrayImage, Luma};

/// Cubic interpolation sharpness coefficient
const CUBIC_A: f64 = -0.75;

/// Correct the skew of a (typically binarized) page image.
///
/// Returns the corrected image together with the applied rotation angle in
/// degrees, always normalized into (-45, 45]. A blank image (no foreground
/// pixels) or a degenerate point set yields angle 0.0 and the input unchanged.
pub fn deskew(image: &GrayImage) -> (GrayImage, f64) {
    let angle = detect_skew_angle(image);
    if angle == 0.0 {
        return (image.clone(), 0.0);
    }
    (rotate_about_center(image, angle), angle)
}

/// Estimate the skew angle from the minimum-area bounding rectangle over all
/// foreground pixels.
///
/// The raw rectangle orientation is reduced to [-90, 0) and then reframed so
/// the result always lands in (-45, 45]: angles below -45 become -(90 + a),
/// anything else is negated.
pub fn detect_skew_angle(image: &GrayImage) -> f64 {
    let points: Vec<(f64, f64)> = image
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel.0[0] > 0)
        .map(|(x, y, _)| (x as f64, y as f64))
        .collect();

    if points.is_empty() {
        return 0.0;
    }

    let hull = convex_hull(&points);
    if hull.len() < 3 {
        return 0.0;
    }

    let raw = min_area_rect_angle(&hull);

    // Reduce to the [-90, 0) reporting range of a rotated rectangle, then
    // normalize into (-45, 45].
    let reduced = raw.rem_euclid(90.0) - 90.0;
    if reduced < -45.0 {
        -(90.0 + reduced)
    } else {
        -reduced
    }
}

/// Andrew's monotone chain convex hull
fn convex_hull(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Orientation (degrees) of the minimum-area rectangle enclosing a convex
/// hull, found by rotating calipers over the hull edges
fn min_area_rect_angle(hull: &[(f64, f64)]) -> f64 {
    let mut best_area = f64::INFINITY;
    let mut best_angle = 0.0f64;

    for i in 0..hull.len() {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % hull.len()];
        let edge_len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if edge_len == 0.0 {
            continue;
        }

        let theta = (y1 - y0).atan2(x1 - x0);
        let (sin_t, cos_t) = theta.sin_cos();

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for &(px, py) in hull {
            let rx = px * cos_t + py * sin_t;
            let ry = -px * sin_t + py * cos_t;
            min_x = min_x.min(rx);
            max_x = max_x.max(rx);
            min_y = min_y.min(ry);
            max_y = max_y.max(ry);
        }

        let area = (max_x - min_x) * (max_y - min_y);
        if area < best_area {
            best_area = area;
            best_angle = theta.to_degrees();
        }
    }

    best_angle
}

/// Rotate an image about its center by `angle` degrees, keeping the original
/// dimensions.
///
/// Sampling is bicubic with replicated edges, so no black wedges appear at
/// the borders that a later content crop could mistake for page content.
pub fn rotate_about_center(image: &GrayImage, angle: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let (sin_a, cos_a) = angle.to_radians().sin_cos();

    let mut rotated = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let src_x = cos_a * dx + sin_a * dy + cx;
            let src_y = -sin_a * dx + cos_a * dy + cy;
            rotated.put_pixel(x, y, Luma([sample_bicubic(image, src_x, src_y)]));
        }
    }

    rotated
}

/// Bicubic sample with coordinates clamped to the image bounds
fn sample_bicubic(image: &GrayImage, x: f64, y: f64) -> u8 {
    let (width, height) = image.dimensions();
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let pixel = |px: i64, py: i64| -> f64 {
        let cx = px.clamp(0, width as i64 - 1) as u32;
        let cy = py.clamp(0, height as i64 - 1) as u32;
        image.get_pixel(cx, cy).0[0] as f64
    };

    let mut value = 0.0;
    for j in -1..=2i64 {
        let wy = cubic_weight(fy - j as f64);
        for i in -1..=2i64 {
            let wx = cubic_weight(fx - i as f64);
            value += pixel(x0 + i, y0 + j) * wx * wy;
        }
    }

    value.round().clamp(0.0, 255.0) as u8
}

/// Cubic convolution kernel
fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        (CUBIC_A + 2.0) * t.powi(3) - (CUBIC_A + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        CUBIC_A * t.powi(3) - 5.0 * CUBIC_A * t.powi(2) + 8.0 * CUBIC_A * t - 4.0 * CUBIC_A
    } else {
        0.0
    }
}
