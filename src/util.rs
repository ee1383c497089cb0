//! Shared helpers
//!
//! Image downscaling, file-extension filtering, and small filesystem checks
//! used by the pipeline and the CLI.

use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;

/// Check if a directory exists and is writable, creating it if necessary
pub fn ensure_dir_writable<P: AsRef<Path>>(path: P) -> Result<(), String> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| format!("Failed to create directory: {}", e))?;
    }

    let test_file = path.join(".write_test");
    std::fs::write(&test_file, b"test")
        .map_err(|_| format!("Directory not writable: {}", path.display()))?;
    let _ = std::fs::remove_file(test_file);

    Ok(())
}

/// Check whether a file name carries one of the allowed extensions
/// (case-insensitive)
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Downscale an image so its longer side equals `max_dimension`, using
/// area averaging.
///
/// Returns `None` when both dimensions already fit, so callers can keep the
/// original without copying. Area averaging integrates every source pixel
/// covered by a destination pixel, which preserves thin strokes better than
/// point sampling when shrinking scans.
pub fn downscale_to_max(img: &DynamicImage, max_dimension: u32) -> Option<DynamicImage> {
    let (width, height) = (img.width(), img.height());
    if width.max(height) <= max_dimension {
        return None;
    }

    let scale = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);

    let rgb = img.to_rgb8();
    Some(DynamicImage::ImageRgb8(area_resize(
        &rgb, new_width, new_height,
    )))
}

/// Area-average resize of an RGB image
pub fn area_resize(src: &RgbImage, new_width: u32, new_height: u32) -> RgbImage {
    let (width, height) = src.dimensions();
    let x_ratio = width as f64 / new_width as f64;
    let y_ratio = height as f64 / new_height as f64;

    let mut dst = RgbImage::new(new_width, new_height);

    for dy in 0..new_height {
        let y0 = dy as f64 * y_ratio;
        let y1 = (dy + 1) as f64 * y_ratio;
        for dx in 0..new_width {
            let x0 = dx as f64 * x_ratio;
            let x1 = (dx + 1) as f64 * x_ratio;

            let mut acc = [0.0f64; 3];
            let mut total_weight = 0.0f64;

            let sy_start = y0.floor() as u32;
            let sy_end = (y1.ceil() as u32).min(height);
            let sx_start = x0.floor() as u32;
            let sx_end = (x1.ceil() as u32).min(width);

            for sy in sy_start..sy_end {
                let row_weight = (y1.min((sy + 1) as f64) - y0.max(sy as f64)).max(0.0);
                for sx in sx_start..sx_end {
                    let col_weight = (x1.min((sx + 1) as f64) - x0.max(sx as f64)).max(0.0);
                    let weight = row_weight * col_weight;
                    let pixel = src.get_pixel(sx, sy);
                    for c in 0..3 {
                        acc[c] += pixel.0[c] as f64 * weight;
                    }
                    total_weight += weight;
                }
            }

            let mut out = [0u8; 3];
            if total_weight > 0.0 {
                for c in 0..3 {
                    out[c] = (acc[c] / total_weight).round().clamp(0.0, 255.0) as u8;
                }
            }
            dst.put_pixel(dx, dy, Rgb(out));
        }
    }

    dst
}

/// Format an elapsed time in seconds in human-readable form
pub fn format_duration(seconds: f64) -> String {
    if seconds >= 3600.0 {
        let hours = (seconds / 3600.0) as u64;
        let minutes = ((seconds % 3600.0) / 60.0) as u64;
        format!("{}h {}m", hours, minutes)
    } else if seconds >= 60.0 {
        let minutes = (seconds / 60.0) as u64;
        format!("{}m {:.0}s", minutes, seconds % 60.0)
    } else {
        format!("{:.1}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ensure_dir_writable_creates_missing() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("nested").join("dir");

        assert!(ensure_dir_writable(&target).is_ok());
        assert!(target.is_dir());
    }

    #[test]
    fn test_has_allowed_extension() {
        let exts: Vec<String> = ["jpg", "jpeg", "png", "tif", "tiff"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert!(has_allowed_extension(Path::new("page_001.jpg"), &exts));
        assert!(has_allowed_extension(Path::new("page_001.JPG"), &exts));
        assert!(has_allowed_extension(Path::new("scan.TIFF"), &exts));
        assert!(!has_allowed_extension(Path::new("notes.txt"), &exts));
        assert!(!has_allowed_extension(Path::new("no_extension"), &exts));
        assert!(!has_allowed_extension(&PathBuf::from(".hidden"), &exts));
    }

    #[test]
    fn test_downscale_small_image_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(800, 600));
        assert!(downscale_to_max(&img, 2000).is_none());
    }

    #[test]
    fn test_downscale_preserves_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4000, 3000));
        let resized = downscale_to_max(&img, 2000).unwrap();

        assert_eq!(resized.width(), 2000);
        assert_eq!(resized.height(), 1500);
    }

    #[test]
    fn test_downscale_portrait() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1500, 3000));
        let resized = downscale_to_max(&img, 2000).unwrap();

        assert_eq!(resized.height(), 2000);
        assert_eq!(resized.width(), 1000);
    }

    #[test]
    fn test_area_resize_uniform_image_stays_uniform() {
        let src = RgbImage::from_pixel(100, 100, Rgb([120, 60, 200]));
        let dst = area_resize(&src, 33, 33);

        for pixel in dst.pixels() {
            assert_eq!(pixel.0, [120, 60, 200]);
        }
    }

    #[test]
    fn test_area_resize_exact_halving() {
        // Left half black, right half white; each destination pixel covers
        // one uniform 2x2 source block, so no mixing occurs.
        let mut src = RgbImage::new(4, 2);
        for y in 0..2 {
            for x in 0..2 {
                src.put_pixel(x, y, Rgb([0, 0, 0]));
            }
            for x in 2..4 {
                src.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let dst = area_resize(&src, 2, 1);
        assert_eq!(dst.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(dst.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_area_resize_mixes_covered_pixels() {
        // Downscaling 2x1 black+white to 1x1 must average to mid gray.
        let mut src = RgbImage::new(2, 1);
        src.put_pixel(0, 0, Rgb([0, 0, 0]));
        src.put_pixel(1, 0, Rgb([255, 255, 255]));

        let dst = area_resize(&src, 1, 1);
        let value = dst.get_pixel(0, 0).0[0];
        assert!((127..=128).contains(&value));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(12.34), "12.3s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3660.0), "1h 1m");
    }
}
