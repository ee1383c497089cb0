//! Border removal
//!
//! Flatbed scans of bound books often carry dark bands where the scanner lid
//! did not cover the page. Cropping to the largest connected foreground
//! region (the page surface on a binarized scan) removes those bands before
//! recognition.

use image::GrayImage;

/// Safety margin kept around the detected content box, in pixels
const CROP_MARGIN: u32 = 10;

/// Crop an image to its largest connected foreground region.
///
/// Foreground pixels are those with a value above zero. The bounding box of
/// the largest 8-connected component is expanded by a 10-pixel margin
/// (clipped to the image bounds) and the image is cropped to it. When no
/// foreground exists the input is returned unchanged; the result is never
/// larger than the input and never empty for a non-empty input.
pub fn crop_to_content(image: &GrayImage) -> GrayImage {
    match largest_component_bounds(image) {
        Some((x0, y0, x1, y1)) => {
            let x = x0.saturating_sub(CROP_MARGIN);
            let y = y0.saturating_sub(CROP_MARGIN);
            let right = (x1 + 1 + CROP_MARGIN).min(image.width());
            let bottom = (y1 + 1 + CROP_MARGIN).min(image.height());

            image::imageops::crop_imm(image, x, y, right - x, bottom - y).to_image()
        }
        None => image.clone(),
    }
}

/// Bounding box (inclusive) of the largest 8-connected foreground component,
/// or `None` when the image has no foreground pixels
fn largest_component_bounds(image: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut visited = vec![false; (width * height) as usize];
    let index = |x: u32, y: u32| (y * width + x) as usize;

    let mut best: Option<(u64, (u32, u32, u32, u32))> = None;
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for start_y in 0..height {
        for start_x in 0..width {
            if visited[index(start_x, start_y)] || image.get_pixel(start_x, start_y).0[0] == 0 {
                continue;
            }

            let mut area = 0u64;
            let (mut min_x, mut min_y, mut max_x, mut max_y) =
                (start_x, start_y, start_x, start_y);

            visited[index(start_x, start_y)] = true;
            stack.push((start_x, start_y));

            while let Some((x, y)) = stack.pop() {
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        if !visited[index(nx, ny)] && image.get_pixel(nx, ny).0[0] > 0 {
                            visited[index(nx, ny)] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            let candidate = (area, (min_x, min_y, max_x, max_y));
            if best.map(|(best_area, _)| area > best_area).unwrap_or(true) {
                best = Some(candidate);
            }
        }
    }

    best.map(|(_, bounds)| bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn image_with_block(
        width: u32,
        height: u32,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
    ) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in y0..=y1 {
            for x in x0..=x1 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
        img
    }

    #[test]
    fn test_blank_image_unchanged() {
        let img = GrayImage::new(80, 80);
        let cropped = crop_to_content(&img);
        assert_eq!(cropped, img);
    }

    #[test]
    fn test_crop_keeps_margin_around_content() {
        let img = image_with_block(100, 100, 30, 40, 60, 70);
        let cropped = crop_to_content(&img);

        // Content 31x31 plus a 10px margin on each side.
        assert_eq!(cropped.dimensions(), (51, 51));
    }

    #[test]
    fn test_margin_clipped_at_image_edge() {
        let img = image_with_block(50, 50, 0, 0, 20, 20);
        let cropped = crop_to_content(&img);

        assert_eq!(cropped.dimensions(), (31, 31));
    }

    #[test]
    fn test_never_enlarges() {
        let img = image_with_block(40, 40, 5, 5, 35, 35);
        let cropped = crop_to_content(&img);

        assert!(cropped.width() <= 40);
        assert!(cropped.height() <= 40);
    }

    #[test]
    fn test_single_foreground_pixel_nonzero_result() {
        let mut img = GrayImage::new(60, 60);
        img.put_pixel(30, 30, Luma([255]));

        let cropped = crop_to_content(&img);
        assert!(cropped.width() > 0 && cropped.height() > 0);
        assert_eq!(cropped.dimensions(), (21, 21));
    }

    #[test]
    fn test_selects_largest_component() {
        let mut img = image_with_block(120, 120, 40, 40, 90, 90);
        // Small distant speckle must not win.
        img.put_pixel(2, 2, Luma([255]));

        let cropped = crop_to_content(&img);
        assert_eq!(cropped.dimensions(), (71, 71));
    }

    #[test]
    fn test_diagonal_pixels_form_one_component() {
        let mut img = GrayImage::new(40, 40);
        for i in 10..20u32 {
            img.put_pixel(i, i, Luma([255]));
        }

        let bounds = largest_component_bounds(&img).unwrap();
        assert_eq!(bounds, (10, 10, 19, 19));
    }

    #[test]
    fn test_full_foreground_is_identity() {
        let img = GrayImage::from_pixel(30, 30, Luma([255]));
        let cropped = crop_to_content(&img);
        assert_eq!(cropped.dimensions(), (30, 30));
    }

    #[test]
    fn test_tie_keeps_first_component() {
        // Two equal-sized components; scan order makes the first one win,
        // keeping the result deterministic.
        let mut img = GrayImage::new(100, 40);
        for y in 10..20u32 {
            for x in 10..20u32 {
                img.put_pixel(x, y, Luma([255]));
            }
            for x in 70..80u32 {
                img.put_pixel(x, y, Luma([255]));
            }
        }

        let bounds = largest_component_bounds(&img).unwrap();
        assert_eq!(bounds, (10, 10, 19, 19));
    }
}
