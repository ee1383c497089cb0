//! Preprocessing benchmarks

use bookscan_ocr::profile::BookProfile;
use bookscan_ocr::{crop, deskew, preprocess};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};

/// Synthetic page: light paper with dark text-like rows
fn synthetic_page(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([225]));
    for row in (20..height.saturating_sub(20)).step_by(18) {
        for y in row..(row + 8).min(height) {
            for x in 15..width.saturating_sub(15) {
                if (x / 12) % 3 != 0 {
                    img.put_pixel(x, y, Luma([35]));
                }
            }
        }
    }
    img
}

fn bench_prepare(c: &mut Criterion) {
    let page = synthetic_page(320, 240);
    let modern = BookProfile::modern();
    let ancient = BookProfile::ancient();

    c.bench_function("prepare_modern_320x240", |b| {
        b.iter(|| preprocess::prepare(black_box(&page), black_box(&modern)))
    });

    c.bench_function("prepare_ancient_320x240", |b| {
        b.iter(|| preprocess::prepare(black_box(&page), black_box(&ancient)))
    });
}

fn bench_deskew(c: &mut Criterion) {
    let page = synthetic_page(320, 240);
    let binary = preprocess::prepare(&page, &BookProfile::modern());

    c.bench_function("deskew_320x240", |b| {
        b.iter(|| deskew::deskew(black_box(&binary)))
    });
}

fn bench_crop(c: &mut Criterion) {
    let page = synthetic_page(320, 240);
    let binary = preprocess::prepare(&page, &BookProfile::modern());

    c.bench_function("crop_to_content_320x240", |b| {
        b.iter(|| crop::crop_to_content(black_box(&binary)))
    });
}

criterion_group!(benches, bench_prepare, bench_deskew, bench_crop);
criterion_main!(benches);
