use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bgremove_api::{
    config::{OutputFormat, ValidationLimits},
    services::{ImageValidator, ResponseEncoder},
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

const SIZES: [u32; 3] = [256, 512, 1024];

/// Opaque disc on a transparent background, like a typical cut-out
fn cutout(size: u32) -> DynamicImage {
    let center = size as f32 / 2.0;
    let radius = size as f32 / 3.0;
    let image = RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if dx * dx + dy * dy < radius * radius {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    DynamicImage::ImageRgba8(image)
}

fn benchmark_response_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_encoding");

    for size in SIZES {
        let image = cutout(size);
        for format in [OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::WebP] {
            group.bench_with_input(
                BenchmarkId::new(format.extension(), size),
                &image,
                |b, image| {
                    b.iter(|| ResponseEncoder::encode(black_box(image), format, false).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn benchmark_data_url(c: &mut Criterion) {
    let bytes = ResponseEncoder::encode_bytes(&cutout(512), OutputFormat::Png).unwrap();
    c.bench_function("data_url_512_png", |b| {
        b.iter(|| ResponseEncoder::to_data_url(black_box(&bytes), OutputFormat::Png));
    });
}

fn benchmark_validation(c: &mut Criterion) {
    let validator = ImageValidator::new(ValidationLimits::default());
    let mut group = c.benchmark_group("validation");

    for size in SIZES {
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(cutout(size).to_rgb8())
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .unwrap();
        let jpeg = jpeg.into_inner();

        group.bench_with_input(BenchmarkId::new("jpeg", size), &jpeg, |b, bytes| {
            b.iter(|| validator.validate(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    encoding_benches,
    benchmark_response_encoding,
    benchmark_data_url,
    benchmark_validation
);
criterion_main!(encoding_benches);
