//! Shared test utilities.
//!
//! Fixture images are built in memory rather than read from disk, so each
//! test states the exact pixels, container, palette or EXIF tag it relies on.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let jpeg = with_exif_orientation(&encode_jpeg(&gradient_rgb(40, 20)), 6);
//! let (storage, engine) = memory_engine();
//! storage.save("photo.jpg", &jpeg).unwrap();
//! ```

use crate::controller::{EngineSettings, RenditionEngine};
use crate::imaging::Palette;
use crate::storage::MemoryStorage;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

// =========================================================================
// Images
// =========================================================================

/// Every pixel unique within 256x256: `[x, y, 128]`.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

pub fn encode_as(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn encode_jpeg(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    image.to_rgb8().write_with_encoder(encoder).unwrap();
    buf
}

/// Palette PNG whose pixel at `(x, y)` uses entry `(x + y) % len`.
pub fn indexed_png(width: u32, height: u32, palette: &Palette) -> Vec<u8> {
    let entries = palette.entries();
    let rgb: Vec<u8> = entries.iter().flat_map(|e| [e[0], e[1], e[2]]).collect();
    let alpha: Vec<u8> = entries.iter().map(|e| e[3]).collect();
    let pixels: Vec<u8> = (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x + y) as usize % entries.len()) as u8))
        .collect();

    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(rgb);
        if alpha.iter().any(|&a| a != 255) {
            encoder.set_trns(alpha);
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    buf
}

// =========================================================================
// EXIF
// =========================================================================

/// Minimal TIFF block: one IFD0 entry, Orientation (0x0112, SHORT).
pub fn tiff_with_orientation(orientation: u16, big_endian: bool) -> Vec<u8> {
    let u16b = |v: u16| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    let u32b = |v: u32| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(if big_endian { b"MM" } else { b"II" });
    tiff.extend_from_slice(&u16b(42));
    tiff.extend_from_slice(&u32b(8));
    tiff.extend_from_slice(&u16b(1));
    tiff.extend_from_slice(&u16b(0x0112));
    tiff.extend_from_slice(&u16b(3));
    tiff.extend_from_slice(&u32b(1));
    tiff.extend_from_slice(&u16b(orientation));
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&u32b(0));
    tiff
}

/// Complete APP1 segment (marker included) carrying `orientation`.
pub fn exif_app1(orientation: u16) -> Vec<u8> {
    let tiff = tiff_with_orientation(orientation, false);
    let length = (2 + 6 + tiff.len()) as u16;
    let mut segment = vec![0xFF, 0xE1];
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(b"Exif\0\0");
    segment.extend_from_slice(&tiff);
    segment
}

/// Insert an EXIF orientation segment right after the SOI marker.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&exif_app1(orientation));
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// RGB PNG with an `eXIf` chunk ahead of the image data.
pub fn png_with_exif_orientation(image: &DynamicImage, orientation: u16) -> Vec<u8> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, rgb.width(), rgb.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_chunk(
                png::chunk::ChunkType(*b"eXIf"),
                &tiff_with_orientation(orientation, false),
            )
            .unwrap();
        writer.write_image_data(rgb.as_raw()).unwrap();
    }
    buf
}

/// Lossless WebP in the extended (`VP8X`) layout with an `EXIF` chunk.
pub fn webp_with_exif_orientation(image: &DynamicImage, orientation: u16) -> Vec<u8> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let simple = encode_as(&rgb, ImageFormat::WebP);
    assert_eq!(&simple[..4], b"RIFF");
    assert_eq!(&simple[8..12], b"WEBP");
    let bitstream = &simple[12..];
    assert!(
        bitstream.starts_with(b"VP8L") || bitstream.starts_with(b"VP8 "),
        "expected a simple-layout WebP"
    );

    let riff_chunk = |fourcc: &[u8; 4], payload: &[u8]| {
        let mut chunk = fourcc.to_vec();
        chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        chunk.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            chunk.push(0);
        }
        chunk
    };

    // Flags: EXIF present. Canvas size is stored minus one, 24-bit little endian.
    let mut header = vec![0x08, 0, 0, 0];
    header.extend_from_slice(&(rgb.width() - 1).to_le_bytes()[..3]);
    header.extend_from_slice(&(rgb.height() - 1).to_le_bytes()[..3]);

    let mut body = b"WEBP".to_vec();
    body.extend_from_slice(&riff_chunk(b"VP8X", &header));
    body.extend_from_slice(bitstream);
    body.extend_from_slice(&riff_chunk(
        b"EXIF",
        &tiff_with_orientation(orientation, false),
    ));

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

// =========================================================================
// Engines
// =========================================================================

/// Real-backend engine over memory storage at `/media/`, create-on-demand on.
pub fn memory_engine() -> (Arc<MemoryStorage>, RenditionEngine) {
    let storage = Arc::new(MemoryStorage::new("/media/"));
    let engine = RenditionEngine::new(storage.clone(), EngineSettings::default());
    (storage, engine)
}
