//! Indexed-colour PNG support.
//!
//! The `image` crate expands palettes to RGB(A) on decode and never writes
//! indexed PNGs. To keep palette sources in palette mode we read `PLTE`/`tRNS`
//! with the `png` crate and, on encode, map every pixel back onto the source
//! palette before writing an indexed image.

use image::{DynamicImage, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;

/// PNG colour type byte for palette images (IHDR offset 25).
const COLOR_TYPE_INDEXED: u8 = 3;
const IHDR_COLOR_TYPE_OFFSET: usize = 25;

/// An RGBA palette of at most 256 entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<[u8; 4]>,
}

impl Palette {
    /// Build from explicit RGBA entries; `None` when empty or over 256 entries.
    pub fn new(entries: Vec<[u8; 4]>) -> Option<Self> {
        if entries.is_empty() || entries.len() > 256 {
            return None;
        }
        Some(Self { entries })
    }

    /// Read the palette of an indexed PNG. Any other input yields `None`.
    pub fn from_png(data: &[u8]) -> Option<Self> {
        if data.get(IHDR_COLOR_TYPE_OFFSET) != Some(&COLOR_TYPE_INDEXED) {
            return None;
        }
        let reader = png::Decoder::new(Cursor::new(data)).read_info().ok()?;
        let info = reader.info();
        let plte = info.palette.as_deref()?;
        let trns = info.trns.as_deref().unwrap_or(&[]);

        let entries = plte
            .chunks_exact(3)
            .enumerate()
            .map(|(i, rgb)| [rgb[0], rgb[1], rgb[2], trns.get(i).copied().unwrap_or(255)])
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[[u8; 4]] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry through an image transform (used by filters so an
    /// inverted palette image stays a palette image).
    pub fn map_colors<F>(&self, transform: F) -> Self
    where
        F: FnOnce(DynamicImage) -> DynamicImage,
    {
        let strip = RgbaImage::from_fn(self.entries.len() as u32, 1, |x, _| {
            image::Rgba(self.entries[x as usize])
        });
        let mapped = transform(DynamicImage::ImageRgba8(strip)).to_rgba8();
        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, original)| {
                mapped
                    .get_pixel_checked(i as u32, 0)
                    .map_or(*original, |p| p.0)
            })
            .collect();
        Self { entries }
    }

    /// Index of the closest entry (squared RGBA distance, first wins on ties).
    fn nearest(&self, pixel: [u8; 4]) -> u8 {
        let distance = |entry: &[u8; 4]| -> u32 {
            entry
                .iter()
                .zip(pixel.iter())
                .map(|(&a, &b)| {
                    let d = a as i32 - b as i32;
                    (d * d) as u32
                })
                .sum()
        };
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| distance(entry))
            .map_or(0, |(i, _)| i as u8)
    }

    /// Encode `image` as an 8-bit indexed PNG using this palette.
    pub fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>, png::EncodingError> {
        let rgba = image.to_rgba8();
        let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
        let indices: Vec<u8> = rgba
            .pixels()
            .map(|p| *lookup.entry(p.0).or_insert_with(|| self.nearest(p.0)))
            .collect();

        let plte: Vec<u8> = self.entries.iter().flat_map(|e| [e[0], e[1], e[2]]).collect();
        // tRNS may stop after the last non-opaque entry.
        let trns_len = self
            .entries
            .iter()
            .rposition(|e| e[3] != 255)
            .map_or(0, |i| i + 1);
        let trns: Vec<u8> = self.entries[..trns_len].iter().map(|e| e[3]).collect();

        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, rgba.width(), rgba.height());
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(plte);
            if !trns.is_empty() {
                encoder.set_trns(trns);
            }
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&indices)?;
            writer.finish()?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::indexed_png;

    fn two_color() -> Palette {
        Palette::new(vec![[255, 0, 0, 255], [0, 0, 255, 128]]).unwrap()
    }

    #[test]
    fn rejects_empty_and_oversized_palettes() {
        assert!(Palette::new(Vec::new()).is_none());
        assert!(Palette::new(vec![[0, 0, 0, 255]; 257]).is_none());
        assert_eq!(Palette::new(vec![[0, 0, 0, 255]; 256]).unwrap().len(), 256);
    }

    #[test]
    fn reads_palette_and_transparency_from_png() {
        let data = indexed_png(4, 4, &two_color());
        let palette = Palette::from_png(&data).unwrap();
        assert_eq!(palette, two_color());
    }

    #[test]
    fn non_indexed_png_has_no_palette() {
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(image::RgbImage::new(2, 2))
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        assert!(Palette::from_png(&data).is_none());
        assert!(Palette::from_png(b"not a png").is_none());
    }

    #[test]
    fn nearest_picks_closest_entry() {
        let palette = two_color();
        assert_eq!(palette.nearest([250, 10, 10, 255]), 0);
        assert_eq!(palette.nearest([10, 10, 240, 120]), 1);
    }

    #[test]
    fn encode_writes_indexed_png_with_same_palette() {
        let palette = two_color();
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(3, 2, |x, _| {
            if x == 0 {
                image::Rgba([240, 5, 5, 255])
            } else {
                image::Rgba([0, 0, 250, 130])
            }
        }));
        let encoded = palette.encode_png(&image).unwrap();

        assert_eq!(encoded[IHDR_COLOR_TYPE_OFFSET], COLOR_TYPE_INDEXED);
        assert_eq!(Palette::from_png(&encoded).unwrap(), palette);

        let decoded = image::load_from_memory(&encoded).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(2, 1).0, [0, 0, 255, 128]);
    }

    #[test]
    fn map_colors_transforms_each_entry() {
        let inverted = two_color().map_colors(|mut img| {
            img.invert();
            img
        });
        assert_eq!(inverted.entries(), &[[0, 255, 255, 255], [255, 255, 0, 128]]);
    }
}
