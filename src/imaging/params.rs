//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which rendition to produce) and the [`backend`](super::backend)
//! (which does the actual pixel work). This separation allows swapping backends
//! (e.g. for testing with a mock) without changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1-100, default 70). Clamped on construction.
//! - [`PixelMode`]: the colour layout a rendition must be written back in.
//! - [`Picture`]: a decoded, orientation-corrected image plus the container
//!   format and pixel mode it has to be encoded with.
//! - [`ThumbnailParams`] / [`CropParams`]: full specification of one sizing step.

use super::palette::Palette;
use crate::ppoi::Ppoi;
use image::{DynamicImage, ImageFormat};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Colour layout of a source, carried through to its renditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    Luma,
    LumaAlpha,
    Rgb,
    Rgba,
    /// Palette-based source (indexed PNG or GIF).
    Indexed,
}

impl PixelMode {
    /// Mode of a decoded image that has no palette of its own.
    pub fn of(image: &DynamicImage) -> Self {
        let color = image.color();
        match (color.has_color(), color.has_alpha()) {
            (false, false) => PixelMode::Luma,
            (false, true) => PixelMode::LumaAlpha,
            (true, false) => PixelMode::Rgb,
            (true, true) => PixelMode::Rgba,
        }
    }
}

/// A decoded image ready for sizing, filtering and re-encoding.
#[derive(Debug, Clone)]
pub struct Picture {
    pub image: DynamicImage,
    /// Container format of the source; renditions are encoded in it too.
    pub format: ImageFormat,
    pub mode: PixelMode,
    /// Source palette for indexed PNGs. GIFs are re-quantized on encode.
    pub palette: Option<Palette>,
}

impl Picture {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Same format, mode and palette, new pixels.
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            format: self.format,
            mode: self.mode,
            palette: self.palette.clone(),
        }
    }
}

/// Scale to fit inside `width` x `height`, preserving aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    pub width: u32,
    pub height: u32,
    pub allow_upscale: bool,
}

/// Scale to cover `width` x `height`, then cut that window anchored on `ppoi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropParams {
    pub width: u32,
    pub height: u32,
    pub ppoi: Ppoi,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, RgbImage, RgbaImage};

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_70() {
        assert_eq!(Quality::default().value(), 70);
    }

    #[test]
    fn pixel_mode_follows_color_type() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        let la = DynamicImage::ImageLumaA8(GrayAlphaImage::new(2, 2));
        assert_eq!(PixelMode::of(&rgb), PixelMode::Rgb);
        assert_eq!(PixelMode::of(&rgba), PixelMode::Rgba);
        assert_eq!(PixelMode::of(&la), PixelMode::LumaAlpha);
        assert_eq!(PixelMode::of(&rgb.to_luma8().into()), PixelMode::Luma);
    }

    #[test]
    fn with_image_keeps_format_and_mode() {
        let picture = Picture {
            image: DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            format: ImageFormat::Png,
            mode: PixelMode::Rgb,
            palette: None,
        };
        let smaller = picture.with_image(DynamicImage::ImageRgb8(RgbImage::new(2, 1)));
        assert_eq!(smaller.dimensions(), (2, 1));
        assert_eq!(smaller.format, ImageFormat::Png);
        assert_eq!(smaller.mode, PixelMode::Rgb);
    }
}
