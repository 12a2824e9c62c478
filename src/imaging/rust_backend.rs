//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) + EXIF orientation |
//! | Decode (JPEG, PNG, GIF, TIFF, WebP, BMP) | `image::load_from_memory` (content-sniffed) |
//! | EXIF orientation | `kamadak-exif` via [`orientation`](super::orientation) + `rotate*`/`flip*` |
//! | Palette of indexed PNGs | `png` crate via [`Palette`](super::palette::Palette) |
//! | Thumbnail | `DynamicImage::resize_exact` (Lanczos3) to fit dimensions |
//! | Crop | `resize_exact` (Lanczos3) to fill dimensions + `crop_imm` at the PPOI |
//! | Encode JPEG | `JpegEncoder::new_with_quality` |
//! | Encode GIF | `GifEncoder` (re-quantized to a 256-colour palette) |
//! | Encode indexed PNG | `png` crate, mapped onto the source palette |
//! | Encode other formats | `DynamicImage::write_to`, converted to the picture's [`PixelMode`] |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    calculate_crop_window, calculate_fill_dimensions, calculate_fit_dimensions,
};
use super::orientation;
use super::palette::Palette;
use super::params::{CropParams, Picture, PixelMode, Quality, ThumbnailParams};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Frame, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions that map to a container we can both read and write.
const FORMAT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    FORMAT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of source file extensions that can be decoded and re-encoded.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

fn format_for_name(name: &str) -> Option<ImageFormat> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    FORMAT_CANDIDATES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, fmt)| *fmt)
}

fn is_writable(format: &ImageFormat) -> bool {
    FORMAT_CANDIDATES.iter().any(|(_, fmt)| fmt == format)
}

/// Container format a rendition of `name` is written in.
///
/// The source's extension wins; otherwise the sniffed content format; JPEG
/// when neither is something we can encode.
pub fn output_format(name: &str, bytes: &[u8]) -> ImageFormat {
    format_for_name(name)
        .or_else(|| image::guess_format(bytes).ok().filter(is_writable))
        .unwrap_or(ImageFormat::Jpeg)
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// 8-bit buffer laid out as `mode`.
fn with_mode(image: &DynamicImage, mode: PixelMode) -> DynamicImage {
    match mode {
        PixelMode::Luma => image.to_luma8().into(),
        PixelMode::LumaAlpha => image.to_luma_alpha8().into(),
        PixelMode::Rgb => image.to_rgb8().into(),
        PixelMode::Rgba | PixelMode::Indexed => image.to_rgba8().into(),
    }
}

/// Convert the picture's pixels to the layout its [`PixelMode`] names, as far
/// as the target encoder can hold it.
///
/// Indexed pictures reaching this point have no palette to write, so they are
/// encoded in the truecolour layout of their pixels.
fn encodable(picture: &Picture, format: ImageFormat) -> DynamicImage {
    let image = &picture.image;
    let mode = match picture.mode {
        PixelMode::Indexed => PixelMode::of(image),
        mode => mode,
    };
    match format {
        // PNG takes every 8- and 16-bit layout, so a matching image keeps its depth.
        ImageFormat::Png if PixelMode::of(image) == mode => match image {
            DynamicImage::ImageRgb32F(_) => image.to_rgb16().into(),
            DynamicImage::ImageRgba32F(_) => image.to_rgba16().into(),
            _ => image.clone(),
        },
        ImageFormat::Png | ImageFormat::Bmp => with_mode(image, mode),
        ImageFormat::Jpeg => match mode {
            PixelMode::Luma | PixelMode::LumaAlpha => image.to_luma8().into(),
            _ => image.to_rgb8().into(),
        },
        ImageFormat::Tiff if mode == PixelMode::LumaAlpha => image.to_rgba8().into(),
        ImageFormat::Tiff => with_mode(image, mode),
        _ => match mode {
            PixelMode::Rgba | PixelMode::LumaAlpha => image.to_rgba8().into(),
            _ => image.to_rgb8().into(),
        },
    }
}

fn encode_failed(format: ImageFormat, err: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("{format:?} encode failed: {err}"))
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to read dimensions: {e}"))
            })?;
        // Orientations 5-8 swap the axes.
        Ok(match orientation::read_orientation(bytes) {
            Some(5..=8) => Dimensions {
                width: height,
                height: width,
            },
            _ => Dimensions { width, height },
        })
    }

    fn decode(&self, bytes: &[u8], name: &str) -> Result<Picture, BackendError> {
        let image = image::load_from_memory(bytes).map_err(|e| BackendError::Decode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let image = match orientation::read_orientation(bytes) {
            Some(tag) => orientation::apply_orientation(image, tag),
            None => image,
        };

        let format = output_format(name, bytes);
        let sniffed = image::guess_format(bytes).ok();
        let palette = match sniffed {
            Some(ImageFormat::Png) => Palette::from_png(bytes),
            _ => None,
        };
        let mode = if palette.is_some() || sniffed == Some(ImageFormat::Gif) {
            PixelMode::Indexed
        } else {
            PixelMode::of(&image)
        };

        Ok(Picture {
            image,
            format,
            mode,
            // A palette only survives when the rendition is written as PNG.
            palette: palette.filter(|_| format == ImageFormat::Png),
        })
    }

    fn thumbnail(
        &self,
        picture: &Picture,
        params: &ThumbnailParams,
    ) -> Result<Picture, BackendError> {
        let source = picture.dimensions();
        let (w, h) = calculate_fit_dimensions(
            source,
            (params.width, params.height),
            params.allow_upscale,
        );
        if (w, h) == source {
            return Ok(picture.clone());
        }
        Ok(picture.with_image(picture.image.resize_exact(w, h, FilterType::Lanczos3)))
    }

    fn crop(&self, picture: &Picture, params: &CropParams) -> Result<Picture, BackendError> {
        let source = picture.dimensions();
        let target = (params.width, params.height);
        let (fill_w, fill_h) = calculate_fill_dimensions(source, target);

        // Skip resampling when one side already matches exactly.
        let scaled = if (fill_w, fill_h) == source {
            picture.image.clone()
        } else {
            picture
                .image
                .resize_exact(fill_w, fill_h, FilterType::Lanczos3)
        };

        let window = calculate_crop_window((fill_w, fill_h), target, params.ppoi);
        Ok(picture.with_image(scaled.crop_imm(window.x, window.y, window.width, window.height)))
    }

    fn encode(&self, picture: &Picture, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let format = picture.format;
        if let (ImageFormat::Png, Some(palette)) = (format, &picture.palette) {
            return palette
                .encode_png(&picture.image)
                .map_err(|e| encode_failed(format, e));
        }

        let mut buf = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
                encodable(picture, format)
                    .write_with_encoder(encoder)
                    .map_err(|e| encode_failed(format, e))?;
            }
            ImageFormat::Gif => {
                // The encoder writes the trailer on drop.
                let mut encoder = GifEncoder::new(&mut buf);
                encoder
                    .encode_frame(Frame::new(picture.image.to_rgba8()))
                    .map_err(|e| encode_failed(format, e))?;
            }
            _ => {
                encodable(picture, format)
                    .write_to(&mut Cursor::new(&mut buf), format)
                    .map_err(|e| encode_failed(format, e))?;
            }
        }
        Ok(buf)
    }
}
