//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the five operations every backend must
//! support: identify, decode, thumbnail, crop, and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests substitute [`tests::MockBackend`] to count pixel work without
//! doing any.

use super::params::{CropParams, Picture, Quality, ThumbnailParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Displayed size of a source, after EXIF orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Every backend must implement all five operations so the rest of the
/// codebase is backend-agnostic.
pub trait ImageBackend: Send + Sync {
    /// Get source dimensions without a full decode where possible.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode source bytes into an orientation-corrected [`Picture`].
    ///
    /// `name` is the storage name of the source; its extension picks the
    /// output container format.
    fn decode(&self, bytes: &[u8], name: &str) -> Result<Picture, BackendError>;

    /// Scale to fit inside a box (aspect preserved, no cropping).
    fn thumbnail(&self, picture: &Picture, params: &ThumbnailParams)
    -> Result<Picture, BackendError>;

    /// Scale to cover a box, then crop it around the PPOI.
    fn crop(&self, picture: &Picture, params: &CropParams) -> Result<Picture, BackendError>;

    /// Encode in the picture's own format and pixel mode.
    fn encode(&self, picture: &Picture, quality: Quality) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::PixelMode;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockBackend {
        /// Dimensions every decoded picture reports.
        pub source_dimensions: (u32, u32),
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify,
        Decode(String),
        Thumbnail {
            width: u32,
            height: u32,
            allow_upscale: bool,
        },
        Crop {
            width: u32,
            height: u32,
            ppoi: (f64, f64),
        },
        Encode {
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::with_dimensions(200, 100)
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                source_dimensions: (width, height),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn count(&self, pred: impl Fn(&RecordedOp) -> bool) -> usize {
            self.get_operations().iter().filter(|op| pred(op)).count()
        }

        fn blank(&self, picture: &Picture, width: u32, height: u32) -> Picture {
            picture.with_image(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, _bytes: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Identify);
            let (width, height) = self.source_dimensions;
            Ok(Dimensions { width, height })
        }

        fn decode(&self, _bytes: &[u8], name: &str) -> Result<Picture, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(name.to_string()));
            let (width, height) = self.source_dimensions;
            Ok(Picture {
                image: DynamicImage::ImageRgb8(RgbImage::new(width, height)),
                format: ImageFormat::Png,
                mode: PixelMode::Rgb,
                palette: None,
            })
        }

        fn thumbnail(
            &self,
            picture: &Picture,
            params: &ThumbnailParams,
        ) -> Result<Picture, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Thumbnail {
                width: params.width,
                height: params.height,
                allow_upscale: params.allow_upscale,
            });
            Ok(self.blank(picture, params.width, params.height))
        }

        fn crop(&self, picture: &Picture, params: &CropParams) -> Result<Picture, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Crop {
                width: params.width,
                height: params.height,
                ppoi: params.ppoi.as_tuple(),
            });
            Ok(self.blank(picture, params.width, params.height))
        }

        fn encode(&self, picture: &Picture, quality: Quality) -> Result<Vec<u8>, BackendError> {
            let (width, height) = picture.dimensions();
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width,
                height,
                quality: quality.value(),
            });
            Ok(format!("mock:{width}x{height}").into_bytes())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);
        let dims = backend.identify(b"").unwrap();
        assert_eq!((dims.width, dims.height), (800, 600));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Identify]);
    }

    #[test]
    fn mock_records_decode() {
        let backend = MockBackend::with_dimensions(800, 600);

        let picture = backend.decode(b"", "photos/image.jpg").unwrap();
        assert_eq!(picture.dimensions(), (800, 600));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Decode(p) if p == "photos/image.jpg"));
    }

    #[test]
    fn mock_records_crop_and_encode() {
        let backend = MockBackend::new();
        let picture = backend.decode(b"", "a.png").unwrap();

        let cropped = backend
            .crop(
                &picture,
                &CropParams {
                    width: 50,
                    height: 40,
                    ppoi: crate::ppoi::Ppoi::CENTER,
                },
            )
            .unwrap();
        let bytes = backend.encode(&cropped, Quality::new(85)).unwrap();
        assert_eq!(bytes, b"mock:50x40");

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(
            &ops[1],
            RecordedOp::Crop {
                width: 50,
                height: 40,
                ..
            }
        ));
        assert!(matches!(&ops[2], RecordedOp::Encode { quality: 85, .. }));
    }
}
