//! Image processing, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | header-only dimensions, orientation-aware |
//! | **Decode** | `image::load_from_memory` + EXIF orientation fix-up |
//! | **Thumbnail** | fit dimensions + Lanczos3 `resize_exact` |
//! | **Crop** | fill dimensions + Lanczos3 `resize_exact` + PPOI-anchored `crop_imm` |
//! | **Encode** | source container format; indexed PNGs through the `png` crate |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend
//! - **Orientation**: EXIF orientation via `kamadak-exif`, baked into pixels
//! - **Palette**: PNG palettes, which the `image` crate drops on decode

pub mod backend;
mod calculations;
pub mod operations;
pub(crate) mod orientation;
mod palette;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    CropWindow, calculate_crop_window, calculate_fill_dimensions, calculate_fit_dimensions,
};
pub use operations::{RenderError, RenderOptions, render_filtered, render_sized, size_picture};
pub use palette::Palette;
pub use params::{CropParams, Picture, PixelMode, Quality, ThumbnailParams};
pub use rust_backend::{RustBackend, output_format, supported_input_extensions};
