//! High-level image operations.
//!
//! These functions combine a rendition request with backend execution: they
//! decode the source, pick the sizing step, run filters and encode the result.
//! Nothing here touches storage; callers hand in bytes and get bytes back.

use super::backend::{BackendError, ImageBackend};
use super::params::{CropParams, Picture, Quality, ThumbnailParams};
use crate::filters::{FilterError, FilterRegistry};
use crate::keys::{SizeMethod, SizeRequest};
use crate::ppoi::Ppoi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Encoding and sizing knobs shared by every rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub quality: Quality,
    pub allow_upscale: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            allow_upscale: true,
        }
    }
}

/// Dispatch a size request to the matching backend operation.
pub fn size_picture(
    backend: &dyn ImageBackend,
    picture: &Picture,
    request: &SizeRequest,
    ppoi: Ppoi,
    options: &RenderOptions,
) -> Result<Picture, BackendError> {
    let (width, height) = (request.size.width, request.size.height);
    match request.method {
        SizeMethod::Thumbnail => backend.thumbnail(
            picture,
            &ThumbnailParams {
                width,
                height,
                allow_upscale: options.allow_upscale,
            },
        ),
        SizeMethod::Crop => backend.crop(
            picture,
            &CropParams {
                width,
                height,
                ppoi,
            },
        ),
    }
}

/// Produce the encoded bytes of a sized rendition of `source`.
pub fn render_sized(
    backend: &dyn ImageBackend,
    source: &[u8],
    name: &str,
    request: &SizeRequest,
    ppoi: Ppoi,
    options: &RenderOptions,
) -> Result<Vec<u8>, BackendError> {
    let picture = backend.decode(source, name)?;
    let sized = size_picture(backend, &picture, request, ppoi, options)?;
    backend.encode(&sized, options.quality)
}

/// Produce the encoded bytes of a filtered rendition of `source`.
pub fn render_filtered(
    backend: &dyn ImageBackend,
    filters: &FilterRegistry,
    source: &[u8],
    name: &str,
    filter: &str,
    options: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    // Fail on unknown names before paying for a decode.
    filters.get(filter)?;
    let picture = backend.decode(source, name)?;
    let filtered = filters.apply(filter, &picture)?;
    Ok(backend.encode(&filtered, options.quality)?)
}
