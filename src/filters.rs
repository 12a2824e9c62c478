//! Named pixel filters.
//!
//! A filter is a whole-image transform addressed by name in rendition keys
//! (`filters__invert`, `filter__grayscale__url`, ...). The registry ships with
//! `invert` and `grayscale`; applications may register their own, either as
//! a type implementing [`Filter`] or as a plain closure.
//!
//! Filters preserve dimensions and container format. Palette images keep
//! their palette: the filter is applied to the palette entries, so an
//! inverted indexed PNG is still an indexed PNG.

use crate::imaging::{Picture, PixelMode};
use crate::keys::is_valid_filter_name;
use image::DynamicImage;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("unknown filter {0:?}")]
    InvalidFilter(String),
    #[error("invalid filter name {0:?}: use lowercase letters, digits and single underscores")]
    InvalidName(String),
}

/// A named, whole-image pixel transform.
pub trait Filter: Send + Sync {
    fn apply(&self, image: DynamicImage) -> DynamicImage;
}

impl<F> Filter for F
where
    F: Fn(DynamicImage) -> DynamicImage + Send + Sync,
{
    fn apply(&self, image: DynamicImage) -> DynamicImage {
        self(image)
    }
}

/// Invert colour channels. Alpha is left untouched.
pub struct Invert;

impl Filter for Invert {
    fn apply(&self, mut image: DynamicImage) -> DynamicImage {
        image.invert();
        image
    }
}

/// Convert to grayscale, keeping an alpha channel if there is one.
pub struct Grayscale;

impl Filter for Grayscale {
    fn apply(&self, image: DynamicImage) -> DynamicImage {
        image.grayscale()
    }
}

#[derive(Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<dyn Filter>>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.filters.keys()).finish()
    }
}

impl FilterRegistry {
    /// A registry with no filters at all.
    pub fn empty() -> Self {
        Self {
            filters: BTreeMap::new(),
        }
    }

    /// `invert` and `grayscale`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .filters
            .insert("invert".to_string(), Arc::new(Invert));
        registry
            .filters
            .insert("grayscale".to_string(), Arc::new(Grayscale));
        registry
    }

    /// Register (or replace) a filter under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        filter: impl Filter + 'static,
    ) -> Result<(), FilterError> {
        let name = name.into();
        if !is_valid_filter_name(&name) {
            return Err(FilterError::InvalidName(name));
        }
        self.filters.insert(name, Arc::new(filter));
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&dyn Filter, FilterError> {
        self.filters
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| FilterError::InvalidFilter(name.to_string()))
    }

    /// Apply the named filter to a picture.
    pub fn apply(&self, name: &str, picture: &Picture) -> Result<Picture, FilterError> {
        let filter = self.get(name)?;
        let image = filter.apply(picture.image.clone());
        let palette = picture
            .palette
            .as_ref()
            .map(|palette| palette.map_colors(|img| filter.apply(img)));
        let mode = match picture.mode {
            PixelMode::Indexed => PixelMode::Indexed,
            _ => PixelMode::of(&image),
        };
        Ok(Picture {
            image,
            format: picture.format,
            mode,
            palette,
        })
    }
}
