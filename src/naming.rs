//! Deterministic storage names for renditions.
//!
//! Every rendition of a source lives at a path derived only from the source
//! name and the operation, so a path doubles as the cache key: if it exists
//! in storage, the rendition has been generated.
//!
//! ## Layout
//!
//! With the default directory names (`__sized__`, `__filtered__`):
//!
//! | Rendition of `folder/photo.jpg` | Stored at |
//! |---|---|
//! | `thumbnail__100x100` | `__sized__/folder/photo-thumbnail-100x100.jpg` |
//! | `crop__100x100`, PPOI 0.25x0.25 | `__sized__/folder/photo-crop-c0-25__0-25-100x100.jpg` |
//! | `filters__invert` | `__filtered__/folder/photo__invert__.jpg` |
//! | `filters__invert__thumbnail__100x100` | `__sized__/__filtered__/folder/photo__invert__-thumbnail-100x100.jpg` |
//!
//! Crops embed the PPOI (decimal points written as `-`) so moving the focal
//! point yields a new file instead of serving a stale crop. A composed
//! rendition is the sized rule applied to the filtered path.
//!
//! The extension is copied from the source unchanged; a source without one
//! yields derived names without one.

use crate::keys::{Rendition, SizeKey, SizeMethod, SizeRequest, is_valid_filter_name};
use crate::ppoi::Ppoi;

/// Result of parsing a derived storage name back into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedName {
    /// Storage name of the original source.
    pub source: String,
    pub filter: Option<String>,
    pub size: Option<SizeRequest>,
    /// Present for crops only.
    pub ppoi: Option<Ppoi>,
}

impl DerivedName {
    /// The rendition this name was derived with.
    pub fn rendition(&self) -> Rendition {
        match (&self.filter, self.size) {
            (None, None) => Rendition::Original,
            (None, Some(size)) => Rendition::Sized(size),
            (Some(filter), None) => Rendition::Filtered(filter.clone()),
            (Some(filter), Some(size)) => Rendition::Composed {
                filter: filter.clone(),
                size,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNamer {
    sized_dir: String,
    filtered_dir: String,
}

impl Default for PathNamer {
    fn default() -> Self {
        Self::new("__sized__", "__filtered__")
    }
}

impl PathNamer {
    pub fn new(sized_dir: impl Into<String>, filtered_dir: impl Into<String>) -> Self {
        Self {
            sized_dir: sized_dir.into(),
            filtered_dir: filtered_dir.into(),
        }
    }

    pub fn sized_path(&self, source: &str, request: &SizeRequest, ppoi: Ppoi) -> String {
        let (dir, stem, ext) = split_name(source);
        let suffix = match request.method {
            SizeMethod::Thumbnail => format!("thumbnail-{}", request.size),
            SizeMethod::Crop => format!("crop-c{}-{}", ppoi_token(ppoi), request.size),
        };
        join(
            &under(&self.sized_dir, dir),
            &format!("{stem}-{suffix}"),
            ext,
        )
    }

    pub fn filtered_path(&self, source: &str, filter: &str) -> String {
        let (dir, stem, ext) = split_name(source);
        join(
            &under(&self.filtered_dir, dir),
            &format!("{stem}__{filter}__"),
            ext,
        )
    }

    /// Storage name of `rendition`. `None` for the original, which is the
    /// source itself.
    pub fn derive(&self, source: &str, rendition: &Rendition, ppoi: Ppoi) -> Option<String> {
        match rendition {
            Rendition::Original => None,
            Rendition::Sized(request) => Some(self.sized_path(source, request, ppoi)),
            Rendition::Filtered(filter) => Some(self.filtered_path(source, filter)),
            Rendition::Composed { filter, size } => {
                Some(self.sized_path(&self.filtered_path(source, filter), size, ppoi))
            }
        }
    }

    /// Recover source and operation from a derived name.
    ///
    /// Returns `None` for names this namer could not have produced.
    pub fn parse_derived(&self, path: &str) -> Option<DerivedName> {
        let Some(rest) = strip_root(path, &self.sized_dir) else {
            return self.parse_filtered(path);
        };

        let (dir, stem, ext) = split_name(rest);
        let (base, size_token) = stem.rsplit_once('-')?;
        let size: SizeKey = size_token.parse().ok()?;

        let (inner_stem, method, ppoi) = if let Some(inner) = base.strip_suffix("-thumbnail") {
            (inner, SizeMethod::Thumbnail, None)
        } else {
            let (inner, token) = base.rsplit_once("-crop-c")?;
            (inner, SizeMethod::Crop, Some(parse_ppoi_token(token)?))
        };
        if inner_stem.is_empty() {
            return None;
        }

        let inner = join(dir, inner_stem, ext);
        let mut derived = self.parse_filtered(&inner).unwrap_or(DerivedName {
            source: inner,
            filter: None,
            size: None,
            ppoi: None,
        });
        derived.size = Some(SizeRequest { method, size });
        derived.ppoi = ppoi;
        Some(derived)
    }

    fn parse_filtered(&self, path: &str) -> Option<DerivedName> {
        let rest = strip_root(path, &self.filtered_dir)?;
        let (dir, stem, ext) = split_name(rest);
        let (source_stem, filter) = stem.strip_suffix("__")?.rsplit_once("__")?;
        if source_stem.is_empty() || !is_valid_filter_name(filter) {
            return None;
        }
        Some(DerivedName {
            source: join(dir, source_stem, ext),
            filter: Some(filter.to_string()),
            size: None,
            ppoi: None,
        })
    }
}

/// Split `dir/stem.ext` into its parts. Dot-files count as extensionless.
fn split_name(name: &str) -> (&str, &str, Option<&str>) {
    let (dir, file) = name.rsplit_once('/').unwrap_or(("", name));
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (dir, stem, Some(ext)),
        _ => (dir, file, None),
    }
}

fn join(dir: &str, stem: &str, ext: Option<&str>) -> String {
    let file = match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    };
    if dir.is_empty() {
        file
    } else {
        format!("{dir}/{file}")
    }
}

fn under(root: &str, dir: &str) -> String {
    if dir.is_empty() {
        root.to_string()
    } else {
        format!("{root}/{dir}")
    }
}

fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    path.strip_prefix(root)?.strip_prefix('/')
}

fn ppoi_token(ppoi: Ppoi) -> String {
    format!("{}__{}", ppoi.x(), ppoi.y()).replace('.', "-")
}

fn parse_ppoi_token(token: &str) -> Option<Ppoi> {
    let (x, y) = token.split_once("__")?;
    let x: f64 = x.replace('-', ".").parse().ok()?;
    let y: f64 = y.replace('-', ".").parse().ok()?;
    Ppoi::new(x, y).ok()
}
