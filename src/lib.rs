//! # Renditions
//!
//! Resized, cropped and filtered versions of uploaded images, created on
//! first access and served from storage afterwards.
//!
//! A record's image field holds a [`SourceImage`](source::SourceImage): a
//! storage name, a primary point of interest (PPOI) and a create-on-demand
//! flag. Templates and serializers ask for renditions with short specifiers:
//!
//! ```text
//! thumbnail__100x100                 fit inside 100x100
//! crop__400x300                      exactly 400x300, centred on the PPOI
//! filters__invert__crop__100x100     invert, then crop
//! ```
//!
//! # Architecture
//!
//! ```text
//! specifier ──keys::parse──► Rendition ──naming──► storage name ──► URL
//!                                              │
//!                       (missing + create-on-demand)
//!                                              ▼
//!                  storage.open ─► imaging::decode ─► filter / size ─► encode ─► storage.save
//! ```
//!
//! The storage name of a rendition is a pure function of the source name,
//! the operation, and (for crops) the PPOI. That makes the name its own cache
//! key: a rendition exists exactly when its file does. A small
//! [memo](cache::GenerationMemo) in front of storage saves the existence
//! check on hot paths.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`ppoi`] | Primary point of interest: validation, parsing, `"0.5x0.5"` form |
//! | [`keys`] | Specifier grammar, `Rendition` AST, rendition key sets |
//! | [`imaging`] | Decode, thumbnail, crop, encode; EXIF orientation; palettes |
//! | [`filters`] | Named whole-image filters and their registry |
//! | [`naming`] | Deterministic storage names for renditions, and their inverse |
//! | [`storage`] | `Storage` trait with file-system and in-memory backends |
//! | [`cache`] | Generation memo and outcome statistics |
//! | [`placeholder`] | Stand-in URLs for records without an image |
//! | [`source`] | The image field value attached to a record |
//! | [`controller`] | Create-on-demand resolution of renditions |
//! | [`warmer`] | Parallel batch pre-generation |
//! | [`config`] | `renditions.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Paths Are The Cache
//!
//! There is no database of generated files. Renditions are found by
//! recomputing their name. The flip side is staleness: replacing a source's
//! bytes without renaming it leaves old renditions in place until they are
//! deleted with [`RenditionEngine::delete_renditions`].
//!
//! ## Format And Mode Follow The Source
//!
//! A rendition is written in the source's container format and pixel mode.
//! Palette PNGs stay palette PNGs (their palette is carried through filters),
//! grayscale stays grayscale, and alpha survives. Only EXIF orientation is
//! normalised away: pixels are rotated upright on decode.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling) and
//! the `png` crate for indexed output. No system libraries are needed.

pub mod cache;
pub mod config;
pub mod controller;
pub mod filters;
pub mod imaging;
pub mod keys;
pub mod naming;
pub mod output;
pub mod placeholder;
pub mod ppoi;
pub mod source;
pub mod storage;
pub mod warmer;

pub use controller::{EngineSettings, RenditionEngine, RenditionError, RenditionRef};

#[cfg(test)]
pub(crate) mod test_helpers;
