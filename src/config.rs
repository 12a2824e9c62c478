//! Engine configuration.
//!
//! Handles loading, validating, and merging a `renditions.toml` file. Stock
//! defaults are the base layer; the user file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! media_root = "media"           # Directory sources and renditions live in
//! media_url = "/media/"          # Public URL prefix of media_root
//! sized_dirname = "__sized__"
//! filtered_dirname = "__filtered__"
//! create_on_demand = true        # Generate missing renditions on access
//! jpeg_quality = 70              # Lossy encoding quality (1-100)
//! allow_upscale = true           # Let thumbnails grow past the source size
//!
//! [memo]
//! ttl_secs = 2592000             # How long "generated" is remembered (0 = forever)
//!
//! [placeholder]
//! # url_template = "http://placehold.it/{width}x{height}"
//! default_size = [100, 100]      # Placeholder size for unsized renditions
//!
//! [processing]
//! max_processes = 4              # Max parallel workers (omit for auto = CPU cores)
//!
//! [rendition_key_sets]
//! headshot = [
//!     ["full_size", "url"],
//!     ["small", "thumbnail__100x100"],
//!     ["square", "crop__200x200"],
//! ]
//! ```
//!
//! Unknown keys are rejected to catch typos early. Key sets are validated as
//! part of [`EngineConfig::validate`], so a bad specifier is reported at
//! startup rather than on first use.

use crate::cache::DEFAULT_TTL;
use crate::controller::{EngineSettings, RenditionEngine};
use crate::imaging::{Quality, RenderOptions};
use crate::keys::{KeyError, KeySetRegistry, SizeKey};
use crate::placeholder::{PlaceholderService, TemplatePlaceholder};
use crate::storage::FileSystemStorage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Config validation error: {0}")]
    KeySet(#[from] KeyError),
}

/// Engine configuration loaded from `renditions.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Root directory of the file-system storage.
    pub media_root: String,
    /// URL prefix joined with storage names.
    pub media_url: String,
    pub sized_dirname: String,
    pub filtered_dirname: String,
    /// Default create-on-demand flag for new sources.
    pub create_on_demand: bool,
    pub jpeg_quality: u32,
    pub allow_upscale: bool,
    pub memo: MemoConfig,
    pub placeholder: PlaceholderConfig,
    pub processing: ProcessingConfig,
    /// Raw key sets, validated by [`KeySetRegistry`].
    pub rendition_key_sets: BTreeMap<String, toml::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            media_root: "media".to_string(),
            media_url: "/media/".to_string(),
            sized_dirname: "__sized__".to_string(),
            filtered_dirname: "__filtered__".to_string(),
            create_on_demand: true,
            jpeg_quality: 70,
            allow_upscale: true,
            memo: MemoConfig::default(),
            placeholder: PlaceholderConfig::default(),
            processing: ProcessingConfig::default(),
            rendition_key_sets: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Validation("jpeg_quality must be 1-100".into()));
        }
        for (key, dir) in [
            ("sized_dirname", &self.sized_dirname),
            ("filtered_dirname", &self.filtered_dirname),
        ] {
            if dir.is_empty() || dir.contains('/') || dir == "." || dir == ".." {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a single non-empty path segment"
                )));
            }
        }
        if self.sized_dirname == self.filtered_dirname {
            return Err(ConfigError::Validation(
                "sized_dirname and filtered_dirname must differ".into(),
            ));
        }
        if self.placeholder.default_size.contains(&0) {
            return Err(ConfigError::Validation(
                "placeholder.default_size values must be non-zero".into(),
            ));
        }
        if let Some(template) = &self.placeholder.url_template {
            if template.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "placeholder.url_template must not be empty".into(),
                ));
            }
        }
        self.key_set_registry().validate_all()?;
        Ok(())
    }

    pub fn settings(&self) -> EngineSettings {
        let [width, height] = self.placeholder.default_size;
        EngineSettings {
            sized_dirname: self.sized_dirname.clone(),
            filtered_dirname: self.filtered_dirname.clone(),
            create_on_demand: self.create_on_demand,
            render: RenderOptions {
                quality: Quality::new(self.jpeg_quality),
                allow_upscale: self.allow_upscale,
            },
            memo_ttl: self.memo.ttl(),
            placeholder_size: SizeKey { width, height },
        }
    }

    pub fn key_set_registry(&self) -> KeySetRegistry {
        KeySetRegistry::new(self.rendition_key_sets.clone())
    }

    pub fn placeholder_service(&self) -> Option<Arc<dyn PlaceholderService>> {
        self.placeholder
            .url_template
            .as_ref()
            .map(|t| Arc::new(TemplatePlaceholder::new(t.as_str())) as Arc<dyn PlaceholderService>)
    }

    /// Engine over `media_root` on disk, with this config's key sets and
    /// placeholder. `base_dir` anchors a relative `media_root`.
    pub fn build_engine(&self, base_dir: &Path) -> RenditionEngine {
        let storage = FileSystemStorage::new(base_dir.join(&self.media_root), &self.media_url);
        let engine = RenditionEngine::new(Arc::new(storage), self.settings())
            .with_key_sets(self.key_set_registry());
        match self.placeholder_service() {
            Some(placeholder) => engine.with_placeholder(placeholder),
            None => engine,
        }
    }
}

/// Generation memo settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoConfig {
    /// Seconds an entry lives. `0` keeps entries forever.
    pub ttl_secs: u64,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

impl MemoConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

/// Placeholder URLs for unset sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Template with `{width}` and `{height}` markers. Absent disables placeholders.
    pub url_template: Option<String>,
    /// Size used for renditions that carry none (originals, filters).
    pub default_size: [u32; 2],
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            url_template: None,
            default_size: [100, 100],
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for batch warming.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EngineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` when the file is absent.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `renditions.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Renditions Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding source images and their renditions.
media_root = "media"

# Public URL prefix for files under media_root.
media_url = "/media/"

# Top-level directories for sized and filtered renditions.
sized_dirname = "__sized__"
filtered_dirname = "__filtered__"

# Generate missing renditions when they are first requested. When false,
# a missing rendition is an error and must be created by `warm`.
create_on_demand = true

# Lossy encoding quality (1 = worst, 100 = best).
jpeg_quality = 70

# Let thumbnails grow beyond the source size.
allow_upscale = true

# ---------------------------------------------------------------------------
# Generation memo
# ---------------------------------------------------------------------------
[memo]
# Seconds a "rendition exists" entry is trusted before storage is checked
# again. 0 keeps entries forever.
ttl_secs = 2592000

# ---------------------------------------------------------------------------
# Placeholders for records without an image
# ---------------------------------------------------------------------------
[placeholder]
# URL template; {width} and {height} are replaced with the rendition size.
# Omit to make unset images an error instead.
# url_template = "http://placehold.it/{width}x{height}"

# Size used for renditions without one (the original, filtered images).
default_size = [100, 100]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `warm`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Rendition key sets
# ---------------------------------------------------------------------------
# Named, ordered lists of [attribute, specifier] pairs, generated together by
# `warm --key-set` and `serialize`. Specifiers:
#   url                               the source itself
#   thumbnail__WxH                    fit inside WxH
#   crop__WxH                         exactly WxH around the focal point
#   filters__NAME                     filtered at full size
#   filters__NAME__crop__WxH          filtered, then sized
[rendition_key_sets]
# headshot = [
#     ["full_size", "url"],
#     ["small", "thumbnail__100x100"],
#     ["square", "crop__200x200"],
# ]
"##
}
