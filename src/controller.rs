//! Create-on-demand rendition controller.
//!
//! [`RenditionEngine`] turns `(source, rendition)` into a [`RenditionRef`]:
//! the derived storage name, its public URL, and how it was obtained. It owns
//! the collaborators (storage, memo, backend, filters, key sets, placeholder)
//! and implements one protocol for every access:
//!
//! 1. **Unset source**: the placeholder URL for the target size (unsized
//!    renditions use the configured default size). Storage and memo are not
//!    touched. Without a placeholder service this is [`RenditionError::NoSourceImage`].
//! 2. **Original**: the source URL.
//! 3. **Create-on-demand off**: the rendition must already be in storage,
//!    otherwise [`RenditionError::RenditionNotFound`].
//! 4. **Create-on-demand on**: memo hit → done; otherwise check storage;
//!    otherwise generate and save. The memo records `1` for the URL either way.
//!
//! Composed renditions (`filters__invert__crop__100x100`) first resolve
//! their filtered rendition through the same protocol, then size the stored
//! filtered file.
//!
//! The engine holds no locks of its own. Two threads resolving the same
//! missing rendition may both generate it; the second save overwrites the
//! first with identical bytes.

use crate::cache::{GENERATED, GenerationMemo, InMemoryMemo, Outcome};
use crate::filters::{FilterError, FilterRegistry};
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, RenderError, RenderOptions, RustBackend,
    render_filtered, render_sized,
};
use crate::keys::{
    KeyError, KeySetRegistry, Rendition, RenditionKeySet, SizeKey, SizeMethod, SizeRequest,
    parse_size_key,
};
use crate::naming::PathNamer;
use crate::placeholder::PlaceholderService;
use crate::source::SourceImage;
use crate::storage::{Storage, StorageError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenditionError {
    #[error("rendition {0:?} does not exist and create-on-demand is disabled")]
    RenditionNotFound(String),
    #[error("renditions are read-only: cannot assign {0}")]
    UnsupportedOperation(String),
    #[error("no source image is set and no placeholder is configured")]
    NoSourceImage,
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("image processing failed: {0}")]
    Imaging(#[from] BackendError),
}

impl From<RenderError> for RenditionError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Backend(e) => RenditionError::Imaging(e),
            RenderError::Filter(e) => RenditionError::Filter(e),
        }
    }
}

/// Where a rendition lives and how this call obtained it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionRef {
    /// Storage name. `None` for placeholders.
    pub name: Option<String>,
    pub url: String,
    pub outcome: Outcome,
}

/// Engine-wide knobs, usually built from [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub sized_dirname: String,
    pub filtered_dirname: String,
    /// Default flag for sources created through [`RenditionEngine::source`].
    pub create_on_demand: bool,
    pub render: RenderOptions,
    /// Memo lifetime; `None` never expires.
    pub memo_ttl: Option<Duration>,
    /// Placeholder size for renditions without dimensions.
    pub placeholder_size: SizeKey,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sized_dirname: "__sized__".to_string(),
            filtered_dirname: "__filtered__".to_string(),
            create_on_demand: true,
            render: RenderOptions::default(),
            memo_ttl: Some(crate::cache::DEFAULT_TTL),
            placeholder_size: SizeKey {
                width: 100,
                height: 100,
            },
        }
    }
}

pub struct RenditionEngine {
    storage: Arc<dyn Storage>,
    memo: Arc<dyn GenerationMemo>,
    backend: Arc<dyn ImageBackend>,
    filters: FilterRegistry,
    key_sets: KeySetRegistry,
    placeholder: Option<Arc<dyn PlaceholderService>>,
    namer: PathNamer,
    settings: EngineSettings,
}

impl RenditionEngine {
    /// An engine over `storage` with the pure-Rust backend, an in-memory
    /// memo, the built-in filters, no key sets and no placeholder.
    pub fn new(storage: Arc<dyn Storage>, settings: EngineSettings) -> Self {
        Self {
            storage,
            memo: Arc::new(InMemoryMemo::new()),
            backend: Arc::new(RustBackend::new()),
            filters: FilterRegistry::default(),
            key_sets: KeySetRegistry::default(),
            placeholder: None,
            namer: PathNamer::new(
                settings.sized_dirname.clone(),
                settings.filtered_dirname.clone(),
            ),
            settings,
        }
    }

    pub fn with_memo(mut self, memo: Arc<dyn GenerationMemo>) -> Self {
        self.memo = memo;
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_key_sets(mut self, key_sets: KeySetRegistry) -> Self {
        self.key_sets = key_sets;
        self
    }

    pub fn with_placeholder(mut self, placeholder: Arc<dyn PlaceholderService>) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// A source stored under `name`, using the engine's create-on-demand default.
    pub fn source(&self, name: impl Into<String>) -> SourceImage {
        SourceImage::new(name).with_create_on_demand(self.settings.create_on_demand)
    }

    /// Look up a configured key set.
    pub fn key_set(&self, name: &str) -> Result<RenditionKeySet, KeyError> {
        self.key_sets.get(name)
    }

    /// Width and height of the source as displayed (EXIF orientation applied).
    pub fn dimensions(&self, source: &SourceImage) -> Result<Dimensions, RenditionError> {
        let name = source.name().ok_or(RenditionError::NoSourceImage)?;
        let bytes = self.storage.open(name)?;
        Ok(self.backend.identify(&bytes)?)
    }

    /// Parse `spec` and resolve it.
    pub fn resolve_key(
        &self,
        source: &SourceImage,
        spec: &str,
    ) -> Result<RenditionRef, RenditionError> {
        let rendition: Rendition = spec.parse()?;
        self.resolve(source, &rendition)
    }

    /// Resolve one rendition following the create-on-demand protocol
    /// described in the [module docs](self).
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(source = source.name().unwrap_or("<unset>"), rendition = %rendition)
    )]
    pub fn resolve(
        &self,
        source: &SourceImage,
        rendition: &Rendition,
    ) -> Result<RenditionRef, RenditionError> {
        if let Some(filter) = rendition.filter() {
            self.filters.get(filter)?;
        }
        let Some(name) = source.name() else {
            return self.placeholder_for(rendition);
        };
        let Some(path) = self.namer.derive(name, rendition, source.ppoi()) else {
            return Ok(RenditionRef {
                name: Some(name.to_string()),
                url: self.storage.url(name),
                outcome: Outcome::Original,
            });
        };
        let url = self.storage.url(&path);
        let found = |outcome| RenditionRef {
            name: Some(path.clone()),
            url: url.clone(),
            outcome,
        };

        if !source.create_on_demand() {
            return if self.storage.exists(&path) {
                Ok(found(Outcome::Existing))
            } else {
                Err(RenditionError::RenditionNotFound(path.clone()))
            };
        }

        if self.memo.get(&url).is_some() {
            debug!(%url, "memo hit");
            return Ok(found(Outcome::Memoized));
        }

        let outcome = if self.storage.exists(&path) {
            debug!(%path, "already in storage");
            Outcome::Existing
        } else {
            self.generate(source, name, rendition, &path)?;
            info!(%path, "generated rendition");
            Outcome::Generated
        };
        self.memo.set(&url, GENERATED, self.settings.memo_ttl);
        Ok(found(outcome))
    }

    fn placeholder_for(&self, rendition: &Rendition) -> Result<RenditionRef, RenditionError> {
        let placeholder = self
            .placeholder
            .as_ref()
            .ok_or(RenditionError::NoSourceImage)?;
        let size = rendition.size().unwrap_or(self.settings.placeholder_size);
        Ok(RenditionRef {
            name: None,
            url: placeholder.url(size),
            outcome: Outcome::Placeholder,
        })
    }

    fn generate(
        &self,
        source: &SourceImage,
        name: &str,
        rendition: &Rendition,
        path: &str,
    ) -> Result<(), RenditionError> {
        let options = &self.settings.render;
        let bytes = match rendition {
            Rendition::Original => return Ok(()),
            Rendition::Sized(request) => {
                let original = self.storage.open(name)?;
                render_sized(
                    self.backend.as_ref(),
                    &original,
                    name,
                    request,
                    source.ppoi(),
                    options,
                )?
            }
            Rendition::Filtered(filter) => {
                let original = self.storage.open(name)?;
                render_filtered(
                    self.backend.as_ref(),
                    &self.filters,
                    &original,
                    name,
                    filter,
                    options,
                )?
            }
            Rendition::Composed { filter, size } => {
                let filtered = self.resolve(source, &Rendition::Filtered(filter.clone()))?;
                let filtered_name = filtered
                    .name
                    .unwrap_or_else(|| self.namer.filtered_path(name, filter));
                let input = self.storage.open(&filtered_name)?;
                render_sized(
                    self.backend.as_ref(),
                    &input,
                    &filtered_name,
                    size,
                    source.ppoi(),
                    options,
                )?
            }
        };
        self.storage.save(path, &bytes)?;
        Ok(())
    }

    /// Read-only accessor for one sizing method, e.g. `engine.sized(&src, Crop).get("100x100")`.
    pub fn sized<'a>(&'a self, source: &'a SourceImage, method: SizeMethod) -> SizedImages<'a> {
        SizedImages {
            engine: self,
            source,
            method,
        }
    }

    pub fn thumbnail(
        &self,
        source: &SourceImage,
        size_key: &str,
    ) -> Result<RenditionRef, RenditionError> {
        self.sized(source, SizeMethod::Thumbnail).get(size_key)
    }

    pub fn crop(&self, source: &SourceImage, size_key: &str) -> Result<RenditionRef, RenditionError> {
        self.sized(source, SizeMethod::Crop).get(size_key)
    }

    pub fn filtered(
        &self,
        source: &SourceImage,
        filter: &str,
    ) -> Result<RenditionRef, RenditionError> {
        self.resolve(source, &Rendition::Filtered(filter.to_string()))
    }

    /// Resolve every entry of a key set, keeping the set's order.
    pub fn key_set_urls(
        &self,
        source: &SourceImage,
        set: &RenditionKeySet,
    ) -> Result<Vec<(String, String)>, RenditionError> {
        set.entries()
            .iter()
            .map(|entry| {
                let resolved = self.resolve(source, &entry.rendition)?;
                Ok((entry.attr.clone(), resolved.url))
            })
            .collect()
    }

    /// Delete every derived file of `source` named by `set`, including the
    /// filtered intermediates of composed renditions, and forget them in the
    /// memo. Returns how many files were removed.
    pub fn delete_renditions(
        &self,
        source: &SourceImage,
        set: &RenditionKeySet,
    ) -> Result<usize, RenditionError> {
        let Some(name) = source.name() else {
            return Ok(0);
        };
        let mut paths = BTreeSet::new();
        for entry in set.entries() {
            if let Rendition::Composed { filter, .. } = &entry.rendition {
                paths.insert(self.namer.filtered_path(name, filter));
            }
            if let Some(path) = self.namer.derive(name, &entry.rendition, source.ppoi()) {
                paths.insert(path);
            }
        }

        let mut deleted = 0;
        for path in &paths {
            self.memo.delete(&self.storage.url(path));
            if self.storage.delete(path)? {
                debug!(%path, "deleted rendition");
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Renditions of one source for one sizing method, addressed by size key.
///
/// Lookup only: renditions are derived data and cannot be assigned.
pub struct SizedImages<'a> {
    engine: &'a RenditionEngine,
    source: &'a SourceImage,
    method: SizeMethod,
}

impl SizedImages<'_> {
    pub fn get(&self, size_key: &str) -> Result<RenditionRef, RenditionError> {
        let size = parse_size_key(size_key)?;
        self.engine
            .resolve(self.source, &Rendition::Sized(SizeRequest {
                method: self.method,
                size,
            }))
    }

    /// Always fails with [`RenditionError::UnsupportedOperation`].
    pub fn insert<T>(&mut self, size_key: &str, _value: T) -> Result<(), RenditionError> {
        Err(RenditionError::UnsupportedOperation(format!(
            "{}[{size_key:?}]",
            self.method
        )))
    }
}
