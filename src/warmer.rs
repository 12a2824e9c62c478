//! Batch pre-generation of renditions.
//!
//! The warmer runs the [controller](crate::controller) over every
//! `(source, specifier)` pair with create-on-demand forced on, so a
//! deployment can fill storage before the first page view instead of paying
//! for generation inside a request.
//!
//! ```text
//! sources × specifiers ──par_iter──► resolve ──► WarmEvent (optional channel)
//!                                       │
//!                                       ▼
//!                          WarmResult { created, failures, stats }
//! ```
//!
//! Per-item errors never abort the batch; they are collected in
//! [`WarmResult::failures`]. Only problems with the inputs themselves
//! (sources that are not records, unknown or invalid key sets) fail fast.

use crate::cache::{GenerationStats, Outcome};
use crate::controller::{RenditionEngine, RenditionError};
use crate::keys::{KeyError, Rendition, RenditionKeySet};
use crate::source::{SourceError, SourceImage};
use rayon::prelude::*;
use serde_json::Value;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome counters of a warm run.
pub type WarmStats = GenerationStats;

#[derive(Error, Debug)]
pub enum WarmError {
    #[error("warm sources must be a record or a list of records: {0}")]
    InvalidSources(String),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("record {index}: {source}")]
    InvalidRecord { index: usize, source: SourceError },
}

/// What to warm: one record's image or a collection of them.
#[derive(Debug, Clone, PartialEq)]
pub enum WarmTarget {
    Single(SourceImage),
    Many(Vec<SourceImage>),
}

impl WarmTarget {
    /// Read sources from JSON records.
    ///
    /// An object is a single record, an array of objects is a collection.
    /// The image is read from each record's `attr` field (a name, `null`, or
    /// a `{name, ppoi, create_on_demand}` object); a missing field is an
    /// empty image. Anything else is [`WarmError::InvalidSources`].
    pub fn from_json(value: &Value, attr: &str) -> Result<Self, WarmError> {
        match value {
            Value::Object(_) => Ok(Self::Single(record_source(value, attr, 0)?)),
            Value::Array(records) => records
                .iter()
                .enumerate()
                .map(|(index, record)| {
                    if !record.is_object() {
                        return Err(WarmError::InvalidSources(format!(
                            "item {index} is not a record: {record}"
                        )));
                    }
                    record_source(record, attr, index)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Many),
            other => Err(WarmError::InvalidSources(other.to_string())),
        }
    }

    pub fn sources(&self) -> &[SourceImage] {
        match self {
            Self::Single(source) => std::slice::from_ref(source),
            Self::Many(sources) => sources,
        }
    }
}

fn record_source(record: &Value, attr: &str, index: usize) -> Result<SourceImage, WarmError> {
    let value = record.get(attr).unwrap_or(&Value::Null);
    SourceImage::from_value(value).map_err(|source| WarmError::InvalidRecord { index, source })
}

/// Which renditions to warm: a configured key set or literal pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Specifiers {
    KeySet(String),
    Literal(Vec<(String, String)>),
}

impl From<&str> for Specifiers {
    fn from(name: &str) -> Self {
        Self::KeySet(name.to_string())
    }
}

/// Progress notification, one per `(source, specifier)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum WarmEvent {
    Rendered {
        source: String,
        key: String,
        url: String,
        outcome: Outcome,
    },
    Failed {
        source: String,
        key: String,
        error: String,
    },
}

#[derive(Debug)]
pub struct WarmFailure {
    /// Source name, or empty for an unset image.
    pub source: String,
    pub key: String,
    pub error: RenditionError,
}

#[derive(Debug, Default)]
pub struct WarmResult {
    pub created: usize,
    pub failures: Vec<WarmFailure>,
    pub stats: WarmStats,
}

pub struct Warmer<'a> {
    engine: &'a RenditionEngine,
    events: Option<Sender<WarmEvent>>,
}

impl<'a> Warmer<'a> {
    pub fn new(engine: &'a RenditionEngine) -> Self {
        Self {
            engine,
            events: None,
        }
    }

    /// Send a [`WarmEvent`] per item to `events`.
    pub fn with_events(mut self, events: Sender<WarmEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Parse `records` with [`WarmTarget::from_json`] and warm them.
    pub fn warm_records(
        &self,
        records: &Value,
        attr: &str,
        specifiers: &Specifiers,
    ) -> Result<WarmResult, WarmError> {
        let target = WarmTarget::from_json(records, attr)?;
        self.warm(&target, specifiers)
    }

    /// Generate every `(source, specifier)` rendition in parallel.
    ///
    /// Fails only when the specifiers are invalid; per-item errors land in
    /// the result. Failures keep source-then-specifier order.
    #[tracing::instrument(level = "debug", skip_all, fields(sources = target.sources().len()))]
    pub fn warm(
        &self,
        target: &WarmTarget,
        specifiers: &Specifiers,
    ) -> Result<WarmResult, WarmError> {
        let set = match specifiers {
            Specifiers::KeySet(name) => self.engine.key_set(name)?,
            Specifiers::Literal(pairs) => {
                RenditionKeySet::from_pairs("literal", pairs.iter().cloned())?
            }
        };

        let jobs: Vec<(SourceImage, &str, &Rendition)> = target
            .sources()
            .iter()
            .map(|source| source.clone().with_create_on_demand(true))
            .flat_map(|source| {
                set.entries()
                    .iter()
                    .map(move |entry| (source.clone(), entry.key.as_str(), &entry.rendition))
            })
            .collect();
        debug!(jobs = jobs.len(), set = set.name(), "warming");

        let outcomes: Vec<_> = jobs
            .into_par_iter()
            .map(|(source, key, rendition)| {
                let result = self.engine.resolve(&source, rendition);
                let name = source.name().unwrap_or_default().to_string();
                self.notify(&name, key, &result);
                (name, key, result)
            })
            .collect();

        let mut result = WarmResult::default();
        for (source, key, outcome) in outcomes {
            match outcome {
                Ok(resolved) => {
                    result.created += 1;
                    result.stats.record(resolved.outcome);
                }
                Err(error) => {
                    warn!(%source, key, %error, "rendition failed");
                    result.failures.push(WarmFailure {
                        source,
                        key: key.to_string(),
                        error,
                    });
                }
            }
        }
        Ok(result)
    }

    fn notify(
        &self,
        source: &str,
        key: &str,
        result: &Result<crate::controller::RenditionRef, RenditionError>,
    ) {
        let Some(events) = &self.events else {
            return;
        };
        let event = match result {
            Ok(resolved) => WarmEvent::Rendered {
                source: source.to_string(),
                key: key.to_string(),
                url: resolved.url.clone(),
                outcome: resolved.outcome,
            },
            Err(err) => WarmEvent::Failed {
                source: source.to_string(),
                key: key.to_string(),
                error: err.to_string(),
            },
        };
        // A dropped receiver only loses progress output.
        let _ = events.send(event);
    }
}
