//! Generation memo and outcome bookkeeping.
//!
//! Resolving a rendition with create-on-demand enabled must never regenerate
//! a file that already exists. The authoritative check is the storage
//! existence test, but asking remote storage on every URL lookup is slow, so
//! a small memo sits in front of it.
//!
//! # Design
//!
//! ## Memo keys
//!
//! The memo is keyed by **rendition URL** and stores a sentinel value of `1`
//! meaning "generated or seen to exist". Since derived names are a pure
//! function of source name and operation, the URL identifies the exact file.
//! Entries expire after a configurable TTL (30 days by default).
//!
//! The memo is advisory. A miss always falls back to the storage check, and
//! a stale hit (file removed behind our back) is cleared by
//! [`RenditionEngine::delete_renditions`](crate::controller::RenditionEngine::delete_renditions)
//! or by expiry.
//!
//! ## Staleness
//!
//! Content changes are **not** detected: replacing a source under the same
//! name keeps serving the old renditions until they are deleted. Callers
//! that overwrite sources in place should delete renditions first.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Value stored for every memoized rendition.
pub const GENERATED: u8 = 1;

/// Default memo lifetime: 30 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Key/value store with expiry, shared by every resolver in the process.
pub trait GenerationMemo: Send + Sync {
    fn get(&self, key: &str) -> Option<u8>;

    /// Store `value` under `key`. `None` means no expiry.
    fn set(&self, key: &str, value: u8, ttl: Option<Duration>);

    fn delete(&self, key: &str);
}

/// Process-local memo.
#[derive(Debug, Default)]
pub struct InMemoryMemo {
    entries: Mutex<HashMap<String, (u8, Option<Instant>)>>,
}

impl InMemoryMemo {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (u8, Option<Instant>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.purge_expired();
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries()
            .retain(|_, (_, expires)| expires.is_none_or(|at| at > now));
    }
}

impl GenerationMemo for InMemoryMemo {
    fn get(&self, key: &str) -> Option<u8> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(*value),
            None => None,
        }
    }

    fn set(&self, key: &str, value: u8, ttl: Option<Duration>) {
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries().insert(key.to_string(), (value, expires));
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// Memo that remembers nothing; every lookup goes to storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemo;

impl GenerationMemo for NoMemo {
    fn get(&self, _key: &str) -> Option<u8> {
        None
    }

    fn set(&self, _key: &str, _value: u8, _ttl: Option<Duration>) {}

    fn delete(&self, _key: &str) {}
}

/// How a rendition URL was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Source unset; the placeholder service supplied the URL.
    Placeholder,
    /// The source itself was requested.
    Original,
    /// The memo said the rendition exists.
    Memoized,
    /// Storage already had the rendition.
    Existing,
    /// The rendition was created by this call.
    Generated,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Placeholder => "placeholder",
            Outcome::Original => "original",
            Outcome::Memoized => "memoized",
            Outcome::Existing => "existing",
            Outcome::Generated => "generated",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of outcomes for a batch of resolutions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerationStats {
    pub generated: u32,
    pub existing: u32,
    pub memoized: u32,
    pub other: u32,
}

impl GenerationStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Generated => self.generated += 1,
            Outcome::Existing => self.existing += 1,
            Outcome::Memoized => self.memoized += 1,
            Outcome::Placeholder | Outcome::Original => self.other += 1,
        }
    }

    /// Renditions that were already there (memo or storage).
    pub fn cached(&self) -> u32 {
        self.existing + self.memoized
    }

    pub fn total(&self) -> u32 {
        self.generated + self.existing + self.memoized + self.other
    }
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached() > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.cached(),
                self.generated,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.generated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    // =========================================================================
    // InMemoryMemo
    // =========================================================================

    #[test]
    fn memo_set_get_delete() {
        let memo = InMemoryMemo::new();
        assert_eq!(memo.get("/media/a.jpg"), None);
        memo.set("/media/a.jpg", GENERATED, None);
        assert_eq!(memo.get("/media/a.jpg"), Some(1));
        memo.delete("/media/a.jpg");
        assert_eq!(memo.get("/media/a.jpg"), None);
    }

    #[test]
    fn memo_entries_expire() {
        let memo = InMemoryMemo::new();
        memo.set("short", GENERATED, Some(Duration::from_millis(1)));
        memo.set("long", GENERATED, Some(DEFAULT_TTL));
        sleep(Duration::from_millis(10));
        assert_eq!(memo.get("short"), None);
        assert_eq!(memo.get("long"), Some(1));
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn no_memo_forgets_everything() {
        let memo = NoMemo;
        memo.set("k", GENERATED, None);
        assert_eq!(memo.get("k"), None);
    }

    #[test]
    fn default_ttl_is_thirty_days() {
        assert_eq!(DEFAULT_TTL.as_secs(), 2_592_000);
    }

    // =========================================================================
    // GenerationStats
    // =========================================================================

    #[test]
    fn stats_display_generated_only() {
        let mut stats = GenerationStats::default();
        stats.record(Outcome::Generated);
        stats.record(Outcome::Generated);
        assert_eq!(stats.to_string(), "2 generated");
    }

    #[test]
    fn stats_display_with_cached() {
        let mut stats = GenerationStats::default();
        for outcome in [
            Outcome::Generated,
            Outcome::Existing,
            Outcome::Memoized,
            Outcome::Memoized,
            Outcome::Placeholder,
        ] {
            stats.record(outcome);
        }
        assert_eq!(stats.cached(), 3);
        assert_eq!(stats.to_string(), "3 cached, 1 generated (5 total)");
    }

    #[test]
    fn outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Outcome::Memoized).unwrap(),
            "\"memoized\""
        );
    }
}
