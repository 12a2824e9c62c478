//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Warm
//!
//! Events arrive from worker threads in completion order, so each one is a
//! self-contained line:
//!
//! ```text
//! photos/dawn.jpg  thumbnail__100x100: generated → /media/__sized__/photos/dawn-thumbnail-100x100.jpg
//! photos/dawn.jpg  crop__50x50: cached → /media/__sized__/photos/dawn-crop-c0-5__0-5-50x50.jpg
//! photos/gone.jpg  crop__50x50: FAILED storage error: not found: photos/gone.jpg
//! ```
//!
//! followed by a summary:
//!
//! ```text
//! Warmed 2 of 3 renditions: 1 cached, 1 generated (2 total)
//! Failures:
//!     photos/gone.jpg crop__50x50: storage error: not found: photos/gone.jpg
//! ```
//!
//! ## Check
//!
//! ```text
//! Storage
//!     Root: media
//!     URL: /media/
//!     Create on demand: yes
//!
//! Key sets
//! 001 headshot (2 renditions)
//!     full_size: url
//!     small: thumbnail__100x100
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::Outcome;
use crate::config::EngineConfig;
use crate::keys::RenditionKeySet;
use crate::warmer::{WarmEvent, WarmResult};

/// Format a 1-based position as a zero-padded three-digit index.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// `001 name (N renditions)`
fn entity_header(index: usize, title: &str, count: usize) -> String {
    let noun = if count == 1 { "rendition" } else { "renditions" };
    format!("{} {} ({} {})", format_index(index), title, count, noun)
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Memoized | Outcome::Existing => "cached",
        other => other.as_str(),
    }
}

fn source_label(source: &str) -> &str {
    if source.is_empty() { "<no image>" } else { source }
}

// ============================================================================
// Warm
// ============================================================================

pub fn format_warm_event(event: &WarmEvent) -> Vec<String> {
    match event {
        WarmEvent::Rendered {
            source,
            key,
            url,
            outcome,
        } => vec![format!(
            "{}  {}: {} \u{2192} {}",
            source_label(source),
            key,
            outcome_label(*outcome),
            url
        )],
        WarmEvent::Failed { source, key, error } => {
            vec![format!("{}  {}: FAILED {}", source_label(source), key, error)]
        }
    }
}

pub fn format_warm_summary(result: &WarmResult) -> Vec<String> {
    let attempted = result.created + result.failures.len();
    let mut lines = vec![format!(
        "Warmed {} of {} renditions: {}",
        result.created, attempted, result.stats
    )];
    if !result.failures.is_empty() {
        lines.push("Failures:".to_string());
        for failure in &result.failures {
            lines.push(format!(
                "    {} {}: {}",
                source_label(&failure.source),
                failure.key,
                failure.error
            ));
        }
    }
    lines
}

pub fn print_warm_summary(result: &WarmResult) {
    for line in format_warm_summary(result) {
        println!("{}", line);
    }
}

// ============================================================================
// URLs
// ============================================================================

/// `attr: url` lines, in key-set order.
pub fn format_urls(urls: &[(String, String)]) -> Vec<String> {
    urls.iter()
        .map(|(attr, url)| format!("{}: {}", attr, url))
        .collect()
}

pub fn print_urls(urls: &[(String, String)]) {
    for line in format_urls(urls) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(config: &EngineConfig, sets: &[RenditionKeySet]) -> Vec<String> {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let mut lines = vec![
        "Storage".to_string(),
        format!("    Root: {}", config.media_root),
        format!("    URL: {}", config.media_url),
        format!("    Create on demand: {}", yes_no(config.create_on_demand)),
    ];
    if let Some(template) = &config.placeholder.url_template {
        lines.push(format!("    Placeholder: {}", template));
    }

    lines.push(String::new());
    if sets.is_empty() {
        lines.push("Key sets: none".to_string());
        return lines;
    }
    lines.push("Key sets".to_string());
    for (i, set) in sets.iter().enumerate() {
        lines.push(entity_header(i + 1, set.name(), set.len()));
        for entry in set.entries() {
            lines.push(format!("    {}: {}", entry.attr, entry.key));
        }
    }
    lines
}

pub fn print_check_output(config: &EngineConfig, sets: &[RenditionKeySet]) {
    for line in format_check_output(config, sets) {
        println!("{}", line);
    }
}
