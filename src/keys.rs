//! Rendition specifier grammar and rendition key sets.
//!
//! A specifier names one rendition of a source image. Tokens are separated
//! by a double underscore so they can double as attribute-style paths in
//! templates and serializer configuration:
//!
//! ```text
//! url                                  the source image itself
//! thumbnail__100x100                   fit inside 100x100
//! crop__400x300                        exactly 400x300, anchored on the PPOI
//! filters__invert                      filtered, original size
//! filters__invert__url                 same (trailing `url` is accepted everywhere)
//! filters__invert__crop__100x100       filter first, then size
//! filter__invert__sizer__crop__100x100 long form of the above
//! ```
//!
//! Parsing produces a [`Rendition`] AST; nothing here touches pixels or
//! storage.
//!
//! ## Rendition key sets
//!
//! A key set is a named, ordered bundle of `(attribute, specifier)` pairs
//! generated together (for serializers or the batch warmer). Sets come from
//! configuration as raw TOML so that every shape problem is reported by this
//! module, with four distinct error kinds:
//!
//! | Problem | Error |
//! |---|---|
//! | name not registered | [`KeyError::NotConfigured`] |
//! | value is not a list of pairs (or a table) at all | [`KeyError::InvalidSizeKeySet`] |
//! | pairs of the wrong arity/type, empty or duplicate attributes, empty set | [`KeyError::InvalidKeySet`] |
//! | a well-formed pair whose specifier does not parse | [`KeyError::InvalidSizeKey`] |

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FILTER_KEYWORDS: &[&str] = &["filters", "filter"];
const SIZER_KEYWORD: &str = "sizer";
const URL_KEYWORD: &str = "url";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    #[error("malformed rendition key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },
    #[error("unknown sizer method {method:?} in rendition key {key:?}")]
    UnknownMethod { key: String, method: String },
    #[error("rendition key set {0:?} is not configured")]
    NotConfigured(String),
    #[error("rendition key set {set:?}: attribute {attr:?} has an invalid size key {key:?}")]
    InvalidSizeKey {
        set: String,
        attr: String,
        key: String,
        source: Box<KeyError>,
    },
    #[error("rendition key set {set:?} must be a list of [attribute, key] pairs or a table")]
    InvalidSizeKeySet { set: String },
    #[error("rendition key set {set:?} is invalid: {reason}")]
    InvalidKeySet { set: String, reason: String },
}

/// The fixed set of sizing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeMethod {
    Thumbnail,
    Crop,
}

impl SizeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeMethod::Thumbnail => "thumbnail",
            SizeMethod::Crop => "crop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "thumbnail" => Some(SizeMethod::Thumbnail),
            "crop" => Some(SizeMethod::Crop),
            _ => None,
        }
    }
}

impl fmt::Display for SizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target dimensions parsed from a `WxH` size key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeKey {
    pub width: u32,
    pub height: u32,
}

impl FromStr for SizeKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size_key(s)
    }
}

impl fmt::Display for SizeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A sizing step: algorithm plus target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeRequest {
    pub method: SizeMethod,
    pub size: SizeKey,
}

impl SizeRequest {
    pub fn new(method: SizeMethod, width: u32, height: u32) -> Self {
        Self {
            method,
            size: SizeKey { width, height },
        }
    }
}

impl fmt::Display for SizeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}", self.method, self.size)
    }
}

/// Parsed rendition specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rendition {
    Original,
    Sized(SizeRequest),
    Filtered(String),
    Composed { filter: String, size: SizeRequest },
}

impl Rendition {
    /// Target box, if the rendition is sized.
    pub fn size(&self) -> Option<SizeKey> {
        match self {
            Rendition::Sized(req) | Rendition::Composed { size: req, .. } => Some(req.size),
            Rendition::Original | Rendition::Filtered(_) => None,
        }
    }

    pub fn filter(&self) -> Option<&str> {
        match self {
            Rendition::Filtered(name) | Rendition::Composed { filter: name, .. } => Some(name),
            Rendition::Original | Rendition::Sized(_) => None,
        }
    }
}

impl FromStr for Rendition {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for Rendition {
    /// Canonical specifier (short filter form, no trailing `url`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendition::Original => f.write_str(URL_KEYWORD),
            Rendition::Sized(req) => write!(f, "{req}"),
            Rendition::Filtered(name) => write!(f, "filters__{name}"),
            Rendition::Composed { filter, size } => write!(f, "filters__{filter}__{size}"),
        }
    }
}

/// Parse a `WxH` size key. Both sides must be positive integers.
pub fn parse_size_key(key: &str) -> Result<SizeKey, KeyError> {
    let malformed = |reason: &str| KeyError::MalformedKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let (w, h) = key
        .split_once('x')
        .ok_or_else(|| malformed("expected '<width>x<height>'"))?;
    // `u32::from_str` also takes a leading `+`; the grammar is digits only.
    let dimension = |side: &str, what: &str| -> Result<u32, KeyError> {
        if side.is_empty() || !side.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(&format!("{what} is not a positive integer")));
        }
        side.parse()
            .map_err(|_| malformed(&format!("{what} is out of range")))
    };
    let width = dimension(w, "width")?;
    let height = dimension(h, "height")?;
    if width == 0 || height == 0 {
        return Err(malformed("dimensions must be greater than zero"));
    }
    Ok(SizeKey { width, height })
}

/// Parse a full rendition specifier. See the [module docs](self) for the grammar.
pub fn parse(spec: &str) -> Result<Rendition, KeyError> {
    let malformed = |reason: &str| KeyError::MalformedKey {
        key: spec.to_string(),
        reason: reason.to_string(),
    };
    if spec.trim().is_empty() {
        return Err(malformed("empty specifier"));
    }

    let mut tokens: Vec<&str> = spec.split("__").collect();
    if tokens.len() > 1 && tokens.last() == Some(&URL_KEYWORD) {
        tokens.pop();
    }

    match tokens.as_slice() {
        [only] if *only == URL_KEYWORD => Ok(Rendition::Original),
        [kw, rest @ ..] if FILTER_KEYWORDS.contains(kw) => {
            let [name, sizer @ ..] = rest else {
                return Err(malformed("missing filter name"));
            };
            if !is_valid_filter_name(name) {
                return Err(malformed("filter names use [a-z0-9_] without '__'"));
            }
            let filter = name.to_string();
            match sizer {
                [] => Ok(Rendition::Filtered(filter)),
                [kw, method, dims] if *kw == SIZER_KEYWORD => Ok(Rendition::Composed {
                    filter,
                    size: parse_sized(spec, method, dims)?,
                }),
                [method, dims] => Ok(Rendition::Composed {
                    filter,
                    size: parse_sized(spec, method, dims)?,
                }),
                [method, ..] if SizeMethod::from_name(method).is_none() && *method != SIZER_KEYWORD => {
                    Err(unknown_method(spec, method))
                }
                _ => Err(malformed("expected '<method>__<width>x<height>' after the filter")),
            }
        }
        [method, dims] => Ok(Rendition::Sized(parse_sized(spec, method, dims)?)),
        [method, ..] if SizeMethod::from_name(method).is_none() => Err(unknown_method(spec, method)),
        _ => Err(malformed("expected '<method>__<width>x<height>'")),
    }
}

fn parse_sized(spec: &str, method: &str, dims: &str) -> Result<SizeRequest, KeyError> {
    let method = SizeMethod::from_name(method).ok_or_else(|| unknown_method(spec, method))?;
    let size = parse_size_key(dims).map_err(|err| match err {
        KeyError::MalformedKey { reason, .. } => KeyError::MalformedKey {
            key: spec.to_string(),
            reason,
        },
        other => other,
    })?;
    Ok(SizeRequest { method, size })
}

fn unknown_method(spec: &str, method: &str) -> KeyError {
    KeyError::UnknownMethod {
        key: spec.to_string(),
        method: method.to_string(),
    }
}

/// Filter names are path tokens: lowercase ASCII, digits and single
/// underscores, not touching either end, and not a grammar keyword.
pub fn is_valid_filter_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && !name.contains("__")
        && !name.starts_with('_')
        && !name.ends_with('_')
        && name != URL_KEYWORD
        && name != SIZER_KEYWORD
}

// =============================================================================
// Rendition key sets
// =============================================================================

/// One validated `(attribute, specifier)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySetEntry {
    pub attr: String,
    pub key: String,
    pub rendition: Rendition,
}

/// A validated, ordered rendition key set.
#[derive(Debug, Clone, PartialEq)]
pub struct RenditionKeySet {
    name: String,
    entries: Vec<KeySetEntry>,
}

impl RenditionKeySet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[KeySetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate literal pairs (e.g. supplied directly to the warmer).
    pub fn from_pairs<I, A, K>(name: &str, pairs: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = (A, K)>,
        A: Into<String>,
        K: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(a, k)| (a.into(), k.into()))
            .collect();
        build_key_set(name, pairs)
    }

    /// Validate a raw configuration value: an array of `[attr, key]` pairs
    /// or an ordered table `attr = "key"`.
    pub fn from_value(name: &str, value: &toml::Value) -> Result<Self, KeyError> {
        let invalid_set = || KeyError::InvalidSizeKeySet {
            set: name.to_string(),
        };
        let invalid = |reason: String| KeyError::InvalidKeySet {
            set: name.to_string(),
            reason,
        };

        let pairs: Vec<(String, String)> = match value {
            toml::Value::Array(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let toml::Value::Array(pair) = item else {
                        return Err(invalid_set());
                    };
                    match pair.as_slice() {
                        [toml::Value::String(attr), toml::Value::String(key)] => {
                            pairs.push((attr.clone(), key.clone()))
                        }
                        _ => {
                            return Err(invalid(format!(
                                "entry {i} is not an [attribute, key] pair of strings"
                            )));
                        }
                    }
                }
                pairs
            }
            toml::Value::Table(table) => {
                let mut pairs = Vec::with_capacity(table.len());
                for (attr, key) in table {
                    let toml::Value::String(key) = key else {
                        return Err(invalid(format!("attribute {attr:?} must map to a string")));
                    };
                    pairs.push((attr.clone(), key.clone()));
                }
                pairs
            }
            _ => return Err(invalid_set()),
        };
        build_key_set(name, pairs)
    }
}

fn build_key_set(name: &str, pairs: Vec<(String, String)>) -> Result<RenditionKeySet, KeyError> {
    let invalid = |reason: String| KeyError::InvalidKeySet {
        set: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("set name must not be empty".into()));
    }
    if pairs.is_empty() {
        return Err(invalid("set has no entries".into()));
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(pairs.len());
    for (attr, key) in pairs {
        if attr.is_empty() {
            return Err(invalid("attribute names must not be empty".into()));
        }
        if !seen.insert(attr.clone()) {
            return Err(invalid(format!("duplicate attribute {attr:?}")));
        }
        let rendition = parse(&key).map_err(|source| KeyError::InvalidSizeKey {
            set: name.to_string(),
            attr: attr.clone(),
            key: key.clone(),
            source: Box::new(source),
        })?;
        entries.push(KeySetEntry {
            attr,
            key,
            rendition,
        });
    }

    Ok(RenditionKeySet {
        name: name.to_string(),
        entries,
    })
}

/// Registered key sets, kept raw until looked up or validated.
#[derive(Debug, Clone, Default)]
pub struct KeySetRegistry {
    sets: BTreeMap<String, toml::Value>,
}

impl KeySetRegistry {
    pub fn new(sets: BTreeMap<String, toml::Value>) -> Self {
        Self { sets }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: toml::Value) {
        self.sets.insert(name.into(), value);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Look up and validate a set by name.
    pub fn get(&self, name: &str) -> Result<RenditionKeySet, KeyError> {
        let value = self
            .sets
            .get(name)
            .ok_or_else(|| KeyError::NotConfigured(name.to_string()))?;
        RenditionKeySet::from_value(name, value)
    }

    /// Validate every registered set, failing on the first bad one.
    pub fn validate_all(&self) -> Result<(), KeyError> {
        for name in self.sets.keys() {
            self.get(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(method: SizeMethod, w: u32, h: u32) -> Rendition {
        Rendition::Sized(SizeRequest::new(method, w, h))
    }

    // =========================================================================
    // Specifier grammar
    // =========================================================================

    #[test]
    fn parses_sizers() {
        assert_eq!(
            parse("thumbnail__100x100").unwrap(),
            sized(SizeMethod::Thumbnail, 100, 100)
        );
        assert_eq!(parse("crop__400x300").unwrap(), sized(SizeMethod::Crop, 400, 300));
        assert_eq!(
            parse("crop__400x300__url").unwrap(),
            sized(SizeMethod::Crop, 400, 300)
        );
    }

    #[test]
    fn parses_original() {
        assert_eq!(parse("url").unwrap(), Rendition::Original);
    }

    #[test]
    fn parses_filters_and_compositions() {
        assert_eq!(
            parse("filters__invert__url").unwrap(),
            Rendition::Filtered("invert".into())
        );
        assert_eq!(
            parse("filters__invert").unwrap(),
            Rendition::Filtered("invert".into())
        );
        let composed = Rendition::Composed {
            filter: "invert".into(),
            size: SizeRequest::new(SizeMethod::Thumbnail, 100, 100),
        };
        assert_eq!(parse("filters__invert__thumbnail__100x100").unwrap(), composed);
        assert_eq!(
            parse("filter__invert__sizer__thumbnail__100x100").unwrap(),
            composed
        );
        assert_eq!(
            parse("filters__invert__thumbnail__100x100__url").unwrap(),
            composed
        );
    }

    #[test]
    fn display_is_canonical_and_reparses() {
        for spec in [
            "url",
            "thumbnail__100x100",
            "crop__10x20",
            "filters__invert",
            "filters__invert__crop__100x100",
        ] {
            let parsed = parse(spec).unwrap();
            assert_eq!(parsed.to_string(), spec);
            assert_eq!(parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn malformed_dimensions() {
        for spec in [
            "thumbnail__fooxbar",
            "crop__100",
            "crop__0x100",
            "crop__100x-5",
            "crop__1.5x100",
            "thumbnail__+100x100",
            "thumbnail__100x+100",
            "crop__ 100x100",
            "crop__99999999999x1",
            "crop",
            "filters__invert__crop__axb",
            "",
        ] {
            assert!(
                matches!(parse(spec), Err(KeyError::MalformedKey { .. })),
                "expected MalformedKey for {spec:?}, got {:?}",
                parse(spec)
            );
        }
    }

    #[test]
    fn unknown_methods() {
        for spec in ["resize__100x100", "foo", "filters__invert__stretch__10x10"] {
            assert!(
                matches!(parse(spec), Err(KeyError::UnknownMethod { .. })),
                "expected UnknownMethod for {spec:?}, got {:?}",
                parse(spec)
            );
        }
    }

    #[test]
    fn bare_size_keys() {
        assert_eq!(
            parse_size_key("100x100").unwrap(),
            SizeKey {
                width: 100,
                height: 100
            }
        );
        assert!(matches!(
            parse_size_key("fooxbar"),
            Err(KeyError::MalformedKey { .. })
        ));
        assert!(matches!(
            parse_size_key("+10x10"),
            Err(KeyError::MalformedKey { .. })
        ));
        assert!(matches!(
            "10x".parse::<SizeKey>(),
            Err(KeyError::MalformedKey { .. })
        ));
    }

    #[test]
    fn filter_name_rules() {
        assert!(is_valid_filter_name("invert"));
        assert!(is_valid_filter_name("sepia_2"));
        assert!(!is_valid_filter_name("Invert"));
        assert!(!is_valid_filter_name("a__b"));
        assert!(!is_valid_filter_name("_a"));
        assert!(!is_valid_filter_name("a-b"));
        assert!(!is_valid_filter_name("url"));
        assert!(!is_valid_filter_name(""));
    }

    // =========================================================================
    // Key sets
    // =========================================================================

    fn registry(toml_src: &str) -> KeySetRegistry {
        let table: toml::Table = toml::from_str(toml_src).unwrap();
        KeySetRegistry::new(table.into_iter().collect())
    }

    #[test]
    fn key_set_from_pairs_preserves_order() {
        let reg = registry(
            r#"
test_set = [
    ["test_thumb", "thumbnail__100x100"],
    ["test_crop", "crop__100x100"],
    ["test_invert", "filters__invert__url"],
]
"#,
        );
        let set = reg.get("test_set").unwrap();
        let attrs: Vec<&str> = set.entries().iter().map(|e| e.attr.as_str()).collect();
        assert_eq!(attrs, ["test_thumb", "test_crop", "test_invert"]);
        assert_eq!(set.entries()[2].rendition, Rendition::Filtered("invert".into()));
    }

    #[test]
    fn key_set_from_table() {
        let reg = registry(
            r#"
[table_set]
small = "thumbnail__50x50"
square = "crop__80x80"
"#,
        );
        let set = reg.get("table_set").unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn unregistered_set_is_not_configured() {
        let reg = KeySetRegistry::default();
        assert_eq!(
            reg.get("does_not_exist"),
            Err(KeyError::NotConfigured("does_not_exist".into()))
        );
    }

    #[test]
    fn flat_list_is_invalid_size_key_set() {
        let reg = registry(r#"invalid_set = ["test_thumb", "thumbnail__100x100"]"#);
        assert!(matches!(
            reg.get("invalid_set"),
            Err(KeyError::InvalidSizeKeySet { .. })
        ));
        let reg = registry(r#"invalid_set = "thumbnail__100x100""#);
        assert!(matches!(
            reg.get("invalid_set"),
            Err(KeyError::InvalidSizeKeySet { .. })
        ));
    }

    #[test]
    fn bad_entry_key_is_invalid_size_key() {
        let reg = registry(r#"invalid_size_key = [["test", "thumbnail"]]"#);
        match reg.get("invalid_size_key") {
            Err(KeyError::InvalidSizeKey { attr, source, .. }) => {
                assert_eq!(attr, "test");
                assert!(matches!(*source, KeyError::MalformedKey { .. }));
            }
            other => panic!("expected InvalidSizeKey, got {other:?}"),
        }
    }

    #[test]
    fn structural_problems_are_invalid_key_set() {
        for src in [
            r#"s = [["only_one"]]"#,
            r#"s = [["a", "crop__1x1"], ["a", "crop__2x2"]]"#,
            r#"s = []"#,
            r#"s = [["", "crop__1x1"]]"#,
            r#"s = [["a", 5]]"#,
        ] {
            let reg = registry(src);
            assert!(
                matches!(reg.get("s"), Err(KeyError::InvalidKeySet { .. })),
                "expected InvalidKeySet for {src}, got {:?}",
                reg.get("s")
            );
        }
    }

    #[test]
    fn validate_all_reports_first_bad_set() {
        let reg = registry(
            r#"
good = [["t", "thumbnail__10x10"]]
bad = [["t", "resize__10x10"]]
"#,
        );
        assert!(matches!(
            reg.validate_all(),
            Err(KeyError::InvalidSizeKey { .. })
        ));
    }

    #[test]
    fn literal_pairs_validate_like_config() {
        let set = RenditionKeySet::from_pairs(
            "literal",
            [("test_thumb", "thumbnail__100x100"), ("inv", "filters__invert__url")],
        )
        .unwrap();
        assert_eq!(set.name(), "literal");
        assert!(matches!(
            RenditionKeySet::from_pairs("literal", [("x", "crop__nope")]),
            Err(KeyError::InvalidSizeKey { .. })
        ));
    }
}
