//! Primary point of interest (PPOI).
//!
//! A PPOI is the focal point of an image expressed as fractions of its
//! width and height: `(0, 0)` is the top-left corner, `(1, 1)` the
//! bottom-right, `(0.5, 0.5)` the centre (the default). Crops anchor on it.
//!
//! ## Accepted inputs
//!
//! Values usually arrive from forms or JSON records, so validation works on
//! a dynamic [`serde_json::Value`]:
//!
//! | Input | Result |
//! |---|---|
//! | `[0.25, 0.75]` | `Ppoi(0.25, 0.75)` |
//! | `["0.25", "0.75"]` | `Ppoi(0.25, 0.75)` (numeric strings are coerced) |
//! | `"0.25x0.75"` | `Ppoi(0.25, 0.75)` |
//! | `[0, 1.5]`, `[1]`, `"picklexcucumber"` | [`PpoiError::Invalid`] |
//! | `true`, `3`, `{}`, `null` | [`PpoiError::Type`] |

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PpoiError {
    /// Right shape of input, wrong content (length, non-numeric, out of range).
    #[error("invalid PPOI {0}: expected two numbers between 0 and 1")]
    Invalid(String),
    /// Input that can never be a PPOI (not a sequence and not a string).
    #[error("PPOI must be a pair of numbers or a '<x>x<y>' string, got {0}")]
    Type(&'static str),
}

/// A validated point of interest. Both components lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ppoi {
    x: f64,
    y: f64,
}

impl Ppoi {
    pub const CENTER: Ppoi = Ppoi { x: 0.5, y: 0.5 };

    /// Build a PPOI from two floats, rejecting anything outside `[0, 1]`.
    pub fn new(x: f64, y: f64) -> Result<Self, PpoiError> {
        if !in_range(x) || !in_range(y) {
            return Err(PpoiError::Invalid(format!("({x}, {y})")));
        }
        // Normalise -0.0 so it prints (and names files) as "0".
        Ok(Self {
            x: x + 0.0,
            y: y + 0.0,
        })
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn as_tuple(self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Validate a dynamic value. See the [module docs](self) for the rules.
    pub fn from_value(value: &Value) -> Result<Self, PpoiError> {
        match value {
            Value::String(s) => s.parse(),
            Value::Array(items) => {
                if items.len() != 2 {
                    return Err(PpoiError::Invalid(value.to_string()));
                }
                let x = component(&items[0]).ok_or_else(|| PpoiError::Invalid(value.to_string()))?;
                let y = component(&items[1]).ok_or_else(|| PpoiError::Invalid(value.to_string()))?;
                Self::new(x, y).map_err(|_| PpoiError::Invalid(value.to_string()))
            }
            Value::Null => Err(PpoiError::Type("null")),
            Value::Bool(_) => Err(PpoiError::Type("a boolean")),
            Value::Number(_) => Err(PpoiError::Type("a number")),
            Value::Object(_) => Err(PpoiError::Type("an object")),
        }
    }
}

impl Default for Ppoi {
    fn default() -> Self {
        Self::CENTER
    }
}

impl TryFrom<(f64, f64)> for Ppoi {
    type Error = PpoiError;

    fn try_from((x, y): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(x, y)
    }
}

impl FromStr for Ppoi {
    type Err = PpoiError;

    /// Parse the `"<x>x<y>"` form, e.g. `"0.25x0.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PpoiError::Invalid(format!("{s:?}"));
        let (x, y) = s.trim().split_once('x').ok_or_else(invalid)?;
        let x: f64 = x.trim().parse().map_err(|_| invalid())?;
        let y: f64 = y.trim().parse().map_err(|_| invalid())?;
        Self::new(x, y).map_err(|_| invalid())
    }
}

impl fmt::Display for Ppoi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl Serialize for Ppoi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ppoi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ppoi::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Boolean check for a raw sequence: exactly two components, both in `[0, 1]`.
pub fn is_valid_ppoi(values: &[f64]) -> bool {
    matches!(values, [x, y] if in_range(*x) && in_range(*y))
}

fn in_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

fn component(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
