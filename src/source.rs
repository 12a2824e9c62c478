//! The source image attached to a record.
//!
//! A [`SourceImage`] is what a record's image field holds: a storage name
//! (or nothing), a PPOI, and the create-on-demand flag. Renditions are
//! resolved against it by the [controller](crate::controller).
//!
//! Setters that take dynamic values validate first and leave the field
//! untouched on error, so a rejected form submission never corrupts a
//! live source.

use crate::ppoi::{Ppoi, PpoiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("create_on_demand must be a boolean, got {0}")]
    CreateOnDemandType(String),
    #[error("invalid source record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Ppoi(#[from] PpoiError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceImage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ppoi: Ppoi,
    #[serde(default)]
    create_on_demand: bool,
}

impl SourceImage {
    /// A source stored under `name`, centred PPOI, create-on-demand off.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ppoi: Ppoi::CENTER,
            create_on_demand: false,
        }
    }

    /// An empty image field.
    pub fn unset() -> Self {
        Self {
            name: None,
            ppoi: Ppoi::CENTER,
            create_on_demand: false,
        }
    }

    pub fn with_ppoi(mut self, ppoi: Ppoi) -> Self {
        self.ppoi = ppoi;
        self
    }

    pub fn with_create_on_demand(mut self, enabled: bool) -> Self {
        self.create_on_demand = enabled;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.name.is_some()
    }

    pub fn ppoi(&self) -> Ppoi {
        self.ppoi
    }

    pub fn set_ppoi(&mut self, ppoi: Ppoi) {
        self.ppoi = ppoi;
    }

    /// Validate and assign. On error the previous PPOI is kept.
    pub fn set_ppoi_value(&mut self, value: &Value) -> Result<(), PpoiError> {
        self.ppoi = Ppoi::from_value(value)?;
        Ok(())
    }

    pub fn create_on_demand(&self) -> bool {
        self.create_on_demand
    }

    pub fn set_create_on_demand(&mut self, enabled: bool) {
        self.create_on_demand = enabled;
    }

    /// Assign from a dynamic value; anything but a boolean is rejected.
    pub fn set_create_on_demand_value(&mut self, value: &Value) -> Result<(), SourceError> {
        match value {
            Value::Bool(enabled) => {
                self.create_on_demand = *enabled;
                Ok(())
            }
            other => Err(SourceError::CreateOnDemandType(other.to_string())),
        }
    }

    /// Build from the value of a record's image attribute.
    ///
    /// Accepts a bare name (`"photos/a.jpg"`), `null` for an empty field, or
    /// an object `{"name": ..., "ppoi": ..., "create_on_demand": ...}` where
    /// every key is optional.
    pub fn from_value(value: &Value) -> Result<Self, SourceError> {
        match value {
            Value::Null => Ok(Self::unset()),
            Value::String(name) if name.is_empty() => Ok(Self::unset()),
            Value::String(name) => Ok(Self::new(name.as_str())),
            Value::Object(fields) => {
                let mut source = match fields.get("name") {
                    None | Some(Value::Null) => Self::unset(),
                    Some(Value::String(name)) if name.is_empty() => Self::unset(),
                    Some(Value::String(name)) => Self::new(name.as_str()),
                    Some(other) => {
                        return Err(SourceError::InvalidRecord(format!(
                            "name must be a string, got {other}"
                        )));
                    }
                };
                if let Some(ppoi) = fields.get("ppoi") {
                    source.set_ppoi_value(ppoi)?;
                }
                if let Some(flag) = fields.get("create_on_demand") {
                    source.set_create_on_demand_value(flag)?;
                }
                Ok(source)
            }
            other => Err(SourceError::InvalidRecord(format!(
                "expected a name, null or an object, got {other}"
            ))),
        }
    }
}

impl Default for SourceImage {
    fn default() -> Self {
        Self::unset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_source_defaults() {
        let source = SourceImage::new("python-logo.jpg");
        assert_eq!(source.name(), Some("python-logo.jpg"));
        assert_eq!(source.ppoi(), Ppoi::CENTER);
        assert!(!source.create_on_demand());
        assert!(!SourceImage::unset().is_set());
    }

    #[test]
    fn invalid_ppoi_keeps_previous_value() {
        let mut source = SourceImage::new("a.jpg");
        source.set_ppoi_value(&json!([0.25, 0.75])).unwrap();
        assert_eq!(source.ppoi().as_tuple(), (0.25, 0.75));

        assert!(matches!(
            source.set_ppoi_value(&json!([0, 1.5, 6])),
            Err(PpoiError::Invalid(_))
        ));
        assert!(matches!(
            source.set_ppoi_value(&json!(true)),
            Err(PpoiError::Type(_))
        ));
        assert_eq!(source.ppoi().as_tuple(), (0.25, 0.75));
    }

    #[test]
    fn create_on_demand_requires_boolean() {
        let mut source = SourceImage::new("a.jpg");
        source.set_create_on_demand_value(&json!(true)).unwrap();
        assert!(source.create_on_demand());

        for bad in [json!("yes"), json!(1), json!(null)] {
            assert!(matches!(
                source.set_create_on_demand_value(&bad),
                Err(SourceError::CreateOnDemandType(_))
            ));
        }
        assert!(source.create_on_demand());
    }

    #[test]
    fn from_value_shapes() {
        assert_eq!(
            SourceImage::from_value(&json!("a.jpg")).unwrap(),
            SourceImage::new("a.jpg")
        );
        assert_eq!(
            SourceImage::from_value(&Value::Null).unwrap(),
            SourceImage::unset()
        );
        let full = SourceImage::from_value(&json!({
            "name": "b.png",
            "ppoi": "0.1x0.9",
            "create_on_demand": true,
        }))
        .unwrap();
        assert_eq!(full.name(), Some("b.png"));
        assert_eq!(full.ppoi().as_tuple(), (0.1, 0.9));
        assert!(full.create_on_demand());
    }

    #[test]
    fn from_value_rejects_bad_shapes() {
        assert!(matches!(
            SourceImage::from_value(&json!(5)),
            Err(SourceError::InvalidRecord(_))
        ));
        assert!(matches!(
            SourceImage::from_value(&json!({"name": 5})),
            Err(SourceError::InvalidRecord(_))
        ));
        assert!(matches!(
            SourceImage::from_value(&json!({"name": "a.jpg", "ppoi": [2, 2]})),
            Err(SourceError::Ppoi(PpoiError::Invalid(_)))
        ));
    }

    #[test]
    fn serde_round_trip() {
        let source = SourceImage::new("a.jpg")
            .with_ppoi(Ppoi::new(0.25, 0.5).unwrap())
            .with_create_on_demand(true);
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(
            json,
            json!({"name": "a.jpg", "ppoi": "0.25x0.5", "create_on_demand": true})
        );
        let back: SourceImage = serde_json::from_value(json).unwrap();
        assert_eq!(back, source);
    }
}
