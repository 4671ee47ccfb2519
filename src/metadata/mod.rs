// src/metadata/mod.rs
//! Conversion metadata handling.
//!
//! Metadata is a nested JSON document. Interfaces contribute sections
//! (`NWBFile`, `Ecephys`) which are merged with [`Metadata::deep_update`];
//! user-supplied metadata is merged last and wins on conflicts.

mod deep_update;

pub use deep_update::deep_update;

use crate::error::{NwbError, Result};
use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};

/// Timestamp format used by NWB session start times and SpikeGLX headers.
pub const SESSION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const DEFAULT_SESSION_DESCRIPTION: &str = "no description";

/// Nested JSON metadata with a guaranteed object root.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata(Value);

impl Default for Metadata {
    fn default() -> Self {
        Metadata(Value::Object(Map::new()))
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_object() {
            Ok(Metadata(value))
        } else {
            Err(NwbError::InvalidMetadata(
                "metadata root must be a JSON object".to_string(),
            ))
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Merge `other` into this document; see [`deep_update`] for the rules.
    pub fn deep_update(&mut self, other: &Metadata) {
        deep_update(&mut self.0, &other.0);
    }

    /// Look up a nested value by key path.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.0;
        for key in path {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Set a nested value, creating intermediate objects as needed.
    ///
    /// Intermediate non-object values on the path are overwritten.
    pub fn set_path(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut current = &mut self.0;
        for key in parents {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = current
                .as_object_mut()
                .expect("just ensured object")
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current
            .as_object_mut()
            .expect("just ensured object")
            .insert(last.to_string(), value);
    }

    pub fn session_description(&self) -> Option<&str> {
        self.get_str(&["NWBFile", "session_description"])
    }

    pub fn identifier(&self) -> Option<&str> {
        self.get_str(&["NWBFile", "identifier"])
    }

    pub fn session_start_time(&self) -> Option<NaiveDateTime> {
        let raw = self.get_str(&["NWBFile", "session_start_time"])?;
        parse_session_time(raw)
    }

    pub fn set_session_start_time(&mut self, time: NaiveDateTime) {
        self.set_path(
            &["NWBFile", "session_start_time"],
            json!(time.format(SESSION_TIME_FORMAT).to_string()),
        );
    }

    /// Fill the NWBFile fields a conversion can default: a fresh UUIDv4
    /// identifier and a placeholder session description.
    pub fn ensure_defaults(&mut self) {
        if self.identifier().is_none() {
            self.set_path(
                &["NWBFile", "identifier"],
                json!(uuid::Uuid::new_v4().to_string()),
            );
        }
        if self.session_description().is_none() {
            self.set_path(
                &["NWBFile", "session_description"],
                json!(DEFAULT_SESSION_DESCRIPTION),
            );
        }
    }

    /// Check the NWBFile section is complete enough to start a conversion.
    pub fn validate_for_conversion(&self) -> Result<()> {
        for field in ["session_description", "identifier", "session_start_time"] {
            if self.get_str(&["NWBFile", field]).is_none() {
                return Err(NwbError::InvalidMetadata(format!(
                    "NWBFile.{field} is required"
                )));
            }
        }
        let raw = self
            .get_str(&["NWBFile", "session_start_time"])
            .expect("checked above");
        if parse_session_time(raw).is_none() {
            return Err(NwbError::InvalidMetadata(format!(
                "NWBFile.session_start_time is not a valid timestamp: {raw}"
            )));
        }
        Ok(())
    }
}

/// Parse a header or metadata timestamp, with or without fractional seconds.
pub fn parse_session_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, SESSION_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_path() {
        let mut metadata = Metadata::new();
        metadata.set_path(&["Ecephys", "Device"], json!([{"name": "probe"}]));
        assert_eq!(
            metadata.get_path(&["Ecephys", "Device"]).unwrap()[0]["name"],
            "probe"
        );
        assert!(metadata.get_path(&["Ecephys", "missing"]).is_none());
    }

    #[test]
    fn test_ensure_defaults() {
        let mut metadata = Metadata::new();
        metadata.ensure_defaults();
        assert_eq!(metadata.session_description(), Some(DEFAULT_SESSION_DESCRIPTION));
        let identifier = metadata.identifier().unwrap().to_string();
        // Stable across repeated calls.
        metadata.ensure_defaults();
        assert_eq!(metadata.identifier(), Some(identifier.as_str()));
    }

    #[test]
    fn test_validation_requires_start_time() {
        let mut metadata = Metadata::new();
        metadata.ensure_defaults();
        assert!(metadata.validate_for_conversion().is_err());

        let time = NaiveDateTime::parse_from_str("2020-11-03T10:35:10", SESSION_TIME_FORMAT).unwrap();
        metadata.set_session_start_time(time);
        metadata.validate_for_conversion().unwrap();
        assert_eq!(metadata.session_start_time(), Some(time));
    }

    #[test]
    fn test_validation_rejects_garbage_time() {
        let mut metadata = Metadata::new();
        metadata.ensure_defaults();
        metadata.set_path(&["NWBFile", "session_start_time"], json!("yesterday"));
        assert!(metadata.validate_for_conversion().is_err());
    }

    #[test]
    fn test_fractional_seconds_accepted() {
        assert!(parse_session_time("2020-11-03T10:35:10.500").is_some());
        assert!(parse_session_time("not a time").is_none());
    }

    #[test]
    fn test_non_object_root_rejected() {
        assert!(Metadata::from_value(json!([1, 2])).is_err());
        assert!(Metadata::from_value(json!({"a": 1})).is_ok());
    }
}
