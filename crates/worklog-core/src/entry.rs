//! # entry
//!
//! why: represent one opaque unit of tracked work without fixing its schema
//! relations: appended by worklog-storage's LogService, projected by csv.rs
//! what: LogEntry newtype over a json object, timestamp presence validation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// name of the only field an entry is required to carry
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// reasons a submitted value is not accepted as a log entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// the value is not a json object (array, string, number, bool, null)
    #[error("log entry must be a json object")]
    NotAnObject,
    /// the object has no usable `timestamp`
    #[error("log entry is missing a timestamp")]
    MissingTimestamp,
}

/// A single logged record
///
/// the only structural guarantee is "json object with a non-empty timestamp";
/// every other field (project, sprint, task, durations, totals, ...) is
/// carried through untouched, including fields this crate has never heard of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(Map<String, Value>);

impl LogEntry {
    /// Validate a raw json value and wrap it as an entry
    ///
    /// a timestamp counts as present unless it is `null`, `false`, an empty
    /// string or numeric zero.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(fields) = value else {
            return Err(ValidationError::NotAnObject);
        };

        match fields.get(TIMESTAMP_FIELD) {
            Some(ts) if is_present(ts) => Ok(Self(fields)),
            _ => Err(ValidationError::MissingTimestamp),
        }
    }

    /// The entry's timestamp, exactly as submitted
    pub fn timestamp(&self) -> &Value {
        // from_value guarantees the key; deserialized entries may lack it
        self.0.get(TIMESTAMP_FIELD).unwrap_or(&Value::Null)
    }

    /// Look up a field by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// All fields in the entry
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for LogEntry {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<LogEntry> for Value {
    fn from(entry: LogEntry) -> Self {
        entry.into_value()
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
