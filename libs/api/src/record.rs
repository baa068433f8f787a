use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

pub const ID_KEY: &str = "id";
pub const ACTIVE_KEY: &str = "active";
pub const SOURCE_KEY: &str = "source";
pub const LOCATION_KEY: &str = "location";
pub const COORDINATES_KEY: &str = "coordinates";
pub const LATITUDE_KEY: &str = "latitude";
pub const LONGITUDE_KEY: &str = "longitude";

// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// One job posting: a JSON object with a few managed keys
/// (`id`, `active`, `source`, `location`, coordinates).
///
/// Every other key is opaque and passes through load → mutate → save
/// unchanged, in its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a field. Replacing keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove a field, keeping the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value.into());
        self
    }

    // ── Managed keys ──

    pub fn id(&self) -> Option<&Value> {
        self.0.get(ID_KEY)
    }

    /// String form of `id`, the value records are compared by.
    /// `None` when the record has no `id` key.
    pub fn identity(&self) -> Option<String> {
        self.id().map(identity_of)
    }

    /// True iff the record has an `id` whose string form equals `id`.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id().is_some_and(|v| identity_of(v) == id)
    }

    /// Explicit `active` flag, if the key holds a boolean.
    pub fn active(&self) -> Option<bool> {
        self.0.get(ACTIVE_KEY).and_then(Value::as_bool)
    }

    pub fn set_active(&mut self, active: bool) {
        self.0.insert(ACTIVE_KEY.to_string(), Value::Bool(active));
    }

    pub fn source(&self) -> Option<&Value> {
        self.0.get(SOURCE_KEY)
    }

    pub fn location(&self) -> Option<&str> {
        self.0.get(LOCATION_KEY).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = StorageError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(StorageError::format_err(format!(
                "job record must be an object, got {}",
                value_type(&other)
            ))),
        }
    }
}

/// Render an `id` value the way the admin tool has always compared ids:
/// strings verbatim, numbers as their JSON text, booleans as `True`/`False`,
/// null as `None`.
pub fn identity_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_compares_string_forms() {
        let numeric = Record::new().with("id", 5);
        let textual = Record::new().with("id", "5");
        assert_eq!(numeric.identity().as_deref(), Some("5"));
        assert!(numeric.matches_id("5"));
        assert!(textual.matches_id("5"));
        assert!(!numeric.matches_id("05"));
    }

    #[test]
    fn identity_of_non_string_values() {
        assert_eq!(identity_of(&json!(5.5)), "5.5");
        assert_eq!(identity_of(&json!(true)), "True");
        assert_eq!(identity_of(&json!(null)), "None");
    }

    #[test]
    fn record_without_id_matches_nothing() {
        let r = Record::new().with("title", "Driver");
        assert_eq!(r.identity(), None);
        assert!(!r.matches_id(""));
    }

    #[test]
    fn remove_keeps_field_order() {
        let mut r = Record::new()
            .with("id", 1)
            .with("source", "heartland")
            .with("title", "Driver");
        r.remove("source");
        let keys: Vec<&str> = r.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, ["id", "title"]);
    }

    #[test]
    fn non_object_is_not_a_record() {
        let err = Record::try_from(json!([1, 2])).unwrap_err();
        assert!(err.message().contains("array"));
    }
}
