pub mod error;
pub mod record;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use error::{ErrorKind, StorageError};
pub use record::{Record, identity_of};

// ════════════════════════════════════════════════════════════════
//  Source names
// ════════════════════════════════════════════════════════════════

/// Fixed set of job sources. Each one owns exactly one partition.
///
/// Declaration order is the order of the aggregated view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceName {
    Heartland,
    Montgomery,
    Lease,
}

impl SourceName {
    pub const ALL: [SourceName; 3] = [SourceName::Heartland, SourceName::Montgomery, SourceName::Lease];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::Heartland => "heartland",
            SourceName::Montgomery => "montgomery",
            SourceName::Lease => "lease",
        }
    }

    /// File name the original data set uses for this source.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            SourceName::Heartland => "heartland_jobs_updated.json",
            SourceName::Montgomery => "montgomery_flatbed_jobs_updated.json",
            SourceName::Lease => "lease_purchase_job.json",
        }
    }
}

impl std::fmt::Display for SourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown source '{s}'"))
    }
}

// ════════════════════════════════════════════════════════════════
//  Coordinates
// ════════════════════════════════════════════════════════════════

/// Geographic point as stored under a record's `coordinates` key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("lat".to_string(), Value::from(self.lat));
        obj.insert("lng".to_string(), Value::from(self.lng));
        Value::Object(obj)
    }
}

// ════════════════════════════════════════════════════════════════
//  Partition document
// ════════════════════════════════════════════════════════════════

pub const JOBS_KEY: &str = "jobs";

/// Full content of one partition: the `jobs` list plus every sibling key.
///
/// Sibling keys keep their values and their position in the object, so a
/// read → write cycle only changes what was changed in `jobs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionDocument {
    /// Top-level object. The `jobs` slot, if present, holds a null
    /// placeholder while the list lives in `jobs`.
    fields: Map<String, Value>,
    pub jobs: Vec<Record>,
}

impl PartitionDocument {
    pub fn new(jobs: Vec<Record>) -> Self {
        Self { fields: Map::new(), jobs }
    }

    /// Split a parsed JSON document into metadata and records.
    pub fn from_value(value: Value) -> Result<Self, StorageError> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(StorageError::format_err(format!(
                    "partition document must be an object, got {}",
                    record::value_type(&other)
                )));
            }
        };

        let jobs = match fields.get_mut(JOBS_KEY).map(Value::take) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Record::try_from(item).map_err(|e| e.with_context(format!("jobs[{i}]"))))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(StorageError::format_err(format!(
                    "'jobs' must be an array, got {}",
                    record::value_type(&other)
                )));
            }
        };

        Ok(Self { fields, jobs })
    }

    /// Reassemble the document. `jobs` goes back into its original slot,
    /// or at the end if the source document had none.
    pub fn to_value(&self) -> Value {
        let mut fields = self.fields.clone();
        let jobs = self.jobs.iter().cloned().map(Value::from).collect();
        fields.insert(JOBS_KEY.to_string(), Value::Array(jobs));
        Value::Object(fields)
    }
}

// ════════════════════════════════════════════════════════════════
//  Storage trait
// ════════════════════════════════════════════════════════════════

/// Backing store of one partition.
///
/// Calls are blocking and whole-document: `read` returns everything,
/// `write` replaces everything. Implementations must either persist the
/// full document or leave the previous one in place.
pub trait PartitionStorage: Send + Sync {
    /// Load the current document.
    fn read(&self) -> Result<PartitionDocument, StorageError>;

    /// Replace the stored document.
    fn write(&self, doc: &PartitionDocument) -> Result<(), StorageError>;

    /// Human-readable location for logs (file path, `memory`, ...).
    fn location(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_names_parse_and_display() {
        for name in SourceName::ALL {
            assert_eq!(name.as_str().parse::<SourceName>(), Ok(name));
        }
        assert!("indeed".parse::<SourceName>().is_err());
        assert_eq!(SourceName::Lease.to_string(), "lease");
    }

    #[test]
    fn document_keeps_metadata_and_key_order() {
        let raw = json!({
            "scraped_at": "2024-03-01",
            "jobs": [{"id": 1, "title": "Driver"}],
            "total": 1
        });
        let mut doc = PartitionDocument::from_value(raw).unwrap();
        assert_eq!(doc.jobs.len(), 1);

        doc.jobs.push(Record::new().with("id", 2));
        let out = doc.to_value();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["scraped_at", "jobs", "total"]);
        assert_eq!(out["jobs"][1]["id"], json!(2));
        assert_eq!(out["scraped_at"], json!("2024-03-01"));
        assert_eq!(out["total"], json!(1));
    }

    #[test]
    fn missing_jobs_reads_as_empty_and_is_appended() {
        let doc = PartitionDocument::from_value(json!({"company": "Heartland"})).unwrap();
        assert!(doc.jobs.is_empty());
        let out = doc.to_value();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["company", "jobs"]);
    }

    #[test]
    fn malformed_documents_are_format_errors() {
        for raw in [json!([]), json!({"jobs": {}}), json!({"jobs": [1]})] {
            let err = PartitionDocument::from_value(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    #[test]
    fn coordinates_serialize_as_lat_lng() {
        let c = Coordinates::new(39.8283, -98.5795);
        assert_eq!(c.to_value(), json!({"lat": 39.8283, "lng": -98.5795}));
    }
}
