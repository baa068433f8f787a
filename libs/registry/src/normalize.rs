//! Conversion between stored records and records in the aggregated view.
//!
//! Stored form: exactly what the partition file holds.
//! View form: stored form plus `active` (defaulted to `true` when absent)
//! and a transient `source` tag naming the owning partition.

use serde_json::Value;

use jobs_api::record::{ACTIVE_KEY, SOURCE_KEY};
use jobs_api::{Record, SourceName};

use crate::error::RegistryError;

/// Stored record → view record.
pub fn normalize(mut record: Record, source: SourceName) -> Record {
    if !record.contains_key(ACTIVE_KEY) {
        record.set_active(true);
    }
    record.insert(SOURCE_KEY, Value::String(source.as_str().to_string()));
    record
}

/// View record → owning partition + stored record.
///
/// The caller's record is left untouched; the returned copy has no `source`.
pub fn denormalize(record: &Record) -> Result<(SourceName, Record), RegistryError> {
    let source = match record.source() {
        None | Some(Value::Null) => return Err(RegistryError::MissingSource),
        Some(Value::String(s)) => s
            .parse::<SourceName>()
            .map_err(|_| RegistryError::UnknownPartition(s.clone()))?,
        Some(other) => return Err(RegistryError::UnknownPartition(other.to_string())),
    };

    let mut stored = record.clone();
    stored.remove(SOURCE_KEY);
    Ok((source, stored))
}
