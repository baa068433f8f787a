//! Coordinate backfill for records that have no position yet.

use std::collections::HashMap;

use serde_json::Value;

use jobs_api::record::{COORDINATES_KEY, LATITUDE_KEY, LONGITUDE_KEY};
use jobs_api::{Coordinates, Record, SourceName};

/// Center of the contiguous US. Assigned to every record whose location
/// is missing or not in the table.
pub const FALLBACK: Coordinates = Coordinates::new(39.8283, -98.5795);

const BUILTIN: &[(&str, Coordinates)] = &[
    // Regions
    ("Nationwide", FALLBACK),
    ("Eastern US", Coordinates::new(39.0119, -77.3585)),
    ("Western US", Coordinates::new(40.7608, -111.8910)),
    ("Southeast", Coordinates::new(33.7490, -84.3880)),
    ("Southern California", Coordinates::new(34.0522, -118.2437)),
    ("Central & Eastern US", Coordinates::new(39.9612, -82.9988)),
    ("Peninsular Florida", Coordinates::new(28.5383, -81.3792)),
    ("Texas & Louisiana Gulf Coast", Coordinates::new(29.7604, -95.3698)),
    ("Western & Northern US", Coordinates::new(44.9778, -93.2650)),
    // Cities
    ("Atlanta, GA", Coordinates::new(33.7490, -84.3880)),
    ("Columbus, GA", Coordinates::new(32.4610, -84.9877)),
    ("Nashville, TN", Coordinates::new(36.1627, -86.7816)),
    ("Los Angeles, CA", Coordinates::new(34.0522, -118.2437)),
];

// ════════════════════════════════════════════════════════════════
//  CoordinateTable
// ════════════════════════════════════════════════════════════════

/// Exact-match location name → coordinates, with an unconditional fallback.
#[derive(Debug, Clone)]
pub struct CoordinateTable {
    entries: HashMap<String, Coordinates>,
}

impl Default for CoordinateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CoordinateTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(name, coords)| (name.to_string(), *coords))
                .collect(),
        }
    }

    /// Add or override entries.
    pub fn with_entries(mut self, extra: impl IntoIterator<Item = (String, Coordinates)>) -> Self {
        self.entries.extend(extra);
        self
    }

    pub fn lookup(&self, location: &str) -> Option<Coordinates> {
        self.entries.get(location).copied()
    }

    /// Table entry for `location`, or [`FALLBACK`]. Never fails.
    pub fn resolve(&self, location: Option<&str>) -> Coordinates {
        location.and_then(|l| self.lookup(l)).unwrap_or(FALLBACK)
    }

    /// Give `record` a `coordinates` object if it has no position.
    /// Returns whether the record changed.
    pub fn backfill(&self, record: &mut Record) -> bool {
        if has_coordinates(record) {
            return false;
        }
        let coords = self.resolve(record.location());
        record.insert(COORDINATES_KEY, coords.to_value());
        true
    }

    /// Backfill every record; returns how many changed.
    pub fn backfill_all(&self, records: &mut [Record]) -> usize {
        records.iter_mut().map(|r| self.backfill(r)).filter(|changed| *changed).count()
    }
}

/// A record has a position if it carries a non-empty `latitude` and
/// `longitude` pair, or a non-empty `coordinates` value.
pub fn has_coordinates(record: &Record) -> bool {
    let pair = record.get(LATITUDE_KEY).is_some_and(truthy) && record.get(LONGITUDE_KEY).is_some_and(truthy);
    pair || record.get(COORDINATES_KEY).is_some_and(truthy)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ════════════════════════════════════════════════════════════════
//  Report
// ════════════════════════════════════════════════════════════════

/// Outcome of a backfill pass over all partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Partitions rewritten because at least one record changed.
    pub files_updated: usize,
    /// Records that received coordinates.
    pub jobs_updated: usize,
    /// Partitions skipped because they could not be read or written.
    pub unavailable: Vec<SourceName>,
}
