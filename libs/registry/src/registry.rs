use std::sync::{Arc, Mutex, PoisonError};

use jobs_api::{PartitionDocument, PartitionStorage, Record, SourceName};

use crate::coordinates::{BackfillReport, CoordinateTable};
use crate::error::RegistryError;
use crate::normalize::{denormalize, normalize};

// ═══════════════════════════════════════════════════════════════
//  Partition
// ═══════════════════════════════════════════════════════════════

/// One source and its storage.
///
/// Every mutation is a full read → modify → write cycle under `lock`,
/// so two calls in this process never interleave on the same partition.
/// Writers in other processes are not coordinated (last writer wins).
pub struct Partition {
    name: SourceName,
    storage: Arc<dyn PartitionStorage>,
    lock: Mutex<()>,
}

impl Partition {
    pub fn new(name: SourceName, storage: Arc<dyn PartitionStorage>) -> Self {
        Self {
            name,
            storage,
            lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> SourceName {
        self.name
    }

    pub fn location(&self) -> String {
        self.storage.location()
    }

    fn read(&self) -> Result<PartitionDocument, RegistryError> {
        self.storage
            .read()
            .map_err(|e| RegistryError::unavailable(self.name, e))
    }

    /// Read the document, let `f` edit its records, write it back if `f`
    /// returns `true`. Nothing is written unless the whole edit succeeded.
    fn modify<F>(&self, f: F) -> Result<bool, RegistryError>
    where
        F: FnOnce(&mut Vec<Record>) -> bool,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.read()?;
        if !f(&mut doc.jobs) {
            return Ok(false);
        }
        self.storage
            .write(&doc)
            .map_err(|e| RegistryError::unavailable(self.name, e))?;
        Ok(true)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An existing record with the same id was replaced in place.
    Replaced,
    /// No match; the record was appended.
    Inserted,
}

/// All partitions, addressed as one collection.
///
/// Holds no records between calls: every operation goes to storage.
pub struct Registry {
    partitions: Vec<Partition>,
}

impl Registry {
    /// Partitions are ordered by source, whatever order they are given in.
    pub fn new(mut partitions: Vec<Partition>) -> Result<Self, RegistryError> {
        partitions.sort_by_key(|p| p.name);
        if let Some(dup) = partitions.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(RegistryError::DuplicatePartition(dup[0].name));
        }
        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    fn partition(&self, name: SourceName) -> Result<&Partition, RegistryError> {
        self.partitions
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RegistryError::UnknownPartition(name.to_string()))
    }

    fn partition_by_str(&self, source: &str) -> Result<&Partition, RegistryError> {
        let name = source
            .parse::<SourceName>()
            .map_err(|_| RegistryError::UnknownPartition(source.to_string()))?;
        self.partition(name)
    }

    // ── Read ──

    /// Normalized records of one partition, in file order.
    pub fn load_partition(&self, name: SourceName) -> Result<Vec<Record>, RegistryError> {
        let partition = self.partition(name)?;
        let doc = partition.read()?;
        Ok(doc.jobs.into_iter().map(|r| normalize(r, name)).collect())
    }

    /// Aggregated view: every partition in source order, then file order.
    ///
    /// A partition that cannot be read is logged and contributes nothing;
    /// the others are still returned.
    pub fn load_all(&self) -> Vec<Record> {
        let mut all = Vec::new();
        for partition in &self.partitions {
            match self.load_partition(partition.name) {
                Ok(records) => all.extend(records),
                Err(e) => {
                    tracing::warn!(
                        partition = %partition.name,
                        location = %partition.location(),
                        error = %e,
                        "skipping unavailable partition"
                    );
                }
            }
        }
        all
    }

    // ── Write ──

    /// Insert `record` into the partition named by its `source`, replacing
    /// the record with the same id in place if there is one.
    pub fn upsert(&self, record: &Record) -> Result<UpsertOutcome, RegistryError> {
        let (name, stored) = denormalize(record)?;
        let id = stored.identity().ok_or(RegistryError::MissingId)?;
        let partition = self.partition(name)?;

        let mut outcome = UpsertOutcome::Inserted;
        partition.modify(|jobs| {
            match jobs.iter_mut().find(|existing| existing.matches_id(&id)) {
                Some(slot) => {
                    *slot = stored;
                    outcome = UpsertOutcome::Replaced;
                }
                None => jobs.push(stored),
            }
            true
        })?;

        tracing::info!(partition = %name, id = %id, outcome = ?outcome, "job saved");
        Ok(outcome)
    }

    /// Remove every record with this id. Returns how many were removed;
    /// zero is still a success.
    pub fn delete(&self, id: &str, source: &str) -> Result<usize, RegistryError> {
        let partition = self.partition_by_str(source)?;

        let mut removed = 0;
        partition.modify(|jobs| {
            let before = jobs.len();
            jobs.retain(|r| !r.matches_id(id));
            removed = before - jobs.len();
            true
        })?;

        tracing::info!(partition = %partition.name, id = %id, removed, "job deleted");
        Ok(removed)
    }

    /// Set `active` on the first record with this id. Returns whether a
    /// record was found; not finding one is still a success.
    pub fn toggle_one(&self, id: &str, source: &str, active: bool) -> Result<bool, RegistryError> {
        let partition = self.partition_by_str(source)?;

        let mut found = false;
        partition.modify(|jobs| {
            if let Some(record) = jobs.iter_mut().find(|r| r.matches_id(id)) {
                record.set_active(active);
                found = true;
            }
            true
        })?;

        tracing::info!(partition = %partition.name, id = %id, active, found, "job toggled");
        Ok(found)
    }

    /// Set `active` on every record of every partition.
    ///
    /// Not atomic across partitions: a failing partition is reported in
    /// `PartialFailure` but does not stop the rest, and partitions already
    /// written keep their new state.
    pub fn toggle_all(&self, active: bool) -> Result<usize, RegistryError> {
        let mut updated = 0;
        let mut failed = Vec::new();

        for partition in &self.partitions {
            let mut count = 0;
            let result = partition.modify(|jobs| {
                for record in jobs.iter_mut() {
                    record.set_active(active);
                }
                count = jobs.len();
                true
            });
            match result {
                Ok(_) => updated += count,
                Err(e) => {
                    tracing::error!(partition = %partition.name, error = %e, "toggle all failed");
                    failed.push(partition.name);
                }
            }
        }

        tracing::info!(active, updated, failed = failed.len(), "toggled all jobs");
        if failed.is_empty() {
            Ok(updated)
        } else {
            Err(RegistryError::PartialFailure { failed })
        }
    }

    // ── Maintenance ──

    /// Fill in coordinates for every stored record that has none.
    ///
    /// Works on stored records (no `active` default, no `source` tag).
    /// Only partitions where something changed are rewritten.
    pub fn assign_coordinates(&self, table: &CoordinateTable) -> BackfillReport {
        let mut report = BackfillReport::default();

        for partition in &self.partitions {
            let mut changed = 0;
            let result = partition.modify(|jobs| {
                changed = table.backfill_all(jobs);
                changed > 0
            });
            match result {
                Ok(true) => {
                    report.files_updated += 1;
                    report.jobs_updated += changed;
                    tracing::info!(
                        partition = %partition.name,
                        location = %partition.location(),
                        jobs = changed,
                        "partition updated with coordinates"
                    );
                }
                Ok(false) => {
                    tracing::debug!(partition = %partition.name, "coordinates already complete");
                }
                Err(e) => {
                    tracing::error!(partition = %partition.name, error = %e, "coordinate backfill failed");
                    report.unavailable.push(partition.name);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobs_api::StorageError;

    struct Unreadable;

    impl PartitionStorage for Unreadable {
        fn read(&self) -> Result<PartitionDocument, StorageError> {
            Err(StorageError::io("disk on fire"))
        }

        fn write(&self, _doc: &PartitionDocument) -> Result<(), StorageError> {
            Err(StorageError::io("disk on fire"))
        }

        fn location(&self) -> String {
            "nowhere".to_string()
        }
    }

    #[test]
    fn partitions_are_sorted_by_source() {
        let registry = Registry::new(vec![
            Partition::new(SourceName::Lease, Arc::new(Unreadable)),
            Partition::new(SourceName::Heartland, Arc::new(Unreadable)),
        ])
        .unwrap();
        let names: Vec<SourceName> = registry.partitions().iter().map(Partition::name).collect();
        assert_eq!(names, [SourceName::Heartland, SourceName::Lease]);
    }

    #[test]
    fn duplicate_partitions_are_rejected() {
        let result = Registry::new(vec![
            Partition::new(SourceName::Lease, Arc::new(Unreadable)),
            Partition::new(SourceName::Lease, Arc::new(Unreadable)),
        ]);
        assert!(matches!(result, Err(RegistryError::DuplicatePartition(SourceName::Lease))));
    }

    #[test]
    fn unconfigured_source_is_unknown() {
        let registry = Registry::new(vec![Partition::new(SourceName::Heartland, Arc::new(Unreadable))]).unwrap();
        assert!(matches!(
            registry.delete("1", "lease"),
            Err(RegistryError::UnknownPartition(s)) if s == "lease"
        ));
        assert!(matches!(
            registry.toggle_one("1", "craigslist", true),
            Err(RegistryError::UnknownPartition(_))
        ));
    }

    #[test]
    fn unreadable_partition_fails_mutations() {
        let registry = Registry::new(vec![Partition::new(SourceName::Heartland, Arc::new(Unreadable))]).unwrap();
        let err = registry.delete("1", "heartland").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::PartitionUnavailable { partition: SourceName::Heartland, .. }
        ));
        assert!(registry.load_all().is_empty());
    }
}
