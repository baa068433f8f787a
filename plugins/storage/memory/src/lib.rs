use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use jobs_api::{PartitionDocument, PartitionStorage, Record, StorageError};

// ═══════════════════════════════════════════════════════════════
//  MemoryStorageConfig
// ═══════════════════════════════════════════════════════════════

/// Config for `storage = "memory"` partitions.
#[derive(Debug, Default, serde::Deserialize)]
pub struct MemoryStorageConfig {
    /// Initial records.
    #[serde(default)]
    pub jobs: Vec<Record>,
    /// Reject every write.
    #[serde(default)]
    pub read_only: bool,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStorage
// ═══════════════════════════════════════════════════════════════

/// In-process partition. Nothing survives a restart; used for
/// demo configs and for exercising the registry without a disk.
pub struct MemoryStorage {
    doc: RwLock<Option<PartitionDocument>>,
    read_only: AtomicBool,
}

impl MemoryStorage {
    pub fn new(doc: PartitionDocument) -> Self {
        Self {
            doc: RwLock::new(Some(doc)),
            read_only: AtomicBool::new(false),
        }
    }

    pub fn with_jobs(jobs: Vec<Record>) -> Self {
        Self::new(PartitionDocument::new(jobs))
    }

    /// Storage with no document at all: every read is `NotFound`.
    pub fn missing() -> Self {
        Self {
            doc: RwLock::new(None),
            read_only: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: MemoryStorageConfig) -> Self {
        let storage = Self::with_jobs(config.jobs);
        storage.set_read_only(config.read_only);
        storage
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Current document, if any.
    pub fn snapshot(&self) -> Option<PartitionDocument> {
        self.doc.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PartitionStorage for MemoryStorage {
    fn read(&self) -> Result<PartitionDocument, StorageError> {
        self.snapshot()
            .ok_or_else(|| StorageError::not_found("memory partition has no document"))
    }

    fn write(&self, doc: &PartitionDocument) -> Result<(), StorageError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::read_only("memory partition is read-only"));
        }
        *self.doc.write().unwrap_or_else(PoisonError::into_inner) = Some(doc.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobs_api::ErrorKind;

    #[test]
    fn missing_document_reads_as_not_found() {
        let storage = MemoryStorage::missing();
        assert_eq!(storage.read().unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn read_only_rejects_writes_and_keeps_document() {
        let storage = MemoryStorage::with_jobs(vec![Record::new().with("id", 1)]);
        storage.set_read_only(true);

        let err = storage.write(&PartitionDocument::new(Vec::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadOnly);
        assert_eq!(storage.read().unwrap().jobs.len(), 1);
    }

    #[test]
    fn config_seeds_jobs() {
        let config: MemoryStorageConfig =
            serde_json::from_str(r#"{"jobs": [{"id": "a1", "title": "Flatbed"}], "read_only": true}"#).unwrap();
        let storage = MemoryStorage::from_config(config);
        let doc = storage.read().unwrap();
        assert!(doc.jobs[0].matches_id("a1"));
        assert!(storage.write(&doc).is_err());
    }
}
