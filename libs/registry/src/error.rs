use jobs_api::{SourceName, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown partition '{0}'")]
    UnknownPartition(String),

    #[error("partition '{partition}' unavailable: {error}")]
    PartitionUnavailable {
        partition: SourceName,
        error: StorageError,
    },

    #[error("record has no 'id'")]
    MissingId,

    #[error("record has no 'source'")]
    MissingSource,

    #[error("partition '{0}' configured more than once")]
    DuplicatePartition(SourceName),

    /// Some partitions failed during a cross-partition operation.
    /// The others kept their new state.
    #[error("partitions failed: {failed:?}")]
    PartialFailure { failed: Vec<SourceName> },
}

impl RegistryError {
    pub(crate) fn unavailable(partition: SourceName, error: StorageError) -> Self {
        RegistryError::PartitionUnavailable { partition, error }
    }
}
