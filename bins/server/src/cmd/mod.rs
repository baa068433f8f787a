pub mod assign_coordinates;
pub mod serve;

use std::sync::Arc;

use job_registry::{CoordinateTable, Partition, Registry};
use jobs_api::PartitionStorage;
use storage_file::FileStorage;
use storage_memory::{MemoryStorage, MemoryStorageConfig};

use crate::config::{PartitionConfig, ServerConfig, StorageKind};
use crate::error::ServerError;

/// Build the registry from config: one storage per partition entry.
pub(crate) fn build_registry(config: &ServerConfig) -> Result<Registry, ServerError> {
    let mut partitions = Vec::new();
    for partition_cfg in config.effective_partitions() {
        let storage = build_storage(config, &partition_cfg)?;
        tracing::info!(
            partition = %partition_cfg.name,
            location = %storage.location(),
            "registered partition"
        );
        partitions.push(Partition::new(partition_cfg.name, storage));
    }
    Ok(Registry::new(partitions)?)
}

fn build_storage(
    config: &ServerConfig,
    partition_cfg: &PartitionConfig,
) -> Result<Arc<dyn PartitionStorage>, ServerError> {
    match partition_cfg.storage {
        StorageKind::File => {
            let path = partition_cfg.path.as_deref().ok_or_else(|| ServerError::Config {
                context: "partitions",
                detail: format!("file partition '{}' has no path", partition_cfg.name),
            })?;
            Ok(Arc::new(FileStorage::new(config.resolve_path(path))))
        }
        StorageKind::Memory => {
            let mem_cfg: MemoryStorageConfig = match &partition_cfg.storage_config {
                Some(v) => {
                    let json = serde_json::to_string(v).map_err(|e| ServerError::Config {
                        context: "partitions",
                        detail: format!("serialize memory config: {e}"),
                    })?;
                    serde_json::from_str(&json).map_err(|e| ServerError::Config {
                        context: "partitions",
                        detail: format!("parse memory config: {e}"),
                    })?
                }
                None => MemoryStorageConfig::default(),
            };
            Ok(Arc::new(MemoryStorage::from_config(mem_cfg)))
        }
    }
}

pub(crate) fn coordinate_table(config: &ServerConfig) -> CoordinateTable {
    CoordinateTable::builtin().with_entries(config.locations.iter().map(|(name, c)| (name.clone(), *c)))
}
