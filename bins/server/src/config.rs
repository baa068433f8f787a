use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use jobs_api::{Coordinates, SourceName};

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "job-admin", about = "Admin service for job postings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP admin API
    Serve(ConfigArgs),
    /// Fill in missing coordinates in every partition, then exit
    AssignCoordinates(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Path to TOML config file
    #[arg(long, default_value = "job-admin.toml", env = "JOB_ADMIN_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base directory for relative partition paths.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Empty means the three standard files under `data_dir`.
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,
    /// Extra location name → coordinates entries for the backfill.
    #[serde(default)]
    pub locations: BTreeMap<String, Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartitionConfig {
    pub name: SourceName,
    #[serde(default)]
    pub storage: StorageKind,
    /// JSON file, relative to `data_dir` unless absolute. Required for `file`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Backend-specific settings (`memory`: `jobs`, `read_only`).
    #[serde(default)]
    pub storage_config: Option<toml::Value>,
}

fn default_api_port() -> u16 {
    8080
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| e.with_detail_prefix(&format!("'{path}'")))
    }

    pub fn parse(toml_str: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        for p in &self.partitions {
            if p.storage == StorageKind::File && p.path.is_none() {
                return Err(ServerError::Config {
                    context: "partitions",
                    detail: format!("file partition '{}' has no path", p.name),
                });
            }
        }
        Ok(())
    }

    /// Configured partitions, or the standard file layout if none are listed.
    pub fn effective_partitions(&self) -> Vec<PartitionConfig> {
        if !self.partitions.is_empty() {
            return self.partitions.clone();
        }
        SourceName::ALL
            .into_iter()
            .map(|name| PartitionConfig {
                name,
                storage: StorageKind::File,
                path: Some(PathBuf::from(name.default_file_name())),
                storage_config: None,
            })
            .collect()
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.bind, "0.0.0.0");

        let partitions = config.effective_partitions();
        let names: Vec<SourceName> = partitions.iter().map(|p| p.name).collect();
        assert_eq!(names, SourceName::ALL);
        assert_eq!(
            config.resolve_path(partitions[1].path.as_deref().unwrap()),
            PathBuf::from("data/montgomery_flatbed_jobs_updated.json")
        );
    }

    #[test]
    fn full_config_parses() {
        let config = ServerConfig::parse(
            r#"
            api_port = 9300
            data_dir = "/srv/jobs"

            [[partitions]]
            name = "heartland"
            path = "heartland.json"

            [[partitions]]
            name = "lease"
            storage = "memory"
            storage_config = { read_only = true }

            [locations]
            "Dallas, TX" = { lat = 32.7767, lng = -96.797 }
            "#,
        )
        .unwrap();

        assert_eq!(config.api_port, 9300);
        assert_eq!(config.partitions.len(), 2);
        assert_eq!(config.partitions[1].storage, StorageKind::Memory);
        assert_eq!(
            config.resolve_path(config.partitions[0].path.as_deref().unwrap()),
            PathBuf::from("/srv/jobs/heartland.json")
        );
        assert_eq!(config.locations["Dallas, TX"], Coordinates::new(32.7767, -96.797));
    }

    #[test]
    fn file_partition_requires_path() {
        let err = ServerConfig::parse("[[partitions]]\nname = \"heartland\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "partitions", .. }));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let err = ServerConfig::parse("[[partitions]]\nname = \"indeed\"\npath = \"x.json\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config { context: "parse", .. }));
    }
}
