//! Configuration types for journal-migrate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use crate::stores::{DocumentApiConfig, RestTargetConfig};

/// Main pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source (document) store.
    pub source: SourceStoreConfig,
    /// Target (REST) store.
    pub target: TargetStoreConfig,
    /// Run options.
    #[serde(default)]
    pub options: PipelineOptions,
}

/// Source store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceStoreConfig {
    /// Document store reached through its Data API.
    #[serde(rename = "document_api")]
    DocumentApi(DocumentApiConfig),
    /// In-process store, optionally seeded from a JSON export.
    #[serde(rename = "memory")]
    Memory(MemorySourceConfig),
}

/// In-memory source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySourceConfig {
    /// JSON file mapping collection names to document arrays.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

/// Target store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TargetStoreConfig {
    /// REST resource API.
    #[serde(rename = "rest")]
    Rest(RestTargetConfig),
    /// In-process store (dry runs).
    #[serde(rename = "memory")]
    Memory(MemoryTargetConfig),
}

/// In-memory target configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTargetConfig {}

/// Options shared by the three engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Records per batch for migration and rollback.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Only process records of this owner.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Source records fetched per entity type during validation.
    #[serde(default = "default_item_limit")]
    pub item_limit: usize,
    /// Records compared per entity type during validation.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Limit for a single store call, in seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    /// Check each record survives the reverse transform before writing it.
    #[serde(default = "default_true")]
    pub verify_round_trip: bool,
    /// Delete target records after rolling them back.
    #[serde(default)]
    pub delete_from_target: bool,
    /// Retry policy for store reads.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            owner_id: None,
            item_limit: default_item_limit(),
            sample_size: default_sample_size(),
            store_timeout_secs: default_store_timeout_secs(),
            verify_round_trip: true,
            delete_from_target: false,
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineOptions {
    /// Limit for a single store call.
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn default_batch_size() -> usize {
    crate::batch::DEFAULT_BATCH_SIZE
}

fn default_item_limit() -> usize {
    100
}

fn default_sample_size() -> usize {
    20
}

fn default_store_timeout_secs() -> u64 {
    crate::context::DEFAULT_STORE_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// A configuration with in-memory stores on both sides.
    #[must_use]
    pub fn in_memory(seed_file: Option<PathBuf>) -> Self {
        Self {
            source: SourceStoreConfig::Memory(MemorySourceConfig { seed_file }),
            target: TargetStoreConfig::Memory(MemoryTargetConfig::default()),
            options: PipelineOptions::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let options = &self.options;
        if options.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".to_string()));
        }
        if options.sample_size == 0 {
            return Err(Error::Config("sample_size must be greater than 0".to_string()));
        }
        if options.item_limit == 0 {
            return Err(Error::Config("item_limit must be greater than 0".to_string()));
        }
        if options.store_timeout_secs == 0 {
            return Err(Error::Config(
                "store_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let SourceStoreConfig::DocumentApi(cfg) = &self.source {
            if cfg.database.is_empty() {
                return Err(Error::Config("database name cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_options_defaults() {
        let options = PipelineOptions::default();
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.item_limit, 100);
        assert_eq!(options.sample_size, 20);
        assert_eq!(options.store_timeout(), Duration::from_secs(30));
        assert!(options.verify_round_trip);
        assert!(!options.delete_from_target);
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
source:
  type: document_api
  data_api_url: https://data.example.com/app/x/endpoint/data/v1
  api_key: key
  database: journal
target:
  type: rest
  base_url: https://api.example.com/v1
  api_token: token
options:
  batch_size: 25
  owner_id: user-1
  retry:
    max_retries: 1
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();

        let SourceStoreConfig::DocumentApi(source) = &config.source else {
            panic!("expected document_api source");
        };
        assert_eq!(source.data_source, "mongodb-atlas");
        assert!(matches!(config.target, TargetStoreConfig::Rest(_)));
        assert_eq!(config.options.batch_size, 25);
        assert_eq!(config.options.owner_id.as_deref(), Some("user-1"));
        assert_eq!(config.options.sample_size, 20);
        assert_eq!(config.options.retry.max_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_batch_size() {
        let mut config = PipelineConfig::in_memory(None);
        config.options.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source:\n  type: memory\n  seed_file: seed.json\ntarget:\n  type: memory\n"
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();

        let SourceStoreConfig::Memory(source) = &config.source else {
            panic!("expected memory source");
        };
        assert_eq!(source.seed_file.as_deref(), Some(Path::new("seed.json")));
        assert_eq!(config.options.batch_size, 50);
    }

    #[test]
    fn test_config_unknown_store_type() {
        let yaml = "source:\n  type: firestore\ntarget:\n  type: memory\n";
        assert!(serde_yaml::from_str::<PipelineConfig>(yaml).is_err());
    }
}
