//! Configuration management for the partition planner
//!
//! Configuration is read from TOML with environment variable overrides and
//! sensible defaults.
//!
//! ```toml
//! [dataset]
//! name = "prometheus"
//! metric_column = "_metric_"
//! default_partition = "east"
//!
//! [partitions.east]
//!
//! [partitions.west]
//! endpoint = "http://west-query:8080"
//!
//! [partitions.west-replica]
//! alias_of = "west"
//!
//! [routing]
//! fallback_partition = "east"
//!
//! [routing.rules]
//! cpu_usage = "west"
//!
//! [routing.prefixes]
//! "http_" = "west"
//!
//! [aggregation]
//! scan_mode = "streaming"
//! max_concurrent_partitions = 16
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregation::source::ScanMode;
use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Dataset settings
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Partition name → partition settings
    #[serde(default = "default_partitions")]
    pub partitions: BTreeMap<String, PartitionConfig>,

    /// Metric routing rules
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Chunk aggregation settings
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

/// Dataset configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Dataset name
    #[serde(default = "default_dataset_name")]
    pub name: String,

    /// Column holding the metric name
    #[serde(default = "default_metric_column")]
    pub metric_column: String,

    /// Partition answering cardinality queries
    #[serde(default = "default_partition_name")]
    pub default_partition: String,
}

/// Settings of one partition (cluster)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartitionConfig {
    /// Query endpoint of a remote cluster; absent for the local partition
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Share the planner of another partition
    #[serde(default)]
    pub alias_of: Option<String>,
}

/// Metric routing configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Exact metric name → partition
    #[serde(default)]
    pub rules: BTreeMap<String, String>,

    /// Metric name prefix → partition
    #[serde(default)]
    pub prefixes: BTreeMap<String, String>,

    /// Partition for unmatched metrics (defaults to the dataset default partition)
    #[serde(default)]
    pub fallback_partition: Option<String>,
}

/// Chunk aggregation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregationConfig {
    /// Bulk or streaming chunk reads
    #[serde(default)]
    pub scan_mode: ScanMode,

    /// Partitions scanned concurrently per query
    #[serde(default = "default_max_concurrent_partitions")]
    pub max_concurrent_partitions: usize,

    /// Skip failed partitions instead of failing the query
    #[serde(default)]
    pub allow_partial_results: bool,
}

// Default value functions
fn default_dataset_name() -> String { "prometheus".to_string() }
fn default_metric_column() -> String { "_metric_".to_string() }
fn default_partition_name() -> String { "local".to_string() }
fn default_partitions() -> BTreeMap<String, PartitionConfig> {
    let mut partitions = BTreeMap::new();
    partitions.insert(default_partition_name(), PartitionConfig::default());
    partitions
}
fn default_max_concurrent_partitions() -> usize { 8 }

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            partitions: default_partitions(),
            routing: RoutingConfig::default(),
            aggregation: AggregationConfig::default(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: default_dataset_name(),
            metric_column: default_metric_column(),
            default_partition: default_partition_name(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::default(),
            max_concurrent_partitions: default_max_concurrent_partitions(),
            allow_partial_results: false,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| Error::Configuration(format!("{}: {}", path, e)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(partition) = std::env::var("PLANNER_DEFAULT_PARTITION") {
            self.dataset.default_partition = partition;
        }
        if let Ok(column) = std::env::var("PLANNER_METRIC_COLUMN") {
            self.dataset.metric_column = column;
        }
        if let Ok(mode) = std::env::var("PLANNER_SCAN_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "bulk" => self.aggregation.scan_mode = ScanMode::Bulk,
                "streaming" => self.aggregation.scan_mode = ScanMode::Streaming,
                _ => {},
            }
        }
        if let Ok(limit) = std::env::var("PLANNER_MAX_CONCURRENT_PARTITIONS") {
            if let Ok(n) = limit.parse() {
                self.aggregation.max_concurrent_partitions = n;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Configuration(msg));

        if self.dataset.metric_column.is_empty() {
            return invalid("Metric column cannot be empty".to_string());
        }
        if self.partitions.is_empty() {
            return invalid("At least one partition must be configured".to_string());
        }
        if !self.partitions.contains_key(&self.dataset.default_partition) {
            return invalid(format!(
                "Default partition '{}' is not configured",
                self.dataset.default_partition
            ));
        }

        for (name, partition) in &self.partitions {
            if let Some(target) = &partition.alias_of {
                if partition.endpoint.is_some() {
                    return invalid(format!(
                        "Partition '{}' cannot set both endpoint and alias_of",
                        name
                    ));
                }
                match self.partitions.get(target) {
                    Some(t) if t.alias_of.is_none() => {},
                    Some(_) => {
                        return invalid(format!(
                            "Partition '{}' aliases '{}', which is itself an alias",
                            name, target
                        ))
                    },
                    None => {
                        return invalid(format!(
                            "Partition '{}' aliases unknown partition '{}'",
                            name, target
                        ))
                    },
                }
            }
        }

        let targets = self
            .routing
            .rules
            .values()
            .chain(self.routing.prefixes.values())
            .chain(self.routing.fallback_partition.iter());
        for target in targets {
            if !self.partitions.contains_key(target) {
                return invalid(format!("Routing targets unknown partition '{}'", target));
            }
        }

        if self.aggregation.max_concurrent_partitions == 0 {
            return invalid("Max concurrent partitions must be > 0".to_string());
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
