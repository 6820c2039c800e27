//! Kuba Planner - partition-aware query planning and chunk aggregation
//!
//! This library provides the query-side core of a partitioned time-series
//! store:
//! - Materialization of logical query trees into physical execution trees
//!   spanning several partitions (clusters)
//! - Splitting of binary joins and set operations whose sides live on
//!   different partitions
//! - Fan-out of label and series-key metadata queries
//! - An aggregation framework with validated, column-bound aggregators
//!   whose merges are order independent

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Partition-aware query planning
/// Turns logical plans into execution trees routed across partitions
pub mod query;

/// Chunk aggregation framework
/// Provides the function registry, aggregators, and the partition executor
pub mod aggregation;

// Re-export main types
pub use config::PlannerConfig;
pub use error::{Error, Result};
pub use types::{ColumnType, PartitionKey, Projection, TimeRange};
