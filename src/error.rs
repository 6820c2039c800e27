//! Error types for the planner and aggregation engine

use thiserror::Error;

use crate::aggregation::error::{AggregationError, ValidationError};
use crate::query::error::QueryError;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Query planning error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Aggregation argument validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Aggregation error
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Chunk storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by chunk storage collaborators
///
/// The core never retries these; a failed read fails the partition it belongs to.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Partition does not exist in the source
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// Requested column position is not stored for the partition
    #[error("Column {column} not available in partition {partition}")]
    ColumnNotFound {
        /// Partition key
        partition: String,
        /// Requested column index
        column: usize,
    },

    /// Chunk data could not be decoded
    #[error("Corrupted chunk: {0}")]
    CorruptedChunk(String),

    /// Network or persistence failure reported by the storage engine
    #[error("Read failed: {0}")]
    ReadFailed(String),
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;
