//! Core data types shared by the planner and the aggregation engine
//!
//! # Key Types
//!
//! - **`TimeRange`**: Inclusive millisecond window used by logical plans and chunk scans
//! - **`ColumnType`**: Physical type of a dataset column
//! - **`ColumnInfo`** / **`Projection`**: Column catalog view (name, type, index)
//! - **`PartitionKey`**: Identifier of a time-series partition (storage sense)
//!
//! # Example
//!
//! ```rust
//! use kuba_planner::types::{ColumnType, Projection, TimeRange};
//!
//! let projection = Projection::new(vec![
//!     ("ts", ColumnType::Timestamp),
//!     ("val", ColumnType::Double),
//! ]);
//! assert_eq!(projection.column("val").map(|c| c.index), Some(1));
//!
//! let range = TimeRange::new(1000, 2000).unwrap();
//! assert!(range.contains(1500));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Time Range
// ============================================================================

/// Inclusive time window in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp in milliseconds (inclusive)
    pub start: i64,

    /// End timestamp in milliseconds (inclusive)
    pub end: i64,
}

impl TimeRange {
    /// Create a new time range with validation
    ///
    /// Returns an error if `start > end`.
    pub fn new(start: i64, end: i64) -> Result<Self, crate::error::Error> {
        if start > end {
            return Err(crate::error::Error::Configuration(format!(
                "Invalid time range: start {} > end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Create a new time range without validation
    pub fn new_unchecked(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Range covering every representable timestamp
    pub fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Check if a timestamp falls within this range (inclusive)
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Duration of the range in milliseconds, `None` on overflow
    pub fn duration_ms(&self) -> Option<i64> {
        self.end.checked_sub(self.start)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

// ============================================================================
// Column Catalog
// ============================================================================

/// Physical column type as exposed by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 64-bit float
    Double,
    /// Epoch-millisecond timestamp stored as i64
    Timestamp,
    /// UTF-8 string
    String,
}

impl ColumnType {
    /// True for types that can be reduced numerically
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Long | ColumnType::Double)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::Timestamp => "timestamp",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

/// A single column of a query projection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Column type
    pub column_type: ColumnType,
    /// Position of the column within the dataset
    pub index: usize,
}

/// Ordered set of columns visible to a query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    columns: Vec<ColumnInfo>,
}

impl Projection {
    /// Build a projection whose column indexes follow list order
    pub fn new<S: Into<String>>(columns: Vec<(S, ColumnType)>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(index, (name, column_type))| ColumnInfo {
                name: name.into(),
                column_type,
                index,
            })
            .collect();
        Self { columns }
    }

    /// Build a projection from explicit column descriptors
    pub fn from_columns(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// All columns in projection order
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if the projection has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// Partition Key
// ============================================================================

/// Identifier of one time series' chunk partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey(pub String);

impl PartitionKey {
    /// Create a partition key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
