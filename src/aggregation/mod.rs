//! Chunk aggregation framework
//!
//! Aggregation functions are resolved by name, validated against the
//! query's column projection, and bound to concrete column positions. The
//! resulting aggregator folds a partition's chunk sets into an aggregate,
//! and per-partition aggregates are merged into the query result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   name + arguments + projection     │
//! └─────────────────────────────────────┘
//!                  ↓  functions::bind
//! ┌─────────────────────────────────────┐
//! │          BoundAggregator            │
//! │  columns, empty, fold, merge        │
//! └─────────────────────────────────────┘
//!                  ↓  AggregationExecutor
//! ┌─────────────────────────────────────┐
//! │   ChunkSource (bulk or streaming)   │
//! │   one fresh aggregate per partition │
//! └─────────────────────────────────────┘
//!                  ↓  merge (any order)
//! ┌─────────────────────────────────────┐
//! │   AggregateValue → AggregateOutput  │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kuba_planner::aggregation::{bind, AggregationExecutor, InMemoryChunkSource};
//!
//! let bound = bind("time_group_avg", &["ts", "val", "1000", "5000", "4"], &projection)?;
//! let executor = AggregationExecutor::new(Arc::new(source), config.aggregation.clone());
//! let outcome = executor.execute(&bound, &partitions, range).await?;
//! let buckets = outcome.value.finalize();
//! ```

pub mod aggregate;
pub mod aggregator;
pub mod chunk;
pub mod error;
pub mod executor;
pub mod functions;
pub mod source;

pub use aggregate::{Aggregate, AggregateOutput, AggregateValue, RunningAverage};
pub use aggregator::{
    Aggregator, AvgReducer, BoundAggregator, BucketReducer, CountAggregator, DoubleSumAggregator,
    LongSumAggregator, MaxReducer, MinReducer, PartitionKeysAggregator, TimeGroupAggregator,
};
pub use chunk::{ChunkInfo, ChunkSetReader, ColumnVector, RowView};
pub use error::{AggregationError, ValidationError};
pub use executor::{AggregationExecutor, AggregationOutcome, PartitionFailure};
pub use functions::{bind, AggregationFunction, MAX_TIME_BUCKETS};
pub use source::{ChunkSource, ChunkStream, InMemoryChunkSource, ScanMode};
