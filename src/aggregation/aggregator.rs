//! Aggregator strategies
//!
//! An aggregator is bound to column positions at validation time and is
//! stateless afterwards. Per partition it starts from a fresh aggregate,
//! folds each chunk into it, and merges per-partition aggregates pairwise.
//! Merges are associative and commutative, so chunks and partitions may be
//! processed in any order or concurrently. List concatenation is commutative
//! up to element order.

use std::marker::PhantomData;

use crate::types::{ColumnType, PartitionKey};

use super::aggregate::{Aggregate, AggregateValue, RunningAverage};
use super::chunk::{ChunkSetReader, ColumnVector};
use super::error::AggregationError;

/// Strategy producing and merging aggregates
pub trait Aggregator: Send + Sync {
    /// Element type of the aggregates this strategy produces
    type Value: Clone + Send + 'static;

    /// Column positions the strategy reads
    fn columns(&self) -> Vec<usize>;

    /// Identity element of `merge`
    fn empty(&self) -> Aggregate<Self::Value>;

    /// Starting aggregate of a partition scan; never shared between scans
    fn start_partition(&self, _partition: &PartitionKey) -> Aggregate<Self::Value> {
        self.empty()
    }

    /// False if the strategy ignores chunk contents
    fn reads_chunks(&self) -> bool {
        true
    }

    /// Fold one chunk into the partition's aggregate
    ///
    /// Buffers are updated in place and handed back.
    fn fold_chunk(
        &self,
        acc: Aggregate<Self::Value>,
        chunk: &ChunkSetReader,
    ) -> Result<Aggregate<Self::Value>, AggregationError>;

    /// Combine two aggregates
    fn merge(
        &self,
        left: Aggregate<Self::Value>,
        right: Aggregate<Self::Value>,
    ) -> Result<Aggregate<Self::Value>, AggregationError>;
}

fn require_column(chunk: &ChunkSetReader, column: usize) -> Result<&ColumnVector, AggregationError> {
    chunk
        .column(column)
        .ok_or(AggregationError::MissingColumn { column })
}

fn require_numeric(chunk: &ChunkSetReader, column: usize) -> Result<&ColumnVector, AggregationError> {
    let vector = require_column(chunk, column)?;
    if vector.column_type().is_numeric() {
        Ok(vector)
    } else {
        Err(AggregationError::ColumnTypeMismatch {
            column,
            actual: vector.column_type(),
            expected: "numeric",
        })
    }
}

// ============================================================================
// Sum and Count
// ============================================================================

/// Floating-point sum of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleSumAggregator {
    column: usize,
}

impl DoubleSumAggregator {
    /// Bind to a column position
    pub fn new(column: usize) -> Self {
        Self { column }
    }
}

impl Aggregator for DoubleSumAggregator {
    type Value = f64;

    fn columns(&self) -> Vec<usize> {
        vec![self.column]
    }

    fn empty(&self) -> Aggregate<f64> {
        Aggregate::Scalar(0.0)
    }

    fn fold_chunk(&self, acc: Aggregate<f64>, chunk: &ChunkSetReader) -> Result<Aggregate<f64>, AggregationError> {
        let vector = require_numeric(chunk, self.column)?;
        let total: f64 = (0..chunk.num_rows())
            .filter_map(|row| vector.get_double(row))
            .sum();
        acc.merge_scalar(Aggregate::Scalar(total), |a, b| a + b)
    }

    fn merge(&self, left: Aggregate<f64>, right: Aggregate<f64>) -> Result<Aggregate<f64>, AggregationError> {
        left.merge_scalar(right, |a, b| a + b)
    }
}

/// Integer sum of one int or long column
///
/// Wrapping addition keeps the merge associative on overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongSumAggregator {
    column: usize,
}

impl LongSumAggregator {
    /// Bind to a column position
    pub fn new(column: usize) -> Self {
        Self { column }
    }
}

impl Aggregator for LongSumAggregator {
    type Value = i64;

    fn columns(&self) -> Vec<usize> {
        vec![self.column]
    }

    fn empty(&self) -> Aggregate<i64> {
        Aggregate::Scalar(0)
    }

    fn fold_chunk(&self, acc: Aggregate<i64>, chunk: &ChunkSetReader) -> Result<Aggregate<i64>, AggregationError> {
        let vector = require_numeric(chunk, self.column)?;
        let mut total = 0i64;
        for row in 0..chunk.num_rows() {
            let value = vector
                .get_long(row)
                .ok_or(AggregationError::ColumnTypeMismatch {
                    column: self.column,
                    actual: vector.column_type(),
                    expected: "integer",
                })?;
            total = total.wrapping_add(value);
        }
        acc.merge_scalar(Aggregate::Scalar(total), i64::wrapping_add)
    }

    fn merge(&self, left: Aggregate<i64>, right: Aggregate<i64>) -> Result<Aggregate<i64>, AggregationError> {
        left.merge_scalar(right, i64::wrapping_add)
    }
}

/// Number of rows holding a value in one column
///
/// Counts wrap on overflow like [`LongSumAggregator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountAggregator {
    column: usize,
}

impl CountAggregator {
    /// Bind to a column position
    pub fn new(column: usize) -> Self {
        Self { column }
    }
}

impl Aggregator for CountAggregator {
    type Value = i64;

    fn columns(&self) -> Vec<usize> {
        vec![self.column]
    }

    fn empty(&self) -> Aggregate<i64> {
        Aggregate::Scalar(0)
    }

    fn fold_chunk(&self, acc: Aggregate<i64>, chunk: &ChunkSetReader) -> Result<Aggregate<i64>, AggregationError> {
        let rows = require_column(chunk, self.column)?.len() as i64;
        acc.merge_scalar(Aggregate::Scalar(rows), i64::wrapping_add)
    }

    fn merge(&self, left: Aggregate<i64>, right: Aggregate<i64>) -> Result<Aggregate<i64>, AggregationError> {
        left.merge_scalar(right, i64::wrapping_add)
    }
}

// ============================================================================
// Time Grouping
// ============================================================================

/// Per-bucket reduction of a time-grouping aggregator
pub trait BucketReducer: Send + Sync + 'static {
    /// Slot type
    type Value: Clone + Send + 'static;

    /// Value of a bucket that has seen no rows
    fn seed() -> Self::Value;

    /// Account for one value
    fn add(slot: &mut Self::Value, value: f64);

    /// Fold another bucket into this one
    fn combine(slot: &mut Self::Value, other: Self::Value);
}

/// Minimum per bucket, `None` until the bucket sees a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinReducer;

impl BucketReducer for MinReducer {
    type Value = Option<f64>;

    fn seed() -> Option<f64> {
        None
    }

    fn add(slot: &mut Option<f64>, value: f64) {
        *slot = Some(slot.map_or(value, |current| current.min(value)));
    }

    fn combine(slot: &mut Option<f64>, other: Option<f64>) {
        if let Some(value) = other {
            Self::add(slot, value);
        }
    }
}

/// Maximum per bucket, `None` until the bucket sees a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxReducer;

impl BucketReducer for MaxReducer {
    type Value = Option<f64>;

    fn seed() -> Option<f64> {
        None
    }

    fn add(slot: &mut Option<f64>, value: f64) {
        *slot = Some(slot.map_or(value, |current| current.max(value)));
    }

    fn combine(slot: &mut Option<f64>, other: Option<f64>) {
        if let Some(value) = other {
            Self::add(slot, value);
        }
    }
}

/// Running average per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvgReducer;

impl BucketReducer for AvgReducer {
    type Value = RunningAverage;

    fn seed() -> RunningAverage {
        RunningAverage::default()
    }

    fn add(slot: &mut RunningAverage, value: f64) {
        slot.add(value);
    }

    fn combine(slot: &mut RunningAverage, other: RunningAverage) {
        slot.combine(&other);
    }
}

/// Reduces a value column into fixed time buckets
///
/// Row with timestamp `t` lands in
/// `clamp(floor((t - start) * buckets / (end - start)), 0, buckets - 1)`.
/// Bucket counts are capped at
/// [`MAX_TIME_BUCKETS`](super::functions::MAX_TIME_BUCKETS) during binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGroupAggregator<B> {
    time_column: usize,
    value_column: usize,
    start: i64,
    end: i64,
    buckets: usize,
    _reducer: PhantomData<fn() -> B>,
}

impl<B: BucketReducer> TimeGroupAggregator<B> {
    /// Bind to time and value columns; callers guarantee `end > start`
    pub fn new(time_column: usize, value_column: usize, start: i64, end: i64, buckets: usize) -> Self {
        Self {
            time_column,
            value_column,
            start,
            end,
            buckets,
            _reducer: PhantomData,
        }
    }

    /// Number of buckets
    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// Start and end of the bucketed span (epoch ms)
    pub fn span(&self) -> (i64, i64) {
        (self.start, self.end)
    }

    /// Bucket of a timestamp, `None` when there are no buckets
    pub fn bucket_for(&self, timestamp: i64) -> Option<usize> {
        if self.buckets == 0 || self.end <= self.start {
            return None;
        }
        let offset = i128::from(timestamp) - i128::from(self.start);
        let width = i128::from(self.end) - i128::from(self.start);
        let bucket = (offset * self.buckets as i128).div_euclid(width);
        Some(bucket.clamp(0, self.buckets as i128 - 1) as usize)
    }
}

impl<B: BucketReducer> Aggregator for TimeGroupAggregator<B> {
    type Value = B::Value;

    fn columns(&self) -> Vec<usize> {
        vec![self.time_column, self.value_column]
    }

    fn empty(&self) -> Aggregate<B::Value> {
        Aggregate::Buffer(vec![B::seed(); self.buckets])
    }

    fn fold_chunk(
        &self,
        mut acc: Aggregate<B::Value>,
        chunk: &ChunkSetReader,
    ) -> Result<Aggregate<B::Value>, AggregationError> {
        let times = require_column(chunk, self.time_column)?;
        if !matches!(times.column_type(), ColumnType::Long | ColumnType::Timestamp) {
            return Err(AggregationError::ColumnTypeMismatch {
                column: self.time_column,
                actual: times.column_type(),
                expected: "time",
            });
        }
        let values = require_numeric(chunk, self.value_column)?;

        let shape = acc.shape();
        let slots = acc.buffer_mut().ok_or(AggregationError::ShapeMismatch {
            left: shape,
            right: "buffer",
        })?;

        for row in 0..chunk.num_rows() {
            if let (Some(ts), Some(value)) = (times.get_long(row), values.get_double(row)) {
                if let Some(bucket) = self.bucket_for(ts) {
                    B::add(&mut slots[bucket], value);
                }
            }
        }
        Ok(acc)
    }

    fn merge(
        &self,
        left: Aggregate<B::Value>,
        right: Aggregate<B::Value>,
    ) -> Result<Aggregate<B::Value>, AggregationError> {
        left.merge_buffer(right, B::combine)
    }
}

// ============================================================================
// Partition Keys
// ============================================================================

/// Emits the identifier of every partition scanned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionKeysAggregator;

impl Aggregator for PartitionKeysAggregator {
    type Value = String;

    fn columns(&self) -> Vec<usize> {
        Vec::new()
    }

    fn empty(&self) -> Aggregate<String> {
        Aggregate::List(Vec::new())
    }

    fn start_partition(&self, partition: &PartitionKey) -> Aggregate<String> {
        Aggregate::List(vec![partition.to_string()])
    }

    fn reads_chunks(&self) -> bool {
        false
    }

    fn fold_chunk(&self, acc: Aggregate<String>, _chunk: &ChunkSetReader) -> Result<Aggregate<String>, AggregationError> {
        Ok(acc)
    }

    fn merge(&self, left: Aggregate<String>, right: Aggregate<String>) -> Result<Aggregate<String>, AggregationError> {
        left.concat(&right)
    }
}

// ============================================================================
// Bound Aggregator
// ============================================================================

/// Aggregator produced by a validated aggregation function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundAggregator {
    /// `sum` over a double column
    DoubleSum(DoubleSumAggregator),
    /// `sum` over an int or long column
    LongSum(LongSumAggregator),
    /// `count`
    Count(CountAggregator),
    /// `time_group_min`
    TimeGroupMin(TimeGroupAggregator<MinReducer>),
    /// `time_group_max`
    TimeGroupMax(TimeGroupAggregator<MaxReducer>),
    /// `time_group_avg`
    TimeGroupAvg(TimeGroupAggregator<AvgReducer>),
    /// `partition_keys`
    PartitionKeys(PartitionKeysAggregator),
}

impl BoundAggregator {
    /// Column positions read by the aggregator
    pub fn columns(&self) -> Vec<usize> {
        match self {
            BoundAggregator::DoubleSum(a) => a.columns(),
            BoundAggregator::LongSum(a) => a.columns(),
            BoundAggregator::Count(a) => a.columns(),
            BoundAggregator::TimeGroupMin(a) => a.columns(),
            BoundAggregator::TimeGroupMax(a) => a.columns(),
            BoundAggregator::TimeGroupAvg(a) => a.columns(),
            BoundAggregator::PartitionKeys(a) => a.columns(),
        }
    }

    /// Identity aggregate
    pub fn empty(&self) -> AggregateValue {
        match self {
            BoundAggregator::DoubleSum(a) => AggregateValue::Double(a.empty()),
            BoundAggregator::LongSum(a) => AggregateValue::Long(a.empty()),
            BoundAggregator::Count(a) => AggregateValue::Long(a.empty()),
            BoundAggregator::TimeGroupMin(a) => AggregateValue::Extremes(a.empty()),
            BoundAggregator::TimeGroupMax(a) => AggregateValue::Extremes(a.empty()),
            BoundAggregator::TimeGroupAvg(a) => AggregateValue::Average(a.empty()),
            BoundAggregator::PartitionKeys(a) => AggregateValue::Keys(a.empty()),
        }
    }

    /// Merge two aggregates produced by this aggregator
    pub fn merge(&self, left: AggregateValue, right: AggregateValue) -> Result<AggregateValue, AggregationError> {
        use AggregateValue as V;
        use BoundAggregator as B;

        match (self, left, right) {
            (B::DoubleSum(a), V::Double(l), V::Double(r)) => Ok(V::Double(a.merge(l, r)?)),
            (B::LongSum(a), V::Long(l), V::Long(r)) => Ok(V::Long(a.merge(l, r)?)),
            (B::Count(a), V::Long(l), V::Long(r)) => Ok(V::Long(a.merge(l, r)?)),
            (B::TimeGroupMin(a), V::Extremes(l), V::Extremes(r)) => Ok(V::Extremes(a.merge(l, r)?)),
            (B::TimeGroupMax(a), V::Extremes(l), V::Extremes(r)) => Ok(V::Extremes(a.merge(l, r)?)),
            (B::TimeGroupAvg(a), V::Average(l), V::Average(r)) => Ok(V::Average(a.merge(l, r)?)),
            (B::PartitionKeys(a), V::Keys(l), V::Keys(r)) => Ok(V::Keys(a.merge(l, r)?)),
            (_, l, r) => Err(AggregationError::ShapeMismatch {
                left: l.type_name(),
                right: r.type_name(),
            }),
        }
    }
}
