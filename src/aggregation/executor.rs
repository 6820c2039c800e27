//! Aggregation executor
//!
//! Drives a bound aggregator over the partitions selected for a query:
//!
//! ```text
//!   partition p1 ──► start_partition ──► fold chunk 1 ──► fold chunk 2 ──┐
//!   partition p2 ──► start_partition ──► fold chunk 1 ───────────────────┼──► merge ──► result
//!   partition p3 ──► start_partition ──► (no chunks) ────────────────────┘
//! ```
//!
//! Partitions are scanned concurrently up to the configured limit and merged
//! in completion order. Every scan starts from its own aggregate.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::config::AggregationConfig;
use crate::error::{Error, Result};
use crate::types::{PartitionKey, TimeRange};

use super::aggregate::{Aggregate, AggregateValue};
use super::aggregator::{Aggregator, BoundAggregator};
use super::source::{ChunkSource, ScanMode};

/// A partition skipped because its scan failed
#[derive(Debug)]
pub struct PartitionFailure {
    /// Partition that failed
    pub partition: PartitionKey,
    /// Why the scan failed
    pub error: Error,
}

/// Merged result of a multi-partition aggregation
#[derive(Debug)]
pub struct AggregationOutcome<T> {
    /// Merged aggregate
    pub value: T,
    /// Partitions whose scan completed
    pub partitions_scanned: usize,
    /// Partitions skipped under partial results
    pub failures: Vec<PartitionFailure>,
}

impl<T> AggregationOutcome<T> {
    /// True if some partitions were skipped
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Transform the merged value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AggregationOutcome<U> {
        AggregationOutcome {
            value: f(self.value),
            partitions_scanned: self.partitions_scanned,
            failures: self.failures,
        }
    }
}

/// Runs aggregators against a chunk source
pub struct AggregationExecutor<S: ?Sized> {
    source: Arc<S>,
    config: AggregationConfig,
}

impl<S: ChunkSource + ?Sized> AggregationExecutor<S> {
    /// Create an executor over a chunk source
    pub fn new(source: Arc<S>, config: AggregationConfig) -> Self {
        Self { source, config }
    }

    /// Executor settings
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate one partition's chunks within `range`
    pub async fn aggregate_partition<A: Aggregator>(
        &self,
        aggregator: &A,
        partition: &PartitionKey,
        range: TimeRange,
    ) -> Result<Aggregate<A::Value>> {
        let mut acc = aggregator.start_partition(partition);
        if !aggregator.reads_chunks() {
            return Ok(acc);
        }

        let columns = aggregator.columns();
        let mut chunks = 0usize;
        match self.config.scan_mode {
            ScanMode::Bulk => {
                for reader in self.source.readers(partition, range, &columns).await? {
                    acc = aggregator.fold_chunk(acc, &reader)?;
                    chunks += 1;
                }
            },
            ScanMode::Streaming => {
                let mut readers = self.source.stream_readers(partition, range, &columns);
                while let Some(reader) = readers.next().await {
                    acc = aggregator.fold_chunk(acc, &reader?)?;
                    chunks += 1;
                }
            },
        }

        debug!(partition = %partition, chunks, "Aggregated partition");
        Ok(acc)
    }

    /// Aggregate several partitions concurrently and merge their results
    ///
    /// A failed partition fails the whole call unless partial results are
    /// allowed, in which case it is skipped and reported.
    pub async fn aggregate_partitions<A: Aggregator>(
        &self,
        aggregator: &A,
        partitions: &[PartitionKey],
        range: TimeRange,
    ) -> Result<AggregationOutcome<Aggregate<A::Value>>> {
        let scans = partitions.iter().map(|partition| async move {
            (partition, self.aggregate_partition(aggregator, partition, range).await)
        });
        let mut completed = stream::iter(scans).buffer_unordered(self.config.max_concurrent_partitions.max(1));

        let mut merged = aggregator.empty();
        let mut partitions_scanned = 0usize;
        let mut failures = Vec::new();

        while let Some((partition, result)) = completed.next().await {
            match result {
                Ok(aggregate) => {
                    merged = aggregator.merge(merged, aggregate)?;
                    partitions_scanned += 1;
                },
                Err(error) if self.config.allow_partial_results => {
                    warn!(partition = %partition, error = %error, "Skipping failed partition");
                    failures.push(PartitionFailure {
                        partition: partition.clone(),
                        error,
                    });
                },
                Err(error) => return Err(error),
            }
        }

        Ok(AggregationOutcome {
            value: merged,
            partitions_scanned,
            failures,
        })
    }

    /// Run a validated aggregation function over partitions
    pub async fn execute(
        &self,
        bound: &BoundAggregator,
        partitions: &[PartitionKey],
        range: TimeRange,
    ) -> Result<AggregationOutcome<AggregateValue>> {
        let outcome = match bound {
            BoundAggregator::DoubleSum(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Double),
            BoundAggregator::LongSum(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Long),
            BoundAggregator::Count(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Long),
            BoundAggregator::TimeGroupMin(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Extremes),
            BoundAggregator::TimeGroupMax(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Extremes),
            BoundAggregator::TimeGroupAvg(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Average),
            BoundAggregator::PartitionKeys(a) => self
                .aggregate_partitions(a, partitions, range)
                .await?
                .map(AggregateValue::Keys),
        };

        debug!(
            partitions = partitions.len(),
            scanned = outcome.partitions_scanned,
            failed = outcome.failures.len(),
            "Aggregation complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate::AggregateOutput;
    use crate::aggregation::aggregator::{DoubleSumAggregator, TimeGroupAggregator};
    use crate::aggregation::chunk::{ChunkInfo, ChunkSetReader, ColumnVector};
    use crate::aggregation::source::InMemoryChunkSource;

    fn source() -> Arc<InMemoryChunkSource> {
        let mut source = InMemoryChunkSource::new();
        for (p, values) in [("a", vec![1.0, 2.0]), ("b", vec![10.0])] {
            let reader = ChunkSetReader::new(
                ChunkInfo {
                    id: 1,
                    time_range: TimeRange::new_unchecked(0, 100),
                },
                vec![
                    (0, ColumnVector::Timestamp(vec![0; values.len()])),
                    (1, ColumnVector::Double(values)),
                ],
            )
            .unwrap();
            source.add_chunk(PartitionKey::new(p), reader);
        }
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_partition_sum() {
        let executor = AggregationExecutor::new(source(), AggregationConfig::default());
        let agg = DoubleSumAggregator::new(1);
        let result = executor
            .aggregate_partition(&agg, &PartitionKey::new("a"), TimeRange::all())
            .await
            .unwrap();
        assert_eq!(result, Aggregate::Scalar(3.0));
    }

    #[tokio::test]
    async fn test_missing_partition_fails_query() {
        let executor = AggregationExecutor::new(source(), AggregationConfig::default());
        let agg = DoubleSumAggregator::new(1);
        let keys = [PartitionKey::new("a"), PartitionKey::new("gone")];
        let result = executor.aggregate_partitions(&agg, &keys, TimeRange::all()).await;
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_partial_results_skip_failures() {
        let config = AggregationConfig {
            allow_partial_results: true,
            ..AggregationConfig::default()
        };
        let executor = AggregationExecutor::new(source(), config);
        let agg = DoubleSumAggregator::new(1);
        let keys = [PartitionKey::new("a"), PartitionKey::new("gone"), PartitionKey::new("b")];
        let outcome = executor
            .aggregate_partitions(&agg, &keys, TimeRange::all())
            .await
            .unwrap();
        assert_eq!(outcome.value, Aggregate::Scalar(13.0));
        assert_eq!(outcome.partitions_scanned, 2);
        assert!(outcome.is_partial());
        assert_eq!(outcome.failures[0].partition, PartitionKey::new("gone"));
    }

    #[tokio::test]
    async fn test_empty_partition_contributes_identity() {
        let mut source = InMemoryChunkSource::new();
        source.add_partition(PartitionKey::new("idle"));
        let executor = AggregationExecutor::new(Arc::new(source), AggregationConfig::default());

        let bound = BoundAggregator::TimeGroupMin(TimeGroupAggregator::new(0, 1, 0, 100, 2));
        let outcome = executor
            .execute(&bound, &[PartitionKey::new("idle")], TimeRange::all())
            .await
            .unwrap();
        assert_eq!(outcome.partitions_scanned, 1);
        assert!(!outcome.is_partial());
        assert_eq!(outcome.value, bound.empty());
        assert_eq!(outcome.value.finalize(), AggregateOutput::Buckets(vec![None, None]));
    }
}
