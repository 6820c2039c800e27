//! Chunk storage collaborator
//!
//! Storage hands decoded chunk sets of one partition to the aggregation
//! executor, either all at once or as a lazy stream. Both reads must yield
//! the same logical rows for the same arguments.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::{PartitionKey, TimeRange};

use super::chunk::ChunkSetReader;

/// Stream of chunk sets returned by a streaming read
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChunkSetReader, StorageError>> + Send>>;

/// How partitions are read from storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Read every chunk set of a partition before folding
    #[default]
    Bulk,
    /// Fold chunk sets as they arrive
    Streaming,
}

/// Chunk storage of time-series partitions
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// All chunk sets of a partition overlapping `range`, restricted to `columns`
    async fn readers(
        &self,
        partition: &PartitionKey,
        range: TimeRange,
        columns: &[usize],
    ) -> Result<Vec<ChunkSetReader>, StorageError> {
        self.stream_readers(partition, range, columns)
            .try_collect()
            .await
    }

    /// Lazy sequence of the chunk sets `readers` returns
    fn stream_readers(&self, partition: &PartitionKey, range: TimeRange, columns: &[usize]) -> ChunkStream;
}

/// Chunk source backed by in-memory chunk sets
#[derive(Debug, Clone, Default)]
pub struct InMemoryChunkSource {
    partitions: HashMap<PartitionKey, Vec<ChunkSetReader>>,
}

impl InMemoryChunkSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty partition
    pub fn add_partition(&mut self, partition: PartitionKey) {
        self.partitions.entry(partition).or_default();
    }

    /// Append a chunk set to a partition, creating it if needed
    pub fn add_chunk(&mut self, partition: PartitionKey, chunk: ChunkSetReader) {
        self.partitions.entry(partition).or_default().push(chunk);
    }

    /// Registered partitions, sorted
    pub fn partitions(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<PartitionKey> = self.partitions.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn select(
        &self,
        partition: &PartitionKey,
        range: TimeRange,
        columns: &[usize],
    ) -> Result<Vec<ChunkSetReader>, StorageError> {
        let chunks = self
            .partitions
            .get(partition)
            .ok_or_else(|| StorageError::PartitionNotFound(partition.to_string()))?;

        chunks
            .iter()
            .filter(|chunk| {
                let span = chunk.info().time_range;
                span.start <= range.end && span.end >= range.start
            })
            .map(|chunk| {
                if let Some(&column) = columns.iter().find(|c| chunk.column(**c).is_none()) {
                    return Err(StorageError::ColumnNotFound {
                        partition: partition.to_string(),
                        column,
                    });
                }
                Ok(chunk.project(columns))
            })
            .collect()
    }
}

#[async_trait]
impl ChunkSource for InMemoryChunkSource {
    async fn readers(
        &self,
        partition: &PartitionKey,
        range: TimeRange,
        columns: &[usize],
    ) -> Result<Vec<ChunkSetReader>, StorageError> {
        self.select(partition, range, columns)
    }

    fn stream_readers(&self, partition: &PartitionKey, range: TimeRange, columns: &[usize]) -> ChunkStream {
        match self.select(partition, range, columns) {
            Ok(chunks) => Box::pin(stream::iter(chunks.into_iter().map(Ok))),
            Err(e) => Box::pin(stream::once(async move { Err(e) })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::chunk::{ChunkInfo, ColumnVector};
    use futures::StreamExt;

    fn chunk(id: u64, start: i64, end: i64) -> ChunkSetReader {
        ChunkSetReader::new(
            ChunkInfo {
                id,
                time_range: TimeRange::new_unchecked(start, end),
            },
            vec![
                (0, ColumnVector::Timestamp(vec![start, end])),
                (1, ColumnVector::Double(vec![1.0, 2.0])),
            ],
        )
        .unwrap()
    }

    fn source() -> InMemoryChunkSource {
        let mut source = InMemoryChunkSource::new();
        let key = PartitionKey::new("p1");
        source.add_chunk(key.clone(), chunk(1, 0, 999));
        source.add_chunk(key.clone(), chunk(2, 1000, 1999));
        source.add_chunk(key, chunk(3, 2000, 2999));
        source
    }

    #[tokio::test]
    async fn test_bulk_read_filters_by_range() {
        let readers = source()
            .readers(&PartitionKey::new("p1"), TimeRange::new_unchecked(1500, 2500), &[1])
            .await
            .unwrap();
        let ids: Vec<u64> = readers.iter().map(|r| r.info().id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(readers.iter().all(|r| r.column(0).is_none()));
    }

    #[tokio::test]
    async fn test_stream_matches_bulk() {
        let source = source();
        let key = PartitionKey::new("p1");
        let range = TimeRange::all();
        let bulk = source.readers(&key, range, &[0, 1]).await.unwrap();
        let streamed: Vec<ChunkSetReader> = source
            .stream_readers(&key, range, &[0, 1])
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(bulk, streamed);
    }

    #[tokio::test]
    async fn test_missing_partition_and_column() {
        let source = source();
        let err = source
            .readers(&PartitionKey::new("nope"), TimeRange::all(), &[0])
            .await
            .unwrap_err();
        assert_eq!(err, StorageError::PartitionNotFound("nope".into()));

        let err = source
            .readers(&PartitionKey::new("p1"), TimeRange::all(), &[5])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ColumnNotFound { column: 5, .. }));
    }

    #[test]
    fn test_scan_mode_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: ScanMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"streaming\"").unwrap();
        assert_eq!(parsed.mode, ScanMode::Streaming);
        assert_eq!(ScanMode::default(), ScanMode::Bulk);
    }
}
