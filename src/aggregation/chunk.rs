//! Decoded chunk sets handed to aggregators
//!
//! A chunk set holds one decoded vector per requested column for a bounded
//! row range of one partition. Readers expose only the columns that were
//! requested from storage.

use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::types::{ColumnType, TimeRange};

/// Decoded values of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnVector {
    /// 32-bit integers
    Int(Vec<i32>),
    /// 64-bit integers
    Long(Vec<i64>),
    /// 64-bit floats
    Double(Vec<f64>),
    /// Epoch-millisecond timestamps
    Timestamp(Vec<i64>),
    /// Strings
    String(Vec<String>),
}

impl ColumnVector {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            ColumnVector::Int(v) => v.len(),
            ColumnVector::Long(v) | ColumnVector::Timestamp(v) => v.len(),
            ColumnVector::Double(v) => v.len(),
            ColumnVector::String(v) => v.len(),
        }
    }

    /// True if the vector has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Catalog type of the vector
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnVector::Int(_) => ColumnType::Int,
            ColumnVector::Long(_) => ColumnType::Long,
            ColumnVector::Double(_) => ColumnType::Double,
            ColumnVector::Timestamp(_) => ColumnType::Timestamp,
            ColumnVector::String(_) => ColumnType::String,
        }
    }

    /// Integer view of a row (int, long, and timestamp columns)
    pub fn get_long(&self, row: usize) -> Option<i64> {
        match self {
            ColumnVector::Int(v) => v.get(row).map(|x| i64::from(*x)),
            ColumnVector::Long(v) | ColumnVector::Timestamp(v) => v.get(row).copied(),
            _ => None,
        }
    }

    /// Floating-point view of a row (numeric columns)
    pub fn get_double(&self, row: usize) -> Option<f64> {
        match self {
            ColumnVector::Int(v) => v.get(row).map(|x| f64::from(*x)),
            ColumnVector::Long(v) => v.get(row).map(|x| *x as f64),
            ColumnVector::Double(v) => v.get(row).copied(),
            _ => None,
        }
    }
}

/// Metadata of one chunk set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Chunk identifier, unique within the partition
    pub id: u64,
    /// Time span covered by the chunk
    pub time_range: TimeRange,
}

/// Column vectors of one chunk set, keyed by column index
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSetReader {
    info: ChunkInfo,
    num_rows: usize,
    columns: BTreeMap<usize, ColumnVector>,
}

impl ChunkSetReader {
    /// Build a reader; every column must hold the same number of rows
    pub fn new(info: ChunkInfo, columns: Vec<(usize, ColumnVector)>) -> Result<Self, StorageError> {
        let num_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((index, column)) = columns.iter().find(|(_, c)| c.len() != num_rows) {
            return Err(StorageError::CorruptedChunk(format!(
                "chunk {} column {} has {} rows, expected {}",
                info.id,
                index,
                column.len(),
                num_rows
            )));
        }
        Ok(Self {
            info,
            num_rows,
            columns: columns.into_iter().collect(),
        })
    }

    /// Chunk metadata
    pub fn info(&self) -> &ChunkInfo {
        &self.info
    }

    /// Number of rows in the chunk
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Vector of a column, if it was read
    pub fn column(&self, index: usize) -> Option<&ColumnVector> {
        self.columns.get(&index)
    }

    /// Column indexes present in this reader
    pub fn column_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.keys().copied()
    }

    /// Copy of this reader restricted to the given column positions
    pub fn project(&self, positions: &[usize]) -> Self {
        Self {
            info: self.info,
            num_rows: self.num_rows,
            columns: self
                .columns
                .iter()
                .filter(|(index, _)| positions.contains(*index))
                .map(|(index, column)| (*index, column.clone()))
                .collect(),
        }
    }

    /// Iterate rows in storage order
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        (0..self.num_rows).map(move |row| RowView { reader: self, row })
    }
}

/// One row of a chunk set
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    reader: &'a ChunkSetReader,
    row: usize,
}

impl RowView<'_> {
    /// Row number within the chunk
    pub fn row(&self) -> usize {
        self.row
    }

    /// Integer value of a column
    pub fn get_long(&self, column: usize) -> Option<i64> {
        self.reader.column(column)?.get_long(self.row)
    }

    /// Floating-point value of a column
    pub fn get_double(&self, column: usize) -> Option<f64> {
        self.reader.column(column)?.get_double(self.row)
    }

    /// True if the column was read for this chunk
    pub fn has_column(&self, column: usize) -> bool {
        self.reader.column(column).is_some()
    }
}
