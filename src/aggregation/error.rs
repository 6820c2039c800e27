//! Aggregation error types

use thiserror::Error;

use crate::types::ColumnType;

/// Argument validation failure of an aggregation function
///
/// Positions are zero-based indexes into the caller's argument list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// No function with this name
    #[error("Unknown aggregation function '{0}'")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("{function} expects {expected} argument(s), got {actual}")]
    WrongArgumentCount {
        /// Function name
        function: &'static str,
        /// Required argument count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Argument names a column missing from the projection
    #[error("Argument {position}: column '{column}' not found")]
    UnknownColumn {
        /// Argument position
        position: usize,
        /// Column name as supplied
        column: String,
    },

    /// Column exists but its type is not accepted
    #[error("Argument {position}: column '{column}' has type {actual}, {function} accepts {allowed:?}")]
    DisallowedColumnType {
        /// Function name
        function: &'static str,
        /// Argument position
        position: usize,
        /// Column name
        column: String,
        /// Column type found
        actual: ColumnType,
        /// Types the function accepts at this position
        allowed: Vec<ColumnType>,
    },

    /// Numeric or time literal could not be parsed
    #[error("Argument {position}: malformed literal '{value}': {reason}")]
    MalformedLiteral {
        /// Argument position
        position: usize,
        /// Literal as supplied
        value: String,
        /// Why parsing failed
        reason: String,
    },
}

impl ValidationError {
    /// Argument position the error refers to, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            ValidationError::UnknownColumn { position, .. }
            | ValidationError::DisallowedColumnType { position, .. }
            | ValidationError::MalformedLiteral { position, .. } => Some(*position),
            ValidationError::UnknownFunction(_) | ValidationError::WrongArgumentCount { .. } => None,
        }
    }
}

/// Failures while folding chunks or merging aggregates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// Aggregates of different shapes cannot be merged
    #[error("Cannot merge {left} aggregate with {right} aggregate")]
    ShapeMismatch {
        /// Shape of the left operand
        left: &'static str,
        /// Shape of the right operand
        right: &'static str,
    },

    /// Buffers of different lengths cannot be merged
    #[error("Cannot merge buffers of length {left} and {right}")]
    LengthMismatch {
        /// Length of the left buffer
        left: usize,
        /// Length of the right buffer
        right: usize,
    },

    /// Chunk lacks a column the aggregator is bound to
    #[error("Column {column} missing from chunk")]
    MissingColumn {
        /// Column index
        column: usize,
    },

    /// Chunk column type differs from the bound type
    #[error("Column {column} holds {actual}, expected a {expected} column")]
    ColumnTypeMismatch {
        /// Column index
        column: usize,
        /// Type found in the chunk
        actual: ColumnType,
        /// Kind of column expected
        expected: &'static str,
    },
}
