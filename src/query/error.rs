//! Query planning error types
//!
//! Planning has no recoverable user-facing failures: a plan that cannot be
//! routed is a configuration or programming defect. These errors exist so the
//! defect surfaces at the materialization boundary instead of aborting the
//! process.

use std::fmt;

/// Query error with context
#[derive(Debug)]
pub struct QueryError {
    /// Error kind for programmatic handling
    pub kind: QueryErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional source error
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// Create a new query error
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add source error for error chaining
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a planning error
    pub fn planning(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::PlanningError, message)
    }

    /// Create an unknown-partition error
    pub fn unknown_partition(partition: impl fmt::Display) -> Self {
        Self::new(
            QueryErrorKind::UnknownPartition,
            format!("no planner registered for partition '{}'", partition),
        )
    }

    /// Create an unsupported-plan error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Unsupported, message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Categories of query errors for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Plan could not be materialized
    PlanningError,
    /// Plan routed to a partition with no registered planner
    UnknownPartition,
    /// Plan node not supported by the target planner
    Unsupported,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::PlanningError => write!(f, "PlanningError"),
            QueryErrorKind::UnknownPartition => write!(f, "UnknownPartition"),
            QueryErrorKind::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Result type alias for planning operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;
