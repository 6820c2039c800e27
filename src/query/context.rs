//! Query context carried alongside logical plans

use serde::{Deserialize, Serialize};

use crate::query::logical::RangeParams;

/// Execution options attached to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerParams {
    /// Maximum number of samples a query may return
    pub sample_limit: usize,
    /// Query timeout in milliseconds
    pub query_timeout_ms: u64,
    /// Shard spread override
    pub spread: Option<u32>,
    /// Return what succeeded when a partition fails
    pub allow_partial_results: bool,
    /// Evaluation window of the query text; set on contexts derived for a join side
    pub range_params: Option<RangeParams>,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            sample_limit: 1_000_000,
            query_timeout_ms: 30_000,
            spread: None,
            allow_partial_results: false,
            range_params: None,
        }
    }
}

/// Original query text plus execution options
///
/// Contexts are immutable once built. Splitting a join across partitions
/// derives a new context per side with [`QueryContext::with_query_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Query text the plan was parsed from
    pub orig_query_text: String,
    /// Query identifier shared by every derived context
    pub query_id: String,
    /// Submission time (epoch ms)
    pub submit_time_ms: i64,
    /// Execution options
    pub params: PlannerParams,
}

impl QueryContext {
    /// Create a context for a freshly submitted query
    pub fn new(query_text: impl Into<String>, query_id: impl Into<String>) -> Self {
        Self {
            orig_query_text: query_text.into(),
            query_id: query_id.into(),
            submit_time_ms: chrono::Utc::now().timestamp_millis(),
            params: PlannerParams::default(),
        }
    }

    /// Replace the planner parameters
    pub fn with_params(mut self, params: PlannerParams) -> Self {
        self.params = params;
        self
    }

    /// Derive a context holding different query text; all other fields are copied
    pub fn with_query_text(&self, query_text: impl Into<String>) -> Self {
        Self {
            orig_query_text: query_text.into(),
            ..self.clone()
        }
    }

    /// Replace the evaluation window carried with the query text
    pub fn with_range_params(mut self, range_params: Option<RangeParams>) -> Self {
        self.params.range_params = range_params;
        self
    }
}
