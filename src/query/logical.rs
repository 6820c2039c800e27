//! Logical query plans
//!
//! A `LogicalPlan` is the immutable tree handed to the planner by the query
//! parser. Metrics are referenced through column filters on the dataset's
//! metric column (or the Prometheus `__name__` label, which is treated as an
//! alias of it).
//!
//! # Example
//!
//! ```rust
//! use kuba_planner::query::logical::{ColumnFilter, LogicalPlan};
//! use kuba_planner::types::TimeRange;
//!
//! let plan = LogicalPlan::raw_series(
//!     vec![
//!         ColumnFilter::equals("_metric_", "cpu_usage"),
//!         ColumnFilter::equals("host", "server1"),
//!     ],
//!     TimeRange::new_unchecked(0, 60_000),
//! );
//! assert_eq!(plan.metric_name("_metric_"), Some("cpu_usage"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TimeRange;

/// Prometheus label holding the metric name
pub const PROM_METRIC_LABEL: &str = "__name__";

// ============================================================================
// Column Filters
// ============================================================================

/// Predicate applied to a single label column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// `label="value"`
    Equals(String),
    /// `label!="value"`
    NotEquals(String),
    /// `label=~"regex"`
    EqualsRegex(String),
    /// `label!~"regex"`
    NotEqualsRegex(String),
}

/// A filter bound to a column name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnFilter {
    /// Label/column name
    pub column: String,
    /// Predicate
    pub filter: Filter,
}

impl ColumnFilter {
    /// Equality filter
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            filter: Filter::Equals(value.into()),
        }
    }

    /// Inequality filter
    pub fn not_equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            filter: Filter::NotEquals(value.into()),
        }
    }

    /// Regex match filter
    pub fn regex(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            filter: Filter::EqualsRegex(pattern.into()),
        }
    }

    /// True if this filter names the metric column
    pub fn is_metric_filter(&self, metric_column: &str) -> bool {
        self.column == metric_column || self.column == PROM_METRIC_LABEL
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Binary operator of a join or scalar operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `^`
    Pow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `and`
    And,
    /// `or`
    Or,
    /// `unless`
    Unless,
}

impl BinaryOperator {
    /// Set operators combine series by label match rather than by value
    pub fn is_set_operator(&self) -> bool {
        matches!(
            self,
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Unless
        )
    }

    /// Textual form used when rendering queries
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "^",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Unless => "unless",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Vector matching cardinality hint of a binary join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Each lhs series matches at most one rhs series
    OneToOne,
    /// `group_right`
    OneToMany,
    /// `group_left`
    ManyToOne,
    /// Set operators
    ManyToMany,
}

/// Cross-series aggregation operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationOperator {
    /// `sum`
    Sum,
    /// `avg`
    Avg,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `count`
    Count,
    /// `stddev`
    Stddev,
    /// `stdvar`
    Stdvar,
    /// `group`
    Group,
}

impl AggregationOperator {
    /// Function name in query text
    pub fn name(&self) -> &'static str {
        match self {
            AggregationOperator::Sum => "sum",
            AggregationOperator::Avg => "avg",
            AggregationOperator::Min => "min",
            AggregationOperator::Max => "max",
            AggregationOperator::Count => "count",
            AggregationOperator::Stddev => "stddev",
            AggregationOperator::Stdvar => "stdvar",
            AggregationOperator::Group => "group",
        }
    }
}

/// Function applied over a range window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeFunction {
    /// `rate`
    Rate,
    /// `increase`
    Increase,
    /// `delta`
    Delta,
    /// `avg_over_time`
    AvgOverTime,
    /// `sum_over_time`
    SumOverTime,
    /// `min_over_time`
    MinOverTime,
    /// `max_over_time`
    MaxOverTime,
    /// `count_over_time`
    CountOverTime,
}

impl RangeFunction {
    /// Function name in query text
    pub fn name(&self) -> &'static str {
        match self {
            RangeFunction::Rate => "rate",
            RangeFunction::Increase => "increase",
            RangeFunction::Delta => "delta",
            RangeFunction::AvgOverTime => "avg_over_time",
            RangeFunction::SumOverTime => "sum_over_time",
            RangeFunction::MinOverTime => "min_over_time",
            RangeFunction::MaxOverTime => "max_over_time",
            RangeFunction::CountOverTime => "count_over_time",
        }
    }
}

// ============================================================================
// Plan Nodes
// ============================================================================

/// Evaluation grid of a periodic plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeParams {
    /// First evaluation timestamp (ms)
    pub start_ms: i64,
    /// Step between evaluations (ms)
    pub step_ms: i64,
    /// Last evaluation timestamp (ms)
    pub end_ms: i64,
}

/// Binary join between two vector plans
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryJoin {
    /// Left operand
    pub lhs: Box<LogicalPlan>,
    /// Operator
    pub operator: BinaryOperator,
    /// Matching cardinality
    pub cardinality: Cardinality,
    /// Right operand
    pub rhs: Box<LogicalPlan>,
    /// `on(...)` labels
    pub on: Vec<String>,
    /// `ignoring(...)` labels
    pub ignoring: Vec<String>,
    /// `group_left(...)` / `group_right(...)` labels
    pub include: Vec<String>,
}

impl BinaryJoin {
    /// One-to-one join without label modifiers
    pub fn new(lhs: LogicalPlan, operator: BinaryOperator, rhs: LogicalPlan) -> Self {
        let cardinality = if operator.is_set_operator() {
            Cardinality::ManyToMany
        } else {
            Cardinality::OneToOne
        };
        Self {
            lhs: Box::new(lhs),
            operator,
            cardinality,
            rhs: Box::new(rhs),
            on: Vec::new(),
            ignoring: Vec::new(),
            include: Vec::new(),
        }
    }

    /// Set the `on` labels
    pub fn on(mut self, labels: &[&str]) -> Self {
        self.on = labels.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the `ignoring` labels
    pub fn ignoring(mut self, labels: &[&str]) -> Self {
        self.ignoring = labels.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set cardinality and the labels carried from the "one" side
    pub fn group(mut self, cardinality: Cardinality, include: &[&str]) -> Self {
        self.cardinality = cardinality;
        self.include = include.iter().map(|s| (*s).to_string()).collect();
        self
    }
}

/// Root logical plan type
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Raw samples of every series matching the filters
    RawSeries {
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Time range to read
        range: TimeRange,
        /// Columns to read (empty = dataset default)
        columns: Vec<String>,
        /// Offset applied to the selector (ms)
        offset_ms: Option<i64>,
    },

    /// Instant samples of a raw series on a periodic grid
    PeriodicSeries {
        /// Underlying raw series
        raw: Box<LogicalPlan>,
        /// Evaluation grid
        params: RangeParams,
    },

    /// Range function over a sliding window on a periodic grid
    PeriodicSeriesWithWindowing {
        /// Underlying raw series
        series: Box<LogicalPlan>,
        /// Evaluation grid
        params: RangeParams,
        /// Window length (ms)
        window_ms: i64,
        /// Function applied to each window
        function: RangeFunction,
    },

    /// Cross-series aggregation
    Aggregate {
        /// Aggregation operator
        operator: AggregationOperator,
        /// Input vectors
        vectors: Box<LogicalPlan>,
        /// `by (...)` labels
        by: Vec<String>,
        /// `without (...)` labels
        without: Vec<String>,
    },

    /// Binary join or set operation between two vector plans
    BinaryJoin(BinaryJoin),

    /// Arithmetic between a scalar literal and a vector plan
    ScalarVectorBinaryOperation {
        /// Operator
        operator: BinaryOperator,
        /// Scalar operand
        scalar: f64,
        /// Vector operand
        vector: Box<LogicalPlan>,
        /// True if the scalar is the left operand
        scalar_is_lhs: bool,
    },

    /// Distinct values of the given labels
    LabelValues {
        /// Labels whose values are requested
        label_names: Vec<String>,
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Time range
        range: TimeRange,
    },

    /// Distinct label names
    LabelNames {
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Time range
        range: TimeRange,
    },

    /// Series keys matching the filters
    SeriesKeysByFilters {
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Also fetch first/last sample times
        fetch_first_last_sample_times: bool,
        /// Time range
        range: TimeRange,
    },

    /// Series counts grouped by shard-key prefix
    TsCardinalities {
        /// Shard key prefix values
        shard_key_prefix: Vec<String>,
        /// Number of prefix fields to group by
        num_group_by_fields: usize,
    },
}

impl LogicalPlan {
    /// Raw series with default columns and no offset
    pub fn raw_series(filters: Vec<ColumnFilter>, range: TimeRange) -> Self {
        LogicalPlan::RawSeries {
            filters,
            range,
            columns: Vec::new(),
            offset_ms: None,
        }
    }

    /// Instant samples of `metric{filters}` on the given grid
    pub fn periodic(raw: LogicalPlan, start_ms: i64, step_ms: i64, end_ms: i64) -> Self {
        LogicalPlan::PeriodicSeries {
            raw: Box::new(raw),
            params: RangeParams {
                start_ms,
                step_ms,
                end_ms,
            },
        }
    }

    /// Time window the plan evaluates over, outermost first
    ///
    /// A bare raw series reports its range as a grid with a zero step.
    /// Metadata plans have no window.
    pub fn range_params(&self) -> Option<RangeParams> {
        match self {
            LogicalPlan::PeriodicSeries { params, .. }
            | LogicalPlan::PeriodicSeriesWithWindowing { params, .. } => Some(*params),
            LogicalPlan::RawSeries { range, .. } => Some(RangeParams {
                start_ms: range.start,
                step_ms: 0,
                end_ms: range.end,
            }),
            LogicalPlan::Aggregate { vectors, .. } => vectors.range_params(),
            LogicalPlan::ScalarVectorBinaryOperation { vector, .. } => vector.range_params(),
            LogicalPlan::BinaryJoin(join) => join.lhs.range_params().or_else(|| join.rhs.range_params()),
            LogicalPlan::LabelValues { .. }
            | LogicalPlan::LabelNames { .. }
            | LogicalPlan::SeriesKeysByFilters { .. }
            | LogicalPlan::TsCardinalities { .. } => None,
        }
    }

    /// Direct children in left-to-right order
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::PeriodicSeries { raw, .. } => vec![raw.as_ref()],
            LogicalPlan::PeriodicSeriesWithWindowing { series, .. } => vec![series.as_ref()],
            LogicalPlan::Aggregate { vectors, .. } => vec![vectors.as_ref()],
            LogicalPlan::BinaryJoin(join) => vec![join.lhs.as_ref(), join.rhs.as_ref()],
            LogicalPlan::ScalarVectorBinaryOperation { vector, .. } => vec![vector.as_ref()],
            LogicalPlan::RawSeries { .. }
            | LogicalPlan::LabelValues { .. }
            | LogicalPlan::LabelNames { .. }
            | LogicalPlan::SeriesKeysByFilters { .. }
            | LogicalPlan::TsCardinalities { .. } => Vec::new(),
        }
    }

    /// Column filters attached directly to this node
    pub fn filters(&self) -> &[ColumnFilter] {
        match self {
            LogicalPlan::RawSeries { filters, .. }
            | LogicalPlan::LabelValues { filters, .. }
            | LogicalPlan::LabelNames { filters, .. }
            | LogicalPlan::SeriesKeysByFilters { filters, .. } => filters,
            _ => &[],
        }
    }

    /// First metric name referenced anywhere in the plan (pre-order, left first)
    pub fn metric_name(&self, metric_column: &str) -> Option<&str> {
        let direct = self.filters().iter().find_map(|f| match &f.filter {
            Filter::Equals(value) if f.is_metric_filter(metric_column) => Some(value.as_str()),
            _ => None,
        });
        direct.or_else(|| {
            self.children()
                .into_iter()
                .find_map(|child| child.metric_name(metric_column))
        })
    }

    /// Short node name used in logs and explain output
    pub fn kind_name(&self) -> &'static str {
        match self {
            LogicalPlan::RawSeries { .. } => "RawSeries",
            LogicalPlan::PeriodicSeries { .. } => "PeriodicSeries",
            LogicalPlan::PeriodicSeriesWithWindowing { .. } => "PeriodicSeriesWithWindowing",
            LogicalPlan::Aggregate { .. } => "Aggregate",
            LogicalPlan::BinaryJoin(_) => "BinaryJoin",
            LogicalPlan::ScalarVectorBinaryOperation { .. } => "ScalarVectorBinaryOperation",
            LogicalPlan::LabelValues { .. } => "LabelValues",
            LogicalPlan::LabelNames { .. } => "LabelNames",
            LogicalPlan::SeriesKeysByFilters { .. } => "SeriesKeysByFilters",
            LogicalPlan::TsCardinalities { .. } => "TsCardinalities",
        }
    }
}

/// Replace the Prometheus metric label with the dataset's metric column
pub fn rename_labels(labels: &[String], metric_column: &str) -> Vec<String> {
    labels
        .iter()
        .map(|label| {
            if label == PROM_METRIC_LABEL {
                metric_column.to_string()
            } else {
                label.clone()
            }
        })
        .collect()
}
