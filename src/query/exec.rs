//! Physical execution plans
//!
//! An `ExecPlan` is the tree handed to the execution runtime. The planner only
//! decides *where* each node runs through its [`Dispatcher`]; the runtime
//! decides how.

use std::fmt;
use std::fmt::Write as _;

use crate::query::context::QueryContext;
use crate::query::logical::{
    AggregationOperator, BinaryOperator, Cardinality, ColumnFilter, RangeFunction, RangeParams,
};
use crate::types::TimeRange;

/// Where an execution node runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dispatcher {
    /// Execute in-process
    Local,
    /// Hand off to another node
    Remote {
        /// Address of the node that runs the plan
        endpoint: String,
    },
}

impl Dispatcher {
    /// True for in-process dispatch
    pub fn is_local(&self) -> bool {
        matches!(self, Dispatcher::Local)
    }
}

impl fmt::Display for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatcher::Local => f.write_str("local"),
            Dispatcher::Remote { endpoint } => write!(f, "remote({})", endpoint),
        }
    }
}

/// Operator and label matching of a join or set-operator node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Operator
    pub operator: BinaryOperator,
    /// Matching cardinality
    pub cardinality: Cardinality,
    /// `on(...)` labels, metric label renamed to the metric column
    pub on: Vec<String>,
    /// `ignoring(...)` labels, metric label renamed to the metric column
    pub ignoring: Vec<String>,
    /// `group_*(...)` labels, metric label renamed to the metric column
    pub include: Vec<String>,
    /// Dataset metric column
    pub metric_column: String,
}

/// Node kinds of a physical plan
#[derive(Debug, Clone, PartialEq)]
pub enum ExecNode {
    /// Read raw samples of matching series from one partition
    SeriesScan {
        /// Partition (cluster) name
        partition: String,
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Time range
        range: TimeRange,
        /// Columns to read
        columns: Vec<String>,
    },
    /// Label values of matching series in one partition
    LabelValuesScan {
        /// Partition (cluster) name
        partition: String,
        /// Labels whose values are requested
        label_names: Vec<String>,
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Time range
        range: TimeRange,
    },
    /// Label names of matching series in one partition
    LabelNamesScan {
        /// Partition (cluster) name
        partition: String,
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Time range
        range: TimeRange,
    },
    /// Series keys of matching series in one partition
    SeriesKeysScan {
        /// Partition (cluster) name
        partition: String,
        /// Series selectors
        filters: Vec<ColumnFilter>,
        /// Also fetch first/last sample times
        fetch_first_last_sample_times: bool,
        /// Time range
        range: TimeRange,
    },
    /// Series counts of one partition
    CardinalityScan {
        /// Partition (cluster) name
        partition: String,
        /// Shard key prefix
        shard_key_prefix: Vec<String>,
        /// Prefix fields to group by
        num_group_by_fields: usize,
    },
    /// Query text executed by another cluster
    RemoteQuery {
        /// Partition (cluster) name
        partition: String,
        /// Query text shipped to the remote cluster
        query_text: String,
        /// Evaluation window shipped with the text
        range_params: Option<RangeParams>,
    },
    /// Instant samples on a periodic grid
    PeriodicSamples {
        /// Evaluation grid
        params: RangeParams,
    },
    /// Range function over sliding windows
    WindowedSamples {
        /// Evaluation grid
        params: RangeParams,
        /// Window length (ms)
        window_ms: i64,
        /// Window function
        function: RangeFunction,
    },
    /// Cross-series aggregation
    AggregateReduce {
        /// Operator
        operator: AggregationOperator,
        /// `by` labels
        by: Vec<String>,
        /// `without` labels
        without: Vec<String>,
    },
    /// Scalar-vector arithmetic
    ScalarOperation {
        /// Operator
        operator: BinaryOperator,
        /// Scalar operand
        scalar: f64,
        /// Scalar is the left operand
        scalar_is_lhs: bool,
    },
    /// Binary join; children are `[lhs, rhs]`
    BinaryJoin(JoinSpec),
    /// Set operator; children are `[lhs, rhs]`
    SetOperator(JoinSpec),
    /// Union of label values from several planners
    LabelValuesConcat,
    /// Union of label names from several planners
    LabelNamesConcat,
    /// Union of series keys from several planners
    SeriesKeysConcat,
}

impl ExecNode {
    /// Short node name for explain output
    pub fn name(&self) -> &'static str {
        match self {
            ExecNode::SeriesScan { .. } => "SeriesScan",
            ExecNode::LabelValuesScan { .. } => "LabelValuesScan",
            ExecNode::LabelNamesScan { .. } => "LabelNamesScan",
            ExecNode::SeriesKeysScan { .. } => "SeriesKeysScan",
            ExecNode::CardinalityScan { .. } => "CardinalityScan",
            ExecNode::RemoteQuery { .. } => "RemoteQuery",
            ExecNode::PeriodicSamples { .. } => "PeriodicSamples",
            ExecNode::WindowedSamples { .. } => "WindowedSamples",
            ExecNode::AggregateReduce { .. } => "AggregateReduce",
            ExecNode::ScalarOperation { .. } => "ScalarOperation",
            ExecNode::BinaryJoin(_) => "BinaryJoin",
            ExecNode::SetOperator(_) => "SetOperator",
            ExecNode::LabelValuesConcat => "LabelValuesConcat",
            ExecNode::LabelNamesConcat => "LabelNamesConcat",
            ExecNode::SeriesKeysConcat => "SeriesKeysConcat",
        }
    }

    /// Partition a leaf node reads from, `None` for inner nodes
    pub fn partition(&self) -> Option<&str> {
        match self {
            ExecNode::SeriesScan { partition, .. }
            | ExecNode::LabelValuesScan { partition, .. }
            | ExecNode::LabelNamesScan { partition, .. }
            | ExecNode::SeriesKeysScan { partition, .. }
            | ExecNode::CardinalityScan { partition, .. }
            | ExecNode::RemoteQuery { partition, .. } => Some(partition),
            _ => None,
        }
    }

    fn detail(&self) -> String {
        match self {
            ExecNode::SeriesScan { partition, range, .. } => {
                format!("partition={} range={}", partition, range)
            },
            ExecNode::RemoteQuery {
                partition,
                query_text,
                range_params,
            } => match range_params {
                Some(p) => format!(
                    "partition={} query={} start={} step={} end={}",
                    partition, query_text, p.start_ms, p.step_ms, p.end_ms
                ),
                None => format!("partition={} query={}", partition, query_text),
            },
            ExecNode::BinaryJoin(spec) | ExecNode::SetOperator(spec) => format!(
                "op={} on={:?} ignoring={:?} include={:?}",
                spec.operator, spec.on, spec.ignoring, spec.include
            ),
            ExecNode::AggregateReduce { operator, by, .. } => {
                format!("op={} by={:?}", operator.name(), by)
            },
            other => other
                .partition()
                .map(|p| format!("partition={}", p))
                .unwrap_or_default(),
        }
    }
}

/// A node of the physical plan tree
#[derive(Debug, Clone, PartialEq)]
pub struct ExecPlan {
    /// Node kind
    pub node: ExecNode,
    /// Where this node runs
    pub dispatcher: Dispatcher,
    /// Context the node was planned with
    pub context: QueryContext,
    /// Child plans, in operand order
    pub children: Vec<ExecPlan>,
}

impl ExecPlan {
    /// Create a childless node
    pub fn leaf(node: ExecNode, dispatcher: Dispatcher, context: &QueryContext) -> Self {
        Self {
            node,
            dispatcher,
            context: context.clone(),
            children: Vec::new(),
        }
    }

    /// Create a node owning the given children
    pub fn with_children(
        node: ExecNode,
        dispatcher: Dispatcher,
        context: &QueryContext,
        children: Vec<ExecPlan>,
    ) -> Self {
        Self {
            node,
            dispatcher,
            context: context.clone(),
            children,
        }
    }

    /// Partitions read by the leaves of this tree, left to right
    pub fn leaf_partitions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_partitions(&mut out);
        out
    }

    fn collect_partitions<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(p) = self.node.partition() {
            out.push(p);
        }
        for child in &self.children {
            child.collect_partitions(out);
        }
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ExecPlan::node_count).sum::<usize>()
    }

    /// Indented, one-node-per-line rendering of the tree
    pub fn tree_string(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        let detail = self.node.detail();
        // Writing to a String cannot fail
        let _ = writeln!(
            out,
            "{}-{}[{}]{}{}",
            "  ".repeat(depth),
            self.node.name(),
            self.dispatcher,
            if detail.is_empty() { "" } else { " " },
            detail
        );
        for child in &self.children {
            child.write_tree(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(partition: &str) -> ExecPlan {
        ExecPlan::leaf(
            ExecNode::LabelNamesScan {
                partition: partition.into(),
                filters: Vec::new(),
                range: TimeRange::new_unchecked(0, 10),
            },
            Dispatcher::Local,
            &QueryContext::new("", "q"),
        )
    }

    #[test]
    fn test_leaf_partitions_in_operand_order() {
        let ctx = QueryContext::new("", "q");
        let plan = ExecPlan::with_children(
            ExecNode::LabelNamesConcat,
            Dispatcher::Local,
            &ctx,
            vec![scan("east"), scan("west")],
        );
        assert_eq!(plan.leaf_partitions(), vec!["east", "west"]);
        assert_eq!(plan.node_count(), 3);
    }

    #[test]
    fn test_tree_string_indents_children() {
        let ctx = QueryContext::new("", "q");
        let remote = ExecPlan::leaf(
            ExecNode::RemoteQuery {
                partition: "west".into(),
                query_text: "up".into(),
                range_params: Some(RangeParams {
                    start_ms: 0,
                    step_ms: 15_000,
                    end_ms: 60_000,
                }),
            },
            Dispatcher::Remote {
                endpoint: "http://west:9090".into(),
            },
            &ctx,
        );
        let plan = ExecPlan::with_children(
            ExecNode::LabelNamesConcat,
            Dispatcher::Local,
            &ctx,
            vec![scan("east"), remote],
        );
        let text = plan.tree_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "-LabelNamesConcat[local]");
        assert_eq!(lines[1], "  -LabelNamesScan[local] partition=east");
        assert_eq!(
            lines[2],
            "  -RemoteQuery[remote(http://west:9090)] partition=west query=up start=0 step=15000 end=60000"
        );
    }
}
