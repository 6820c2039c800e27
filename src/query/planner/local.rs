//! Planner for the partition served by this node

use tracing::debug;

use crate::query::context::QueryContext;
use crate::query::error::QueryResult;
use crate::query::exec::{Dispatcher, ExecNode, ExecPlan, JoinSpec};
use crate::query::logical::{rename_labels, LogicalPlan};

use super::PartitionPlanner;

/// Materializes every node as an in-process operator over local data
#[derive(Debug, Clone)]
pub struct LocalPartitionPlanner {
    partition: String,
    metric_column: String,
}

impl LocalPartitionPlanner {
    /// Create a planner for the named partition
    pub fn new(partition: impl Into<String>, metric_column: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            metric_column: metric_column.into(),
        }
    }

    fn leaf(&self, node: ExecNode, context: &QueryContext) -> ExecPlan {
        ExecPlan::leaf(node, Dispatcher::Local, context)
    }

    fn unary(&self, node: ExecNode, input: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan> {
        let child = self.materialize(input, context)?;
        Ok(ExecPlan::with_children(node, Dispatcher::Local, context, vec![child]))
    }
}

impl PartitionPlanner for LocalPartitionPlanner {
    fn name(&self) -> &str {
        &self.partition
    }

    fn materialize(&self, plan: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan> {
        debug!(partition = %self.partition, kind = plan.kind_name(), "Materializing locally");

        match plan {
            LogicalPlan::RawSeries {
                filters,
                range,
                columns,
                ..
            } => Ok(self.leaf(
                ExecNode::SeriesScan {
                    partition: self.partition.clone(),
                    filters: filters.clone(),
                    range: *range,
                    columns: columns.clone(),
                },
                context,
            )),
            LogicalPlan::PeriodicSeries { raw, params } => {
                self.unary(ExecNode::PeriodicSamples { params: *params }, raw, context)
            },
            LogicalPlan::PeriodicSeriesWithWindowing {
                series,
                params,
                window_ms,
                function,
            } => self.unary(
                ExecNode::WindowedSamples {
                    params: *params,
                    window_ms: *window_ms,
                    function: *function,
                },
                series,
                context,
            ),
            LogicalPlan::Aggregate {
                operator,
                vectors,
                by,
                without,
            } => self.unary(
                ExecNode::AggregateReduce {
                    operator: *operator,
                    by: by.clone(),
                    without: without.clone(),
                },
                vectors,
                context,
            ),
            LogicalPlan::ScalarVectorBinaryOperation {
                operator,
                scalar,
                vector,
                scalar_is_lhs,
            } => self.unary(
                ExecNode::ScalarOperation {
                    operator: *operator,
                    scalar: *scalar,
                    scalar_is_lhs: *scalar_is_lhs,
                },
                vector,
                context,
            ),
            LogicalPlan::BinaryJoin(join) => {
                let lhs = self.materialize(&join.lhs, context)?;
                let rhs = self.materialize(&join.rhs, context)?;
                let spec = JoinSpec {
                    operator: join.operator,
                    cardinality: join.cardinality,
                    on: rename_labels(&join.on, &self.metric_column),
                    ignoring: rename_labels(&join.ignoring, &self.metric_column),
                    include: rename_labels(&join.include, &self.metric_column),
                    metric_column: self.metric_column.clone(),
                };
                let node = if join.operator.is_set_operator() {
                    ExecNode::SetOperator(spec)
                } else {
                    ExecNode::BinaryJoin(spec)
                };
                Ok(ExecPlan::with_children(
                    node,
                    Dispatcher::Local,
                    context,
                    vec![lhs, rhs],
                ))
            },
            LogicalPlan::LabelValues {
                label_names,
                filters,
                range,
            } => Ok(self.leaf(
                ExecNode::LabelValuesScan {
                    partition: self.partition.clone(),
                    label_names: label_names.clone(),
                    filters: filters.clone(),
                    range: *range,
                },
                context,
            )),
            LogicalPlan::LabelNames { filters, range } => Ok(self.leaf(
                ExecNode::LabelNamesScan {
                    partition: self.partition.clone(),
                    filters: filters.clone(),
                    range: *range,
                },
                context,
            )),
            LogicalPlan::SeriesKeysByFilters {
                filters,
                fetch_first_last_sample_times,
                range,
            } => Ok(self.leaf(
                ExecNode::SeriesKeysScan {
                    partition: self.partition.clone(),
                    filters: filters.clone(),
                    fetch_first_last_sample_times: *fetch_first_last_sample_times,
                    range: *range,
                },
                context,
            )),
            LogicalPlan::TsCardinalities {
                shard_key_prefix,
                num_group_by_fields,
            } => Ok(self.leaf(
                ExecNode::CardinalityScan {
                    partition: self.partition.clone(),
                    shard_key_prefix: shard_key_prefix.clone(),
                    num_group_by_fields: *num_group_by_fields,
                },
                context,
            )),
        }
    }
}
