//! Planner for partitions owned by another cluster

use tracing::debug;

use crate::query::context::QueryContext;
use crate::query::error::QueryResult;
use crate::query::exec::{Dispatcher, ExecNode, ExecPlan};
use crate::query::logical::LogicalPlan;

use super::PartitionPlanner;

/// Ships work to the cluster that owns a partition
///
/// Expression plans travel as the context's query text plus its evaluation
/// window, which is why a split join must hand each side a context holding
/// only that side's text and grid.
/// Metadata queries travel as scan nodes dispatched to the remote endpoint.
#[derive(Debug, Clone)]
pub struct RemotePartitionPlanner {
    partition: String,
    endpoint: String,
}

impl RemotePartitionPlanner {
    /// Create a planner for a partition served at `endpoint`
    pub fn new(partition: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Remote endpoint address
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::Remote {
            endpoint: self.endpoint.clone(),
        }
    }
}

impl PartitionPlanner for RemotePartitionPlanner {
    fn name(&self) -> &str {
        &self.partition
    }

    fn materialize(&self, plan: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan> {
        debug!(
            partition = %self.partition,
            endpoint = %self.endpoint,
            kind = plan.kind_name(),
            "Materializing remotely"
        );

        let partition = self.partition.clone();
        let node = match plan {
            LogicalPlan::LabelValues {
                label_names,
                filters,
                range,
            } => ExecNode::LabelValuesScan {
                partition,
                label_names: label_names.clone(),
                filters: filters.clone(),
                range: *range,
            },
            LogicalPlan::LabelNames { filters, range } => ExecNode::LabelNamesScan {
                partition,
                filters: filters.clone(),
                range: *range,
            },
            LogicalPlan::SeriesKeysByFilters {
                filters,
                fetch_first_last_sample_times,
                range,
            } => ExecNode::SeriesKeysScan {
                partition,
                filters: filters.clone(),
                fetch_first_last_sample_times: *fetch_first_last_sample_times,
                range: *range,
            },
            LogicalPlan::TsCardinalities {
                shard_key_prefix,
                num_group_by_fields,
            } => ExecNode::CardinalityScan {
                partition,
                shard_key_prefix: shard_key_prefix.clone(),
                num_group_by_fields: *num_group_by_fields,
            },
            _ => ExecNode::RemoteQuery {
                partition,
                query_text: context.orig_query_text.clone(),
                range_params: context.params.range_params.or_else(|| plan.range_params()),
            },
        };

        Ok(ExecPlan::leaf(node, self.dispatcher(), context))
    }
}
