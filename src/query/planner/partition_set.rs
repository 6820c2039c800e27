//! Planner over a set of partitions (clusters)
//!
//! Each metric lives in exactly one partition. Plans touching a single
//! partition are delegated whole; binary joins whose operands live in
//! different partitions are split, each side planned by its own partition
//! planner, and recombined by a join node that runs locally.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PlannerConfig;
use crate::error::Result;
use crate::query::context::QueryContext;
use crate::query::error::{QueryError, QueryResult};
use crate::query::exec::{Dispatcher, ExecNode, ExecPlan, JoinSpec};
use crate::query::logical::{rename_labels, BinaryJoin, LogicalPlan};
use crate::query::render::QueryRenderer;
use crate::query::routing::MetricRouter;

use super::{
    same_planner, LocalPartitionPlanner, PartitionPlanner, PartitionSelector,
    RemotePartitionPlanner,
};

/// Routes logical plans across per-partition planners
///
/// Planning is pure: no I/O, no interior state. One instance can serve any
/// number of concurrent queries.
pub struct SinglePartitionPlanner {
    /// Partition name → planner; several names may share one planner
    planners: BTreeMap<String, Arc<dyn PartitionPlanner>>,
    /// Metric name → partition name
    selector: Arc<dyn PartitionSelector>,
    /// Partition that answers cardinality queries
    default_partition: String,
    /// Dataset column holding the metric name
    metric_column: String,
    /// Dispatcher of the combinator nodes this planner creates
    local_dispatcher: Dispatcher,
    renderer: QueryRenderer,
}

impl std::fmt::Debug for SinglePartitionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinglePartitionPlanner")
            .field("partitions", &self.planners.keys().collect::<Vec<_>>())
            .field("default_partition", &self.default_partition)
            .field("metric_column", &self.metric_column)
            .finish()
    }
}

impl SinglePartitionPlanner {
    /// Create a planner over the given partitions
    pub fn new(
        planners: BTreeMap<String, Arc<dyn PartitionPlanner>>,
        selector: Arc<dyn PartitionSelector>,
        default_partition: impl Into<String>,
        metric_column: impl Into<String>,
    ) -> Self {
        let metric_column = metric_column.into();
        Self {
            planners,
            selector,
            default_partition: default_partition.into(),
            renderer: QueryRenderer::new(metric_column.clone()),
            metric_column,
            local_dispatcher: Dispatcher::Local,
        }
    }

    /// Build planners and routing from configuration
    ///
    /// Partitions with an endpoint get a remote planner, the rest a local one.
    /// `alias_of` entries share the planner instance of their target.
    pub fn from_config(config: &PlannerConfig) -> Result<Self> {
        config.validate()?;

        let metric_column = &config.dataset.metric_column;
        let mut planners: BTreeMap<String, Arc<dyn PartitionPlanner>> = BTreeMap::new();

        for (name, partition) in config.partitions.iter().filter(|(_, p)| p.alias_of.is_none()) {
            let planner: Arc<dyn PartitionPlanner> = match &partition.endpoint {
                Some(endpoint) => Arc::new(RemotePartitionPlanner::new(name.clone(), endpoint.clone())),
                None => Arc::new(LocalPartitionPlanner::new(name.clone(), metric_column.clone())),
            };
            planners.insert(name.clone(), planner);
        }
        for (name, partition) in &config.partitions {
            if let Some(target) = &partition.alias_of {
                // validate() guarantees the target is a concrete partition
                if let Some(shared) = planners.get(target).cloned() {
                    planners.insert(name.clone(), shared);
                }
            }
        }

        info!(
            partitions = planners.len(),
            default_partition = %config.dataset.default_partition,
            "Partition-set planner configured"
        );

        Ok(Self::new(
            planners,
            Arc::new(MetricRouter::from_config(config)),
            config.dataset.default_partition.clone(),
            metric_column.clone(),
        ))
    }

    /// Registered partition names in routing order
    pub fn partition_names(&self) -> impl Iterator<Item = &str> {
        self.planners.keys().map(String::as_str)
    }

    /// Planner responsible for a plan
    ///
    /// Uses the first metric the plan references. Plans without a metric fall
    /// back to the lexicographically first partition.
    pub fn get_planner(&self, plan: &LogicalPlan) -> QueryResult<&Arc<dyn PartitionPlanner>> {
        match plan.metric_name(&self.metric_column) {
            Some(metric) => {
                let partition = self.selector.partition_for(metric);
                debug!(metric, partition = %partition, "Routed metric to partition");
                self.planners
                    .get(&partition)
                    .ok_or_else(|| QueryError::unknown_partition(&partition))
            },
            None => self
                .planners
                .values()
                .next()
                .ok_or_else(|| QueryError::planning("no partition planners registered")),
        }
    }

    fn default_planner(&self) -> QueryResult<&Arc<dyn PartitionPlanner>> {
        self.planners
            .get(&self.default_partition)
            .ok_or_else(|| QueryError::unknown_partition(&self.default_partition))
    }

    /// Planners of every non-join leaf, left to right
    fn collect_leaf_planners<'a>(
        &'a self,
        plan: &LogicalPlan,
        out: &mut Vec<&'a Arc<dyn PartitionPlanner>>,
    ) -> QueryResult<()> {
        match plan {
            LogicalPlan::BinaryJoin(join) => {
                self.collect_leaf_planners(&join.lhs, out)?;
                self.collect_leaf_planners(&join.rhs, out)
            },
            leaf => {
                out.push(self.get_planner(leaf)?);
                Ok(())
            },
        }
    }

    fn materialize_binary_join(
        &self,
        plan: &LogicalPlan,
        join: &BinaryJoin,
        context: &QueryContext,
    ) -> QueryResult<ExecPlan> {
        let mut leaves = Vec::new();
        self.collect_leaf_planners(plan, &mut leaves)?;

        if let Some(first) = leaves.first() {
            if leaves.iter().all(|p| same_planner(p, first)) {
                debug!(planner = first.name(), "Join served by a single partition");
                return first.materialize(plan, context);
            }
        }

        let lhs_context = self.side_context(&join.lhs, context)?;
        let rhs_context = self.side_context(&join.rhs, context)?;
        info!(
            query_id = %context.query_id,
            operator = %join.operator,
            lhs = %lhs_context.orig_query_text,
            rhs = %rhs_context.orig_query_text,
            "Splitting join across partitions"
        );

        let lhs = self.materialize_operand(&join.lhs, &lhs_context)?;
        let rhs = self.materialize_operand(&join.rhs, &rhs_context)?;

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
            self.local_dispatcher.clone(),
            context,
            vec![lhs, rhs],
        ))
    }

    /// Context holding only one join side's text and evaluation window
    fn side_context(&self, side: &LogicalPlan, context: &QueryContext) -> QueryResult<QueryContext> {
        Ok(context
            .with_query_text(self.renderer.render(side)?)
            .with_range_params(side.range_params()))
    }

    fn materialize_operand(&self, plan: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan> {
        match plan {
            LogicalPlan::BinaryJoin(join) => self.materialize_binary_join(plan, join, context),
            other => self.get_planner(other)?.materialize(other, context),
        }
    }

    /// Run a metadata query once per distinct planner
    fn materialize_fan_out(
        &self,
        plan: &LogicalPlan,
        context: &QueryContext,
        concat: ExecNode,
    ) -> QueryResult<ExecPlan> {
        let mut distinct: Vec<&Arc<dyn PartitionPlanner>> = Vec::new();
        for planner in self.planners.values() {
            if !distinct.iter().any(|seen| same_planner(seen, planner)) {
                distinct.push(planner);
            }
        }

        let mut children = distinct
            .iter()
            .map(|planner| planner.materialize(plan, context))
            .collect::<QueryResult<Vec<_>>>()?;

        debug!(
            kind = plan.kind_name(),
            planners = children.len(),
            partitions = self.planners.len(),
            "Fanned out metadata query"
        );

        match children.len() {
            0 => Err(QueryError::planning("no partition planners registered")),
            1 => Ok(children.remove(0)),
            _ => Ok(ExecPlan::with_children(
                concat,
                self.local_dispatcher.clone(),
                context,
                children,
            )),
        }
    }
}

impl PartitionPlanner for SinglePartitionPlanner {
    fn name(&self) -> &str {
        "partition-set"
    }

    fn materialize(&self, plan: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan> {
        match plan {
            LogicalPlan::BinaryJoin(join) => self.materialize_binary_join(plan, join, context),
            LogicalPlan::LabelValues { .. } => {
                self.materialize_fan_out(plan, context, ExecNode::LabelValuesConcat)
            },
            LogicalPlan::LabelNames { .. } => {
                self.materialize_fan_out(plan, context, ExecNode::LabelNamesConcat)
            },
            LogicalPlan::SeriesKeysByFilters { .. } => {
                self.materialize_fan_out(plan, context, ExecNode::SeriesKeysConcat)
            },
            // Only the default partition is consulted; series held elsewhere are not counted.
            LogicalPlan::TsCardinalities { .. } => {
                self.default_planner()?.materialize(plan, context)
            },
            other => self.get_planner(other)?.materialize(other, context),
        }
    }
}
