//! Query planners
//!
//! Three planners materialize logical plans into execution trees:
//!
//! - [`LocalPartitionPlanner`]: plans against the data of the partition this node serves
//! - [`RemotePartitionPlanner`]: ships query text to the cluster owning a partition
//! - [`SinglePartitionPlanner`]: routes a plan across a set of partitions, splitting
//!   joins whose operands live in different partitions
//!
//! ```text
//!            LogicalPlan + QueryContext
//!                       │
//!                       ▼
//!          ┌─────────────────────────┐
//!          │  SinglePartitionPlanner │  metric → partition → planner
//!          └───────────┬─────────────┘
//!          ┌───────────┴─────────────┐
//!          ▼                         ▼
//!   ┌──────────────┐         ┌──────────────┐
//!   │ Local planner│         │Remote planner│
//!   └──────────────┘         └──────────────┘
//! ```

mod local;
mod partition_set;
mod remote;

pub use local::LocalPartitionPlanner;
pub use partition_set::SinglePartitionPlanner;
pub use remote::RemotePartitionPlanner;

use std::fmt;
use std::sync::Arc;

use crate::query::context::QueryContext;
use crate::query::error::QueryResult;
use crate::query::exec::ExecPlan;
use crate::query::logical::LogicalPlan;

/// Materializes logical plans for one partition (cluster)
///
/// Implementations are shared read-only across concurrent queries.
pub trait PartitionPlanner: Send + Sync + fmt::Debug {
    /// Planner name used in logs
    fn name(&self) -> &str;

    /// Materialize a plan into an execution tree
    fn materialize(&self, plan: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan>;
}

/// Maps a metric name to the name of the partition holding it
pub trait PartitionSelector: Send + Sync {
    /// Partition name for the metric
    fn partition_for(&self, metric: &str) -> String;
}

impl<F> PartitionSelector for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn partition_for(&self, metric: &str) -> String {
        self(metric)
    }
}

/// Identity comparison of shared planners
///
/// Compares data addresses only; vtable pointers of the same type may differ
/// between codegen units.
pub(crate) fn same_planner(a: &Arc<dyn PartitionPlanner>, b: &Arc<dyn PartitionPlanner>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_selector() {
        let selector = |metric: &str| {
            if metric.starts_with("cpu") {
                "clusterA".to_string()
            } else {
                "clusterB".to_string()
            }
        };
        assert_eq!(selector.partition_for("cpu_usage"), "clusterA");
        assert_eq!(selector.partition_for("mem_free"), "clusterB");
    }

    #[test]
    fn test_same_planner_is_identity_not_equality() {
        let a: Arc<dyn PartitionPlanner> = Arc::new(LocalPartitionPlanner::new("p", "_metric_"));
        let b: Arc<dyn PartitionPlanner> = Arc::new(LocalPartitionPlanner::new("p", "_metric_"));
        assert!(same_planner(&a, &a.clone()));
        assert!(!same_planner(&a, &b));
    }
}
