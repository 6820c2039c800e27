//! Partition-aware query planning
//!
//! A logical plan describes what a query computes. Planning turns it into a
//! physical execution tree whose leaves are dispatched to the partitions
//! (clusters) holding the data.
//!
//! # Architecture
//!
//! ```text
//! LogicalPlan + QueryContext
//!      │
//!      ▼
//! ┌────────────────────────┐
//! │ SinglePartitionPlanner │  metric → partition, split joins, fan out label queries
//! └────────────────────────┘
//!      │
//!      ├──────────────► LocalPartitionPlanner   (in-process leaves)
//!      │
//!      └──────────────► RemotePartitionPlanner  (query text shipped to an endpoint)
//!      │
//!      ▼
//!   ExecPlan (tree of ExecNode + Dispatcher)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kuba_planner::config::PlannerConfig;
//! use kuba_planner::query::{LogicalPlan, PartitionPlanner, QueryContext, SinglePartitionPlanner};
//!
//! let planner = SinglePartitionPlanner::from_config(&PlannerConfig::from_file("planner.toml")?)?;
//! let plan = LogicalPlan::raw_series(vec![ColumnFilter::equals("_metric_", "cpu")], range);
//! let exec = planner.materialize(&plan, &QueryContext::new("cpu", "q-1"))?;
//! println!("{}", exec.tree_string());
//! ```

pub mod context;
pub mod error;
pub mod exec;
pub mod logical;
pub mod planner;
pub mod render;
pub mod routing;

// Re-export main types
pub use context::{PlannerParams, QueryContext};
pub use error::{QueryError, QueryErrorKind, QueryResult};
pub use exec::{Dispatcher, ExecNode, ExecPlan, JoinSpec};
pub use logical::{
    AggregationOperator, BinaryJoin, BinaryOperator, Cardinality, ColumnFilter, Filter,
    LogicalPlan, RangeFunction, RangeParams, PROM_METRIC_LABEL,
};
pub use planner::{
    LocalPartitionPlanner, PartitionPlanner, PartitionSelector, RemotePartitionPlanner,
    SinglePartitionPlanner,
};
pub use render::QueryRenderer;
pub use routing::MetricRouter;
