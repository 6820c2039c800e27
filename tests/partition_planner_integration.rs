//! Integration tests for the partition-aware planner
//!
//! These tests validate planning across partitions:
//! - Whole-plan delegation when every leaf lives in one partition
//! - Recursive splitting of joins and set operations
//! - Label and series-key fan-out over distinct planners
//! - Planner construction from TOML configuration

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use kuba_planner::config::PlannerConfig;
use kuba_planner::query::{
    BinaryJoin, BinaryOperator, Cardinality, ColumnFilter, Dispatcher, ExecNode, ExecPlan,
    LocalPartitionPlanner, LogicalPlan, PartitionPlanner, QueryContext, QueryError,
    QueryErrorKind, QueryResult, RangeParams, RemotePartitionPlanner, SinglePartitionPlanner,
};
use kuba_planner::types::TimeRange;

// ============================================================================
// Helper Functions
// ============================================================================

/// Records every plan it is asked to materialize
#[derive(Debug)]
struct RecordingPlanner {
    name: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingPlanner {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PartitionPlanner for RecordingPlanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn materialize(&self, plan: &LogicalPlan, context: &QueryContext) -> QueryResult<ExecPlan> {
        self.calls
            .lock()
            .unwrap()
            .push((plan.kind_name().to_string(), context.orig_query_text.clone()));
        Ok(ExecPlan::leaf(
            ExecNode::RemoteQuery {
                partition: self.name.clone(),
                query_text: context.orig_query_text.clone(),
                range_params: context.params.range_params,
            },
            Dispatcher::Local,
            context,
        ))
    }
}

/// Fails every request
#[derive(Debug)]
struct FailingPlanner;

impl PartitionPlanner for FailingPlanner {
    fn name(&self) -> &str {
        "failing"
    }

    fn materialize(&self, _plan: &LogicalPlan, _context: &QueryContext) -> QueryResult<ExecPlan> {
        Err(QueryError::unsupported("partition offline"))
    }
}

fn range() -> TimeRange {
    TimeRange::new_unchecked(0, 60_000)
}

fn grid() -> RangeParams {
    RangeParams {
        start_ms: 0,
        step_ms: 10_000,
        end_ms: 60_000,
    }
}

fn series(metric: &str) -> LogicalPlan {
    LogicalPlan::periodic(
        LogicalPlan::raw_series(vec![ColumnFilter::equals("_metric_", metric)], range()),
        0,
        10_000,
        60_000,
    )
}

fn label_values() -> LogicalPlan {
    LogicalPlan::LabelValues {
        label_names: vec!["job".into()],
        filters: vec![ColumnFilter::equals("_metric_", "cpu")],
        range: range(),
    }
}

/// Route `<partition>:<metric>`-style names to their prefix
fn prefix_selector() -> Arc<dyn kuba_planner::query::PartitionSelector> {
    Arc::new(|metric: &str| {
        metric
            .split_once(':')
            .map(|(p, _)| p.to_string())
            .unwrap_or_else(|| "p1".to_string())
    })
}

/// Partition name → planner, built up one entry at a time
#[derive(Default)]
struct Partitions(BTreeMap<String, Arc<dyn PartitionPlanner>>);

impl Partitions {
    fn with(mut self, name: &str, planner: Arc<dyn PartitionPlanner>) -> Self {
        self.0.insert(name.to_string(), planner);
        self
    }

    fn planner(self) -> SinglePartitionPlanner {
        SinglePartitionPlanner::new(self.0, prefix_selector(), "p1", "_metric_")
    }
}

// ============================================================================
// Delegation and Splitting
// ============================================================================

#[test]
fn test_join_within_one_planner_is_delegated_whole() {
    let shared = RecordingPlanner::new("p1");
    let planner = Partitions::default()
        .with("p1", shared.clone())
        .with("p1-replica", shared.clone())
        .planner();

    let join = LogicalPlan::BinaryJoin(BinaryJoin::new(
        series("p1:cpu"),
        BinaryOperator::Div,
        series("p1-replica:mem"),
    ));
    let exec = planner
        .materialize(&join, &QueryContext::new("p1:cpu / p1-replica:mem", "q1"))
        .unwrap();

    assert_eq!(exec.node.name(), "RemoteQuery");
    assert_eq!(
        shared.calls(),
        vec![("BinaryJoin".to_string(), "p1:cpu / p1-replica:mem".to_string())]
    );
}

#[test]
fn test_cross_partition_join_materializes_each_side_with_its_text() {
    let p1 = RecordingPlanner::new("p1");
    let p2 = RecordingPlanner::new("p2");
    let planner = Partitions::default()
        .with("p1", p1.clone())
        .with("p2", p2.clone())
        .planner();

    let join = LogicalPlan::BinaryJoin(
        BinaryJoin::new(series("p1:cpu"), BinaryOperator::Add, series("p2:cpu"))
            .on(&["__name__", "host"]),
    );
    let ctx = QueryContext::new("full query", "q2");
    let exec = planner.materialize(&join, &ctx).unwrap();

    match &exec.node {
        ExecNode::BinaryJoin(spec) => {
            assert_eq!(spec.on, vec!["_metric_".to_string(), "host".to_string()]);
            assert_eq!(spec.cardinality, Cardinality::OneToOne);
        },
        other => panic!("expected a join node, got {:?}", other),
    }
    assert_eq!(exec.dispatcher, Dispatcher::Local);
    assert_eq!(exec.context, ctx);
    assert_eq!(exec.leaf_partitions(), vec!["p1", "p2"]);

    let (lhs_kind, lhs_text) = &p1.calls()[0];
    let (rhs_kind, rhs_text) = &p2.calls()[0];
    assert_eq!(lhs_kind, "PeriodicSeries");
    assert_eq!(rhs_kind, "PeriodicSeries");
    assert!(lhs_text.contains("p1:cpu"));
    assert!(rhs_text.contains("p2:cpu"));
    assert_ne!(lhs_text, "full query");

    // Derived contexts keep everything but the text and carry the side's grid.
    assert_eq!(exec.children[0].context.query_id, "q2");
    assert_eq!(exec.children[1].context.submit_time_ms, ctx.submit_time_ms);
    assert_eq!(exec.children[0].context.params.range_params, Some(grid()));
    assert_eq!(exec.children[1].context.params.range_params, Some(grid()));
}

#[test]
fn test_set_operator_across_partitions() {
    let planner = Partitions::default()
        .with("p1", RecordingPlanner::new("p1"))
        .with("p2", RecordingPlanner::new("p2"))
        .planner();
    let join = LogicalPlan::BinaryJoin(
        BinaryJoin::new(series("p1:up"), BinaryOperator::Unless, series("p2:up"))
            .ignoring(&["__name__"]),
    );
    let exec = planner.materialize(&join, &QueryContext::new("", "q")).unwrap();

    match &exec.node {
        ExecNode::SetOperator(spec) => {
            assert_eq!(spec.operator, BinaryOperator::Unless);
            assert_eq!(spec.cardinality, Cardinality::ManyToMany);
            assert_eq!(spec.ignoring, vec!["_metric_".to_string()]);
        },
        other => panic!("expected a set operator, got {:?}", other),
    }
}

#[test]
fn test_group_left_include_renames_metric_label() {
    let p1 = RecordingPlanner::new("p1");
    let p2 = RecordingPlanner::new("p2");
    let planner = Partitions::default()
        .with("p1", p1.clone())
        .with("p2", p2.clone())
        .planner();
    let join = LogicalPlan::BinaryJoin(
        BinaryJoin::new(series("p1:req"), BinaryOperator::Div, series("p2:limit"))
            .on(&["job"])
            .group(Cardinality::ManyToOne, &["__name__"]),
    );
    let exec = planner.materialize(&join, &QueryContext::new("", "q")).unwrap();

    match &exec.node {
        ExecNode::BinaryJoin(spec) => {
            assert_eq!(spec.cardinality, Cardinality::ManyToOne);
            assert_eq!(spec.on, vec!["job".to_string()]);
            assert_eq!(spec.include, vec!["_metric_".to_string()]);
            assert_eq!(spec.metric_column, "_metric_");
        },
        other => panic!("expected a join node, got {:?}", other),
    }
    assert_eq!(exec.leaf_partitions(), vec!["p1", "p2"]);
    assert_eq!(p1.calls().len(), 1);
    assert_eq!(p2.calls().len(), 1);
}

#[test]
fn test_deeply_nested_join_splits_only_where_needed() {
    let p1 = RecordingPlanner::new("p1");
    let p2 = RecordingPlanner::new("p2");
    let planner = Partitions::default()
        .with("p1", p1.clone())
        .with("p2", p2.clone())
        .planner();

    // ((p1:a + p1:b) * (p2:c - p1:d))
    let left = LogicalPlan::BinaryJoin(BinaryJoin::new(
        series("p1:a"),
        BinaryOperator::Add,
        series("p1:b"),
    ));
    let right = LogicalPlan::BinaryJoin(BinaryJoin::new(
        series("p2:c"),
        BinaryOperator::Sub,
        series("p1:d"),
    ));
    let root = LogicalPlan::BinaryJoin(BinaryJoin::new(left, BinaryOperator::Mul, right));
    let exec = planner.materialize(&root, &QueryContext::new("", "q")).unwrap();

    assert_eq!(exec.node.name(), "BinaryJoin");
    // Left side delegated to p1 as a whole join.
    assert_eq!(exec.children[0].node.name(), "RemoteQuery");
    // Right side split again.
    assert_eq!(exec.children[1].node.name(), "BinaryJoin");
    assert_eq!(exec.leaf_partitions(), vec!["p1", "p2", "p1"]);

    let p1_kinds: Vec<String> = p1.calls().into_iter().map(|(k, _)| k).collect();
    assert_eq!(p1_kinds, vec!["BinaryJoin", "PeriodicSeries"]);
    assert_eq!(p2.calls().len(), 1);
}

#[test]
fn test_planner_failure_propagates() {
    let planner = Partitions::default()
        .with("p1", RecordingPlanner::new("p1"))
        .with("p2", Arc::new(FailingPlanner))
        .planner();
    let join = LogicalPlan::BinaryJoin(BinaryJoin::new(
        series("p1:a"),
        BinaryOperator::Add,
        series("p2:b"),
    ));
    let err = planner.materialize(&join, &QueryContext::new("", "q")).unwrap_err();
    assert_eq!(err.kind, QueryErrorKind::Unsupported);
}

#[test]
fn test_unregistered_partition_is_a_planning_error() {
    let planner = Partitions::default()
        .with("p1", RecordingPlanner::new("p1"))
        .planner();
    let err = planner
        .materialize(&series("p9:cpu"), &QueryContext::new("", "q"))
        .unwrap_err();
    assert_eq!(err.kind, QueryErrorKind::UnknownPartition);
}

// ============================================================================
// Metadata Fan-out
// ============================================================================

#[test]
fn test_label_values_fan_out_once_per_distinct_planner() {
    let a = RecordingPlanner::new("a");
    let b = RecordingPlanner::new("b");
    let planner = Partitions::default()
        .with("p1", a.clone())
        .with("p2", b.clone())
        .with("p3", a.clone())
        .planner();

    let exec = planner
        .materialize(&label_values(), &QueryContext::new("", "q"))
        .unwrap();

    assert_eq!(exec.node, ExecNode::LabelValuesConcat);
    assert_eq!(exec.children.len(), 2);
    assert_eq!(a.calls().len(), 1);
    assert_eq!(b.calls().len(), 1);
}

#[test]
fn test_single_distinct_planner_is_unwrapped() {
    let shared = RecordingPlanner::new("shared");
    let planner = Partitions::default()
        .with("p1", shared.clone())
        .with("p2", shared.clone())
        .planner();

    let names = LogicalPlan::LabelNames {
        filters: Vec::new(),
        range: range(),
    };
    let exec = planner.materialize(&names, &QueryContext::new("", "q")).unwrap();

    assert_eq!(exec.node.name(), "RemoteQuery");
    assert!(exec.children.is_empty());
    assert_eq!(shared.calls().len(), 1);
}

#[test]
fn test_series_keys_concat_over_local_planners() {
    let planner = Partitions::default()
        .with("p1", Arc::new(LocalPartitionPlanner::new("p1", "_metric_")))
        .with("p2", Arc::new(RemotePartitionPlanner::new("p2", "http://p2:8080")))
        .planner();
    let keys = LogicalPlan::SeriesKeysByFilters {
        filters: vec![ColumnFilter::equals("job", "api")],
        fetch_first_last_sample_times: true,
        range: range(),
    };
    let exec = planner.materialize(&keys, &QueryContext::new("", "q")).unwrap();

    assert_eq!(exec.node, ExecNode::SeriesKeysConcat);
    assert_eq!(exec.leaf_partitions(), vec!["p1", "p2"]);
    assert_eq!(exec.children[0].dispatcher, Dispatcher::Local);
    assert!(!exec.children[1].dispatcher.is_local());
}

#[test]
fn test_cardinality_goes_to_default_partition() {
    let p1 = RecordingPlanner::new("p1");
    let p2 = RecordingPlanner::new("p2");
    let planner = Partitions::default()
        .with("p1", p1.clone())
        .with("p2", p2.clone())
        .planner();

    let plan = LogicalPlan::TsCardinalities {
        shard_key_prefix: vec!["ws".into()],
        num_group_by_fields: 2,
    };
    planner.materialize(&plan, &QueryContext::new("", "q")).unwrap();

    assert_eq!(p1.calls().len(), 1);
    assert!(p2.calls().is_empty());
}

#[test]
fn test_planning_is_deterministic() {
    let planner = Partitions::default()
        .with("p1", Arc::new(LocalPartitionPlanner::new("p1", "_metric_")))
        .with("p2", Arc::new(RemotePartitionPlanner::new("p2", "http://p2:8080")))
        .planner();
    let join = LogicalPlan::BinaryJoin(BinaryJoin::new(
        series("p1:a"),
        BinaryOperator::Or,
        series("p2:b"),
    ));
    let ctx = QueryContext::new("p1:a or p2:b", "q");
    let first = planner.materialize(&join, &ctx).unwrap();
    let second = planner.materialize(&join, &ctx).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.tree_string(), second.tree_string());
}

// ============================================================================
// Configuration
// ============================================================================

const CONFIG: &str = r#"
[dataset]
metric_column = "_metric_"
default_partition = "east"

[partitions.east]

[partitions.west]
endpoint = "http://west:8080"

[partitions.west-replica]
alias_of = "west"

[routing]
fallback_partition = "east"

[routing.rules]
mem_bytes = "west-replica"

[routing.prefixes]
"w_" = "west"
"#;

#[test]
fn test_from_config_shares_planner_for_aliases() {
    let config = PlannerConfig::from_toml_str(CONFIG).unwrap();
    let planner = SinglePartitionPlanner::from_config(&config).unwrap();

    assert_eq!(
        planner.partition_names().collect::<Vec<_>>(),
        vec!["east", "west", "west-replica"]
    );

    // Both sides resolve to the same remote planner, so the join is not split.
    let join = LogicalPlan::BinaryJoin(BinaryJoin::new(
        series("w_cpu"),
        BinaryOperator::Div,
        series("mem_bytes"),
    ));
    let ctx = QueryContext::new("w_cpu / mem_bytes", "q");
    let exec = planner.materialize(&join, &ctx).unwrap();
    assert_eq!(
        exec.node,
        ExecNode::RemoteQuery {
            partition: "west".into(),
            query_text: "w_cpu / mem_bytes".into(),
            range_params: Some(grid()),
        }
    );

    // Label queries reach east and west once each.
    let exec = planner.materialize(&label_values(), &ctx).unwrap();
    assert_eq!(exec.children.len(), 2);
}

#[test]
fn test_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let config = PlannerConfig::from_file(path.to_str().unwrap()).unwrap();
    let planner = SinglePartitionPlanner::from_config(&config).unwrap();
    let exec = planner
        .materialize(&series("cpu"), &QueryContext::new("cpu", "q"))
        .unwrap();
    assert_eq!(exec.leaf_partitions(), vec!["east"]);
    assert!(exec.tree_string().starts_with("-PeriodicSamples[local]"));
}

#[test]
fn test_from_config_rejects_invalid_alias() {
    let mut config = PlannerConfig::from_toml_str(CONFIG).unwrap();
    config
        .partitions
        .get_mut("west-replica")
        .unwrap()
        .alias_of = Some("mars".into());
    assert!(SinglePartitionPlanner::from_config(&config).is_err());
}
