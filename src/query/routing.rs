//! Metric-to-partition routing

use std::collections::HashMap;

use tracing::trace;

use crate::config::PlannerConfig;
use crate::query::planner::PartitionSelector;

/// Rule-based [`PartitionSelector`]
///
/// Exact metric rules win over prefix rules; among prefix rules the longest
/// match wins; anything unmatched goes to the fallback partition.
#[derive(Debug, Clone)]
pub struct MetricRouter {
    exact: HashMap<String, String>,
    /// Sorted by descending prefix length
    prefixes: Vec<(String, String)>,
    fallback: String,
}

impl MetricRouter {
    /// Router that sends every metric to `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            exact: HashMap::new(),
            prefixes: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Route one metric name to a partition
    pub fn with_rule(mut self, metric: impl Into<String>, partition: impl Into<String>) -> Self {
        self.exact.insert(metric.into(), partition.into());
        self
    }

    /// Route every metric starting with `prefix` to a partition
    pub fn with_prefix(mut self, prefix: impl Into<String>, partition: impl Into<String>) -> Self {
        self.prefixes.push((prefix.into(), partition.into()));
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self
    }

    /// Build the router described by the `[routing]` section
    pub fn from_config(config: &PlannerConfig) -> Self {
        let fallback = config
            .routing
            .fallback_partition
            .clone()
            .unwrap_or_else(|| config.dataset.default_partition.clone());

        let router = config
            .routing
            .rules
            .iter()
            .fold(Self::new(fallback), |r, (metric, partition)| {
                r.with_rule(metric.clone(), partition.clone())
            });
        config
            .routing
            .prefixes
            .iter()
            .fold(router, |r, (prefix, partition)| {
                r.with_prefix(prefix.clone(), partition.clone())
            })
    }
}

impl PartitionSelector for MetricRouter {
    fn partition_for(&self, metric: &str) -> String {
        if let Some(partition) = self.exact.get(metric) {
            return partition.clone();
        }
        let partition = self
            .prefixes
            .iter()
            .find(|(prefix, _)| metric.starts_with(prefix.as_str()))
            .map(|(_, partition)| partition.clone())
            .unwrap_or_else(|| self.fallback.clone());
        trace!(metric, partition = %partition, "Metric routed");
        partition
    }
}
