//! Logical plan to query text
//!
//! When a binary join straddles partitions, each side is shipped to its own
//! partition planner with a context whose query text covers only that side.
//! The renderer produces that text. Re-parsing the output must yield a plan
//! equivalent to the input subtree, so every operand is parenthesised and
//! every modifier is spelled out. A column selection renders as
//! `metric::column`. The evaluation grid is not part of the text; it travels
//! in the side context's [`PlannerParams`](crate::query::context::PlannerParams).

use crate::query::error::{QueryError, QueryResult};
use crate::query::logical::{BinaryJoin, Cardinality, ColumnFilter, Filter, LogicalPlan};

/// Renders logical plans to PromQL-style text
#[derive(Debug, Clone)]
pub struct QueryRenderer {
    metric_column: String,
}

impl QueryRenderer {
    /// Create a renderer for a dataset with the given metric column
    pub fn new(metric_column: impl Into<String>) -> Self {
        Self {
            metric_column: metric_column.into(),
        }
    }

    /// Render a plan to query text
    ///
    /// Label, key, and cardinality queries have no expression form and are
    /// rejected.
    pub fn render(&self, plan: &LogicalPlan) -> QueryResult<String> {
        match plan {
            LogicalPlan::RawSeries {
                filters,
                range,
                columns,
                offset_ms,
            } => {
                let window = range.duration_ms().unwrap_or(0);
                Ok(format!(
                    "{}[{}]{}",
                    self.selector(filters, columns)?,
                    format_duration(window),
                    offset_suffix(*offset_ms)
                ))
            },
            LogicalPlan::PeriodicSeries { raw, .. } => self.instant_selector(raw),
            LogicalPlan::PeriodicSeriesWithWindowing {
                series,
                window_ms,
                function,
                ..
            } => {
                let (filters, columns, offset) = self.raw_parts(series)?;
                Ok(format!(
                    "{}({}[{}]{})",
                    function.name(),
                    self.selector(filters, columns)?,
                    format_duration(*window_ms),
                    offset_suffix(offset)
                ))
            },
            LogicalPlan::Aggregate {
                operator,
                vectors,
                by,
                without,
            } => {
                let inner = self.render(vectors)?;
                let grouping = if !by.is_empty() {
                    format!(" by ({})", by.join(", "))
                } else if !without.is_empty() {
                    format!(" without ({})", without.join(", "))
                } else {
                    String::new()
                };
                Ok(format!("{}{}({})", operator.name(), grouping, inner))
            },
            LogicalPlan::BinaryJoin(join) => self.render_join(join),
            LogicalPlan::ScalarVectorBinaryOperation {
                operator,
                scalar,
                vector,
                scalar_is_lhs,
            } => {
                let inner = self.render(vector)?;
                if *scalar_is_lhs {
                    Ok(format!("({} {} {})", scalar, operator, inner))
                } else {
                    Ok(format!("({} {} {})", inner, operator, scalar))
                }
            },
            LogicalPlan::LabelValues { .. }
            | LogicalPlan::LabelNames { .. }
            | LogicalPlan::SeriesKeysByFilters { .. }
            | LogicalPlan::TsCardinalities { .. } => Err(QueryError::unsupported(format!(
                "{} has no query text form",
                plan.kind_name()
            ))),
        }
    }

    fn render_join(&self, join: &BinaryJoin) -> QueryResult<String> {
        let lhs = self.render(&join.lhs)?;
        let rhs = self.render(&join.rhs)?;

        let mut modifiers = String::new();
        if !join.on.is_empty() {
            modifiers.push_str(&format!(" on({})", join.on.join(", ")));
        } else if !join.ignoring.is_empty() {
            modifiers.push_str(&format!(" ignoring({})", join.ignoring.join(", ")));
        }
        match join.cardinality {
            Cardinality::ManyToOne => {
                modifiers.push_str(&format!(" group_left({})", join.include.join(", ")))
            },
            Cardinality::OneToMany => {
                modifiers.push_str(&format!(" group_right({})", join.include.join(", ")))
            },
            Cardinality::OneToOne | Cardinality::ManyToMany => {},
        }

        Ok(format!("({} {}{} {})", lhs, join.operator, modifiers, rhs))
    }

    fn instant_selector(&self, raw: &LogicalPlan) -> QueryResult<String> {
        let (filters, columns, offset) = self.raw_parts(raw)?;
        Ok(format!("{}{}", self.selector(filters, columns)?, offset_suffix(offset)))
    }

    fn raw_parts<'a>(
        &self,
        plan: &'a LogicalPlan,
    ) -> QueryResult<(&'a [ColumnFilter], &'a [String], Option<i64>)> {
        match plan {
            LogicalPlan::RawSeries {
                filters,
                columns,
                offset_ms,
                ..
            } => Ok((filters, columns, *offset_ms)),
            other => Err(QueryError::unsupported(format!(
                "expected RawSeries under periodic plan, found {}",
                other.kind_name()
            ))),
        }
    }

    /// `metric{label="value",...}`, or `metric::column{...}` with a column selection
    fn selector(&self, filters: &[ColumnFilter], columns: &[String]) -> QueryResult<String> {
        let mut metric = None;
        let mut matchers = Vec::with_capacity(filters.len());
        for f in filters {
            match &f.filter {
                Filter::Equals(value) if metric.is_none() && f.is_metric_filter(&self.metric_column) => {
                    metric = Some(value.as_str());
                },
                filter => {
                    let (op, value) = match filter {
                        Filter::Equals(v) => ("=", v),
                        Filter::NotEquals(v) => ("!=", v),
                        Filter::EqualsRegex(v) => ("=~", v),
                        Filter::NotEqualsRegex(v) => ("!~", v),
                    };
                    matchers.push(format!("{}{}\"{}\"", f.column, op, escape(value)));
                },
            }
        }

        let name = match columns {
            [] => metric.unwrap_or("").to_string(),
            [column] => format!("{}::{}", metric.unwrap_or(""), column),
            _ => {
                return Err(QueryError::unsupported(format!(
                    "selecting {} columns has no query text form",
                    columns.len()
                )))
            },
        };
        if matchers.is_empty() && !name.is_empty() {
            Ok(name)
        } else {
            Ok(format!("{}{{{}}}", name, matchers.join(",")))
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn offset_suffix(offset_ms: Option<i64>) -> String {
    match offset_ms {
        Some(ms) if ms != 0 => format!(" offset {}", format_duration(ms)),
        _ => String::new(),
    }
}

/// Largest whole unit that represents the duration exactly
fn format_duration(ms: i64) -> String {
    const UNITS: [(i64, &str); 4] = [(3_600_000, "h"), (60_000, "m"), (1_000, "s"), (1, "ms")];
    if ms == 0 {
        return "0s".to_string();
    }
    for (size, suffix) in UNITS {
        if ms % size == 0 {
            return format!("{}{}", ms / size, suffix);
        }
    }
    format!("{}ms", ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::logical::{
        AggregationOperator, BinaryOperator, RangeFunction, RangeParams, PROM_METRIC_LABEL,
    };
    use crate::types::TimeRange;

    fn raw(metric: &str, extra: Vec<ColumnFilter>) -> LogicalPlan {
        let mut filters = vec![ColumnFilter::equals("_metric_", metric)];
        filters.extend(extra);
        LogicalPlan::raw_series(filters, TimeRange::new_unchecked(0, 300_000))
    }

    fn renderer() -> QueryRenderer {
        QueryRenderer::new("_metric_")
    }

    #[test]
    fn test_render_instant_selector() {
        let plan = LogicalPlan::periodic(
            raw("http_requests", vec![ColumnFilter::equals("job", "api")]),
            0,
            15_000,
            300_000,
        );
        assert_eq!(renderer().render(&plan).unwrap(), "http_requests{job=\"api\"}");
    }

    #[test]
    fn test_render_windowed_with_offset() {
        let raw = LogicalPlan::RawSeries {
            filters: vec![ColumnFilter::equals(PROM_METRIC_LABEL, "errors")],
            range: TimeRange::new_unchecked(0, 600_000),
            columns: Vec::new(),
            offset_ms: Some(3_600_000),
        };
        let plan = LogicalPlan::PeriodicSeriesWithWindowing {
            series: Box::new(raw),
            params: RangeParams {
                start_ms: 0,
                step_ms: 60_000,
                end_ms: 600_000,
            },
            window_ms: 300_000,
            function: RangeFunction::Rate,
        };
        assert_eq!(renderer().render(&plan).unwrap(), "rate(errors[5m] offset 1h)");
    }

    #[test]
    fn test_render_join_with_modifiers() {
        let lhs = LogicalPlan::periodic(raw("a", vec![]), 0, 10, 100);
        let rhs = LogicalPlan::Aggregate {
            operator: AggregationOperator::Sum,
            vectors: Box::new(LogicalPlan::periodic(raw("b", vec![]), 0, 10, 100)),
            by: vec!["job".into()],
            without: Vec::new(),
        };
        let join = BinaryJoin::new(lhs, BinaryOperator::Div, rhs)
            .on(&["job"])
            .group(Cardinality::ManyToOne, &["instance"]);
        assert_eq!(
            renderer().render(&LogicalPlan::BinaryJoin(join)).unwrap(),
            "(a / on(job) group_left(instance) sum by (job)(b))"
        );
    }

    #[test]
    fn test_render_escapes_and_regex() {
        let plan = LogicalPlan::periodic(
            raw(
                "m",
                vec![
                    ColumnFilter::regex("path", "/api/.*"),
                    ColumnFilter::not_equals("msg", "say \"hi\""),
                ],
            ),
            0,
            1,
            1,
        );
        assert_eq!(
            renderer().render(&plan).unwrap(),
            "m{path=~\"/api/.*\",msg!=\"say \\\"hi\\\"\"}"
        );
    }

    #[test]
    fn test_render_rejects_label_queries() {
        let plan = LogicalPlan::LabelNames {
            filters: Vec::new(),
            range: TimeRange::new_unchecked(0, 1),
        };
        assert!(renderer().render(&plan).is_err());
    }

    #[test]
    fn test_render_column_selection() {
        let counted = |extra: Vec<ColumnFilter>| LogicalPlan::RawSeries {
            filters: [vec![ColumnFilter::equals("_metric_", "req")], extra].concat(),
            range: TimeRange::new_unchecked(0, 300_000),
            columns: vec!["count".into()],
            offset_ms: None,
        };

        let instant = LogicalPlan::periodic(counted(Vec::new()), 0, 10_000, 60_000);
        assert_eq!(renderer().render(&instant).unwrap(), "req::count");

        let filtered = LogicalPlan::periodic(counted(vec![ColumnFilter::equals("job", "api")]), 0, 1, 1);
        assert_eq!(renderer().render(&filtered).unwrap(), "req::count{job=\"api\"}");

        let windowed = LogicalPlan::PeriodicSeriesWithWindowing {
            series: Box::new(counted(Vec::new())),
            params: RangeParams {
                start_ms: 0,
                step_ms: 60_000,
                end_ms: 600_000,
            },
            window_ms: 300_000,
            function: RangeFunction::Rate,
        };
        assert_eq!(renderer().render(&windowed).unwrap(), "rate(req::count[5m])");
        assert_eq!(renderer().render(&counted(Vec::new())).unwrap(), "req::count[5m]");
    }

    #[test]
    fn test_render_rejects_multiple_columns() {
        let plan = LogicalPlan::RawSeries {
            filters: vec![ColumnFilter::equals("_metric_", "req")],
            range: TimeRange::new_unchecked(0, 1),
            columns: vec!["count".into(), "sum".into()],
            offset_ms: None,
        };
        assert!(renderer().render(&plan).is_err());
    }

    #[test]
    fn test_distinct_subtrees_never_share_text_and_window() {
        let raw = |metric: &str, columns: Vec<String>, offset_ms: Option<i64>| LogicalPlan::RawSeries {
            filters: vec![ColumnFilter::equals("_metric_", metric)],
            range: TimeRange::new_unchecked(0, 60_000),
            columns,
            offset_ms,
        };
        let windowed = |function: RangeFunction, window_ms: i64| LogicalPlan::PeriodicSeriesWithWindowing {
            series: Box::new(raw("req", Vec::new(), None)),
            params: RangeParams {
                start_ms: 0,
                step_ms: 10_000,
                end_ms: 60_000,
            },
            window_ms,
            function,
        };
        let plans = vec![
            LogicalPlan::periodic(raw("req", Vec::new(), None), 0, 10_000, 60_000),
            LogicalPlan::periodic(raw("req", vec!["count".into()], None), 0, 10_000, 60_000),
            LogicalPlan::periodic(raw("req", Vec::new(), None), 500_000, 1, 999_000),
            LogicalPlan::periodic(raw("req", Vec::new(), Some(60_000)), 0, 10_000, 60_000),
            LogicalPlan::periodic(raw("other", Vec::new(), None), 0, 10_000, 60_000),
            windowed(RangeFunction::Rate, 300_000),
            windowed(RangeFunction::Rate, 60_000),
            windowed(RangeFunction::Increase, 300_000),
            raw("req", Vec::new(), None),
            LogicalPlan::raw_series(
                vec![ColumnFilter::equals("_metric_", "req")],
                TimeRange::new_unchecked(60_000, 120_000),
            ),
        ];

        let shipped: Vec<(String, Option<RangeParams>)> = plans
            .iter()
            .map(|plan| (renderer().render(plan).unwrap(), plan.range_params()))
            .collect();
        for (i, a) in shipped.iter().enumerate() {
            for b in &shipped[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(90_000), "90s");
        assert_eq!(format_duration(120_000), "2m");
        assert_eq!(format_duration(1_500), "1500ms");
    }
}
