//! Aggregation function registry
//!
//! Each function validates a positional argument list against the query's
//! column projection and, on success, binds an aggregator to concrete column
//! positions. Validation runs before any chunk is read.
//!
//! | Function         | Arguments                               | Aggregate       |
//! |------------------|-----------------------------------------|-----------------|
//! | `sum`            | value column                            | scalar          |
//! | `count`          | any column                              | scalar          |
//! | `time_group_min` | time, value, start, end, bucket count   | buffer          |
//! | `time_group_max` | time, value, start, end, bucket count   | buffer          |
//! | `time_group_avg` | time, value, start, end, bucket count   | buffer          |
//! | `partition_keys` | none                                    | list            |
//!
//! Function names match case-insensitively. Start and end accept epoch
//! milliseconds or an ISO-8601 datetime. Bucket counts are at most
//! [`MAX_TIME_BUCKETS`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use tracing::debug;

use crate::types::{ColumnInfo, ColumnType, Projection};

use super::aggregator::{
    AvgReducer, BoundAggregator, BucketReducer, CountAggregator, DoubleSumAggregator,
    LongSumAggregator, MaxReducer, MinReducer, PartitionKeysAggregator, TimeGroupAggregator,
};
use super::error::ValidationError;

/// Largest bucket count a time-grouping function accepts
pub const MAX_TIME_BUCKETS: usize = 1 << 20;

const NUMERIC_TYPES: &[ColumnType] = &[ColumnType::Int, ColumnType::Long, ColumnType::Double];
const TIME_TYPES: &[ColumnType] = &[ColumnType::Long, ColumnType::Timestamp];
const ANY_TYPE: &[ColumnType] = &[
    ColumnType::Int,
    ColumnType::Long,
    ColumnType::Double,
    ColumnType::Timestamp,
    ColumnType::String,
];

lazy_static! {
    /// Canonical name → function
    static ref FUNCTIONS_BY_NAME: HashMap<&'static str, AggregationFunction> = AggregationFunction::ALL
        .iter()
        .map(|function| (function.name(), *function))
        .collect();
}

/// Aggregation functions known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationFunction {
    /// Sum of a numeric column
    Sum,
    /// Number of values in a column
    Count,
    /// Minimum per time bucket
    TimeGroupMin,
    /// Maximum per time bucket
    TimeGroupMax,
    /// Average per time bucket
    TimeGroupAvg,
    /// Identifiers of the partitions scanned
    PartitionKeys,
}

impl AggregationFunction {
    /// Every registered function
    pub const ALL: [AggregationFunction; 6] = [
        AggregationFunction::Sum,
        AggregationFunction::Count,
        AggregationFunction::TimeGroupMin,
        AggregationFunction::TimeGroupMax,
        AggregationFunction::TimeGroupAvg,
        AggregationFunction::PartitionKeys,
    ];

    /// Canonical lower-snake-case name
    pub fn name(&self) -> &'static str {
        match self {
            AggregationFunction::Sum => "sum",
            AggregationFunction::Count => "count",
            AggregationFunction::TimeGroupMin => "time_group_min",
            AggregationFunction::TimeGroupMax => "time_group_max",
            AggregationFunction::TimeGroupAvg => "time_group_avg",
            AggregationFunction::PartitionKeys => "partition_keys",
        }
    }

    /// Look up a function by name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        FUNCTIONS_BY_NAME
            .get(name.trim().to_ascii_lowercase().as_str())
            .copied()
    }

    /// Number of arguments the function takes
    pub fn arity(&self) -> usize {
        match self {
            AggregationFunction::Sum | AggregationFunction::Count => 1,
            AggregationFunction::TimeGroupMin
            | AggregationFunction::TimeGroupMax
            | AggregationFunction::TimeGroupAvg => 5,
            AggregationFunction::PartitionKeys => 0,
        }
    }

    /// Types accepted for the value column
    pub fn allowed_types(&self) -> &'static [ColumnType] {
        match self {
            AggregationFunction::Count => ANY_TYPE,
            AggregationFunction::PartitionKeys => &[],
            _ => NUMERIC_TYPES,
        }
    }

    /// Validate arguments against a projection and bind an aggregator
    pub fn validate<S: AsRef<str>>(
        &self,
        args: &[S],
        projection: &Projection,
    ) -> Result<BoundAggregator, ValidationError> {
        expect_arg_count(*self, args.len())?;

        let bound = match self {
            AggregationFunction::Sum => {
                let column = self.value_column(args, 0, projection)?;
                if column.column_type == ColumnType::Double {
                    BoundAggregator::DoubleSum(DoubleSumAggregator::new(column.index))
                } else {
                    BoundAggregator::LongSum(LongSumAggregator::new(column.index))
                }
            },
            AggregationFunction::Count => {
                let column = self.value_column(args, 0, projection)?;
                BoundAggregator::Count(CountAggregator::new(column.index))
            },
            AggregationFunction::TimeGroupMin => {
                BoundAggregator::TimeGroupMin(self.time_group::<MinReducer, S>(args, projection)?)
            },
            AggregationFunction::TimeGroupMax => {
                BoundAggregator::TimeGroupMax(self.time_group::<MaxReducer, S>(args, projection)?)
            },
            AggregationFunction::TimeGroupAvg => {
                BoundAggregator::TimeGroupAvg(self.time_group::<AvgReducer, S>(args, projection)?)
            },
            AggregationFunction::PartitionKeys => BoundAggregator::PartitionKeys(PartitionKeysAggregator),
        };

        debug!(
            function = self.name(),
            columns = ?bound.columns(),
            "Bound aggregation function"
        );
        Ok(bound)
    }

    fn value_column<'p, S: AsRef<str>>(
        &self,
        args: &[S],
        position: usize,
        projection: &'p Projection,
    ) -> Result<&'p ColumnInfo, ValidationError> {
        let column = resolve_column(projection, position, args[position].as_ref())?;
        check_type(self.name(), position, column, self.allowed_types())?;
        Ok(column)
    }

    fn time_group<B: BucketReducer, S: AsRef<str>>(
        &self,
        args: &[S],
        projection: &Projection,
    ) -> Result<TimeGroupAggregator<B>, ValidationError> {
        let time = resolve_column(projection, 0, args[0].as_ref())?;
        check_type(self.name(), 0, time, TIME_TYPES)?;
        let value = self.value_column(args, 1, projection)?;
        let start = parse_time(2, args[2].as_ref())?;
        let end = parse_time(3, args[3].as_ref())?;
        if end <= start {
            return Err(ValidationError::MalformedLiteral {
                position: 3,
                value: args[3].as_ref().to_string(),
                reason: format!("end must be after start ({})", start),
            });
        }
        let buckets = parse_bucket_count(4, args[4].as_ref())?;
        Ok(TimeGroupAggregator::new(time.index, value.index, start, end, buckets))
    }
}

/// Resolve a function by name and validate its arguments
pub fn bind<S: AsRef<str>>(
    name: &str,
    args: &[S],
    projection: &Projection,
) -> Result<BoundAggregator, ValidationError> {
    AggregationFunction::from_name(name)
        .ok_or_else(|| ValidationError::UnknownFunction(name.to_string()))?
        .validate(args, projection)
}

// ============================================================================
// Validation steps
// ============================================================================

fn expect_arg_count(function: AggregationFunction, actual: usize) -> Result<(), ValidationError> {
    if actual == function.arity() {
        Ok(())
    } else {
        Err(ValidationError::WrongArgumentCount {
            function: function.name(),
            expected: function.arity(),
            actual,
        })
    }
}

fn resolve_column<'p>(
    projection: &'p Projection,
    position: usize,
    name: &str,
) -> Result<&'p ColumnInfo, ValidationError> {
    projection
        .column(name)
        .ok_or_else(|| ValidationError::UnknownColumn {
            position,
            column: name.to_string(),
        })
}

fn check_type(
    function: &'static str,
    position: usize,
    column: &ColumnInfo,
    allowed: &[ColumnType],
) -> Result<(), ValidationError> {
    if allowed.contains(&column.column_type) {
        Ok(())
    } else {
        Err(ValidationError::DisallowedColumnType {
            function,
            position,
            column: column.name.clone(),
            actual: column.column_type,
            allowed: allowed.to_vec(),
        })
    }
}

/// Epoch milliseconds from an integer literal or an ISO-8601 datetime
fn parse_time(position: usize, value: &str) -> Result<i64, ValidationError> {
    let text = value.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(datetime.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp_millis());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&midnight).timestamp_millis());
    }
    Err(ValidationError::MalformedLiteral {
        position,
        value: value.to_string(),
        reason: "expected epoch milliseconds or an ISO-8601 datetime".to_string(),
    })
}

fn parse_bucket_count(position: usize, value: &str) -> Result<usize, ValidationError> {
    let buckets = value
        .trim()
        .parse::<usize>()
        .map_err(|e| ValidationError::MalformedLiteral {
            position,
            value: value.to_string(),
            reason: e.to_string(),
        })?;
    if buckets > MAX_TIME_BUCKETS {
        return Err(ValidationError::MalformedLiteral {
            position,
            value: value.to_string(),
            reason: format!("at most {} buckets are allowed", MAX_TIME_BUCKETS),
        });
    }
    Ok(buckets)
}
