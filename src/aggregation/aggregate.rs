//! Aggregate containers
//!
//! Three shapes hold computed values:
//!
//! - **Scalar**: a single value, replaced on every update
//! - **Buffer**: a pre-sized sequence updated in place; one buffer belongs to
//!   exactly one partition scan until it is handed to a merge
//! - **List**: an ordered sequence of identifiers; concatenation builds a new list

use super::error::AggregationError;

/// Fixed-shape container of aggregated values
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate<R> {
    /// One value
    Scalar(R),
    /// Fixed-length, mutable sequence
    Buffer(Vec<R>),
    /// Immutable ordered sequence
    List(Vec<R>),
}

impl<R> Aggregate<R> {
    /// Shape name for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            Aggregate::Scalar(_) => "scalar",
            Aggregate::Buffer(_) => "buffer",
            Aggregate::List(_) => "list",
        }
    }

    /// All values in order; a scalar is a one-element slice
    pub fn values(&self) -> &[R] {
        match self {
            Aggregate::Scalar(v) => std::slice::from_ref(v),
            Aggregate::Buffer(v) | Aggregate::List(v) => v,
        }
    }

    /// Number of values held
    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// True if no values are held
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Mutable access to a buffer's slots
    pub fn buffer_mut(&mut self) -> Option<&mut [R]> {
        match self {
            Aggregate::Buffer(v) => Some(v),
            _ => None,
        }
    }

    /// Combine two scalars into a new scalar
    pub fn merge_scalar(
        self,
        other: Self,
        combine: impl FnOnce(R, R) -> R,
    ) -> Result<Self, AggregationError> {
        match (self, other) {
            (Aggregate::Scalar(a), Aggregate::Scalar(b)) => Ok(Aggregate::Scalar(combine(a, b))),
            (a, b) => Err(AggregationError::ShapeMismatch {
                left: a.shape(),
                right: b.shape(),
            }),
        }
    }

    /// Fold `other`'s slots into this buffer in place and return it
    pub fn merge_buffer(
        self,
        other: Self,
        mut combine: impl FnMut(&mut R, R),
    ) -> Result<Self, AggregationError> {
        match (self, other) {
            (Aggregate::Buffer(mut a), Aggregate::Buffer(b)) => {
                if a.len() != b.len() {
                    return Err(AggregationError::LengthMismatch {
                        left: a.len(),
                        right: b.len(),
                    });
                }
                for (slot, value) in a.iter_mut().zip(b) {
                    combine(slot, value);
                }
                Ok(Aggregate::Buffer(a))
            },
            (a, b) => Err(AggregationError::ShapeMismatch {
                left: a.shape(),
                right: b.shape(),
            }),
        }
    }
}

impl<R: Clone> Aggregate<R> {
    /// New list holding this list's values followed by `other`'s
    pub fn concat(&self, other: &Self) -> Result<Self, AggregationError> {
        match (self, other) {
            (Aggregate::List(a), Aggregate::List(b)) => {
                let mut joined = Vec::with_capacity(a.len() + b.len());
                joined.extend_from_slice(a);
                joined.extend_from_slice(b);
                Ok(Aggregate::List(joined))
            },
            (a, b) => Err(AggregationError::ShapeMismatch {
                left: a.shape(),
                right: b.shape(),
            }),
        }
    }
}

/// Running sum and count of one bucket
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    /// Sum of observed values
    pub sum: f64,
    /// Number of observed values
    pub count: u64,
}

impl RunningAverage {
    /// Account for one value
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Fold another running average into this one
    pub fn combine(&mut self, other: &RunningAverage) {
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean of observed values, `None` if nothing was observed
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate produced by a bound aggregator, tagged by value type
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    /// Floating-point values
    Double(Aggregate<f64>),
    /// Integer values
    Long(Aggregate<i64>),
    /// Per-bucket minimum or maximum, `None` until a row is seen
    Extremes(Aggregate<Option<f64>>),
    /// Per-bucket running averages
    Average(Aggregate<RunningAverage>),
    /// Partition identifiers
    Keys(Aggregate<String>),
}

/// Client-facing form of an aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutput {
    /// Floating-point total
    Double(f64),
    /// Integer total
    Long(i64),
    /// One value per time bucket, `None` for buckets without rows
    Buckets(Vec<Option<f64>>),
    /// Partition identifiers
    Keys(Vec<String>),
}

impl AggregateValue {
    /// Value type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            AggregateValue::Double(_) => "double",
            AggregateValue::Long(_) => "long",
            AggregateValue::Extremes(_) => "extremes",
            AggregateValue::Average(_) => "average",
            AggregateValue::Keys(_) => "keys",
        }
    }

    /// Convert to output values
    pub fn finalize(&self) -> AggregateOutput {
        match self {
            AggregateValue::Double(Aggregate::Scalar(v)) => AggregateOutput::Double(*v),
            AggregateValue::Double(agg) => {
                AggregateOutput::Buckets(agg.values().iter().map(|v| Some(*v)).collect())
            },
            AggregateValue::Long(Aggregate::Scalar(v)) => AggregateOutput::Long(*v),
            AggregateValue::Long(agg) => {
                AggregateOutput::Buckets(agg.values().iter().map(|v| Some(*v as f64)).collect())
            },
            AggregateValue::Extremes(agg) => AggregateOutput::Buckets(agg.values().to_vec()),
            AggregateValue::Average(agg) => {
                AggregateOutput::Buckets(agg.values().iter().map(RunningAverage::mean).collect())
            },
            AggregateValue::Keys(agg) => AggregateOutput::Keys(agg.values().to_vec()),
        }
    }
}
