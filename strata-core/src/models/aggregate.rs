//! Aggregation over currently-valid versions: Reducer, AggregateValue.

use serde::{Deserialize, Serialize};

/// Reduction applied over a numeric business field of matching versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

/// Result of a reduction.
///
/// Field reducers over zero extracted values yield Empty (SQL aggregates of
/// an empty set are NULL); Count always yields a count. Tombstones carry no
/// fields, so they never contribute a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateValue {
    Float(f64),
    Count(u64),
    Empty,
}

impl AggregateValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AggregateValue::Float(v) => Some(*v),
            AggregateValue::Count(n) => Some(*n as f64),
            AggregateValue::Empty => None,
        }
    }
}

impl Reducer {
    /// Fold extracted field values into an aggregate. Count counts the
    /// versions that carried the field.
    pub fn fold<I>(&self, values: I) -> AggregateValue
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count: u64 = 0;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        match self {
            Reducer::Count => AggregateValue::Count(count),
            _ if count == 0 => AggregateValue::Empty,
            Reducer::Sum => AggregateValue::Float(sum),
            Reducer::Min => AggregateValue::Float(min),
            Reducer::Max => AggregateValue::Float(max),
            Reducer::Avg => AggregateValue::Float(sum / count as f64),
        }
    }

    /// Stable lowercase name, for config round-trips and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Count => "count",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Avg => "avg",
        }
    }
}
