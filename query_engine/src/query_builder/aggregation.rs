use super::args::UniqueWhere;
use super::filter::QueryFilter;
use super::ordering::OrderBy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Represents SQL aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFunction {
    /// Convert aggregate function to SQL string
    pub fn to_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }

    /// Key the results are reported under
    pub fn result_key(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "_count",
            AggregateFunction::Avg => "_avg",
            AggregateFunction::Sum => "_sum",
            AggregateFunction::Min => "_min",
            AggregateFunction::Max => "_max",
        }
    }

    /// Only numeric columns can be averaged or summed
    pub fn requires_numeric(&self) -> bool {
        matches!(self, AggregateFunction::Avg | AggregateFunction::Sum)
    }
}

/// Which aggregates to compute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSelection {
    /// `_count._all`
    pub count_all: bool,
    pub count: Vec<String>,
    pub avg: Vec<String>,
    pub sum: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

impl AggregateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_all(mut self) -> Self {
        self.count_all = true;
        self
    }

    pub fn count(mut self, field: &str) -> Self {
        self.count.push(field.to_string());
        self
    }

    pub fn avg(mut self, field: &str) -> Self {
        self.avg.push(field.to_string());
        self
    }

    pub fn sum(mut self, field: &str) -> Self {
        self.sum.push(field.to_string());
        self
    }

    pub fn min(mut self, field: &str) -> Self {
        self.min.push(field.to_string());
        self
    }

    pub fn max(mut self, field: &str) -> Self {
        self.max.push(field.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.count_all
            && self.count.is_empty()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    /// Requested (function, fields) groups, `_count` excluding `_all`
    pub fn groups(&self) -> [(AggregateFunction, &[String]); 5] {
        [
            (AggregateFunction::Count, &self.count),
            (AggregateFunction::Avg, &self.avg),
            (AggregateFunction::Sum, &self.sum),
            (AggregateFunction::Min, &self.min),
            (AggregateFunction::Max, &self.max),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateArgs {
    pub filter: Option<QueryFilter>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<UniqueWhere>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub aggregates: AggregateSelection,
}

impl AggregateArgs {
    pub fn new(aggregates: AggregateSelection) -> Self {
        Self {
            aggregates,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<UniqueWhere>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }
}

/// Accessors shared by aggregate results and groupBy rows
pub trait AggregateValues {
    fn values(&self) -> &Map<String, Value>;

    fn aggregate_value(&self, function: AggregateFunction, field: &str) -> Option<&Value> {
        self.values()
            .get(function.result_key())
            .and_then(|group| group.get(field))
            .filter(|v| !v.is_null())
    }

    fn count_all(&self) -> Option<i64> {
        self.aggregate_value(AggregateFunction::Count, "_all")
            .and_then(Value::as_i64)
    }

    /// Number of non-null values of `field`
    fn count(&self, field: &str) -> Option<i64> {
        self.aggregate_value(AggregateFunction::Count, field)
            .and_then(Value::as_i64)
    }

    fn avg(&self, field: &str) -> Option<f64> {
        self.aggregate_value(AggregateFunction::Avg, field)
            .and_then(Value::as_f64)
    }

    fn sum(&self, field: &str) -> Option<f64> {
        self.aggregate_value(AggregateFunction::Sum, field)
            .and_then(Value::as_f64)
    }

    fn min<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.aggregate_value(AggregateFunction::Min, field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn max<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.aggregate_value(AggregateFunction::Max, field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Result of `aggregate`, keyed `_count`, `_avg`, `_sum`, `_min`, `_max`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct AggregateResult(pub Map<String, Value>);

impl AggregateValues for AggregateResult {
    fn values(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Per-field non-null counts returned by `count` with a field selection
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CountResult(pub Map<String, Value>);

impl CountResult {
    pub fn all(&self) -> i64 {
        self.0.get("_all").and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn field(&self, field: &str) -> Option<i64> {
        self.0.get(field).and_then(Value::as_i64)
    }
}
