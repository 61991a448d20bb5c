//! Filter grammar
//!
//! A `QueryFilter` is a boolean tree of per-field conditions, relation
//! conditions and `AND`/`OR`/`NOT` groups. Operand values are kept as JSON
//! and coerced against the column type when SQL is generated.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;

/// Per-field condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equals,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    /// list contains the value
    Has,
    /// list contains every value
    HasEvery,
    /// list contains at least one value
    HasSome,
    IsEmpty,
}

impl QueryOperator {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "equals" => QueryOperator::Equals,
            "in" => QueryOperator::In,
            "notIn" => QueryOperator::NotIn,
            "lt" => QueryOperator::Lt,
            "lte" => QueryOperator::Lte,
            "gt" => QueryOperator::Gt,
            "gte" => QueryOperator::Gte,
            "contains" => QueryOperator::Contains,
            "startsWith" => QueryOperator::StartsWith,
            "endsWith" => QueryOperator::EndsWith,
            "has" => QueryOperator::Has,
            "hasEvery" => QueryOperator::HasEvery,
            "hasSome" => QueryOperator::HasSome,
            "isEmpty" => QueryOperator::IsEmpty,
            _ => return None,
        })
    }

    pub fn key(&self) -> &'static str {
        match self {
            QueryOperator::Equals => "equals",
            QueryOperator::In => "in",
            QueryOperator::NotIn => "notIn",
            QueryOperator::Lt => "lt",
            QueryOperator::Lte => "lte",
            QueryOperator::Gt => "gt",
            QueryOperator::Gte => "gte",
            QueryOperator::Contains => "contains",
            QueryOperator::StartsWith => "startsWith",
            QueryOperator::EndsWith => "endsWith",
            QueryOperator::Has => "has",
            QueryOperator::HasEvery => "hasEvery",
            QueryOperator::HasSome => "hasSome",
            QueryOperator::IsEmpty => "isEmpty",
        }
    }
}

/// Single condition on a field
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCondition {
    pub operator: QueryOperator,
    pub value: Value,
}

/// String comparison mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// All conditions on one field, combined with AND
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldFilter {
    pub conditions: Vec<QueryCondition>,
    pub not: Option<Box<FieldFilter>>,
    pub mode: QueryMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelationFilter {
    Some(Box<QueryFilter>),
    Every(Box<QueryFilter>),
    None(Box<QueryFilter>),
    /// `None` matches rows whose relation is absent
    Is(Option<Box<QueryFilter>>),
    /// `None` matches rows whose relation is present
    IsNot(Option<Box<QueryFilter>>),
}

/// Query filter that can be nested
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Field { field: String, filter: FieldFilter },
    Relation { relation: String, filter: RelationFilter },
    And(Vec<QueryFilter>),
    Or(Vec<QueryFilter>),
    Not(Vec<QueryFilter>),
}

pub(crate) fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, operator: QueryOperator, value: Value) -> Self {
        self.conditions.push(QueryCondition { operator, value });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.not.is_none()
    }

    /// Parse `{ "contains": "x", "mode": "insensitive", "not": ... }` or a bare value
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let map = match value {
            Value::Object(map) => map,
            other => return Ok(FieldFilter::new().push(QueryOperator::Equals, other.clone())),
        };
        let mut filter = FieldFilter::new();
        for (key, operand) in map {
            match key.as_str() {
                "mode" => {
                    filter.mode = serde_json::from_value(operand.clone())
                        .map_err(|_| format!("Invalid query mode {}", operand))?;
                }
                "not" => {
                    filter.not = Some(Box::new(FieldFilter::from_json(operand)?));
                }
                other => {
                    let operator = QueryOperator::from_key(other)
                        .ok_or_else(|| format!("Unknown filter condition `{}`", other))?;
                    filter.conditions.push(QueryCondition {
                        operator,
                        value: operand.clone(),
                    });
                }
            }
        }
        Ok(filter)
    }
}

impl QueryFilter {
    /// Matches every row
    pub fn all() -> Self {
        QueryFilter::And(Vec::new())
    }

    pub fn field(field: &str, filter: impl Into<FieldFilter>) -> Self {
        QueryFilter::Field {
            field: field.to_string(),
            filter: filter.into(),
        }
    }

    /// Equality shorthand; `null` matches missing values
    pub fn equals<T: Serialize>(field: &str, value: T) -> Self {
        Self::field(field, FieldFilter::new().push(QueryOperator::Equals, to_json(value)))
    }

    pub fn is_null(field: &str) -> Self {
        Self::field(field, FieldFilter::new().push(QueryOperator::Equals, Value::Null))
    }

    pub fn and(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::And(filters)
    }

    pub fn or(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::Or(filters)
    }

    pub fn not(filters: Vec<QueryFilter>) -> Self {
        QueryFilter::Not(filters)
    }

    /// At least one related row matches
    pub fn some(relation: &str, filter: QueryFilter) -> Self {
        Self::relation(relation, RelationFilter::Some(Box::new(filter)))
    }

    /// All related rows match (vacuously true without related rows)
    pub fn every(relation: &str, filter: QueryFilter) -> Self {
        Self::relation(relation, RelationFilter::Every(Box::new(filter)))
    }

    /// No related row matches
    pub fn none(relation: &str, filter: QueryFilter) -> Self {
        Self::relation(relation, RelationFilter::None(Box::new(filter)))
    }

    /// The related row exists and matches
    pub fn is(relation: &str, filter: QueryFilter) -> Self {
        Self::relation(relation, RelationFilter::Is(Some(Box::new(filter))))
    }

    /// The related row is absent or does not match
    pub fn is_not(relation: &str, filter: QueryFilter) -> Self {
        Self::relation(relation, RelationFilter::IsNot(Some(Box::new(filter))))
    }

    pub fn relation_absent(relation: &str) -> Self {
        Self::relation(relation, RelationFilter::Is(None))
    }

    pub fn relation_present(relation: &str) -> Self {
        Self::relation(relation, RelationFilter::IsNot(None))
    }

    pub fn relation(relation: &str, filter: RelationFilter) -> Self {
        QueryFilter::Relation {
            relation: relation.to_string(),
            filter,
        }
    }

    /// Combine with another filter under AND, flattening nested ANDs
    pub fn and_also(self, other: QueryFilter) -> Self {
        match self {
            QueryFilter::And(mut filters) => {
                filters.push(other);
                QueryFilter::And(filters)
            }
            filter => QueryFilter::And(vec![filter, other]),
        }
    }

    /// Parse the JSON filter grammar:
    /// `{ "name": { "contains": "sh" }, "OR": [...], "reviews": { "some": {...} } }`
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("A filter must be an object, got {}", value))?;
        let mut filters = Vec::with_capacity(map.len());
        for (key, operand) in map {
            filters.push(match key.as_str() {
                "AND" => QueryFilter::And(Self::filter_list(operand)?),
                "OR" => QueryFilter::Or(Self::filter_list(operand)?),
                "NOT" => QueryFilter::Not(Self::filter_list(operand)?),
                field => match operand {
                    Value::Object(inner) if Self::is_relation_filter(inner) => {
                        Self::relation_from_json(field, inner)?
                    }
                    other => QueryFilter::Field {
                        field: field.to_string(),
                        filter: FieldFilter::from_json(other)?,
                    },
                },
            });
        }
        Ok(match filters.len() {
            1 => filters.remove(0),
            _ => QueryFilter::And(filters),
        })
    }

    fn filter_list(value: &Value) -> Result<Vec<QueryFilter>, String> {
        match value {
            Value::Array(items) => items.iter().map(QueryFilter::from_json).collect(),
            other => Ok(vec![QueryFilter::from_json(other)?]),
        }
    }

    fn is_relation_filter(map: &Map<String, Value>) -> bool {
        !map.is_empty()
            && map
                .keys()
                .all(|k| matches!(k.as_str(), "some" | "every" | "none" | "is" | "isNot"))
    }

    fn relation_from_json(relation: &str, map: &Map<String, Value>) -> Result<Self, String> {
        let optional = |v: &Value| -> Result<Option<Box<QueryFilter>>, String> {
            match v {
                Value::Null => Ok(None),
                other => Ok(Some(Box::new(QueryFilter::from_json(other)?))),
            }
        };
        let mut filters = Vec::with_capacity(map.len());
        for (key, operand) in map {
            let filter = match key.as_str() {
                "some" => RelationFilter::Some(Box::new(QueryFilter::from_json(operand)?)),
                "every" => RelationFilter::Every(Box::new(QueryFilter::from_json(operand)?)),
                "none" => RelationFilter::None(Box::new(QueryFilter::from_json(operand)?)),
                "is" => RelationFilter::Is(optional(operand)?),
                _ => RelationFilter::IsNot(optional(operand)?),
            };
            filters.push(Self::relation(relation, filter));
        }
        Ok(match filters.len() {
            1 => filters.remove(0),
            _ => QueryFilter::And(filters),
        })
    }
}

impl<'de> Deserialize<'de> for QueryFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        QueryFilter::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Conditions on a String column
#[derive(Debug, Clone, Default)]
pub struct StringFilter(FieldFilter);

impl StringFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, operator: QueryOperator, value: Value) -> Self {
        Self(self.0.push(operator, value))
    }

    pub fn equals(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Equals, Value::String(value.into()))
    }

    pub fn in_<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(|v| Value::String(v.into())).collect();
        self.with(QueryOperator::In, Value::Array(values))
    }

    pub fn not_in<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(|v| Value::String(v.into())).collect();
        self.with(QueryOperator::NotIn, Value::Array(values))
    }

    pub fn lt(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Lt, Value::String(value.into()))
    }

    pub fn lte(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Lte, Value::String(value.into()))
    }

    pub fn gt(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Gt, Value::String(value.into()))
    }

    pub fn gte(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Gte, Value::String(value.into()))
    }

    pub fn contains(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Contains, Value::String(value.into()))
    }

    pub fn starts_with(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::StartsWith, Value::String(value.into()))
    }

    pub fn ends_with(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::EndsWith, Value::String(value.into()))
    }

    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.0.mode = mode;
        self
    }

    pub fn insensitive(self) -> Self {
        self.mode(QueryMode::Insensitive)
    }

    pub fn not(mut self, inner: StringFilter) -> Self {
        self.0.not = Some(Box::new(inner.0));
        self
    }

    /// Nullable columns only
    pub fn is_null(self) -> Self {
        self.with(QueryOperator::Equals, Value::Null)
    }

    /// Nullable columns only
    pub fn is_not_null(mut self) -> Self {
        self.0.not = Some(Box::new(FieldFilter::new().push(QueryOperator::Equals, Value::Null)));
        self
    }
}

impl From<StringFilter> for FieldFilter {
    fn from(filter: StringFilter) -> Self {
        filter.0
    }
}

/// Conditions on an Int, Float, DateTime, Uuid or Boolean column
#[derive(Debug, Clone)]
pub struct ScalarFilter<T> {
    inner: FieldFilter,
    _marker: PhantomData<fn(T)>,
}

pub type IntFilter = ScalarFilter<i32>;
pub type FloatFilter = ScalarFilter<f64>;
pub type DateTimeFilter = ScalarFilter<chrono::DateTime<chrono::Utc>>;
pub type UuidFilter = ScalarFilter<uuid::Uuid>;
pub type BoolFilter = ScalarFilter<bool>;

impl<T: Serialize> Default for ScalarFilter<T> {
    fn default() -> Self {
        Self {
            inner: FieldFilter::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize> ScalarFilter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, operator: QueryOperator, value: Value) -> Self {
        self.inner = self.inner.push(operator, value);
        self
    }

    pub fn equals(self, value: T) -> Self {
        self.with(QueryOperator::Equals, to_json(value))
    }

    pub fn in_(self, values: impl IntoIterator<Item = T>) -> Self {
        let values = values.into_iter().map(to_json).collect();
        self.with(QueryOperator::In, Value::Array(values))
    }

    pub fn not_in(self, values: impl IntoIterator<Item = T>) -> Self {
        let values = values.into_iter().map(to_json).collect();
        self.with(QueryOperator::NotIn, Value::Array(values))
    }

    pub fn lt(self, value: T) -> Self {
        self.with(QueryOperator::Lt, to_json(value))
    }

    pub fn lte(self, value: T) -> Self {
        self.with(QueryOperator::Lte, to_json(value))
    }

    pub fn gt(self, value: T) -> Self {
        self.with(QueryOperator::Gt, to_json(value))
    }

    pub fn gte(self, value: T) -> Self {
        self.with(QueryOperator::Gte, to_json(value))
    }

    pub fn not(mut self, inner: ScalarFilter<T>) -> Self {
        self.inner.not = Some(Box::new(inner.inner));
        self
    }

    /// Nullable columns only
    pub fn is_null(self) -> Self {
        self.with(QueryOperator::Equals, Value::Null)
    }

    /// Nullable columns only
    pub fn is_not_null(mut self) -> Self {
        self.inner.not = Some(Box::new(FieldFilter::new().push(QueryOperator::Equals, Value::Null)));
        self
    }
}

impl<T> From<ScalarFilter<T>> for FieldFilter {
    fn from(filter: ScalarFilter<T>) -> Self {
        filter.inner
    }
}

/// Conditions on a String[] column
#[derive(Debug, Clone, Default)]
pub struct ListFilter(FieldFilter);

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, operator: QueryOperator, value: Value) -> Self {
        Self(self.0.push(operator, value))
    }

    pub fn has(self, value: impl Into<String>) -> Self {
        self.with(QueryOperator::Has, Value::String(value.into()))
    }

    pub fn has_every<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(QueryOperator::HasEvery, string_array(values))
    }

    pub fn has_some<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(QueryOperator::HasSome, string_array(values))
    }

    pub fn is_empty(self, empty: bool) -> Self {
        self.with(QueryOperator::IsEmpty, Value::Bool(empty))
    }

    /// Whole-list equality, order sensitive
    pub fn equals<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(QueryOperator::Equals, string_array(values))
    }
}

fn string_array<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Array(values.into_iter().map(|v| Value::String(v.into())).collect())
}

impl From<ListFilter> for FieldFilter {
    fn from(filter: ListFilter) -> Self {
        filter.0
    }
}
