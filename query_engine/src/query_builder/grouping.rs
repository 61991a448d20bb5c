use super::aggregation::{AggregateFunction, AggregateSelection, AggregateValues};
use super::filter::{FieldFilter, QueryFilter};
use super::ordering::OrderBy;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Condition on grouped rows
#[derive(Debug, Clone, PartialEq)]
pub enum HavingFilter {
    /// Condition on a grouping field
    Field { field: String, filter: FieldFilter },
    /// Condition on an aggregate over the group, e.g. `_avg(price) > 10`
    Aggregate {
        function: AggregateFunction,
        field: String,
        filter: FieldFilter,
    },
    And(Vec<HavingFilter>),
    Or(Vec<HavingFilter>),
    Not(Vec<HavingFilter>),
}

impl HavingFilter {
    pub fn field(field: &str, filter: impl Into<FieldFilter>) -> Self {
        HavingFilter::Field {
            field: field.to_string(),
            filter: filter.into(),
        }
    }

    /// `field` may be `_all` for `_count`
    pub fn aggregate(function: AggregateFunction, field: &str, filter: impl Into<FieldFilter>) -> Self {
        HavingFilter::Aggregate {
            function,
            field: field.to_string(),
            filter: filter.into(),
        }
    }

    pub fn and(filters: Vec<HavingFilter>) -> Self {
        HavingFilter::And(filters)
    }

    pub fn or(filters: Vec<HavingFilter>) -> Self {
        HavingFilter::Or(filters)
    }

    pub fn not(filters: Vec<HavingFilter>) -> Self {
        HavingFilter::Not(filters)
    }
}

impl From<QueryFilter> for HavingFilter {
    /// Field conditions of a plain filter, applied to grouping fields
    fn from(filter: QueryFilter) -> Self {
        match filter {
            QueryFilter::Field { field, filter } => HavingFilter::Field { field, filter },
            QueryFilter::And(filters) => HavingFilter::And(filters.into_iter().map(Into::into).collect()),
            QueryFilter::Or(filters) => HavingFilter::Or(filters.into_iter().map(Into::into).collect()),
            QueryFilter::Not(filters) => HavingFilter::Not(filters.into_iter().map(Into::into).collect()),
            // Relation conditions are meaningless on groups; an empty OR never matches
            QueryFilter::Relation { .. } => HavingFilter::Or(Vec::new()),
        }
    }
}

/// Arguments of groupBy
#[derive(Debug, Clone, Default)]
pub struct GroupByArgs {
    /// Fields to group by
    pub by: Vec<String>,
    pub filter: Option<QueryFilter>,
    /// Optional HAVING conditions for filtering grouped results
    pub having: Option<HavingFilter>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    pub aggregates: AggregateSelection,
}

impl GroupByArgs {
    pub fn new<I, S>(by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: by.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add a HAVING condition; repeated calls combine with AND
    pub fn having(mut self, condition: HavingFilter) -> Self {
        self.having = Some(match self.having.take() {
            Some(HavingFilter::And(mut conditions)) => {
                conditions.push(condition);
                HavingFilter::And(conditions)
            }
            Some(existing) => HavingFilter::And(vec![existing, condition]),
            None => condition,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
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

    pub fn aggregates(mut self, aggregates: AggregateSelection) -> Self {
        self.aggregates = aggregates;
        self
    }
}

/// One group: the `by` field values plus the requested aggregates
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct GroupByRow(pub Map<String, Value>);

impl GroupByRow {
    /// Value of a grouping field
    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.0
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl AggregateValues for GroupByRow {
    fn values(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::filter::IntFilter;
    use serde_json::json;

    #[test]
    fn test_having_combines_with_and() {
        let args = GroupByArgs::new(["categoryId"])
            .having(HavingFilter::aggregate(
                AggregateFunction::Count,
                "_all",
                IntFilter::new().gt(1),
            ))
            .having(HavingFilter::field("categoryId", IntFilter::new().is_not_null()));

        match args.having {
            Some(HavingFilter::And(conditions)) => assert_eq!(conditions.len(), 2),
            other => panic!("expected AND, got {:?}", other),
        }
        assert_eq!(args.by, vec!["categoryId".to_string()]);
    }

    #[test]
    fn test_group_row_accessors() {
        let row: GroupByRow = serde_json::from_value(json!({
            "status": "pending",
            "_count": { "_all": 3, "totalPrice": 2 },
            "_avg": { "totalPrice": 12.5 },
            "_max": { "totalPrice": null }
        }))
        .unwrap();

        assert_eq!(row.get::<String>("status").as_deref(), Some("pending"));
        assert_eq!(row.count_all(), Some(3));
        assert_eq!(row.count("totalPrice"), Some(2));
        assert_eq!(row.avg("totalPrice"), Some(12.5));
        assert_eq!(row.max::<f64>("totalPrice"), None);
    }

    #[test]
    fn test_relation_conditions_never_match_groups() {
        let having: HavingFilter = QueryFilter::some("reviews", QueryFilter::all()).into();
        assert_eq!(having, HavingFilter::Or(Vec::new()));
    }
}
