//! Ordering specifications

use super::aggregation::AggregateFunction;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }

    /// PostgreSQL places nulls last ascending and first descending
    pub fn default_for(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => NullsOrder::Last,
            SortOrder::Desc => NullsOrder::First,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            NullsOrder::First => NullsOrder::Last,
            NullsOrder::Last => NullsOrder::First,
        }
    }
}

/// What an ordering key sorts by
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    Field(String),
    /// Only valid in groupBy
    Aggregate(AggregateFunction, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub target: OrderTarget,
    pub order: SortOrder,
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self::field(field, SortOrder::Asc)
    }

    pub fn desc(field: &str) -> Self {
        Self::field(field, SortOrder::Desc)
    }

    pub fn field(field: &str, order: SortOrder) -> Self {
        Self {
            target: OrderTarget::Field(field.to_string()),
            order,
            nulls: None,
        }
    }

    pub fn aggregate(function: AggregateFunction, field: &str, order: SortOrder) -> Self {
        Self {
            target: OrderTarget::Aggregate(function, field.to_string()),
            order,
            nulls: None,
        }
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    pub fn effective_nulls(&self) -> NullsOrder {
        self.nulls.unwrap_or_else(|| NullsOrder::default_for(self.order))
    }

    /// Same key walked in the opposite direction, nulls included
    pub fn reversed(&self) -> Self {
        Self {
            target: self.target.clone(),
            order: self.order.reversed(),
            nulls: Some(self.effective_nulls().reversed()),
        }
    }
}
