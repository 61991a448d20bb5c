//! Arguments of every delegate operation
//!
//! One set of argument types serves all models; field and relation names are
//! checked against the model's schema when the operation is compiled.

use super::filter::{to_json, QueryFilter};
use super::ordering::OrderBy;
use super::selection::{Selectable, Selection};
use super::update::{CreateData, UpdateData};
use crate::schema::Model;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::marker::PhantomData;

/// Lookup by a unique field, optionally narrowed by further conditions
///
/// `equals` holds every plain `field = value` pair in the order given; at
/// least one of them must be on an id or unique field of the model, which is
/// checked when the operation is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueWhere {
    pub equals: Vec<(String, Value)>,
    pub extra: Option<QueryFilter>,
}

impl UniqueWhere {
    pub fn new<T: Serialize>(field: &str, value: T) -> Self {
        Self {
            equals: vec![(field.to_string(), to_json(value))],
            extra: None,
        }
    }

    /// Add non-unique conditions the row must also satisfy
    pub fn and(mut self, filter: QueryFilter) -> Self {
        self.extra = Some(match self.extra.take() {
            Some(existing) => existing.and_also(filter),
            None => filter,
        });
        self
    }

    pub fn to_filter(&self) -> QueryFilter {
        let mut parts: Vec<QueryFilter> = self
            .equals
            .iter()
            .map(|(field, value)| QueryFilter::equals(field, value.clone()))
            .collect();
        parts.extend(self.extra.clone());
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            QueryFilter::And(parts)
        }
    }

    /// Parse `{ "email": "a@b.c", "name": { "contains": "x" } }`; keys holding
    /// plain values are candidates for the unique field
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("A unique filter must be an object, got {}", value))?;
        let is_plain = |k: &str, v: &Value| !v.is_object() && !matches!(k, "AND" | "OR" | "NOT");
        let equals: Vec<(String, Value)> = map
            .iter()
            .filter(|(k, v)| is_plain(k.as_str(), *v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if equals.is_empty() {
            return Err("A unique filter needs a unique field with a value".to_string());
        }
        let rest: serde_json::Map<String, Value> = map
            .iter()
            .filter(|(k, v)| !is_plain(k.as_str(), *v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self {
            equals,
            extra: if rest.is_empty() {
                None
            } else {
                Some(QueryFilter::from_json(&Value::Object(rest))?)
            },
        })
    }
}

impl<'de> Deserialize<'de> for UniqueWhere {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        UniqueWhere::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// A unique lookup typed to its model; produced by the `by_*` constructors
/// the `Model` derive generates for `#[primary_key]` and unique fields
#[derive(Debug, Clone, PartialEq)]
pub struct Unique<M> {
    inner: UniqueWhere,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Unique<M> {
    #[doc(hidden)]
    pub fn from_unique_field<T: Serialize>(field: &str, value: T) -> Self {
        Self {
            inner: UniqueWhere::new(field, value),
            _model: PhantomData,
        }
    }

    pub fn and(mut self, filter: QueryFilter) -> Self {
        self.inner = self.inner.and(filter);
        self
    }
}

impl<M> From<Unique<M>> for UniqueWhere {
    fn from(unique: Unique<M>) -> Self {
        unique.inner
    }
}

/// Arguments of findFirst / findMany and of nested to-many relation loads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filter: Option<QueryFilter>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<UniqueWhere>,
    pub skip: Option<i64>,
    /// Negative values page backwards from the cursor
    pub take: Option<i64>,
    pub distinct: Vec<String>,
    pub selection: Selection,
}

impl FindArgs {
    pub fn new() -> Self {
        Self::default()
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

    pub fn distinct(mut self, field: &str) -> Self {
        self.distinct.push(field.to_string());
        self
    }

    /// Any filtering, ordering or paging beyond the plain relation
    pub fn has_query_options(&self) -> bool {
        self.filter.is_some()
            || !self.order_by.is_empty()
            || self.cursor.is_some()
            || self.skip.is_some()
            || self.take.is_some()
            || !self.distinct.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindUniqueArgs {
    pub where_: UniqueWhere,
    pub selection: Selection,
}

impl FindUniqueArgs {
    pub fn new(where_: impl Into<UniqueWhere>) -> Self {
        Self {
            where_: where_.into(),
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateArgs {
    pub data: CreateData,
    pub selection: Selection,
}

impl CreateArgs {
    pub fn new(data: CreateData) -> Self {
        Self {
            data,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateManyArgs {
    pub data: Vec<CreateData>,
    pub skip_duplicates: bool,
    /// Shapes the rows of createManyAndReturn
    pub selection: Selection,
}

impl CreateManyArgs {
    pub fn new(data: Vec<CreateData>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.skip_duplicates = skip;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub where_: UniqueWhere,
    pub data: UpdateData,
    pub selection: Selection,
}

impl UpdateArgs {
    pub fn new(where_: impl Into<UniqueWhere>, data: UpdateData) -> Self {
        Self {
            where_: where_.into(),
            data,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateManyArgs {
    pub filter: Option<QueryFilter>,
    pub data: UpdateData,
    pub limit: Option<i64>,
    /// Shapes the rows of updateManyAndReturn
    pub selection: Selection,
}

impl UpdateManyArgs {
    pub fn new(data: UpdateData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertArgs {
    pub where_: UniqueWhere,
    pub create: CreateData,
    pub update: UpdateData,
    pub selection: Selection,
}

impl UpsertArgs {
    pub fn new(where_: impl Into<UniqueWhere>, create: CreateData, update: UpdateData) -> Self {
        Self {
            where_: where_.into(),
            create,
            update,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteArgs {
    pub where_: UniqueWhere,
    pub selection: Selection,
}

impl DeleteArgs {
    pub fn new(where_: impl Into<UniqueWhere>) -> Self {
        Self {
            where_: where_.into(),
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteManyArgs {
    pub filter: Option<QueryFilter>,
    pub limit: Option<i64>,
}

impl DeleteManyArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountArgs {
    pub filter: Option<QueryFilter>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<UniqueWhere>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    /// Per-field non-null counts; `_all` counts rows
    pub select: Vec<String>,
}

impl CountArgs {
    pub fn new() -> Self {
        Self::default()
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

    pub fn select(mut self, field: &str) -> Self {
        self.select.push(field.to_string());
        self
    }

    /// Same rows as a find with these arguments
    pub(crate) fn as_find_args(&self) -> FindArgs {
        FindArgs {
            filter: self.filter.clone(),
            order_by: self.order_by.clone(),
            cursor: self.cursor.clone(),
            skip: self.skip,
            take: self.take,
            distinct: Vec::new(),
            selection: Selection::default(),
        }
    }
}

macro_rules! impl_selectable {
    ($($ty:ty),*) => {
        $(impl Selectable for $ty {
            fn selection_mut(&mut self) -> &mut Selection {
                &mut self.selection
            }
        })*
    };
}

impl_selectable!(
    FindArgs,
    FindUniqueArgs,
    CreateArgs,
    CreateManyArgs,
    UpdateArgs,
    UpdateManyArgs,
    UpsertArgs,
    DeleteArgs
);
