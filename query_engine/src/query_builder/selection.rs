//! `select` / `include` / `omit` / `_count` shaping of returned rows

use super::args::FindArgs;

/// A relation to load, with its own filtering and pagination for to-many relations
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSelection {
    pub relation: String,
    pub args: FindArgs,
}

/// Exactly the listed fields and relations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectSet {
    pub fields: Vec<String>,
    pub relations: Vec<RelationSelection>,
    pub count: Vec<String>,
}

/// All scalar fields plus the listed relations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSet {
    pub relations: Vec<RelationSelection>,
    pub count: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub select: Option<SelectSet>,
    pub include: Option<IncludeSet>,
    pub omit: Vec<String>,
}

impl Selection {
    pub fn is_default(&self) -> bool {
        self.select.is_none() && self.include.is_none() && self.omit.is_empty()
    }

    /// Only this relation, used by fluent relation access
    pub fn only_relation(relation: &str, args: FindArgs) -> Self {
        Selection {
            select: Some(SelectSet {
                fields: Vec::new(),
                relations: vec![RelationSelection {
                    relation: relation.to_string(),
                    args,
                }],
                count: Vec::new(),
            }),
            include: None,
            omit: Vec::new(),
        }
    }
}

/// Builder methods for every argument type that shapes its result rows
pub trait Selectable: Sized {
    fn selection_mut(&mut self) -> &mut Selection;

    /// Add a scalar field to `select`
    fn select(mut self, field: &str) -> Self {
        self.selection_mut()
            .select
            .get_or_insert_with(SelectSet::default)
            .fields
            .push(field.to_string());
        self
    }

    fn select_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection_mut()
            .select
            .get_or_insert_with(SelectSet::default)
            .fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add a relation to `select`
    fn select_relation(mut self, relation: &str, args: FindArgs) -> Self {
        self.selection_mut()
            .select
            .get_or_insert_with(SelectSet::default)
            .relations
            .push(RelationSelection {
                relation: relation.to_string(),
                args,
            });
        self
    }

    fn select_count(mut self, relation: &str) -> Self {
        self.selection_mut()
            .select
            .get_or_insert_with(SelectSet::default)
            .count
            .push(relation.to_string());
        self
    }

    fn include(self, relation: &str) -> Self {
        self.include_with(relation, FindArgs::new())
    }

    fn include_with(mut self, relation: &str, args: FindArgs) -> Self {
        self.selection_mut()
            .include
            .get_or_insert_with(IncludeSet::default)
            .relations
            .push(RelationSelection {
                relation: relation.to_string(),
                args,
            });
        self
    }

    /// Count related rows under `_count`
    fn include_count(mut self, relation: &str) -> Self {
        self.selection_mut()
            .include
            .get_or_insert_with(IncludeSet::default)
            .count
            .push(relation.to_string());
        self
    }

    fn omit(mut self, field: &str) -> Self {
        self.selection_mut().omit.push(field.to_string());
        self
    }
}

impl Selectable for Selection {
    fn selection_mut(&mut self) -> &mut Selection {
        self
    }
}
