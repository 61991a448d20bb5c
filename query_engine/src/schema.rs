//! Static schema metadata
//!
//! Every entity struct describes itself through `Model::def()`, generated by
//! `#[derive(Model)]`. The query engine validates arguments and builds SQL
//! from these descriptions only.

use crate::errors::ClientError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use type_mapping::ScalarType;

/// Value the client fills in when the caller leaves a column out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoValue {
    None,
    /// Random v4 identifier on create
    Uuid,
    /// Current instant on create
    CreatedAt,
    /// Current instant on create, refreshed on every update
    UpdatedAt,
}

#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub scalar: ScalarType,
    pub nullable: bool,
    pub is_id: bool,
    pub is_unique: bool,
    /// The store supplies a default when the column is omitted
    pub has_default: bool,
    pub auto: AutoValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ToOne,
    ToMany,
}

/// A navigable relation; rows join on `target.remote_field = self.local_field`
#[derive(Debug)]
pub struct RelationDef {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: fn() -> &'static ModelDef,
    pub local_field: &'static str,
    pub remote_field: &'static str,
    /// For to-one relations, whether the foreign key may be null
    pub optional: bool,
}

#[derive(Debug)]
pub struct ModelDef {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
}

/// Implemented by entity structs through `#[derive(Model)]`
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    fn def() -> &'static ModelDef;
}

impl FieldDef {
    /// Whether a create must name this field explicitly
    pub fn is_required_on_create(&self) -> bool {
        !self.nullable && !self.has_default && self.auto == AutoValue::None
    }
}

impl RelationDef {
    pub fn target(&self) -> &'static ModelDef {
        (self.target)()
    }

    /// The foreign key column lives on this model
    pub fn holds_foreign_key(&self) -> bool {
        self.kind == RelationKind::ToOne
    }
}

impl ModelDef {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn id_field(&self) -> &'static FieldDef {
        // The derive rejects models without exactly one primary key
        self.fields
            .iter()
            .find(|f| f.is_id)
            .unwrap_or(&self.fields[0])
    }

    /// Look up a scalar field or produce a validation error naming the model
    pub fn require_field(&self, name: &str, action: &str) -> Result<&'static FieldDef, ClientError> {
        self.field(name).ok_or_else(|| {
            ClientError::validation(
                self.name,
                action,
                format!("Unknown field `{}` for model `{}`.", name, self.name),
            )
        })
    }

    pub fn require_relation(
        &self,
        name: &str,
        action: &str,
    ) -> Result<&'static RelationDef, ClientError> {
        self.relation(name).ok_or_else(|| {
            ClientError::validation(
                self.name,
                action,
                format!("Unknown relation `{}` for model `{}`.", name, self.name),
            )
        })
    }

    /// Field holding the automatic update timestamp, if any
    pub fn updated_at_field(&self) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.auto == AutoValue::UpdatedAt)
    }
}
