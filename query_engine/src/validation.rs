//! Schema validation
//!
//! Checks the static metadata of a set of models before a client uses it:
//! identifiers must be plain SQL identifiers and every relation must link
//! existing UUID columns.

use crate::schema::{ModelDef, RelationKind};
use thiserror::Error;
use type_mapping::ScalarType;

/// PostgreSQL identifier length limit
const MAX_IDENTIFIER_LENGTH: usize = 63;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Invalid characters in name '{0}': only alphanumeric characters and underscores are allowed")]
    InvalidCharacters(String),

    #[error("Name '{0}' must start with a letter or underscore")]
    InvalidStartCharacter(String),

    #[error("Name '{name}' is too long: {length} characters (max {max_length})")]
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },

    #[error("Model '{0}' must have exactly one primary key")]
    PrimaryKey(String),

    #[error("Model '{model}' declares '{name}' more than once")]
    Duplicate { model: String, name: String },

    #[error("Relation '{model}.{relation}': {message}")]
    Relation {
        model: String,
        relation: String,
        message: String,
    },
}

/// Check that `name` is a plain identifier
pub fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    let first_char = name.chars().next().ok_or(SchemaError::Empty)?;
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::TooLong {
            name: name.to_string(),
            length: name.len(),
            max_length: MAX_IDENTIFIER_LENGTH,
        });
    }
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(SchemaError::InvalidStartCharacter(name.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SchemaError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

fn validate_model(model: &ModelDef) -> Result<(), SchemaError> {
    validate_identifier(model.table)?;
    if model.fields.iter().filter(|f| f.is_id).count() != 1 {
        return Err(SchemaError::PrimaryKey(model.name.to_string()));
    }

    let mut names: Vec<&str> = Vec::with_capacity(model.fields.len() + model.relations.len());
    let declared = model
        .fields
        .iter()
        .map(|f| f.name)
        .chain(model.relations.iter().map(|r| r.name));
    for name in declared {
        validate_identifier(name)?;
        if names.contains(&name) {
            return Err(SchemaError::Duplicate {
                model: model.name.to_string(),
                name: name.to_string(),
            });
        }
        names.push(name);
    }

    for relation in model.relations {
        let target = relation.target();
        let broken = |message: String| SchemaError::Relation {
            model: model.name.to_string(),
            relation: relation.name.to_string(),
            message,
        };
        let local = model
            .field(relation.local_field)
            .ok_or_else(|| broken(format!("unknown field '{}'", relation.local_field)))?;
        let remote = target.field(relation.remote_field).ok_or_else(|| {
            broken(format!("unknown field '{}.{}'", target.name, relation.remote_field))
        })?;
        if local.scalar != ScalarType::Uuid || remote.scalar != ScalarType::Uuid {
            return Err(broken("relations must link UUID columns".to_string()));
        }
        let (key, foreign) = match relation.kind {
            RelationKind::ToOne => (remote, local),
            RelationKind::ToMany => (local, remote),
        };
        if !key.is_id {
            return Err(broken(format!(
                "'{}' must reference a primary key",
                foreign.name
            )));
        }
        if relation.kind == RelationKind::ToOne && relation.optional != foreign.nullable {
            return Err(broken(format!(
                "optionality must match the nullability of '{}'",
                foreign.name
            )));
        }
    }
    Ok(())
}

/// Validate every model of a schema
pub fn validate_schema(models: &[&ModelDef]) -> Result<(), SchemaError> {
    for (index, model) in models.iter().enumerate() {
        if models[..index].iter().any(|m| m.table == model.table) {
            return Err(SchemaError::Duplicate {
                model: model.name.to_string(),
                name: model.table.to_string(),
            });
        }
        validate_model(model)?;
    }
    Ok(())
}
