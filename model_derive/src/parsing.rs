//! Parsing utilities for model, field and relation attributes
//!
//! This module handles the parsing of `#[table]`, `#[primary_key]`, `#[unique]`,
//! `#[field]` and `#[relation]` attributes and validation of identifiers.

use quote::ToTokens;
use syn::{Attribute, Data, Error, Fields, LitStr, Path, Result, Token};

/// Validate table name and return syn::Error for better proc macro error handling
pub fn validate_table_name_syn(name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid table name '{}': {}", name, e)))
}

/// Validate column name and return syn::Error for better proc macro error handling
pub fn validate_field_name_syn(name: &str, span: proc_macro2::Span) -> Result<()> {
    validate_identifier(name)
        .map_err(|e| Error::new(span, format!("Invalid field name '{}': {}", name, e)))
}

/// Identifiers are always emitted double-quoted, so keywords such as `Order`
/// are allowed; only the character set and length are restricted.
fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    // PostgreSQL limit
    if name.len() > 63 {
        return Err(format!(
            "Name '{}' is too long: {} characters (max 63)",
            name,
            name.len()
        ));
    }

    let first_char = name
        .chars()
        .next()
        .ok_or_else(|| "Name cannot be empty".to_string())?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(format!(
            "Name '{}' must start with a letter or underscore",
            name
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("Name '{}' contains invalid characters: only alphanumeric characters and underscores are allowed", name));
    }

    Ok(())
}

#[derive(Debug)]
pub struct TableInfo {
    pub model: String,
    pub table: String,
}

/// Values filled in by the client rather than the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoValue {
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug)]
pub struct ScalarField {
    pub ident: syn::Ident,
    pub ty: syn::Type,
    pub column: String,
    pub scalar_variant: &'static str,
    pub nullable: bool,
    pub is_id: bool,
    pub is_unique: bool,
    pub has_default: bool,
    pub auto: Option<AutoValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationCardinality {
    One,
    Many,
}

#[derive(Debug)]
pub struct RelationField {
    pub name: String,
    pub cardinality: RelationCardinality,
    pub target: Path,
    /// Join column on this model
    pub local_column: String,
    /// Join column on the target model
    pub remote_column: String,
    pub optional: bool,
}

#[derive(Debug)]
pub struct FieldInfo {
    pub scalars: Vec<ScalarField>,
    pub relations: Vec<RelationField>,
}

/// Parse `#[table(name = "...")]`; the model name defaults to the struct ident
pub fn parse_table_attributes(attrs: &[Attribute], ident: &syn::Ident) -> Result<TableInfo> {
    let mut table_name = None;
    let mut model_name = None;

    for attr in attrs {
        if attr.path().is_ident("table") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    table_name = Some(lit.value());
                    Ok(())
                } else if meta.path.is_ident("model") {
                    let lit: LitStr = meta.value()?.parse()?;
                    model_name = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported table attribute, expected `name` or `model`"))
                }
            })?;
        }
    }

    let model = model_name.unwrap_or_else(|| ident.to_string());
    let table = table_name.unwrap_or_else(|| model.clone());

    validate_table_name_syn(&table, ident.span())?;

    Ok(TableInfo { model, table })
}

/// Column name: `#[serde(rename = "...")]` if present, otherwise the Rust ident
fn serde_rename(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut rename = None;
    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    rename = Some(lit.value());
                } else if meta.input.peek(Token![=]) {
                    let _: syn::Expr = meta.value()?.parse()?;
                } else if meta.input.peek(syn::token::Paren) {
                    let _content;
                    syn::parenthesized!(_content in meta.input);
                }
                Ok(())
            })?;
        }
    }
    Ok(rename)
}

pub fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

#[derive(Debug, Default)]
struct FieldFlags {
    has_default: bool,
    created_at: bool,
    updated_at: bool,
    unique: bool,
}

/// Parse `#[field(default, created_at, updated_at, unique)]`
fn parse_field_flags(attrs: &[Attribute]) -> Result<FieldFlags> {
    let mut flags = FieldFlags::default();
    for attr in attrs {
        if attr.path().is_ident("field") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    flags.has_default = true;
                } else if meta.path.is_ident("created_at") {
                    flags.created_at = true;
                } else if meta.path.is_ident("updated_at") {
                    flags.updated_at = true;
                } else if meta.path.is_ident("unique") {
                    flags.unique = true;
                } else {
                    return Err(meta.error(
                        "unsupported field option, expected one of: default, created_at, updated_at, unique",
                    ));
                }
                Ok(())
            })?;
        }
    }
    if flags.created_at && flags.updated_at {
        return Err(Error::new(
            proc_macro2::Span::call_site(),
            "a field cannot be both created_at and updated_at",
        ));
    }
    Ok(flags)
}

struct RawRelation {
    cardinality: Option<RelationCardinality>,
    target: Option<Path>,
    fields: Option<String>,
    references: Option<String>,
}

/// Parse `#[relation(one|many, model = Target, fields = "...", references = "...")]`
fn parse_relation_attribute(attr: &Attribute) -> Result<RawRelation> {
    let mut raw = RawRelation {
        cardinality: None,
        target: None,
        fields: None,
        references: None,
    };
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("one") {
            raw.cardinality = Some(RelationCardinality::One);
        } else if meta.path.is_ident("many") {
            raw.cardinality = Some(RelationCardinality::Many);
        } else if meta.path.is_ident("model") {
            raw.target = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("fields") {
            let lit: LitStr = meta.value()?.parse()?;
            raw.fields = Some(lit.value());
        } else if meta.path.is_ident("references") {
            let lit: LitStr = meta.value()?.parse()?;
            raw.references = Some(lit.value());
        } else {
            return Err(meta.error("unsupported relation option"));
        }
        Ok(())
    })?;
    Ok(raw)
}

pub fn parse_field_attributes(data: &Data) -> Result<FieldInfo> {
    let fields = match data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new(
                    proc_macro2::Span::call_site(),
                    "Model can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "Model can only be derived for structs",
            ))
        }
    };

    let mut scalars = Vec::new();
    let mut pending_relations = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;
        let column = serde_rename(&field.attrs)?.unwrap_or_else(|| ident.to_string());
        validate_field_name_syn(&column, ident.span())?;

        if let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("relation")) {
            pending_relations.push((column, parse_relation_attribute(attr)?, attr.clone()));
            continue;
        }

        let type_str = field.ty.to_token_stream().to_string();
        let scalar_variant = type_mapping::rust_type_to_scalar_variant(&type_str).ok_or_else(|| {
            Error::new_spanned(
                &field.ty,
                format!(
                    "unsupported column type `{}`; mark relation fields with #[relation(...)]",
                    type_str
                ),
            )
        })?;
        let flags = parse_field_flags(&field.attrs)?;
        let auto = if flags.created_at {
            Some(AutoValue::CreatedAt)
        } else if flags.updated_at {
            Some(AutoValue::UpdatedAt)
        } else {
            None
        };
        let is_id = has_attribute(&field.attrs, "primary_key");

        scalars.push(ScalarField {
            ident: ident.clone(),
            ty: field.ty.clone(),
            column,
            scalar_variant,
            nullable: type_mapping::is_optional_type(&type_str),
            is_id,
            is_unique: is_id || flags.unique || has_attribute(&field.attrs, "unique"),
            has_default: flags.has_default || scalar_variant == "StringList",
            auto,
        });
    }

    match scalars.iter().filter(|f| f.is_id).count() {
        1 => {}
        0 => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "a model needs exactly one #[primary_key] field",
            ))
        }
        _ => {
            return Err(Error::new(
                proc_macro2::Span::call_site(),
                "composite primary keys are not supported",
            ))
        }
    }

    let mut relations = Vec::new();
    for (name, raw, attr) in pending_relations {
        let cardinality = raw
            .cardinality
            .ok_or_else(|| Error::new_spanned(&attr, "relation needs `one` or `many`"))?;
        let target = raw
            .target
            .ok_or_else(|| Error::new_spanned(&attr, "relation needs `model = Target`"))?;

        let relation = match cardinality {
            RelationCardinality::One => {
                let local = raw.fields.ok_or_else(|| {
                    Error::new_spanned(&attr, "to-one relation needs `fields = \"fkColumn\"`")
                })?;
                let fk = scalars.iter().find(|s| s.column == local).ok_or_else(|| {
                    Error::new_spanned(&attr, format!("unknown foreign key column '{}'", local))
                })?;
                RelationField {
                    name,
                    cardinality,
                    target,
                    optional: fk.nullable,
                    local_column: local,
                    remote_column: raw.references.unwrap_or_else(|| "id".to_string()),
                }
            }
            RelationCardinality::Many => {
                let remote = raw.references.ok_or_else(|| {
                    Error::new_spanned(&attr, "to-many relation needs `references = \"fkColumn\"`")
                })?;
                RelationField {
                    name,
                    cardinality,
                    target,
                    optional: true,
                    local_column: raw.fields.unwrap_or_else(|| "id".to_string()),
                    remote_column: remote,
                }
            }
        };
        validate_field_name_syn(&relation.remote_column, proc_macro2::Span::call_site())?;
        relations.push(relation);
    }

    Ok(FieldInfo { scalars, relations })
}
