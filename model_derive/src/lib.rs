//! Procedural macros for generating model schema metadata
//!
//! This crate provides the `Model` derive and the `#[model]` attribute, which
//! describe a struct's columns and relations to the query engine.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod metadata;
mod model_macro;
mod parsing;

use metadata::generate_model_impl;
use model_macro::model_attribute;
use parsing::{parse_field_attributes, parse_table_attributes};

/// Derive macro for the `Model` trait
///
/// Column names follow `#[serde(rename)]`, so the same struct deserializes
/// the rows the engine returns.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Model)]
/// #[table(name = "Address")]
/// pub struct Address {
///     #[primary_key]
///     pub id: Uuid,
///
///     pub city: String,
///
///     #[serde(rename = "userId")]
///     pub user_id: Option<Uuid>,
///
///     #[serde(rename = "createdAt")]
///     #[field(created_at)]
///     pub created_at: DateTime<Utc>,
///
///     #[relation(one, model = User, fields = "userId")]
///     #[serde(default, skip_serializing_if = "Option::is_none")]
///     pub users: Option<Box<User>>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(table, primary_key, unique, field, relation))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let table_info = match parse_table_attributes(&input.attrs, name) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    let field_info = match parse_field_attributes(&input.data) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_model_impl(name, &table_info, &field_info))
}

/// Convenience attribute macro that adds all necessary derives for a model
#[proc_macro_attribute]
pub fn model(attr: TokenStream, item: TokenStream) -> TokenStream {
    model_attribute(attr, item)
}
