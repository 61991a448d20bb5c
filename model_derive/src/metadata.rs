//! Code generation for static model metadata
//!
//! Emits the `Model` implementation whose `def()` returns the schema
//! description the query engine compiles queries from.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::Ident;

use crate::parsing::{AutoValue, FieldInfo, RelationCardinality, TableInfo};

pub fn generate_model_impl(name: &Ident, table_info: &TableInfo, field_info: &FieldInfo) -> TokenStream {
    let model_name = &table_info.model;
    let table_name = &table_info.table;

    let fields = field_info.scalars.iter().map(|f| {
        let column = &f.column;
        let scalar = Ident::new(f.scalar_variant, Span::call_site());
        let nullable = f.nullable;
        let is_id = f.is_id;
        let is_unique = f.is_unique;
        let has_default = f.has_default;
        let auto = match f.auto {
            Some(AutoValue::CreatedAt) => quote!(::query_engine::schema::AutoValue::CreatedAt),
            Some(AutoValue::UpdatedAt) => quote!(::query_engine::schema::AutoValue::UpdatedAt),
            None if is_id => quote!(::query_engine::schema::AutoValue::Uuid),
            None => quote!(::query_engine::schema::AutoValue::None),
        };
        quote! {
            ::query_engine::schema::FieldDef {
                name: #column,
                scalar: ::query_engine::ScalarType::#scalar,
                nullable: #nullable,
                is_id: #is_id,
                is_unique: #is_unique,
                has_default: #has_default,
                auto: #auto,
            }
        }
    });

    let relations = field_info.relations.iter().map(|r| {
        let relation_name = &r.name;
        let target = &r.target;
        let kind = match r.cardinality {
            RelationCardinality::One => quote!(::query_engine::schema::RelationKind::ToOne),
            RelationCardinality::Many => quote!(::query_engine::schema::RelationKind::ToMany),
        };
        let local = &r.local_column;
        let remote = &r.remote_column;
        let optional = r.optional;
        quote! {
            ::query_engine::schema::RelationDef {
                name: #relation_name,
                kind: #kind,
                target: <#target as ::query_engine::schema::Model>::def,
                local_field: #local,
                remote_field: #remote,
                optional: #optional,
            }
        }
    });

    let unique_constructors = field_info
        .scalars
        .iter()
        .filter(|f| f.is_unique && !f.nullable)
        .map(|f| {
            let column = &f.column;
            let ty = &f.ty;
            let method = Ident::new(&format!("by_{}", f.ident), f.ident.span());
            let doc = format!("Unique lookup by `{}`", column);
            quote! {
                #[doc = #doc]
                pub fn #method(value: impl ::core::convert::Into<#ty>) -> ::query_engine::query_builder::Unique<Self> {
                    ::query_engine::query_builder::Unique::from_unique_field(#column, value.into())
                }
            }
        });

    quote! {
        impl #name {
            #(#unique_constructors)*
        }

        impl ::query_engine::schema::Model for #name {
            fn def() -> &'static ::query_engine::schema::ModelDef {
                static DEF: ::query_engine::schema::ModelDef = ::query_engine::schema::ModelDef {
                    name: #model_name,
                    table: #table_name,
                    fields: &[#(#fields),*],
                    relations: &[#(#relations),*],
                };
                &DEF
            }
        }
    }
}
