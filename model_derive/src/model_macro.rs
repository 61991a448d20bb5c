use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error};

/// Convenience attribute macro that adds all necessary derives for a model
///
/// Usage:
/// ```rust,ignore
/// use model_derive::model;
///
/// #[model]
/// #[table(name = "Category")]
/// pub struct Category {
///     #[primary_key]
///     pub id: Uuid,
///     pub name: String,
/// }
/// ```
pub fn model_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    if !matches!(input.data, Data::Struct(_)) {
        return Error::new_spanned(&input.ident, "model can only be used on structs")
            .to_compile_error()
            .into();
    }

    let expanded = quote! {
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize, ::model_derive::Model)]
        #input
    };

    TokenStream::from(expanded)
}
