//! Parser for the `#[aggregate]` and `#[has_many]` struct attributes.

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DataStruct, DeriveInput, Fields, Lit, Meta, NestedMeta};

/// One parsed `#[has_many(...)]` attribute.
struct HasMany {
    relation: String,
    table: String,
    foreign_key: String,
    local_key: Option<String>,
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !matches!(
        &input.data,
        Data::Struct(DataStruct { fields: Fields::Named(_), .. })
    ) {
        return Err(syn::Error::new_spanned(
            name,
            "AggregateModel can only be derived for structs with named fields",
        ));
    }

    let mut table_name = to_snake_case(&name.to_string());
    let mut id_field = first_field_name(&input.data).unwrap_or_else(|| "id".to_string());
    let mut relations: Vec<HasMany> = Vec::new();

    for attr in &input.attrs {
        if attr.path.is_ident("aggregate") {
            for (key, value) in parse_name_values(attr)? {
                match key.as_str() {
                    "table" => table_name = value,
                    "id" => id_field = value,
                    other => {
                        return Err(syn::Error::new_spanned(
                            attr,
                            format!("unknown aggregate attribute key '{}'", other),
                        ))
                    }
                }
            }
        } else if attr.path.is_ident("has_many") {
            relations.push(parse_has_many(attr)?);
        }
    }

    let relation_tokens = relations.iter().map(|rel| {
        let relation = &rel.relation;
        let table = &rel.table;
        let foreign_key = &rel.foreign_key;
        let local_key = rel.local_key.as_ref().unwrap_or(&id_field);
        quote! {
            (
                #relation.to_string(),
                ::sqlx_with_aggregates::Relationship {
                    table: #table.to_string(),
                    foreign_key: #foreign_key.to_string(),
                    local_key: #local_key.to_string(),
                },
            )
        }
    });

    Ok(quote! {
        impl ::sqlx_with_aggregates::AggregateModel for #name {
            fn scheme() -> &'static ::sqlx_with_aggregates::Scheme {
                static SCHEME: ::sqlx_with_aggregates::Lazy<::sqlx_with_aggregates::Scheme> =
                    ::sqlx_with_aggregates::Lazy::new(|| ::sqlx_with_aggregates::Scheme {
                        table_name: #table_name.to_string(),
                        id_field: #id_field.to_string(),
                        relations: vec![#(#relation_tokens),*],
                    });
                &SCHEME
            }
        }
    })
}

fn parse_has_many(attr: &Attribute) -> syn::Result<HasMany> {
    let mut relation = None;
    let mut table = None;
    let mut foreign_key = None;
    let mut local_key = None;

    for (key, value) in parse_name_values(attr)? {
        match key.as_str() {
            "relation" => relation = Some(value),
            "table" => table = Some(value),
            "foreign_key" => foreign_key = Some(value),
            "local_key" => local_key = Some(value),
            other => {
                return Err(syn::Error::new_spanned(
                    attr,
                    format!("unknown has_many attribute key '{}'", other),
                ))
            }
        }
    }

    let missing = |key: &str| {
        syn::Error::new_spanned(attr, format!("has_many requires a '{}' key", key))
    };
    Ok(HasMany {
        relation: relation.ok_or_else(|| missing("relation"))?,
        table: table.ok_or_else(|| missing("table"))?,
        foreign_key: foreign_key.ok_or_else(|| missing("foreign_key"))?,
        local_key,
    })
}

/// Extract `key = "value"` pairs from an attribute like
/// `#[aggregate(table = "orders")]`.
fn parse_name_values(attr: &Attribute) -> syn::Result<Vec<(String, String)>> {
    let meta = attr.parse_meta()?;
    let list = match meta {
        Meta::List(list) => list,
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "expected a list attribute: #[name(key = \"value\", ...)]",
            ))
        }
    };

    let mut pairs = Vec::new();
    for nested in &list.nested {
        match nested {
            NestedMeta::Meta(Meta::NameValue(nv)) => {
                let key = nv
                    .path
                    .get_ident()
                    .map(|ident| ident.to_string())
                    .ok_or_else(|| syn::Error::new_spanned(nv, "expected an identifier key"))?;
                match &nv.lit {
                    Lit::Str(s) => pairs.push((key, s.value())),
                    other => {
                        return Err(syn::Error::new_spanned(other, "expected a string literal"))
                    }
                }
            }
            other => {
                return Err(syn::Error::new_spanned(other, "expected key = \"value\""))
            }
        }
    }
    Ok(pairs)
}

fn first_field_name(data: &Data) -> Option<String> {
    if let Data::Struct(DataStruct { fields: Fields::Named(named), .. }) = data {
        named
            .named
            .first()
            .and_then(|field| field.ident.as_ref())
            .map(|ident| ident.to_string())
    } else {
        None
    }
}

/// Convert a PascalCase struct name to a snake_case table name.
fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
