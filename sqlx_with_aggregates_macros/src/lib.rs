//! Derive macro generating schema metadata for `sqlx_with_aggregates`.
//!
//! `#[derive(AggregateModel)]` reads the struct-level `#[aggregate(...)]`
//! and `#[has_many(...)]` attributes and implements the `AggregateModel`
//! trait with a lazily-initialized static `Scheme`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod model_parser;

/// Derives `AggregateModel` for a struct.
///
/// # Attributes
///
/// * `#[aggregate(table = "orders", id = "id")]` - both keys optional; the
///   table name defaults to the snake-cased struct name and the id column to
///   the first named field.
/// * `#[has_many(relation = "products", table = "product_orders",
///   foreign_key = "order_id", local_key = "id")]` - one per relationship;
///   `local_key` defaults to the id column.
///
/// # Example
///
/// ```ignore
/// #[derive(AggregateModel)]
/// #[aggregate(table = "orders")]
/// #[has_many(relation = "products", table = "product_orders", foreign_key = "order_id")]
/// struct Order {
///     pub id: i64,
///     pub reference: String,
/// }
/// ```
#[proc_macro_derive(AggregateModel, attributes(aggregate, has_many))]
pub fn derive_aggregate_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model_parser::expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
