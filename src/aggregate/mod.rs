//! Eager-loaded aggregate subquery support.
//!
//! This module provides a fluent query builder that appends scalar
//! correlated-subquery columns (COUNT, SUM, AVG, MIN, MAX over a has-many
//! relationship) to a parent SELECT, so related aggregates arrive in the
//! same round-trip as the parent rows.
//!
//! # Example
//!
//! ```ignore
//! use sqlx_with_aggregates::AggregateModel;
//!
//! #[derive(AggregateModel)]
//! #[aggregate(table = "orders")]
//! #[has_many(relation = "products", table = "product_orders", foreign_key = "order_id")]
//! struct Order {
//!     pub id: i64,
//!     pub reference: String,
//! }
//!
//! let rows = Order::with_aggregates::<sqlx::Postgres>()
//!     .with_count("products")?
//!     .with_sum("products as order_price", "price")?
//!     .fetch_all(&pool)
//!     .await?;
//! ```

mod query_builder;
mod relation_ref;
mod subquery;

pub use query_builder::AggregateQueryBuilder;
pub use relation_ref::{RelationRef, SubqueryFilter};
pub use subquery::AggregateFunction;
