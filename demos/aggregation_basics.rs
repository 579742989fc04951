// Demonstrates the five aggregate entry points and alias defaulting.
//
// Run with: cargo run --example aggregation_basics

use sqlx_with_aggregates::{AggregateError, AggregateModel};

#[derive(AggregateModel)]
#[aggregate(table = "orders")]
#[has_many(relation = "products", table = "product_orders", foreign_key = "order_id")]
#[allow(dead_code)]
struct Order {
    id: i64,
    reference: String,
}

fn main() -> Result<(), AggregateError> {
    // COUNT(*) under the default alias products_count
    let sql = Order::with_aggregates::<sqlx::Postgres>()
        .with_count("products")?
        .build();
    println!("count:\n  {}\n", sql);

    // SUM/AVG/MIN/MAX default to <relation>_<func>_<column>
    let sql = Order::with_aggregates::<sqlx::Postgres>()
        .with_sum("products", "quantity")?
        .with_avg("products", "price")?
        .with_min("products", "price")?
        .with_max("products", "price")?
        .build();
    println!("all functions:\n  {}\n", sql);

    // "relation as alias" picks the result column name explicitly
    let sql = Order::with_aggregates::<sqlx::Postgres>()
        .with_min("products as min_price", "price")?
        .build();
    println!("explicit alias:\n  {}", sql);

    Ok(())
}
