// Filtered aggregates and chaining several columns onto one query.
//
// Run with: cargo run --example filtered_aggregates

use sqlx_with_aggregates::{AggregateError, AggregateModel, RelationRef, SubqueryFilter};

#[derive(AggregateModel)]
#[aggregate(table = "orders")]
#[has_many(relation = "products", table = "product_orders", foreign_key = "order_id")]
#[allow(dead_code)]
struct Order {
    id: i64,
    reference: String,
}

fn main() -> Result<(), AggregateError> {
    // The filter is scoped to the child table and ANDed after the
    // correlation predicate.
    let sql = Order::with_aggregates::<sqlx::Postgres>()
        .with_max(
            RelationRef::filtered(
                "products as higher_price",
                SubqueryFilter::new().where_("quantity > {}", &["1"]),
            ),
            "price",
        )?
        .build();
    println!("filtered max:\n  {}\n", sql);

    // Two sums and a count on the same query, each an independent column;
    // parameter numbering continues into the outer WHERE.
    let sql = Order::with_aggregates::<sqlx::Postgres>()
        .with_sum("products as order_price", "price")?
        .with_sum("products as order_products_count", "quantity")?
        .with_count("products")?
        .where_("reference = {}", &["12345678"])
        .order_by("order_price", "desc")
        .limit(10)
        .build();
    println!("combined:\n  {}", sql);

    Ok(())
}
