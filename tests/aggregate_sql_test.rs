// SQL generation tests for the aggregate entry points (PostgreSQL form).
//
// These assert the exact correlated-subquery text the builder emits, so any
// change to quoting, correlation or alias defaulting shows up here.

#![cfg(feature = "postgres")]

use sqlx_with_aggregates::{AggregateError, AggregateModel, RelationRef, SubqueryFilter};

#[derive(AggregateModel)]
#[aggregate(table = "orders")]
#[has_many(relation = "products", table = "product_orders", foreign_key = "order_id")]
#[allow(dead_code)]
struct Order {
    id: i64,
    reference: String,
}

fn query() -> sqlx_with_aggregates::AggregateQueryBuilder<'static, sqlx::Postgres> {
    Order::with_aggregates::<sqlx::Postgres>()
}

#[test]
fn with_count() {
    let sql = query().with_count("products").unwrap().build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT COUNT(*) FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_count\" FROM \"orders\""
    );
}

#[test]
fn with_sum() {
    let sql = query().with_sum("products", "quantity").unwrap().build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT SUM(\"quantity\") FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_sum_quantity\" FROM \"orders\""
    );
}

#[test]
fn with_avg() {
    let sql = query().with_avg("products", "price").unwrap().build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT AVG(\"price\") FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_avg_price\" FROM \"orders\""
    );
}

#[test]
fn with_min() {
    let sql = query().with_min("products", "price").unwrap().build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT MIN(\"price\") FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_min_price\" FROM \"orders\""
    );
}

#[test]
fn with_max() {
    let sql = query().with_max("products", "price").unwrap().build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT MAX(\"price\") FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_max_price\" FROM \"orders\""
    );
}

#[test]
fn with_min_and_alias() {
    let sql = query().with_min("products as min_price", "price").unwrap().build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT MIN(\"price\") FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"min_price\" FROM \"orders\""
    );
}

#[test]
fn with_max_with_alias_with_where() {
    let sql = query()
        .with_max(
            RelationRef::filtered(
                "products as higher_price",
                SubqueryFilter::new().where_("quantity > {}", &["1"]),
            ),
            "price",
        )
        .unwrap()
        .build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, (SELECT MAX(\"price\") FROM \"product_orders\" \
         WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\" AND quantity > $1) AS \"higher_price\" FROM \"orders\""
    );
}

#[test]
fn with_sum_and_count() {
    let sql = query()
        .with_sum("products as order_price", "price")
        .unwrap()
        .with_sum("products as order_products_count", "quantity")
        .unwrap()
        .with_count("products")
        .unwrap()
        .build();
    assert_eq!(
        sql,
        "SELECT \"orders\".*, \
         (SELECT SUM(\"price\") FROM \"product_orders\" WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"order_price\", \
         (SELECT SUM(\"quantity\") FROM \"product_orders\" WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"order_products_count\", \
         (SELECT COUNT(*) FROM \"product_orders\" WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_count\" \
         FROM \"orders\""
    );
}

#[test]
fn outer_where_numbering_follows_filter_params() {
    let sql = query()
        .with_max(
            RelationRef::filtered(
                "products as higher_price",
                SubqueryFilter::new().where_("quantity > {}", &["1"]),
            ),
            "price",
        )
        .unwrap()
        .where_("reference = {}", &["12345678"])
        .build();
    assert!(sql.contains("AND quantity > $1"));
    assert!(sql.ends_with("WHERE reference = $2"));
}

#[test]
fn unknown_relation_is_rejected() {
    let err = query().with_count("invoices").unwrap_err();
    assert!(matches!(err, AggregateError::UnknownRelation { .. }));
    assert_eq!(
        err.to_string(),
        "unknown relation 'invoices' on table 'orders'"
    );
}

#[test]
fn star_target_is_rejected_for_sum() {
    let err = query().with_sum("products", "*").unwrap_err();
    assert!(matches!(err, AggregateError::InvalidAggregateTarget { .. }));
}
