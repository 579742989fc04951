//! Fluent builder that injects aggregate subquery columns into a SELECT.
//!
//! Each `with_*` call appends exactly one scalar correlated-subquery column
//! to the select list and hands the builder back for chaining. Validation
//! (relation lookup, alias spec, target column) happens before the append,
//! so a failed call leaves no partial mutation behind.

use sqlx::Database;
use std::marker::PhantomData;

use super::relation_ref::{RelationRef, SubqueryFilter};
use super::subquery::{default_alias, AggregateFunction, AggregateTarget, CorrelatedSubquery};
use crate::error::AggregateError;
use crate::{get_or_insert_sql, param_trans, prepare_where, quote_ident, Scheme};

/// One injected aggregate column: the subquery plus its resolved alias and
/// optional child-scoped filter.
#[derive(Debug, Clone, PartialEq)]
struct AggregateColumn {
    subquery: CorrelatedSubquery,
    alias: String,
    filter: Option<SubqueryFilter>,
}

/// Fluent query builder for eager-loaded aggregate columns.
///
/// # Example
///
/// ```ignore
/// use sqlx_with_aggregates::{AggregateModel, SubqueryFilter, RelationRef};
///
/// #[derive(AggregateModel)]
/// #[aggregate(table = "orders")]
/// #[has_many(relation = "products", table = "product_orders", foreign_key = "order_id")]
/// struct Order {
///     id: i64,
///     reference: String,
/// }
///
/// // Count plus two sums in one round-trip
/// let rows = Order::with_aggregates::<sqlx::Postgres>()
///     .with_count("products")?
///     .with_sum("products as order_price", "price")?
///     .with_sum("products as order_products_count", "quantity")?
///     .fetch_all(&pool)
///     .await?;
///
/// // Filtered aggregate
/// let rows = Order::with_aggregates::<sqlx::Postgres>()
///     .with_max(
///         RelationRef::filtered(
///             "products as higher_price",
///             SubqueryFilter::new().where_("quantity > {}", &["1"]),
///         ),
///         "price",
///     )?
///     .fetch_all(&pool)
///     .await?;
/// ```
#[derive(Debug)]
pub struct AggregateQueryBuilder<'a, DB: Database> {
    scheme: &'a Scheme,
    select_columns: Vec<String>,
    aggregates: Vec<AggregateColumn>,
    where_clause: Option<String>,
    where_params: Vec<String>,
    order_by_clause: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    _phantom: PhantomData<&'a DB>,
}

impl<'a, DB: Database> AggregateQueryBuilder<'a, DB> {
    /// Creates a new builder over the given entity scheme.
    pub fn new(scheme: &'a Scheme) -> Self {
        Self {
            scheme,
            select_columns: Vec::new(),
            aggregates: Vec::new(),
            where_clause: None,
            where_params: Vec::new(),
            order_by_clause: None,
            limit: None,
            offset: None,
            _phantom: PhantomData,
        }
    }

    /// Replaces the default `"table".*` base projection with explicit columns.
    ///
    /// Aggregate columns are always appended after the base projection and
    /// are unaffected by this call.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Appends a `COUNT(*)` subquery column for the relation.
    ///
    /// Default alias: `<relation>_count`. Yields 0 (never NULL) for parents
    /// with no matching child rows.
    pub fn with_count<R: Into<RelationRef>>(self, relation: R) -> Result<Self, AggregateError> {
        self.with_aggregate(relation, "*", AggregateFunction::Count)
    }

    /// Appends a `SUM(column)` subquery column for the relation.
    ///
    /// Default alias: `<relation>_sum_<column>`. Yields NULL for parents
    /// with no matching child rows.
    pub fn with_sum<R: Into<RelationRef>>(
        self,
        relation: R,
        column: &str,
    ) -> Result<Self, AggregateError> {
        self.with_aggregate(relation, column, AggregateFunction::Sum)
    }

    /// Appends an `AVG(column)` subquery column for the relation.
    pub fn with_avg<R: Into<RelationRef>>(
        self,
        relation: R,
        column: &str,
    ) -> Result<Self, AggregateError> {
        self.with_aggregate(relation, column, AggregateFunction::Avg)
    }

    /// Appends a `MIN(column)` subquery column for the relation.
    pub fn with_min<R: Into<RelationRef>>(
        self,
        relation: R,
        column: &str,
    ) -> Result<Self, AggregateError> {
        self.with_aggregate(relation, column, AggregateFunction::Min)
    }

    /// Appends a `MAX(column)` subquery column for the relation.
    pub fn with_max<R: Into<RelationRef>>(
        self,
        relation: R,
        column: &str,
    ) -> Result<Self, AggregateError> {
        self.with_aggregate(relation, column, AggregateFunction::Max)
    }

    /// Appends one aggregate subquery column. The five `with_*` entry points
    /// forward here with the function fixed.
    ///
    /// The relation reference, alias spec and target column are validated
    /// first; on any error the select list is untouched.
    pub fn with_aggregate<R: Into<RelationRef>>(
        mut self,
        relation: R,
        target: &str,
        function: AggregateFunction,
    ) -> Result<Self, AggregateError> {
        let (name, alias, filter) = relation.into().into_parts()?;
        let relationship = self.scheme.relationship(&name)?.clone();
        let target = AggregateTarget::resolve(function, target)?;
        let alias = alias.unwrap_or_else(|| default_alias(&name, function, &target));

        self.aggregates.push(AggregateColumn {
            subquery: CorrelatedSubquery {
                parent_table: self.scheme.table_name.clone(),
                relationship,
                function,
                target,
            },
            alias,
            filter: filter.filter(|f| !f.is_empty()),
        });
        Ok(self)
    }

    /// Number of aggregate columns appended so far.
    pub fn aggregate_columns(&self) -> usize {
        self.aggregates.len()
    }

    /// Adds a WHERE clause on the outer query with the given statement and
    /// parameters.
    ///
    /// The statement should use "{}" as parameter placeholders.
    ///
    /// # Example
    ///
    /// ```ignore
    /// .where_("reference = {}", &["12345678"])
    /// ```
    pub fn where_(mut self, clause: &str, params: &[&str]) -> Self {
        self.where_clause = Some(clause.to_string());
        self.where_params = params.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Adds an ORDER BY clause for the specified column and direction.
    ///
    /// # Arguments
    ///
    /// * `column` - The column name to order by (can be an aggregate alias)
    /// * `direction` - Either "ASC" or "DESC" (case-insensitive)
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        let dir = if direction.to_uppercase() == "DESC" {
            "DESC"
        } else {
            "ASC"
        };
        self.order_by_clause = Some(format!("{} {}", column, dir));
        self
    }

    /// Adds a LIMIT clause to restrict the number of results.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Adds an OFFSET clause to skip a number of results.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Builds and returns the SQL query as a string.
    ///
    /// Parameter numbering runs through the aggregate filters in select-list
    /// order, then the outer WHERE, then LIMIT/OFFSET; fetch methods bind in
    /// the same order.
    fn build_sql(&self) -> String {
        let mut select_parts: Vec<String> = Vec::new();

        if self.select_columns.is_empty() {
            select_parts.push(format!("{}.*", quote_ident(&self.scheme.table_name)));
        } else {
            select_parts.extend(self.select_columns.iter().cloned());
        }

        let mut param_offset = 1usize;
        for agg in &self.aggregates {
            let filter_sql = agg.filter.as_ref().map(|f| {
                let prepared = prepare_where(&f.clause(), param_offset as i32);
                param_offset += f.params().len();
                prepared
            });
            select_parts.push(agg.subquery.render(&agg.alias, filter_sql.as_deref()));
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_parts.join(", "),
            quote_ident(&self.scheme.table_name)
        );

        if let Some(ref clause) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&prepare_where(clause, param_offset as i32));
            param_offset += self.where_params.len();
        }

        if let Some(ref clause) = self.order_by_clause {
            sql.push_str(" ORDER BY ");
            sql.push_str(clause);
        }

        if self.limit.is_some() {
            sql.push_str(" LIMIT ");
            sql.push_str(&param_trans(format!("${}", param_offset)));
            param_offset += 1;
        }

        if self.offset.is_some() {
            sql.push_str(" OFFSET ");
            sql.push_str(&param_trans(format!("${}", param_offset)));
        }

        sql
    }

    /// Builds the query and returns a cached SQL string.
    pub fn build(&self) -> &'static str {
        let cache_key = format!(
            "{}-with-aggregates-{:?}-select-{:?}-where-{:?}-orderby-{:?}-limit-{:?}-offset-{:?}",
            self.scheme.table_name,
            self.aggregates,
            self.select_columns,
            self.where_clause,
            self.order_by_clause,
            self.limit,
            self.offset
        );

        let sql = get_or_insert_sql(cache_key, || self.build_sql());
        #[cfg(feature = "log_sql")]
        eprintln!("[SqlxWithAggregates] AGGREGATE SQL: {}", sql);
        sql
    }
}

macro_rules! fetch_impls {
    ($db:ty, $row:ty) => {
        impl<'a> AggregateQueryBuilder<'a, $db> {
            fn bind_all(
                &self,
                mut query: sqlx::query::Query<'static, $db, <$db as sqlx::database::HasArguments<'static>>::Arguments>,
            ) -> sqlx::query::Query<'static, $db, <$db as sqlx::database::HasArguments<'static>>::Arguments> {
                for agg in &self.aggregates {
                    if let Some(filter) = &agg.filter {
                        for param in filter.params() {
                            query = query.bind(param.clone());
                        }
                    }
                }
                for param in &self.where_params {
                    query = query.bind(param.clone());
                }
                if let Some(n) = self.limit {
                    query = query.bind(n as i64);
                }
                if let Some(n) = self.offset {
                    query = query.bind(n as i64);
                }
                query
            }

            /// Execute the query and fetch all rows.
            ///
            /// Each row exposes the base projection plus one named column per
            /// injected aggregate alias.
            pub async fn fetch_all(self, pool: &sqlx::Pool<$db>) -> Result<Vec<$row>, sqlx::Error> {
                let sql = self.build();
                let query = self.bind_all(sqlx::query(sql));
                query.fetch_all(pool).await
            }

            /// Execute the query and fetch exactly one row.
            pub async fn fetch_one(self, pool: &sqlx::Pool<$db>) -> Result<$row, sqlx::Error> {
                let sql = self.build();
                let query = self.bind_all(sqlx::query(sql));
                query.fetch_one(pool).await
            }

            /// Execute the query and fetch at most one row.
            pub async fn fetch_optional(
                self,
                pool: &sqlx::Pool<$db>,
            ) -> Result<Option<$row>, sqlx::Error> {
                let sql = self.build();
                let query = self.bind_all(sqlx::query(sql));
                query.fetch_optional(pool).await
            }
        }
    };
}

#[cfg(feature = "postgres")]
fetch_impls!(sqlx::Postgres, sqlx::postgres::PgRow);

#[cfg(feature = "mysql")]
fetch_impls!(sqlx::MySql, sqlx::mysql::MySqlRow);

#[cfg(feature = "sqlite")]
fetch_impls!(sqlx::Sqlite, sqlx::sqlite::SqliteRow);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Relationship;

    fn order_scheme() -> Scheme {
        Scheme {
            table_name: "orders".to_string(),
            id_field: "id".to_string(),
            relations: vec![(
                "products".to_string(),
                Relationship::has_many("product_orders", "order_id", "id"),
            )],
        }
    }

    #[cfg(feature = "postgres")]
    mod postgres {
        use super::*;

        type Builder<'a> = AggregateQueryBuilder<'a, sqlx::Postgres>;

        const COUNT_SUBQUERY: &str = "(SELECT COUNT(*) FROM \"product_orders\" WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_count\"";

        #[test]
        fn test_with_count() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme).with_count("products").unwrap();

            assert_eq!(
                builder.build_sql(),
                format!("SELECT \"orders\".*, {} FROM \"orders\"", COUNT_SUBQUERY)
            );
        }

        #[test]
        fn test_with_sum_default_alias() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme).with_sum("products", "quantity").unwrap();

            assert_eq!(
                builder.build_sql(),
                "SELECT \"orders\".*, (SELECT SUM(\"quantity\") FROM \"product_orders\" \
                 WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"products_sum_quantity\" FROM \"orders\""
            );
        }

        #[test]
        fn test_with_avg_default_alias() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme).with_avg("products", "price").unwrap();
            assert!(builder
                .build_sql()
                .contains("(SELECT AVG(\"price\") FROM \"product_orders\""));
            assert!(builder.build_sql().contains("AS \"products_avg_price\""));
        }

        #[test]
        fn test_with_min_explicit_alias() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme)
                .with_min("products as min_price", "price")
                .unwrap();

            assert_eq!(
                builder.build_sql(),
                "SELECT \"orders\".*, (SELECT MIN(\"price\") FROM \"product_orders\" \
                 WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\") AS \"min_price\" FROM \"orders\""
            );
        }

        #[test]
        fn test_with_max_filtered() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme)
                .with_max(
                    RelationRef::filtered(
                        "products as higher_price",
                        SubqueryFilter::new().where_("quantity > {}", &["1"]),
                    ),
                    "price",
                )
                .unwrap();

            assert_eq!(
                builder.build_sql(),
                "SELECT \"orders\".*, (SELECT MAX(\"price\") FROM \"product_orders\" \
                 WHERE \"orders\".\"id\" = \"product_orders\".\"order_id\" AND quantity > $1) AS \"higher_price\" FROM \"orders\""
            );
        }

        #[test]
        fn test_filter_params_offset_outer_where() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme)
                .with_max(
                    RelationRef::filtered(
                        "products as higher_price",
                        SubqueryFilter::new().where_("quantity > {}", &["1"]),
                    ),
                    "price",
                )
                .unwrap()
                .where_("reference = {}", &["12345678"]);

            let sql = builder.build_sql();
            assert!(sql.contains("AND quantity > $1"));
            assert!(sql.ends_with("WHERE reference = $2"));
        }

        #[test]
        fn test_chained_aggregates_each_append_one_column() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme);
            assert_eq!(builder.aggregate_columns(), 0);

            let builder = builder.with_sum("products as order_price", "price").unwrap();
            assert_eq!(builder.aggregate_columns(), 1);

            let builder = builder
                .with_sum("products as order_products_count", "quantity")
                .unwrap();
            assert_eq!(builder.aggregate_columns(), 2);

            let builder = builder.with_count("products").unwrap();
            assert_eq!(builder.aggregate_columns(), 3);

            let sql = builder.build_sql();
            let order_price = sql.find("AS \"order_price\"").unwrap();
            let order_products_count = sql.find("AS \"order_products_count\"").unwrap();
            let products_count = sql.find("AS \"products_count\"").unwrap();
            assert!(order_price < order_products_count);
            assert!(order_products_count < products_count);
        }

        #[test]
        fn test_select_override_keeps_aggregates() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme)
                .select(&["id", "reference"])
                .with_count("products")
                .unwrap();

            assert_eq!(
                builder.build_sql(),
                format!("SELECT id, reference, {} FROM \"orders\"", COUNT_SUBQUERY)
            );
        }

        #[test]
        fn test_order_by_limit_offset() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme)
                .with_count("products")
                .unwrap()
                .where_("reference = {}", &["12345678"])
                .order_by("products_count", "desc")
                .limit(10)
                .offset(20);

            let sql = builder.build_sql();
            assert!(sql.contains("WHERE reference = $1"));
            assert!(sql.contains("ORDER BY products_count DESC"));
            assert!(sql.contains("LIMIT $2"));
            assert!(sql.contains("OFFSET $3"));
        }

        #[test]
        fn test_unknown_relation_fails() {
            let scheme = order_scheme();
            let err = Builder::new(&scheme).with_count("invoices").unwrap_err();
            assert!(matches!(err, AggregateError::UnknownRelation { .. }));
        }

        #[test]
        fn test_star_with_sum_fails() {
            let scheme = order_scheme();
            let err = Builder::new(&scheme).with_sum("products", "*").unwrap_err();
            assert!(matches!(err, AggregateError::InvalidAggregateTarget { .. }));
        }

        #[test]
        fn test_malformed_spec_fails() {
            let scheme = order_scheme();
            let err = Builder::new(&scheme)
                .with_min("products as a as b", "price")
                .unwrap_err();
            assert!(matches!(err, AggregateError::InvalidAggregateSpec { .. }));
        }

        #[test]
        fn test_build_is_cached() {
            let scheme = order_scheme();
            let builder = Builder::new(&scheme).with_count("products").unwrap();

            let sql1 = builder.build();
            let sql2 = builder.build();
            assert!(std::ptr::eq(sql1, sql2), "SQL should be cached and return the same pointer");
        }
    }
}
