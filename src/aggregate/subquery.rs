//! Scalar correlated-subquery assembly.
//!
//! Each aggregate column is rendered as a single parenthesized subquery over
//! the child table, correlated on the parent/child key pair and aliased into
//! the outer select list:
//!
//! ```sql
//! (SELECT SUM("price") FROM "product_orders"
//!  WHERE "orders"."id" = "product_orders"."order_id") AS "products_sum_price"
//! ```

use crate::error::AggregateError;
use crate::{quote_ident, quote_qualified, Relationship};

/// An aggregate function reducing the matching child rows to one scalar.
///
/// COUNT yields 0 when no child rows match; SUM, AVG, MIN and MAX yield NULL,
/// per the underlying database's native aggregate semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

impl AggregateFunction {
    /// Lowercase name used in default aliases.
    fn suffix(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

/// What the aggregate function is applied to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AggregateTarget {
    Star,
    Column(String),
}

impl AggregateTarget {
    /// Validate a raw target against the requested function.
    ///
    /// COUNT always aggregates `*` and ignores the raw target. Every other
    /// function requires a concrete column; `*` or an empty string fails
    /// with [`AggregateError::InvalidAggregateTarget`] instead of being
    /// silently coerced.
    pub(crate) fn resolve(
        function: AggregateFunction,
        raw: &str,
    ) -> Result<Self, AggregateError> {
        if function == AggregateFunction::Count {
            return Ok(AggregateTarget::Star);
        }
        let column = raw.trim();
        if column.is_empty() || column == "*" {
            return Err(AggregateError::InvalidAggregateTarget {
                function: function.to_string(),
                target: raw.to_string(),
            });
        }
        Ok(AggregateTarget::Column(column.to_string()))
    }
}

/// Default result-column alias when the caller gave none.
///
/// `COUNT` → `<relation>_count`; other functions over column `c` →
/// `<relation>_<func>_<c>`.
pub(crate) fn default_alias(
    relation: &str,
    function: AggregateFunction,
    target: &AggregateTarget,
) -> String {
    match target {
        AggregateTarget::Star => format!("{}_{}", relation, function.suffix()),
        AggregateTarget::Column(column) => {
            format!("{}_{}_{}", relation, function.suffix(), column)
        }
    }
}

/// One scalar correlated subquery, ready to be rendered into a select list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CorrelatedSubquery {
    pub parent_table: String,
    pub relationship: Relationship,
    pub function: AggregateFunction,
    pub target: AggregateTarget,
}

impl CorrelatedSubquery {
    /// Render `(SELECT FUNC(...) FROM child WHERE correlation [AND filter]) AS alias`.
    ///
    /// The correlation predicate binds the parent key to the child foreign
    /// key unconditionally; `filter_sql` (already placeholder-prepared) is
    /// ANDed after it.
    pub(crate) fn render(&self, alias: &str, filter_sql: Option<&str>) -> String {
        let func_expr = match &self.target {
            AggregateTarget::Star => format!("{}(*)", self.function),
            AggregateTarget::Column(column) => {
                format!("{}({})", self.function, quote_ident(column))
            }
        };
        let correlation = format!(
            "{} = {}",
            quote_qualified(&self.parent_table, &self.relationship.local_key),
            quote_qualified(&self.relationship.table, &self.relationship.foreign_key),
        );

        let mut sql = format!(
            "(SELECT {} FROM {} WHERE {}",
            func_expr,
            quote_ident(&self.relationship.table),
            correlation,
        );
        if let Some(filter) = filter_sql {
            sql.push_str(" AND ");
            sql.push_str(filter);
        }
        sql.push_str(") AS ");
        sql.push_str(&quote_ident(alias));
        sql
    }
}
