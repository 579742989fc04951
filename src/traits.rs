use sqlx::Database;

use crate::aggregate::AggregateQueryBuilder;
use crate::Scheme;

/// Entity types that expose schema metadata for aggregate queries.
///
/// Implemented by the `AggregateModel` derive macro; `with_aggregates` is a
/// provided method, so the query entry points attach to any model without
/// the builder knowing about model types.
pub trait AggregateModel {
    /// Table, primary key and named relationships for this entity.
    fn scheme() -> &'static Scheme
    where
        Self: Sized;

    /// Start an aggregate query over this entity's table.
    fn with_aggregates<'a, DB: Database>() -> AggregateQueryBuilder<'a, DB>
    where
        Self: Sized,
    {
        AggregateQueryBuilder::new(Self::scheme())
    }
}
