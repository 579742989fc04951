//! Error types raised while assembling aggregate subqueries.
//!
//! Every variant is surfaced synchronously at build time, before any SQL is
//! executed. A failed entry-point call leaves the query builder unchanged.

use thiserror::Error;

/// Errors produced by the aggregate entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// The relation name is not registered on the base entity's scheme.
    #[error("unknown relation '{relation}' on table '{table}'")]
    UnknownRelation { relation: String, table: String },

    /// The relation reference is malformed (empty name, empty alias, or a
    /// nested " as " inside the alias segment).
    #[error("invalid aggregate spec '{spec}': {reason}")]
    InvalidAggregateSpec { spec: String, reason: String },

    /// The target column is not usable with the requested function
    /// (`*` or an empty column with a non-COUNT aggregate).
    #[error("invalid target '{target}' for {function}")]
    InvalidAggregateTarget { function: String, target: String },
}
