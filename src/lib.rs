pub mod aggregate;
pub mod error;
pub mod traits;

pub use sqlx_with_aggregates_macros::AggregateModel;
pub use aggregate::{AggregateFunction, AggregateQueryBuilder, RelationRef, SubqueryFilter};
pub use error::AggregateError;
pub use traits::AggregateModel;

// Re-exported for the code generated by #[derive(AggregateModel)].
#[doc(hidden)]
pub use once_cell::sync::Lazy;

use std::collections::HashMap;
use std::sync::Mutex;

#[cfg(not(any(feature = "postgres", feature = "mysql", feature = "sqlite")))]
compile_error!("You must enable one of the database features: postgres, mysql, or sqlite");

#[cfg(feature = "postgres")]
fn get_db() -> DbType {
    DbType::PostgreSQL
}

#[cfg(all(feature = "mysql", not(feature = "postgres"), not(feature = "sqlite")))]
fn get_db() -> DbType {
    DbType::MySQL
}

#[cfg(all(feature = "sqlite", not(feature = "postgres"), not(feature = "mysql")))]
fn get_db() -> DbType {
    DbType::SQLite
}

/// Translates a parameter placeholder to the database-specific format.
///
/// - PostgreSQL: Returns the parameter as-is (e.g., "$1", "$2")
/// - MySQL/SQLite: Returns "?" for all parameters
fn param_trans(p: String) -> String {
    match get_db() {
        DbType::PostgreSQL => p,
        DbType::MySQL | DbType::SQLite => "?".to_string(),
    }
}

/// Prepares a predicate clause by replacing "{}" placeholders with
/// database-specific parameter markers.
///
/// # Arguments
///
/// * `w` - The clause template with "{}" placeholders
/// * `field_count` - The starting parameter number for PostgreSQL
///
/// # Example
///
/// ```ignore
/// prepare_where("name = {} AND age = {}", 1);
/// // PostgreSQL: "name = $1 AND age = $2"
/// // MySQL/SQLite: "name = ? AND age = ?"
/// ```
fn prepare_where(w: &str, field_count: i32) -> String {
    let param_count = w.matches("{}").count() as i32;
    let mut where_sql = w.to_string();

    for i in 0..param_count {
        let param = param_trans(format!("${}", i + field_count));
        if let Some(pos) = where_sql.find("{}") {
            where_sql.replace_range(pos..pos + 2, &param);
        }
    }

    where_sql
}

/// Quote an identifier for the current database type.
///
/// PostgreSQL and SQLite use standard double quotes, MySQL uses backticks.
fn quote_ident(identifier: &str) -> String {
    match get_db() {
        DbType::PostgreSQL | DbType::SQLite => format!("\"{}\"", identifier),
        DbType::MySQL => format!("`{}`", identifier),
    }
}

/// Quote a table-qualified column reference (`"table"."column"`).
fn quote_qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Join metadata for a named has-many relationship: the child table plus the
/// key pair a correlated subquery is bound on.
///
/// `local_key` is the parent-side column (usually the primary key) and
/// `foreign_key` is the child-side column referencing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub table: String,
    pub foreign_key: String,
    pub local_key: String,
}

impl Relationship {
    pub fn has_many(table: &str, foreign_key: &str, local_key: &str) -> Self {
        Self {
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            local_key: local_key.to_string(),
        }
    }
}

/// Schema metadata for a queryable entity.
///
/// Holds the table name, the primary key column, and the entity's named
/// has-many relationships. Instances are constructed by hand or generated by
/// the `AggregateModel` derive macro; resolved relationships are read-only
/// thereafter.
///
/// # Fields
///
/// * `table_name` - Name of the database table
/// * `id_field` - Name of the primary key column
/// * `relations` - Named relationships available to the aggregate entry points
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub table_name: String,
    pub id_field: String,
    pub relations: Vec<(String, Relationship)>,
}

impl Scheme {
    /// Resolve a named relationship on this entity.
    ///
    /// Fails with [`AggregateError::UnknownRelation`] when the name is not
    /// registered. The lookup happens before any query mutation.
    pub fn relationship(&self, name: &str) -> Result<&Relationship, AggregateError> {
        self.relations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, rel)| rel)
            .ok_or_else(|| AggregateError::UnknownRelation {
                relation: name.to_string(),
                table: self.table_name.clone(),
            })
    }
}

// Global SQL cache that stores strings and returns &'static str references
static SQL_CACHE: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Get SQL from cache or compute and store it, returning &'static str.
///
/// # Safety
///
/// The returned reference is valid for the entire program duration because
/// it points to a string stored in a global static HashMap. The HashMap is
/// never cleared, so the reference will remain valid.
fn get_or_insert_sql(key: String, gen_fn: impl FnOnce() -> String) -> &'static str {
    let mut cache = SQL_CACHE.lock().unwrap();
    if !cache.contains_key(&key) {
        cache.insert(key.clone(), gen_fn());
    }
    // SAFETY: The string is stored in a global static HashMap,
    // so the reference will live for the entire program duration
    unsafe {
        let ptr = cache.get(&key).unwrap().as_str() as *const str;
        &*ptr
    }
}

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
enum DbType {
    PostgreSQL,
    MySQL,
    SQLite,
}
