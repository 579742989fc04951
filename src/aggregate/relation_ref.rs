//! Relation references accepted by the aggregate entry points.
//!
//! A reference is either a bare relation name (`"products"`), an aliased name
//! (`"products as order_price"`), or an aliased name carrying an extra filter
//! for the child rows. The three shapes are modeled as a tagged enum instead
//! of inspecting argument types at runtime.

use crate::error::AggregateError;

/// Extra predicates applied to the child table inside a correlated subquery.
///
/// Clauses use the same `"{}"` placeholder syntax as the outer `where_` and
/// are ANDed after the correlation predicate. The filter never sees, and can
/// never replace, the parent/child key binding.
///
/// # Example
///
/// ```ignore
/// let filter = SubqueryFilter::new().where_("quantity > {}", &["1"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubqueryFilter {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl SubqueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate with the given statement and parameters.
    ///
    /// The statement should use "{}" as parameter placeholders. Multiple
    /// calls are combined with AND.
    pub fn where_(mut self, clause: &str, params: &[&str]) -> Self {
        self.clauses.push(clause.to_string());
        self.params.extend(params.iter().map(|s| s.to_string()));
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The combined clause, still holding `{}` placeholders.
    pub(crate) fn clause(&self) -> String {
        self.clauses.join(" AND ")
    }

    pub(crate) fn params(&self) -> &[String] {
        &self.params
    }
}

/// A parsed reference to a named relationship, optionally aliased and
/// optionally filtered.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationRef {
    Plain(String),
    Aliased { name: String, alias: String },
    Filtered {
        name: String,
        alias: Option<String>,
        filter: SubqueryFilter,
    },
}

impl RelationRef {
    /// Build a filtered reference from an alias spec (`"name"` or
    /// `"name as alias"`) and a child-scoped filter.
    pub fn filtered(spec: &str, filter: SubqueryFilter) -> Self {
        let (name, alias) = split_alias(spec);
        RelationRef::Filtered { name, alias, filter }
    }

    /// Decompose into `(relation_name, alias, filter)`, validating the spec.
    ///
    /// Fails with [`AggregateError::InvalidAggregateSpec`] on an empty
    /// relation name, an empty alias, or an alias that itself contains
    /// `" as "`.
    pub(crate) fn into_parts(
        self,
    ) -> Result<(String, Option<String>, Option<SubqueryFilter>), AggregateError> {
        let (name, alias, filter) = match self {
            RelationRef::Plain(name) => (name, None, None),
            RelationRef::Aliased { name, alias } => (name, Some(alias), None),
            RelationRef::Filtered { name, alias, filter } => (name, alias, Some(filter)),
        };

        if name.is_empty() {
            return Err(invalid_spec(&name, &alias, "relation name is empty"));
        }
        if let Some(a) = &alias {
            if a.is_empty() {
                return Err(invalid_spec(&name, &alias, "alias is empty"));
            }
            if a.contains(" as ") {
                return Err(invalid_spec(&name, &alias, "alias contains ' as '"));
            }
        }

        Ok((name, alias, filter))
    }
}

impl From<&str> for RelationRef {
    fn from(spec: &str) -> Self {
        match split_alias(spec) {
            (name, Some(alias)) => RelationRef::Aliased { name, alias },
            (name, None) => RelationRef::Plain(name),
        }
    }
}

impl From<String> for RelationRef {
    fn from(spec: String) -> Self {
        RelationRef::from(spec.as_str())
    }
}

/// Split `"name as alias"` on the first `" as "` occurrence.
fn split_alias(spec: &str) -> (String, Option<String>) {
    match spec.split_once(" as ") {
        Some((name, alias)) => (name.trim().to_string(), Some(alias.trim().to_string())),
        None => (spec.trim().to_string(), None),
    }
}

fn invalid_spec(name: &str, alias: &Option<String>, reason: &str) -> AggregateError {
    let spec = match alias {
        Some(a) => format!("{} as {}", name, a),
        None => name.to_string(),
    };
    AggregateError::InvalidAggregateSpec {
        spec,
        reason: reason.to_string(),
    }
}
