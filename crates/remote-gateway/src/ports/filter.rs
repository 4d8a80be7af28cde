//! # Row Filters
//!
//! Conjunctions of column predicates, evaluated by the backend (or by the
//! in-memory adapter).

use compliance_types::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single column predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// `column = value`
    Eq(String, Value),
    /// `column <> value`
    Neq(String, Value),
    /// `column IN (values)`
    In(String, Vec<Value>),
}

impl Predicate {
    fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Eq(column, value) => row.get(column) == Some(value),
            Self::Neq(column, value) => row.get(column) != Some(value),
            Self::In(column, values) => row.get(column).is_some_and(|v| values.contains(v)),
        }
    }
}

/// A conjunction of predicates. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Filter matching every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq(column.into(), value.into()));
        self
    }

    /// Add an inequality predicate.
    #[must_use]
    pub fn neq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates
            .push(Predicate::Neq(column.into(), value.into()));
        self
    }

    /// Add a membership predicate.
    #[must_use]
    pub fn in_list<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.predicates.push(Predicate::In(
            column.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Evaluate the filter against a row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// The predicates in this filter.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether the filter has no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| match p {
                Predicate::Eq(c, v) => format!("{c}=eq.{v}"),
                Predicate::Neq(c, v) => format!("{c}=neq.{v}"),
                Predicate::In(c, vs) => format!("{c}=in.{}", vs.len()),
            })
            .collect();
        f.write_str(&parts.join("&"))
    }
}
