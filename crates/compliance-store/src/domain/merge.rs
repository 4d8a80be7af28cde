//! # Field-Level Merge Policy
//!
//! Combines a local and a remote payload field by field. Local values win
//! unless they are missing or `null`; server-owned fields always take the
//! remote value.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Merge policy for conflict resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMergePolicy {
    server_owned: BTreeSet<String>,
}

impl FieldMergePolicy {
    /// Policy with the given server-owned fields.
    pub fn new<I, S>(server_owned: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            server_owned: server_owned.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `field` always takes the remote value.
    pub fn is_server_owned(&self, field: &str) -> bool {
        self.server_owned.contains(field)
    }

    /// Server-owned field names.
    pub fn server_owned(&self) -> impl Iterator<Item = &str> {
        self.server_owned.iter().map(String::as_str)
    }

    /// Merge two payloads.
    ///
    /// Objects merge over the union of their top-level fields. Any other
    /// combination resolves to the local value (or the remote one when the
    /// local value is `null`).
    pub fn merge(&self, local: &Value, remote: &Value) -> Value {
        match (local, remote) {
            (Value::Object(l), Value::Object(r)) => Value::Object(self.merge_objects(l, r)),
            (Value::Null, other) => other.clone(),
            (other, _) => other.clone(),
        }
    }

    fn merge_objects(&self, local: &Map<String, Value>, remote: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = remote.clone();
        for (field, value) in local {
            if self.is_server_owned(field) && remote.contains_key(field) {
                continue;
            }
            if value.is_null() && remote.contains_key(field) {
                continue;
            }
            merged.insert(field.clone(), value.clone());
        }
        merged
    }

    /// Drop server-owned fields from an object payload.
    pub fn strip_server_owned(&self, payload: &Value) -> Value {
        match payload {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| !self.is_server_owned(k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
