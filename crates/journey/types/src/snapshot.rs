//! Record snapshots: the facts a gate is evaluated against
//!
//! A snapshot is an arbitrary key/value view of the business record
//! at validation time ("quote_accepted": true, "budget_range": "mid").
//! The engine never fetches record data itself; the caller supplies
//! the snapshot with each advancement or pre-flight check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key/value facts about a business record
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    facts: HashMap<String, serde_json::Value>,
}

impl RecordSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style fact insertion
    pub fn with_fact(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.facts.insert(field.into(), value.into());
        self
    }

    pub fn set_fact(&mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.facts.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.facts.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.facts.contains_key(field)
    }

    /// Truthiness for gate checks: true, non-zero number, or non-empty
    /// string/array/object. Null and absent are falsy.
    pub fn is_truthy(&self, field: &str) -> bool {
        match self.facts.get(field) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(serde_json::Value::Array(a)) => !a.is_empty(),
            Some(serde_json::Value::Object(o)) => !o.is_empty(),
            Some(serde_json::Value::Null) | None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Outcome of evaluating a stage's Definition-of-Done
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True only when every requirement passed
    pub valid: bool,
    /// Names of unmet requirements, in definition order; empty when valid
    pub failed: Vec<String>,
}

impl ValidationReport {
    /// A report with no failures
    pub fn passed() -> Self {
        Self {
            valid: true,
            failed: Vec::new(),
        }
    }

    /// A report from the collected failure names
    pub fn from_failures(failed: Vec<String>) -> Self {
        Self {
            valid: failed.is_empty(),
            failed,
        }
    }
}
