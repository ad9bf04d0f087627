//! Field-scoped validation results shared by every onboarding form.
//!
//! Rules are plain functions in [`rules`]; each form assembles them into a
//! `Violations` list so the UI can render every unmet rule at once.

pub mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

/// One failed rule, addressed by the camelCase field path it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// First dotted segment, e.g. `socialMedia` for `socialMedia.1.handle`.
    pub fn root_field(&self) -> &str {
        self.field.split('.').next().unwrap_or(&self.field)
    }
}

/// Ordered list of violations. Empty means the candidate model is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|violation| format!("{}: {}", violation.field, violation.message))
            .collect();
        write!(f, "validation failed ({})", messages.join("; "))
    }
}

impl std::error::Error for Violations {}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(Violation::new(field, message));
    }

    /// Record `message` against `field` when a rule produced one.
    pub fn check(&mut self, field: &str, message: Option<String>) {
        if let Some(message) = message {
            self.push(field, message);
        }
    }

    pub fn check_all(&mut self, field: &str, messages: Vec<String>) {
        for message in messages {
            self.push(field, message);
        }
    }

    pub fn extend(&mut self, other: Violations) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> + '_ {
        self.0.iter()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.0.iter().map(|violation| violation.message.as_str()).collect()
    }

    /// Violations whose path is `field` or nested below it.
    pub fn for_field(&self, field: &str) -> Violations {
        self.0
            .iter()
            .filter(|violation| {
                violation.field == field
                    || violation
                        .field
                        .strip_prefix(field)
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .cloned()
            .collect()
    }

    /// Violations belonging to any of `fields` (matched on the root segment).
    pub fn scoped_to(&self, fields: &[&str]) -> Violations {
        self.0
            .iter()
            .filter(|violation| fields.contains(&violation.root_field()))
            .cloned()
            .collect()
    }

    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl FromIterator<Violation> for Violations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
