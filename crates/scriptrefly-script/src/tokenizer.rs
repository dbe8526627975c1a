//! Script line tokenization
//!
//! Best-effort and line-oriented: a line matching no known statement shape
//! yields an empty [`Tokenized`] with no target, never an error.

use crate::{mongo, mysql};
use scriptrefly_core::Dialect;
use serde::Serialize;

/// A field paired with the raw text of a value written to or compared with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub field: String,

    /// Value exactly as written (quotes included)
    pub raw_value: String,
}

impl Assignment {
    pub fn new(field: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw_value: raw_value.into(),
        }
    }
}

/// What one script line touches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tokenized {
    /// Table or collection name, backticks and quotes removed
    pub target_name: Option<String>,

    /// Every field named on the line, first mention order, no repeats
    pub touched_fields: Vec<String>,

    /// Values to type-check, in line order
    pub assignments: Vec<Assignment>,
}

impl Tokenized {
    pub(crate) fn for_target(target: impl Into<String>) -> Self {
        Self {
            target_name: Some(target.into()),
            ..Self::default()
        }
    }

    /// True when no statement shape matched
    pub fn is_unrecognized(&self) -> bool {
        self.target_name.is_none()
    }

    pub(crate) fn touch(&mut self, field: &str) {
        if !field.is_empty() && !self.touched_fields.iter().any(|f| f == field) {
            self.touched_fields.push(field.to_string());
        }
    }

    pub(crate) fn assign(&mut self, field: &str, raw_value: &str) {
        self.touch(field);
        if !field.is_empty() {
            self.assignments.push(Assignment::new(field, raw_value.trim()));
        }
    }
}

/// Tokenize one script line in `dialect`
pub fn tokenize(line: &str, dialect: Dialect) -> Tokenized {
    let tokenized = match dialect {
        Dialect::MySql => mysql::tokenize(line),
        Dialect::MongoDb => mongo::tokenize(line),
    };

    tracing::debug!(
        %dialect,
        target = ?tokenized.target_name,
        fields = tokenized.touched_fields.len(),
        assignments = tokenized.assignments.len(),
        "tokenized line"
    );

    tokenized
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dispatches_per_dialect() {
        let sql = tokenize("DELETE FROM users WHERE id = 1;", Dialect::MySql);
        assert_eq!(sql.target_name.as_deref(), Some("users"));

        let mongo = tokenize("DELETE FROM users WHERE id = 1;", Dialect::MongoDb);
        assert!(mongo.is_unrecognized());
    }

    #[test]
    fn touch_keeps_first_mention() {
        let mut tokenized = Tokenized::for_target("t");
        tokenized.assign("a", " 1 ");
        tokenized.touch("b");
        tokenized.assign("a", "2");

        assert_eq!(tokenized.touched_fields, vec!["a", "b"]);
        assert_eq!(tokenized.assignments, vec![Assignment::new("a", "1"), Assignment::new("a", "2")]);
    }

    #[test]
    fn garbage_is_unrecognized() {
        for line in ["hello world", "", "db.", "UPDATE", "SELECT 1"] {
            assert_eq!(tokenize(line, Dialect::MySql).target_name, None, "{line}");
            assert_eq!(tokenize(line, Dialect::MongoDb).target_name, None, "{line}");
        }
    }
}
