//! Per-line validation diagnostics
//!
//! IMPORTANT: Issue codes are stable.
//! NEVER rename or remove codes - they appear in saved reports.

use crate::rules::RuleSeverity;
use serde::{Deserialize, Serialize};

/// Issue code registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// No known statement shape matched, so the target could not be found
    TargetUnrecognized,

    /// The target table/collection is not defined in the schema
    TargetUnknown,

    /// One or more touched fields are not defined in the schema
    FieldUnknown,

    /// A value failed a rule of its field's value-kind
    TypeMismatch,

    /// The line failed a syntax rule or a structural check
    SyntaxViolation,
}

impl IssueCode {
    /// Get the issue code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetUnrecognized => "TARGET_UNRECOGNIZED",
            Self::TargetUnknown => "TARGET_UNKNOWN",
            Self::FieldUnknown => "FIELD_UNKNOWN",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::SyntaxViolation => "SYNTAX_VIOLATION",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One finding on a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable issue code
    pub code: IssueCode,

    /// Severity (rule severity, or error for built-in checks)
    pub severity: RuleSeverity,

    /// Human-readable message
    pub message: String,

    /// Id of the rule that produced the issue, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Issue {
    /// Create an error-severity issue without a rule
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: RuleSeverity::Error,
            message: message.into(),
            rule_id: None,
        }
    }

    /// Attribute the issue to a rule
    pub fn from_rule(code: IssueCode, severity: RuleSeverity, rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            rule_id: Some(rule_id.into()),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Validation outcome of one non-blank script line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiagnostic {
    /// 1-indexed position among non-blank lines
    pub line_number: usize,

    /// Line text as written
    pub content: String,

    /// Resolved table/collection name
    pub target_name: Option<String>,

    /// True iff no issue was recorded
    pub is_valid: bool,

    /// Issues in the order they were found
    pub issues: Vec<Issue>,
}

impl LineDiagnostic {
    /// Create a valid diagnostic with no issues
    pub fn new(line_number: usize, content: impl Into<String>) -> Self {
        Self {
            line_number,
            content: content.into(),
            target_name: None,
            is_valid: true,
            issues: Vec::new(),
        }
    }

    /// Set the target name
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target_name = target;
        self
    }

    /// Record an issue; the line becomes invalid
    pub fn push_issue(&mut self, issue: Issue) {
        self.is_valid = false;
        self.issues.push(issue);
    }

    /// Issue messages in order
    pub fn messages(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.message.as_str()).collect()
    }

    /// Check whether any issue carries `code`
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}
