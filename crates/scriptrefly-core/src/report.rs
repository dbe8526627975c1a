//! Validation report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::diagnostic::LineDiagnostic;
use crate::schema::Dialect;
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of non-blank lines checked
    pub lines: usize,

    /// Lines with no issues
    pub valid: usize,

    /// Lines with at least one issue
    pub invalid: usize,
}

/// Validation report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Dialect the script was checked as
    pub dialect: Dialect,

    /// Summary statistics
    pub summary: ReportSummary,

    /// One entry per non-blank line
    pub diagnostics: Vec<LineDiagnostic>,

    /// Source file, when validated from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ValidationReport {
    /// Create a report from line diagnostics
    pub fn from_diagnostics(dialect: Dialect, diagnostics: Vec<LineDiagnostic>) -> Self {
        let valid = diagnostics.iter().filter(|d| d.is_valid).count();

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            dialect,
            summary: ReportSummary {
                lines: diagnostics.len(),
                valid,
                invalid: diagnostics.len() - valid,
            },
            diagnostics,
            source: None,
        }
    }

    /// Set the source file
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Check if any line is invalid
    pub fn has_invalid_lines(&self) -> bool {
        self.summary.invalid > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Issue, IssueCode};

    #[test]
    fn empty_report() {
        let report = ValidationReport::from_diagnostics(Dialect::MySql, Vec::new());
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary, ReportSummary::default());
        assert!(!report.has_invalid_lines());
    }

    #[test]
    fn summary_counts() {
        let mut bad = LineDiagnostic::new(2, "DELETE FROM x");
        bad.push_issue(Issue::new(IssueCode::TargetUnknown, "table 'x' is not defined in the schema"));

        let report = ValidationReport::from_diagnostics(
            Dialect::MySql,
            vec![LineDiagnostic::new(1, "SELECT id FROM users"), bad],
        )
        .with_source("fix.sql");

        assert_eq!(report.summary.lines, 2);
        assert_eq!(report.summary.valid, 1);
        assert_eq!(report.summary.invalid, 1);
        assert!(report.has_invalid_lines());

        let json = report.to_json().unwrap();
        assert!(json.contains("\"dialect\": \"MySQL\""));
        assert!(json.contains("\"source\": \"fix.sql\""));
    }
}
