//! ScriptRefly Core
//!
//! Core domain model shared by the extractors, the tokenizer and the validator.
//! Never rename issue codes - they are part of saved reports.

pub mod config;
pub mod diagnostic;
pub mod report;
pub mod rules;
pub mod schema;
pub mod store;

pub use config::{Config, ConfigError, InheritanceConfig, StoreConfig, ValidationConfig};
pub use diagnostic::{Issue, IssueCode, LineDiagnostic};
pub use report::{ReportSummary, ReportVersion, ValidationReport};
pub use rules::{RuleEditError, RuleImportError, RuleSeverity, RuleSet, RuleTable, ValidationRule, ValueKind};
pub use schema::{
    merge_fields, push_unique, Dialect, FieldDescriptor, SchemaEditError, SchemaImportError, SchemaSet, TableSchema,
};
pub use store::{
    ConfigStore, FileStore, MemoryStore, RuleStore, RuleStoreError, SchemaStore, SchemaStoreError, StoreError,
    RULES_KEY, SCHEMA_KEY,
};
