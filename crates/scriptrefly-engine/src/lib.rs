//! ScriptRefly engine - script validation
//!
//! This crate implements:
//! - Field type to rule bucket resolution
//! - Rule compilation with per-rule failure isolation
//! - Quote and bracket balance checks
//! - Per-line validation against schemas and rules

pub mod rule_eval;
pub mod structure;
pub mod validator;
pub mod value_kind;

pub use rule_eval::{CompiledRule, CompiledRules, SkippedRule};
pub use structure::{check_structure, Delimiter};
pub use validator::{find_table, validate, ScriptValidator, ValidatorOptions};
pub use value_kind::resolve_value_kind;
