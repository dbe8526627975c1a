//! Compiled rule buckets for one dialect
//!
//! Patterns support lookaround and backreferences. A rule whose pattern does
//! not compile is skipped and listed in [`CompiledRules::skipped_rules`]; the
//! remaining rules still apply.

use fancy_regex::Regex;
use scriptrefly_core::{Dialect, RuleTable, ValidationRule, ValueKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// A rule with its compiled pattern
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: ValidationRule,
    pattern: Regex,
}

impl CompiledRule {
    /// True when `text` matches the pattern.
    ///
    /// A match that aborts (backtrack limit) counts as a pass.
    pub fn accepts(&self, text: &str) -> bool {
        match self.pattern.is_match(text) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(rule_id = %self.rule.id, error = %e, "rule evaluation aborted, skipping");
                true
            }
        }
    }
}

/// A rule left out because its pattern is invalid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub kind: ValueKind,
    pub rule_id: String,
    pub reason: String,
}

/// Rules of one dialect, ready to evaluate
#[derive(Debug, Clone)]
pub struct CompiledRules {
    dialect: Dialect,
    buckets: BTreeMap<ValueKind, Vec<CompiledRule>>,
    skipped: Vec<SkippedRule>,
}

impl CompiledRules {
    /// Compile every bucket of `dialect` in stored order
    pub fn compile(table: &RuleTable, dialect: Dialect) -> Self {
        let mut buckets = BTreeMap::new();
        let mut skipped = Vec::new();

        for (kind, rules) in table.dialect(dialect) {
            let mut compiled = Vec::with_capacity(rules.len());

            for rule in rules {
                match Regex::new(&rule.pattern) {
                    Ok(pattern) => compiled.push(CompiledRule {
                        rule: rule.clone(),
                        pattern,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            %dialect,
                            %kind,
                            rule_id = %rule.id,
                            error = %e,
                            "invalid rule pattern, skipping rule"
                        );
                        skipped.push(SkippedRule {
                            kind: *kind,
                            rule_id: rule.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            buckets.insert(*kind, compiled);
        }

        Self {
            dialect,
            buckets,
            skipped,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compiled rules of one bucket, in stored order
    pub fn bucket(&self, kind: ValueKind) -> &[CompiledRule] {
        self.buckets.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First rule of `kind` that rejects `value`
    pub fn first_failure(&self, kind: ValueKind, value: &str) -> Option<&ValidationRule> {
        self.bucket(kind)
            .iter()
            .find(|compiled| !compiled.accepts(value))
            .map(|compiled| &compiled.rule)
    }

    /// Every syntax rule that rejects `line`, in stored order
    pub fn syntax_failures(&self, line: &str) -> Vec<&ValidationRule> {
        self.bucket(ValueKind::Syntax)
            .iter()
            .filter(|compiled| !compiled.accepts(line))
            .map(|compiled| &compiled.rule)
            .collect()
    }

    /// Rules left out because their pattern did not compile
    pub fn skipped_rules(&self) -> &[SkippedRule] {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scriptrefly_core::RuleSeverity;

    #[test]
    fn first_failing_type_rule_wins() {
        let rules = CompiledRules::compile(&RuleTable::builtin(), Dialect::MySql);

        let failed = rules.first_failure(ValueKind::Number, "'12'").map(|r| r.id.as_str());
        assert_eq!(failed, Some("2"));

        let failed = rules.first_failure(ValueKind::Number, "12a").map(|r| r.id.as_str());
        assert_eq!(failed, Some("18"));

        assert!(rules.first_failure(ValueKind::Number, "7").is_none());
        assert!(rules.first_failure(ValueKind::Object, "anything").is_none());
    }

    #[test]
    fn all_failing_syntax_rules_are_reported() {
        let rules = CompiledRules::compile(&RuleTable::builtin(), Dialect::MySql);

        let failed: Vec<&str> = rules
            .syntax_failures("SELECT * FROM a, b")
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(failed, vec!["5", "8"]);

        assert!(rules.syntax_failures("UPDATE t SET a = 1 WHERE id = 2").is_empty());
        assert_eq!(rules.syntax_failures("update t set a = 1").len(), 1);
        assert_eq!(rules.syntax_failures("DELETE FROM t").len(), 1);
    }

    #[test]
    fn aborted_match_counts_as_pass() {
        let mut table = RuleTable::new();
        table
            .add_rule(
                Dialect::MySql,
                ValueKind::Syntax,
                ValidationRule::new("slow", "Backtracking", "(a|b|ab)*(?=c)", "needs a c", RuleSeverity::Error),
            )
            .unwrap();
        let rules = CompiledRules::compile(&table, Dialect::MySql);

        // Short input fails normally; the long one exceeds the backtrack limit
        assert_eq!(rules.syntax_failures("ab").len(), 1);
        assert!(rules.syntax_failures("abc").is_empty());
        assert!(rules.syntax_failures(&"ab".repeat(40)).is_empty());
    }

    #[test]
    fn object_id_satisfies_mongo_string_rule() {
        let rules = CompiledRules::compile(&RuleTable::builtin(), Dialect::MongoDb);
        assert!(rules.first_failure(ValueKind::String, r#"ObjectId("65a1f0c2e4b0a1b2c3d4e5f6")"#).is_none());
        assert!(rules.first_failure(ValueKind::String, "'abc'").is_none());
        assert_eq!(rules.first_failure(ValueKind::String, "abc").map(|r| r.id.as_str()), Some("9"));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        let mut table = RuleTable::builtin();
        table
            .add_rule(
                Dialect::MongoDb,
                ValueKind::String,
                ValidationRule::new("bad", "Broken", "(unclosed", "never shown", RuleSeverity::Error),
            )
            .unwrap();

        let rules = CompiledRules::compile(&table, Dialect::MongoDb);
        assert_eq!(rules.skipped_rules().len(), 1);
        assert_eq!(rules.skipped_rules()[0].rule_id, "bad");
        assert_eq!(rules.bucket(ValueKind::String).len(), 1);
        assert!(rules.first_failure(ValueKind::String, "\"ok\"").is_none());
    }
}
