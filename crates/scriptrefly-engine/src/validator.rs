//! Script validation against a schema set and a rule table
//!
//! Pure and synchronous: one [`LineDiagnostic`] per non-blank line, in
//! source order. Findings are data; nothing here fails on bad input.

use crate::rule_eval::{CompiledRules, SkippedRule};
use crate::structure::check_structure;
use crate::value_kind::resolve_value_kind;
use scriptrefly_core::{Dialect, Issue, IssueCode, LineDiagnostic, RuleTable, SchemaSet, TableSchema};
use scriptrefly_script::lexer::{trim_statement, unqualified};
use scriptrefly_script::{check_shape, tokenize, Tokenized};

/// Field every MongoDB document carries whether or not the schema lists it
const MONGO_ID_FIELD: &str = "_id";

/// Validator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Run quote/bracket balance and statement shape checks on every line
    pub structural_checks: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            structural_checks: true,
        }
    }
}

/// Validates scripts of one dialect
#[derive(Debug, Clone)]
pub struct ScriptValidator<'a> {
    dialect: Dialect,
    schemas: &'a SchemaSet,
    rules: CompiledRules,
    options: ValidatorOptions,
}

impl<'a> ScriptValidator<'a> {
    /// Compile `rules` for `dialect`
    pub fn new(dialect: Dialect, schemas: &'a SchemaSet, rules: &RuleTable) -> Self {
        Self {
            dialect,
            schemas,
            rules: CompiledRules::compile(rules, dialect),
            options: ValidatorOptions::default(),
        }
    }

    /// Set options
    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Rules left out because their pattern did not compile
    pub fn skipped_rules(&self) -> &[SkippedRule] {
        self.rules.skipped_rules()
    }

    /// Validate every non-blank line of `script`
    pub fn validate(&self, script: &str) -> Vec<LineDiagnostic> {
        let diagnostics: Vec<LineDiagnostic> = script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| self.validate_line(index + 1, line))
            .collect();

        let invalid = diagnostics.iter().filter(|d| !d.is_valid).count();
        tracing::info!(
            dialect = %self.dialect,
            lines = diagnostics.len(),
            invalid,
            "validated script"
        );

        diagnostics
    }

    /// Validate one line
    pub fn validate_line(&self, line_number: usize, line: &str) -> LineDiagnostic {
        let line = line.trim();
        let tokenized = tokenize(line, self.dialect);
        let mut diagnostic = LineDiagnostic::new(line_number, line).with_target(tokenized.target_name.clone());

        let Some(target) = tokenized.target_name.as_deref() else {
            diagnostic.push_issue(Issue::new(IssueCode::TargetUnrecognized, "target not recognized"));
            return diagnostic;
        };

        let Some(table) = find_table(self.schemas, target) else {
            let message = format!("{} '{}' is not defined in the schema", self.target_noun(), target);
            diagnostic.push_issue(Issue::new(IssueCode::TargetUnknown, message));
            return diagnostic;
        };

        self.check_fields(&mut diagnostic, table, &tokenized);
        self.check_values(&mut diagnostic, table, &tokenized);
        self.check_syntax(&mut diagnostic, line);

        if !diagnostic.is_valid {
            tracing::debug!(line = line_number, issues = diagnostic.issues.len(), "line has issues");
        }

        diagnostic
    }

    fn target_noun(&self) -> &'static str {
        match self.dialect {
            Dialect::MySql => "table",
            Dialect::MongoDb => "collection",
        }
    }

    /// Schema field a touched name refers to; `None` when it is not checked
    fn schema_name<'f>(&self, field: &'f str) -> Option<&'f str> {
        match self.dialect {
            Dialect::MongoDb if field == MONGO_ID_FIELD => None,
            Dialect::MongoDb => field.split('.').next(),
            Dialect::MySql => Some(field),
        }
    }

    fn check_fields(&self, diagnostic: &mut LineDiagnostic, table: &TableSchema, tokenized: &Tokenized) {
        let mut unknown: Vec<&str> = Vec::new();

        for field in &tokenized.touched_fields {
            let Some(name) = self.schema_name(field) else {
                continue;
            };
            if !table.has_field(name) && !unknown.contains(&name) {
                unknown.push(name);
            }
        }

        if !unknown.is_empty() {
            diagnostic.push_issue(Issue::new(
                IssueCode::FieldUnknown,
                format!("fields not in schema: {}", unknown.join(", ")),
            ));
        }
    }

    fn check_values(&self, diagnostic: &mut LineDiagnostic, table: &TableSchema, tokenized: &Tokenized) {
        for assignment in &tokenized.assignments {
            // Dotted paths reach into sub-documents whose shape is opaque
            if self.dialect == Dialect::MongoDb && assignment.field.contains('.') {
                continue;
            }
            if assignment.raw_value.eq_ignore_ascii_case("null") {
                continue;
            }

            let Some(field) = table.find_field(&assignment.field) else {
                continue;
            };
            let Some(kind) = resolve_value_kind(&field.field_type) else {
                continue;
            };

            if let Some(rule) = self.rules.first_failure(kind, &assignment.raw_value) {
                diagnostic.push_issue(Issue::from_rule(
                    IssueCode::TypeMismatch,
                    rule.severity,
                    rule.id.clone(),
                    format!("field '{}' value {} {}", assignment.field, assignment.raw_value, rule.message),
                ));
            }
        }
    }

    fn check_syntax(&self, diagnostic: &mut LineDiagnostic, line: &str) {
        for rule in self.rules.syntax_failures(line) {
            diagnostic.push_issue(Issue::from_rule(
                IssueCode::SyntaxViolation,
                rule.severity,
                rule.id.clone(),
                rule.message.clone(),
            ));
        }

        if self.options.structural_checks {
            for delimiter in check_structure(trim_statement(line)) {
                diagnostic.push_issue(Issue::new(IssueCode::SyntaxViolation, delimiter.to_string()));
            }
            for violation in check_shape(line, self.dialect) {
                diagnostic.push_issue(Issue::new(IssueCode::SyntaxViolation, violation.to_string()));
            }
        }
    }
}

/// Look a target up by exact name, then by its last dot segment
pub fn find_table<'s>(schemas: &'s SchemaSet, target: &str) -> Option<&'s TableSchema> {
    let target = target.trim_matches('`');
    schemas.get(target).or_else(|| schemas.get(unqualified(target)))
}

/// Validate `script` in one call
pub fn validate(script: &str, dialect: Dialect, schemas: &SchemaSet, rules: &RuleTable) -> Vec<LineDiagnostic> {
    ScriptValidator::new(dialect, schemas, rules).validate(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scriptrefly_core::FieldDescriptor;

    fn users(dialect: Dialect, fields: &[(&str, &str)]) -> SchemaSet {
        let mut schemas = SchemaSet::new();
        schemas.upsert(
            "users",
            TableSchema::new(dialect, fields.iter().map(|(n, t)| FieldDescriptor::new(*n, *t))),
        );
        schemas
    }

    #[test]
    fn quoted_number_is_reported() {
        let schemas = users(Dialect::MySql, &[("age", "Integer")]);
        let diags = validate(
            "UPDATE users SET age = 'abc' WHERE id = 1",
            Dialect::MySql,
            &schemas,
            &RuleTable::builtin(),
        );

        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_valid);
        assert_eq!(
            diags[0].messages(),
            vec!["fields not in schema: id", "field 'age' value 'abc' should not be wrapped in quotes"]
        );
    }

    #[test]
    fn mongo_update_is_valid() {
        let schemas = users(Dialect::MongoDb, &[("id", "Number"), ("name", "String")]);
        let diags = validate(
            r#"db.users.updateOne({"id":1},{$set:{"name":"X"}})"#,
            Dialect::MongoDb,
            &schemas,
            &RuleTable::builtin(),
        );

        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_valid, "{:?}", diags[0].issues);
        assert_eq!(diags[0].target_name.as_deref(), Some("users"));
    }

    #[test]
    fn blank_lines_are_not_counted() {
        let schemas = users(Dialect::MySql, &[("id", "BIGINT")]);
        let script = "\n  \nDELETE FROM users WHERE id = 1;\n\nDELETE FROM users WHERE id = 2;\n";
        let diags = validate(script, Dialect::MySql, &schemas, &RuleTable::builtin());

        let numbers: Vec<usize> = diags.iter().map(|d| d.line_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(diags.iter().all(|d| d.is_valid));
    }

    #[test]
    fn unknown_and_unrecognized_targets() {
        let schemas = users(Dialect::MySql, &[("id", "BIGINT")]);
        let diags = validate(
            "DELETE FROM orders WHERE id = 1\nhello",
            Dialect::MySql,
            &schemas,
            &RuleTable::builtin(),
        );

        assert!(diags[0].has_code(IssueCode::TargetUnknown));
        assert_eq!(diags[0].messages(), vec!["table 'orders' is not defined in the schema"]);
        assert!(diags[1].has_code(IssueCode::TargetUnrecognized));
        assert_eq!(diags[1].target_name, None);
    }

    #[test]
    fn qualified_target_falls_back_to_table_name() {
        let schemas = users(Dialect::MySql, &[("id", "BIGINT")]);
        let diags = validate("DELETE FROM `shop`.`users` WHERE id = 1", Dialect::MySql, &schemas, &RuleTable::builtin());
        assert!(diags[0].is_valid, "{:?}", diags[0].issues);
    }

    #[test]
    fn syntax_rules_and_structure_are_all_reported() {
        let schemas = users(Dialect::MySql, &[("id", "BIGINT"), ("name", "VARCHAR")]);
        let diags = validate("UPDATE users SET name = 'x", Dialect::MySql, &schemas, &RuleTable::builtin());

        let codes: Vec<IssueCode> = diags[0].issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::TypeMismatch, IssueCode::SyntaxViolation, IssueCode::SyntaxViolation]);
        assert_eq!(diags[0].issues[1].rule_id.as_deref(), Some("6"));
        assert_eq!(diags[0].issues[2].message, "unbalanced single quotes");

        let quiet = ScriptValidator::new(Dialect::MySql, &schemas, &RuleTable::builtin())
            .with_options(ValidatorOptions { structural_checks: false })
            .validate("UPDATE users SET name = 'x");
        assert_eq!(quiet[0].issues.len(), 2);
    }

    #[test]
    fn mongo_id_dotted_paths_and_null() {
        let schemas = users(Dialect::MongoDb, &[("address", "Object"), ("age", "Integer")]);
        let diags = validate(
            r#"db.users.updateOne({_id: ObjectId("65a1")}, {$set: {"address.city": 3, age: null}})"#,
            Dialect::MongoDb,
            &schemas,
            &RuleTable::builtin(),
        );
        assert!(diags[0].is_valid, "{:?}", diags[0].issues);

        let diags = validate(
            r#"db.users.find({"profile.city": "x"})"#,
            Dialect::MongoDb,
            &schemas,
            &RuleTable::builtin(),
        );
        assert_eq!(diags[0].messages(), vec!["fields not in schema: profile"]);
    }

    #[test]
    fn object_id_values_pass_for_object_id_fields() {
        let schemas = users(Dialect::MongoDb, &[("name", "String"), ("ownerId", "ObjectId")]);
        let diags = validate(
            r#"db.users.updateOne({"name": "a"}, {$set: {"ownerId": ObjectId("65a1f0c2e4b0a1b2c3d4e5f6")}})
db.users.updateOne({"name": "a"}, {$set: {"ownerId": "65a1f0c2e4b0a1b2c3d4e5f6"}})
db.users.updateOne({"name": "a"}, {$set: {"ownerId": 42}})"#,
            Dialect::MongoDb,
            &schemas,
            &RuleTable::builtin(),
        );

        assert!(diags[0].is_valid, "{:?}", diags[0].issues);
        assert!(diags[1].is_valid, "{:?}", diags[1].issues);
        assert_eq!(diags[2].issues[0].rule_id.as_deref(), Some("9"));
    }

    #[test]
    fn statement_shapes_are_checked() {
        let schemas = users(Dialect::MongoDb, &[("id", "Integer"), ("name", "String")]);
        let rules = RuleTable::builtin();

        let diags = validate(
            "db.users.updateOne({\"id\": 1})\ndb.users.insertMany({\"name\": \"a\"})\ndb.users.updateOne({\"id\": 1}, {$set: \"x\"})",
            Dialect::MongoDb,
            &schemas,
            &rules,
        );
        let messages: Vec<Vec<&str>> = diags.iter().map(|d| d.messages()).collect();
        assert_eq!(
            messages,
            vec![
                vec!["updateOne() expects a query object and an update object"],
                vec!["insertMany() expects an array of documents"],
                vec!["$set operand must be an object"],
            ]
        );
        assert!(diags.iter().all(|d| d.has_code(IssueCode::SyntaxViolation)));

        let schemas = users(Dialect::MySql, &[("id", "BIGINT"), ("name", "VARCHAR")]);
        let diags = validate(
            "INSERT INTO users (id, name) (1, 'a');\nSELECT id FROM users u JOIN users v WHERE id = 1;\nSELECT id FROM users HAVING id > 1;",
            Dialect::MySql,
            &schemas,
            &rules,
        );
        assert!(diags.iter().all(|d| !d.is_valid));

        let quiet = ScriptValidator::new(Dialect::MySql, &schemas, &rules)
            .with_options(ValidatorOptions { structural_checks: false })
            .validate("SELECT id FROM users HAVING id > 1;");
        assert!(quiet[0].is_valid);
    }

    #[test]
    fn trailing_comment_and_column_arithmetic() {
        let schemas = users(Dialect::MySql, &[("id", "BIGINT"), ("age", "Integer")]);
        let diags = validate(
            "DELETE FROM users WHERE id = 1; -- don't keep\nUPDATE users SET age = age + 1 WHERE id = 2",
            Dialect::MySql,
            &schemas,
            &RuleTable::builtin(),
        );

        assert!(diags[0].is_valid, "{:?}", diags[0].issues);
        assert!(diags[1].is_valid, "{:?}", diags[1].issues);
    }

    #[test]
    fn empty_rule_table_checks_existence_only() {
        let schemas = users(Dialect::MySql, &[("age", "Integer")]);
        let diags = validate("UPDATE users SET age = 'abc'", Dialect::MySql, &schemas, &RuleTable::new());
        assert!(diags[0].is_valid);
    }
}
