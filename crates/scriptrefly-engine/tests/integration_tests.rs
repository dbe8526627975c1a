//! End-to-end validation tests: stored schemas and rules feeding the validator

use pretty_assertions::assert_eq;
use scriptrefly_core::{
    Dialect, FieldDescriptor, IssueCode, MemoryStore, RuleSeverity, RuleStore, SchemaSet, SchemaStore,
    TableSchema, ValidationReport, ValidationRule, ValueKind,
};
use scriptrefly_engine::{validate, ScriptValidator};

const SCHEMA_DOCUMENT: &str = r#"{
  "users": {
    "type": "MySQL",
    "fields": [
      { "name": "id", "type": "BIGINT" },
      { "name": "name", "type": "VARCHAR" },
      { "name": "age", "type": "Integer" },
      { "name": "active", "type": "Boolean" },
      { "name": "created_at", "type": "DATETIME" }
    ]
  },
  "proposal": {
    "type": "MongoDB",
    "fields": [
      { "name": "proposalNo", "type": "String" },
      { "name": "status", "type": "Integer" },
      { "name": "deleted", "type": "Boolean" },
      { "name": "createdAt", "type": "Date" },
      "remark"
    ]
  }
}"#;

fn stores() -> (SchemaStore<MemoryStore>, RuleStore<MemoryStore>) {
    let mut schemas = SchemaStore::load(MemoryStore::new()).unwrap();
    schemas.import_schemas(SCHEMA_DOCUMENT).unwrap();

    let mut rules = RuleStore::load(MemoryStore::new()).unwrap();
    rules.reset_to_default().unwrap();

    (schemas, rules)
}

// =============================================================================
// MySQL
// =============================================================================

#[test]
fn test_mysql_script() {
    let (schemas, rules) = stores();
    let script = r#"
UPDATE users SET age = 31, name = 'Ann' WHERE id = 7;
UPDATE users SET age = '31' WHERE id = 7;

INSERT INTO users (id, name, active, created_at) VALUES (8, 'Bob', TRUE, '2024-05-01 10:00:00');
DELETE FROM users;
SELECT nickname FROM users WHERE id = 1;
DROP TABLE users;
"#;

    let diags = validate(script, Dialect::MySql, schemas.schemas(), rules.table());
    let validity: Vec<bool> = diags.iter().map(|d| d.is_valid).collect();
    assert_eq!(validity, vec![true, false, true, false, false, false]);

    assert!(diags[1].has_code(IssueCode::TypeMismatch));
    assert_eq!(diags[3].messages(), vec!["DELETE statement must have a WHERE clause"]);
    assert_eq!(diags[4].messages(), vec!["fields not in schema: nickname"]);
    assert!(diags[5].has_code(IssueCode::TargetUnrecognized));
}

#[test]
fn test_unknown_target_in_both_dialects() {
    let (schemas, rules) = stores();

    let sql = validate("UPDATE ghosts SET a = 1 WHERE b = 2", Dialect::MySql, schemas.schemas(), rules.table());
    let mongo = validate("db.ghosts.find({})", Dialect::MongoDb, schemas.schemas(), rules.table());

    for diag in sql.iter().chain(mongo.iter()) {
        assert!(!diag.is_valid);
        assert!(diag.has_code(IssueCode::TargetUnknown));
    }
}

// =============================================================================
// MongoDB
// =============================================================================

#[test]
fn test_mongo_script() {
    let (schemas, rules) = stores();
    let script = r#"
db.proposal.updateOne({"proposalNo": "P-1"}, {$set: {"status": 2, "deleted": false}})
db.getCollection("proposal").find({status: {$in: [1, "2"]}})
db.proposal.insertOne({proposalNo: "P-2", createdAt: ISODate("2024-01-01T00:00:00.000Z"), remark: 'ok'})
db.proposal.remove({status: 3})
db.proposal.find({$where: "this.status > 1"})
"#;

    let diags = validate(script, Dialect::MongoDb, schemas.schemas(), rules.table());
    let validity: Vec<bool> = diags.iter().map(|d| d.is_valid).collect();
    assert_eq!(validity, vec![true, false, true, false, false]);

    assert_eq!(
        diags[1].messages(),
        vec!["field 'status' value \"2\" should not be wrapped in quotes"]
    );
    assert_eq!(diags[3].issues[0].rule_id.as_deref(), Some("15"));
    assert_eq!(diags[4].issues[0].severity, RuleSeverity::Warning);
}

// =============================================================================
// Rules
// =============================================================================

#[test]
fn test_rule_round_trip_keeps_behavior() {
    let (schemas, mut rules) = stores();
    let script = "UPDATE users SET active = 'yes' WHERE id = 1";
    let before = validate(script, Dialect::MySql, schemas.schemas(), rules.table());

    let exported = rules.export_rules().unwrap();
    let mut restored = RuleStore::load(MemoryStore::new()).unwrap();
    restored.import_rules(&exported).unwrap();
    assert_eq!(restored.table(), rules.table());

    let after = validate(script, Dialect::MySql, schemas.schemas(), restored.table());
    assert_eq!(before, after);

    rules.remove_rule(Dialect::MySql, ValueKind::Boolean, "4").unwrap();
    let relaxed = validate(script, Dialect::MySql, schemas.schemas(), rules.table());
    assert!(relaxed[0].is_valid);
}

#[test]
fn test_broken_user_rule_is_isolated() {
    let (schemas, mut rules) = stores();
    rules
        .add_rule(
            Dialect::MySql,
            ValueKind::Syntax,
            ValidationRule::new("99", "Broken", "[", "never", RuleSeverity::Error),
        )
        .unwrap();

    let validator = ScriptValidator::new(Dialect::MySql, schemas.schemas(), rules.table());
    assert_eq!(validator.skipped_rules().len(), 1);

    let diags = validator.validate("DELETE FROM users WHERE id = 1");
    assert!(diags[0].is_valid);
}

// =============================================================================
// Reports and extracted schemas
// =============================================================================

#[test]
fn test_report_summary() {
    let (schemas, rules) = stores();
    let diags = validate(
        "DELETE FROM users WHERE id = 1\nDELETE FROM users",
        Dialect::MySql,
        schemas.schemas(),
        rules.table(),
    );

    let report = ValidationReport::from_diagnostics(Dialect::MySql, diags).with_source("cleanup.sql");
    assert_eq!(report.summary.lines, 2);
    assert_eq!(report.summary.valid, 1);
    assert_eq!(report.summary.invalid, 1);
    assert!(report.has_invalid_lines());

    let json = report.to_json().unwrap();
    assert!(json.contains("\"SYNTAX_VIOLATION\""));
}

#[test]
fn test_hand_built_schema() {
    let mut schemas = SchemaSet::new();
    schemas.upsert(
        "fees",
        TableSchema::new(
            Dialect::MongoDb,
            vec![FieldDescriptor::new("amount", "Decimal128"), FieldDescriptor::new("paid", "Boolean")],
        ),
    );
    let rules = scriptrefly_core::RuleTable::builtin();

    let diags = validate(
        "db.fees.updateMany({paid: false}, {$inc: {amount: 1.5}})\ndb.fees.updateMany({paid: 0}, {$inc: {amount: 2}})",
        Dialect::MongoDb,
        &schemas,
        &rules,
    );

    assert!(diags[0].is_valid, "{:?}", diags[0].issues);
    assert_eq!(diags[1].messages(), vec!["field 'paid' value 0 should be true or false"]);
}
