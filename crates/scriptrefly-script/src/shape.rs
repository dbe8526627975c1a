//! Statement shape checks
//!
//! Reports clauses a statement is missing and call arguments of the wrong
//! kind. Lines the tokenizer does not recognize produce no findings here.

use crate::lexer::{find_keyword, find_keywords, trim_statement};
use crate::mongo::{self, CallShape, Value};
use regex::Regex;
use scriptrefly_core::Dialect;
use serde::Serialize;
use std::sync::LazyLock;

static INSERT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:INSERT|REPLACE)\b").expect("static regex must compile"));

/// `BY` followed by something that can start a column expression
static BY_COLUMN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*BY\s+([`\w(]\w*)").expect("static regex must compile"));

/// Words that end a GROUP BY / ORDER BY list rather than start it
const CLAUSE_WORDS: [&str; 7] = ["LIMIT", "HAVING", "ORDER", "GROUP", "WITH", "ASC", "DESC"];

/// A statement missing a clause or argument it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeViolation {
    /// INSERT with neither VALUES, SET nor SELECT
    InsertWithoutValues,

    /// JOIN with neither ON nor USING
    JoinWithoutCondition,

    /// `GROUP BY` or `ORDER BY` with no column after it
    MissingByColumn { clause: &'static str },

    HavingWithoutGroupBy,

    /// Collection method called with arguments of the wrong kind
    CallArguments { verb: String, expected: &'static str },

    /// Update operator whose operand is not an object
    OperatorOperand { operator: String },
}

impl std::fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsertWithoutValues => write!(f, "INSERT statement needs VALUES, SET or SELECT"),
            Self::JoinWithoutCondition => write!(f, "JOIN needs an ON or USING condition"),
            Self::MissingByColumn { clause } => write!(f, "{} needs at least one column", clause),
            Self::HavingWithoutGroupBy => write!(f, "HAVING must follow GROUP BY"),
            Self::CallArguments { verb, expected } => write!(f, "{}() expects {}", verb, expected),
            Self::OperatorOperand { operator } => write!(f, "{} operand must be an object", operator),
        }
    }
}

/// Shape problems on one line of `dialect`, in the order they are checked
pub fn check_shape(line: &str, dialect: Dialect) -> Vec<ShapeViolation> {
    let statement = trim_statement(line);
    let violations = match dialect {
        Dialect::MySql => check_sql(statement),
        Dialect::MongoDb => check_mongo(statement),
    };

    if !violations.is_empty() {
        tracing::debug!(%dialect, count = violations.len(), "statement shape problems");
    }

    violations
}

fn check_sql(statement: &str) -> Vec<ShapeViolation> {
    let mut violations = Vec::new();

    if INSERT_RE.is_match(statement)
        && ["VALUES", "VALUE", "SET", "SELECT"]
            .iter()
            .all(|keyword| find_keyword(statement, keyword).is_none())
    {
        violations.push(ShapeViolation::InsertWithoutValues);
    }

    if joins_without_condition(statement) {
        violations.push(ShapeViolation::JoinWithoutCondition);
    }

    for clause in ["GROUP", "ORDER"] {
        for at in find_keywords(statement, clause) {
            let rest = &statement[at + clause.len()..];
            if !rest.trim_start().to_ascii_uppercase().starts_with("BY") {
                continue;
            }
            let has_column = BY_COLUMN_RE
                .captures(rest)
                .is_some_and(|caps| !CLAUSE_WORDS.iter().any(|w| caps[1].eq_ignore_ascii_case(w)));
            if !has_column {
                let clause = if clause == "GROUP" { "GROUP BY" } else { "ORDER BY" };
                violations.push(ShapeViolation::MissingByColumn { clause });
            }
        }
    }

    if let Some(having) = find_keyword(statement, "HAVING") {
        if find_keyword(&statement[..having], "GROUP").is_none() {
            violations.push(ShapeViolation::HavingWithoutGroupBy);
        }
    }

    violations
}

/// True when some JOIN other than NATURAL/CROSS lacks ON or USING before the
/// next JOIN
fn joins_without_condition(statement: &str) -> bool {
    let joins = find_keywords(statement, "JOIN");

    joins.iter().enumerate().any(|(index, &at)| {
        let preceding: Vec<&str> = statement[..at].split_whitespace().rev().take(2).collect();
        if preceding
            .iter()
            .any(|w| w.eq_ignore_ascii_case("NATURAL") || w.eq_ignore_ascii_case("CROSS"))
        {
            return false;
        }

        let end = joins.get(index + 1).copied().unwrap_or(statement.len());
        let segment = &statement[at..end];
        find_keyword(segment, "ON").is_none() && find_keyword(segment, "USING").is_none()
    })
}

fn check_mongo(statement: &str) -> Vec<ShapeViolation> {
    let Some(call) = mongo::parse_call(statement) else {
        return Vec::new();
    };
    let mut violations = Vec::new();

    let is_object = |raw: &str| matches!(Value::classify(raw), Value::Object(_));
    let optional_object = |raw: &str| raw.is_empty() || is_object(raw);

    let (arguments_ok, expected) = match call.shape {
        CallShape::Find => (
            optional_object(call.arg(0)) && optional_object(call.arg(1)),
            "a query object and an optional projection object",
        ),
        CallShape::Query => (is_object(call.arg(0)), "a query object"),
        CallShape::Count => (optional_object(call.arg(0)), "an optional query object"),
        CallShape::Update => (
            is_object(call.arg(0))
                && (is_object(call.arg(1)) || matches!(Value::classify(call.arg(1)), Value::Array(_))),
            "a query object and an update object",
        ),
        CallShape::Replace => (
            is_object(call.arg(0)) && is_object(call.arg(1)),
            "a query object and a replacement object",
        ),
        CallShape::InsertOne => (is_object(call.arg(0)), "a document object"),
        CallShape::InsertMany => (
            matches!(Value::classify(call.arg(0)), Value::Array(_)),
            "an array of documents",
        ),
    };

    if !arguments_ok {
        violations.push(ShapeViolation::CallArguments {
            verb: call.verb.to_string(),
            expected,
        });
    }

    if call.shape == CallShape::Update {
        for (operator, operand) in mongo::entries(call.arg(1)) {
            if mongo::is_operator(&operator) && !is_object(operand) {
                violations.push(ShapeViolation::OperatorOperand { operator });
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sql(line: &str) -> Vec<String> {
        check_shape(line, Dialect::MySql).iter().map(ToString::to_string).collect()
    }

    fn mongo(line: &str) -> Vec<String> {
        check_shape(line, Dialect::MongoDb).iter().map(ToString::to_string).collect()
    }

    #[test]
    fn well_formed_sql() {
        for line in [
            "INSERT INTO users (id, name) VALUES (1, 'a');",
            "INSERT INTO users SET id = 1",
            "INSERT INTO archive (id) SELECT id FROM users WHERE id = 1",
            "SELECT u.id FROM users u JOIN orders o ON o.user_id = u.id LEFT JOIN t USING (id)",
            "SELECT id FROM users NATURAL JOIN orders WHERE id = 1",
            "SELECT age, COUNT(*) FROM users GROUP BY age HAVING COUNT(*) > 1 ORDER BY age DESC",
            "UPDATE users SET note = 'join having group by' WHERE id = 1",
        ] {
            assert_eq!(sql(line), Vec::<String>::new(), "{line}");
        }
    }

    #[test]
    fn sql_missing_clauses() {
        assert_eq!(sql("INSERT INTO users (id, name) (1, 'a');"), vec!["INSERT statement needs VALUES, SET or SELECT"]);
        assert_eq!(
            sql("SELECT id FROM users u JOIN users v WHERE id = 1;"),
            vec!["JOIN needs an ON or USING condition"]
        );
        assert_eq!(sql("SELECT id FROM users HAVING id > 1;"), vec!["HAVING must follow GROUP BY"]);
        assert_eq!(sql("SELECT id FROM users ORDER BY"), vec!["ORDER BY needs at least one column"]);
        assert_eq!(sql("SELECT id FROM users GROUP BY LIMIT 3"), vec!["GROUP BY needs at least one column"]);
    }

    #[test]
    fn comment_text_is_ignored() {
        assert!(sql("DELETE FROM users WHERE id = 1; -- join without on").is_empty());
    }

    #[test]
    fn well_formed_mongo_calls() {
        for line in [
            r#"db.users.find()"#,
            r#"db.users.find({age: 1}, {name: 1})"#,
            r#"db.users.countDocuments()"#,
            r#"db.users.updateOne({"id": 1}, {$set: {"name": "a"}, $inc: {n: 1}})"#,
            r#"db.users.updateMany({}, [{$set: {n: 1}}])"#,
            r#"db.users.insertMany([{name: "a"}])"#,
            r#"db.users.replaceOne({_id: 1}, {name: "b"})"#,
        ] {
            assert_eq!(mongo(line), Vec::<String>::new(), "{line}");
        }
    }

    #[test]
    fn mongo_arguments_of_the_wrong_kind() {
        assert_eq!(
            mongo(r#"db.users.updateOne({"id": 1})"#),
            vec!["updateOne() expects a query object and an update object"]
        );
        assert_eq!(mongo(r#"db.users.insertMany({"name": "a"})"#), vec!["insertMany() expects an array of documents"]);
        assert_eq!(mongo(r#"db.users.insertOne([{"name": "a"}])"#), vec!["insertOne() expects a document object"]);
        assert_eq!(mongo("db.users.deleteOne()"), vec!["deleteOne() expects a query object"]);
        assert_eq!(mongo(r#"db.users.find("id")"#), vec!["find() expects a query object and an optional projection object"]);
    }

    #[test]
    fn update_operator_operands() {
        assert_eq!(
            mongo(r#"db.users.updateOne({"id": 1}, {$set: "x", $push: {tags: "a"}, $pull: 3})"#),
            vec!["$set operand must be an object", "$pull operand must be an object"]
        );
    }

    #[test]
    fn unrecognized_lines_have_no_findings() {
        assert!(mongo("db.users.aggregate(1)").is_empty());
        assert!(sql("CREATE TABLE t (id INT)").is_empty());
    }
}
