//! Validation rule table
//!
//! Rules are grouped by dialect and value-kind. Evaluation order is the
//! stored order: for value rules the first failing rule wins, for the
//! `Syntax` bucket every failing rule is reported.

use crate::schema::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Semantic value bucket used to select rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Number,
    Date,
    Boolean,
    Object,
    Array,
    /// Line-level structural rules, independent of any field
    Syntax,
}

impl ValueKind {
    /// All value kinds in display order
    pub const ALL: [ValueKind; 7] = [
        ValueKind::String,
        ValueKind::Number,
        ValueKind::Date,
        ValueKind::Boolean,
        ValueKind::Object,
        ValueKind::Array,
        ValueKind::Syntax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Date => "Date",
            Self::Boolean => "Boolean",
            Self::Object => "Object",
            Self::Array => "Array",
            Self::Syntax => "Syntax",
        }
    }

    /// Parse a bucket name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown value kind '{}'", s))
    }
}

/// Rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single pattern rule
///
/// A value (or, for `Syntax` rules, a line) passes when `pattern` matches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pattern: String,
    pub message: String,
    pub severity: RuleSeverity,
}

impl ValidationRule {
    /// Create a rule with an empty description
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: impl Into<String>,
        message: impl Into<String>,
        severity: RuleSeverity,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            pattern: pattern.into(),
            message: message.into(),
            severity,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Rule buckets of one dialect
pub type RuleSet = BTreeMap<ValueKind, Vec<ValidationRule>>;

/// Complete rule table: dialect -> value-kind -> ordered rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(rename = "MySQL")]
    mysql: RuleSet,

    #[serde(rename = "MongoDB")]
    mongodb: RuleSet,
}

impl RuleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules of one bucket, empty when the bucket is absent
    pub fn rules(&self, dialect: Dialect, kind: ValueKind) -> &[ValidationRule] {
        self.dialect(dialect)
            .get(&kind)
            .map(|rules| rules.as_slice())
            .unwrap_or(&[])
    }

    /// All buckets of one dialect
    pub fn dialect(&self, dialect: Dialect) -> &RuleSet {
        match dialect {
            Dialect::MySql => &self.mysql,
            Dialect::MongoDb => &self.mongodb,
        }
    }

    fn dialect_mut(&mut self, dialect: Dialect) -> &mut RuleSet {
        match dialect {
            Dialect::MySql => &mut self.mysql,
            Dialect::MongoDb => &mut self.mongodb,
        }
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.mysql.values().chain(self.mongodb.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a rule to a bucket; ids must be unique per bucket
    pub fn add_rule(&mut self, dialect: Dialect, kind: ValueKind, rule: ValidationRule) -> Result<(), RuleEditError> {
        let bucket = self.dialect_mut(dialect).entry(kind).or_default();
        if bucket.iter().any(|r| r.id == rule.id) {
            return Err(RuleEditError::DuplicateId(rule.id));
        }
        bucket.push(rule);
        Ok(())
    }

    /// Replace the rule with the same id, keeping its position
    pub fn update_rule(&mut self, dialect: Dialect, kind: ValueKind, rule: ValidationRule) -> Result<(), RuleEditError> {
        let slot = self
            .dialect_mut(dialect)
            .get_mut(&kind)
            .and_then(|bucket| bucket.iter_mut().find(|r| r.id == rule.id))
            .ok_or_else(|| RuleEditError::NotFound(rule.id.clone()))?;
        *slot = rule;
        Ok(())
    }

    /// Remove a rule by id
    pub fn remove_rule(&mut self, dialect: Dialect, kind: ValueKind, id: &str) -> Result<ValidationRule, RuleEditError> {
        let bucket = self
            .dialect_mut(dialect)
            .get_mut(&kind)
            .ok_or_else(|| RuleEditError::NotFound(id.to_string()))?;
        let index = bucket
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RuleEditError::NotFound(id.to_string()))?;
        Ok(bucket.remove(index))
    }

    /// Serialize the whole table (2-space indented JSON)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a rule document.
    ///
    /// Both dialect keys must be present and rule ids must be unique per bucket.
    pub fn from_json(json: &str) -> Result<Self, RuleImportError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| RuleImportError::InvalidFormat(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| RuleImportError::InvalidFormat("top level must be an object".to_string()))?;

        for dialect in Dialect::ALL {
            if !object.contains_key(dialect.as_str()) {
                return Err(RuleImportError::MissingDialect(dialect));
            }
        }

        let table: RuleTable =
            serde_json::from_value(value).map_err(|e| RuleImportError::InvalidFormat(e.to_string()))?;

        for dialect in Dialect::ALL {
            for (kind, rules) in table.dialect(dialect) {
                let mut seen = HashSet::new();
                if let Some(dup) = rules.iter().find(|r| !seen.insert(r.id.as_str())) {
                    return Err(RuleImportError::DuplicateRuleId {
                        dialect,
                        kind: *kind,
                        id: dup.id.clone(),
                    });
                }
            }
        }

        Ok(table)
    }

    /// Built-in rule set restored by a reset
    pub fn builtin() -> Self {
        use RuleSeverity::{Error, Warning};

        let mut mysql = RuleSet::new();
        mysql.insert(ValueKind::String, vec![
            ValidationRule::new("1", "String quoting", "^'.*'$", "should be wrapped in single quotes", Error)
                .with_description("String values must use single quotes"),
        ]);
        mysql.insert(ValueKind::Number, vec![
            ValidationRule::new("2", "Unquoted number", r#"^[^'"](.*[^'"])?$"#, "should not be wrapped in quotes", Error)
                .with_description("Numbers must not be quoted"),
            ValidationRule::new("18", "Numeric literal", r"^-?\d+(\.\d+)?$", "should be a numeric literal", Error)
                .with_description("Numbers must be plain integer or decimal literals"),
        ]);
        mysql.insert(ValueKind::Date, vec![
            ValidationRule::new(
                "3",
                "Date format",
                r"^'\d{4}-\d{2}-\d{2}( \d{2}:\d{2}:\d{2})?'$",
                "should use the 'YYYY-MM-DD HH:mm:ss' format in single quotes",
                Error,
            )
            .with_description("Dates must use the standard format"),
        ]);
        mysql.insert(ValueKind::Boolean, vec![
            ValidationRule::new("4", "Boolean literal", "(?i)^(TRUE|FALSE|0|1)$", "should be TRUE, FALSE, 0 or 1", Error)
                .with_description("Booleans must be TRUE or FALSE"),
        ]);
        mysql.insert(ValueKind::Object, Vec::new());
        mysql.insert(ValueKind::Array, Vec::new());
        mysql.insert(ValueKind::Syntax, vec![
            ValidationRule::new(
                "5",
                "No SELECT *",
                r"(?i)^(?!.*\bSELECT\s+\*\s+FROM\b).*$",
                "avoid SELECT *, list the columns you need",
                Warning,
            )
            .with_description("Avoid SELECT *"),
            ValidationRule::new(
                "6",
                "UPDATE requires WHERE",
                r"(?i)^(?!\s*UPDATE\b(?!.*\bWHERE\b)).*$",
                "UPDATE statement must have a WHERE clause",
                Error,
            )
            .with_description("UPDATE statements must include a WHERE clause"),
            ValidationRule::new(
                "7",
                "DELETE requires WHERE",
                r"(?i)^(?!\s*DELETE\s+FROM\b(?!.*\bWHERE\b)).*$",
                "DELETE statement must have a WHERE clause",
                Error,
            )
            .with_description("DELETE statements must include a WHERE clause"),
            ValidationRule::new(
                "8",
                "Explicit JOIN",
                r"(?i)^(?!.*\bFROM\s+\w+\s*,\s*\w+).*$",
                "use explicit JOIN syntax instead of an implicit join",
                Warning,
            )
            .with_description("Joins should be written explicitly"),
        ]);

        let mut mongodb = RuleSet::new();
        mongodb.insert(ValueKind::String, vec![
            ValidationRule::new(
                "9",
                "String quoting",
                r#"^(['"])(.*?)\1$|^ObjectId\(.*\)$"#,
                "should be wrapped in single or double quotes or written as ObjectId()",
                Error,
            )
            .with_description("String values must be quoted; ObjectId fields may use ObjectId()"),
        ]);
        mongodb.insert(ValueKind::Number, vec![
            ValidationRule::new("10", "Unquoted number", r#"^[^'"](.*[^'"])?$"#, "should not be wrapped in quotes", Error)
                .with_description("Numbers must not be quoted"),
            ValidationRule::new(
                "19",
                "Numeric literal",
                r"^(-?\d+(\.\d+)?|Number(Int|Long|Decimal)\(.*\))$",
                "should be a number or NumberInt/NumberLong/NumberDecimal",
                Error,
            )
            .with_description("Numbers must be numeric literals or number constructors"),
        ]);
        mongodb.insert(ValueKind::Date, vec![
            ValidationRule::new("11", "Date constructor", r"^(ISODate|new Date)\(.*\)$", "should use ISODate() or new Date()", Error)
                .with_description("Dates must use a date constructor"),
            ValidationRule::new(
                "12",
                "ISO date string",
                r#"^(?!ISODate\().*$|^ISODate\("\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{3})?Z"\)$"#,
                "should use an ISO date string such as \"YYYY-MM-DDTHH:MM:SS.MMMZ\"",
                Warning,
            )
            .with_description("ISODate arguments should use the ISO format"),
        ]);
        mongodb.insert(ValueKind::Boolean, vec![
            ValidationRule::new("13", "Boolean literal", "^(true|false)$", "should be true or false", Error)
                .with_description("Booleans must be true or false"),
        ]);
        mongodb.insert(ValueKind::Object, Vec::new());
        mongodb.insert(ValueKind::Array, Vec::new());
        mongodb.insert(ValueKind::Syntax, vec![
            ValidationRule::new("14", "No $where", r"^(?!.*\$where).*$", "$where is deprecated, use $expr instead", Warning)
                .with_description("Avoid the $where operator"),
            ValidationRule::new(
                "15",
                "No remove()",
                r"^(?!.*\.remove\().*$",
                "remove() is deprecated, use deleteOne() or deleteMany()",
                Error,
            )
            .with_description("Avoid the deprecated remove method"),
            ValidationRule::new(
                "16",
                "No update()",
                r"^(?!.*\.update\().*$",
                "update() is deprecated, use updateOne() or updateMany()",
                Error,
            )
            .with_description("Avoid the deprecated update method"),
            ValidationRule::new(
                "17",
                "Text index",
                r"^(?!.*\.find\(\{\s*\$text).*$",
                "text search should be backed by a text index",
                Warning,
            )
            .with_description("Queries should use indexes"),
        ]);

        Self { mysql, mongodb }
    }
}

/// Errors raised by rule edit operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleEditError {
    #[error("Rule id '{0}' already exists in this bucket")]
    DuplicateId(String),

    #[error("Rule '{0}' not found")]
    NotFound(String),
}

/// Errors raised when importing a rule document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleImportError {
    #[error("Invalid rule document: {0}")]
    InvalidFormat(String),

    #[error("Invalid rule document: missing '{0}' section")]
    MissingDialect(Dialect),

    #[error("Invalid rule document: duplicate rule id '{id}' in {dialect}/{kind}")]
    DuplicateRuleId {
        dialect: Dialect,
        kind: ValueKind,
        id: String,
    },
}
