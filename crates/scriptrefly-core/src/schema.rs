//! Field schema types and the schema persistence document

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Target query language family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// SQL statements (`UPDATE`, `INSERT`, `DELETE`, `SELECT`)
    #[serde(rename = "MySQL")]
    MySql,

    /// Shell-style document commands (`db.collection.verb(...)`)
    #[serde(rename = "MongoDB")]
    MongoDb,
}

impl Dialect {
    /// All dialects, in persistence order
    pub const ALL: [Dialect; 2] = [Dialect::MySql, Dialect::MongoDb];

    /// Stable name used in persisted documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::MongoDb => "MongoDB",
        }
    }

    /// Parse a dialect name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "sql" => Some(Self::MySql),
            "mongodb" | "mongo" => Some(Self::MongoDb),
            _ => None,
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::MySql
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown dialect '{}', expected MySQL or MongoDB", s))
    }
}

/// A named field and its value-kind
///
/// `field_type` is only meaningful relative to the dialect of the schema
/// that owns the field; it may be empty when the type is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name (non-empty)
    pub name: String,

    /// Semantic value-kind or raw native type name
    #[serde(rename = "type", default)]
    pub field_type: String,
}

impl FieldDescriptor {
    /// Create a new field descriptor
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// Append `field` unless a field with the same name is already present.
///
/// Returns true when the field was added.
pub fn push_unique(fields: &mut Vec<FieldDescriptor>, field: FieldDescriptor) -> bool {
    if field.name.is_empty() || fields.iter().any(|f| f.name == field.name) {
        return false;
    }
    fields.push(field);
    true
}

/// Merge `additional` into `base`, keeping the first occurrence of every name
pub fn merge_fields(base: &mut Vec<FieldDescriptor>, additional: impl IntoIterator<Item = FieldDescriptor>) {
    for field in additional {
        push_unique(base, field);
    }
}

/// Schema of one table or collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Dialect the field types are expressed in
    #[serde(rename = "type")]
    pub dialect: Dialect,

    /// Fields in discovery order, unique by name
    pub fields: Vec<FieldDescriptor>,
}

impl TableSchema {
    /// Create a table schema, dropping empty names and later duplicates
    pub fn new(dialect: Dialect, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        let mut unique = Vec::new();
        merge_fields(&mut unique, fields);
        Self {
            dialect,
            fields: unique,
        }
    }

    /// Find a field by name
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a field exists
    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }

    /// Get field names in order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Append a field; fails if the name is empty or taken
    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<(), SchemaEditError> {
        if field.name.is_empty() {
            return Err(SchemaEditError::EmptyFieldName);
        }
        if self.has_field(&field.name) {
            return Err(SchemaEditError::DuplicateField(field.name));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Remove a field by name
    pub fn remove_field(&mut self, name: &str) -> Result<FieldDescriptor, SchemaEditError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| SchemaEditError::FieldNotFound(name.to_string()))?;
        Ok(self.fields.remove(index))
    }

    /// Rename a field in place, keeping its position
    pub fn rename_field(&mut self, from: &str, to: &str) -> Result<(), SchemaEditError> {
        if to.is_empty() {
            return Err(SchemaEditError::EmptyFieldName);
        }
        if from != to && self.has_field(to) {
            return Err(SchemaEditError::DuplicateField(to.to_string()));
        }
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == from)
            .ok_or_else(|| SchemaEditError::FieldNotFound(from.to_string()))?;
        field.name = to.to_string();
        Ok(())
    }

    /// Change the type of a field
    pub fn set_field_type(&mut self, name: &str, field_type: impl Into<String>) -> Result<(), SchemaEditError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| SchemaEditError::FieldNotFound(name.to_string()))?;
        field.field_type = field_type.into();
        Ok(())
    }
}

/// All table schemas of one configuration, keyed by table/collection name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSet {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaSet {
    /// Create an empty schema set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a table by name
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables.get_mut(name)
    }

    /// Insert or replace a table; returns the previous schema
    pub fn upsert(&mut self, name: impl Into<String>, table: TableSchema) -> Option<TableSchema> {
        self.tables.insert(name.into(), table)
    }

    /// Remove a table
    pub fn remove(&mut self, name: &str) -> Option<TableSchema> {
        self.tables.remove(name)
    }

    /// Table names in sorted order
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }

    /// Iterate tables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableSchema)> {
        self.tables.iter()
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no tables are defined
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Serialize to the persistence document (2-space indented JSON)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse the persistence document.
    ///
    /// The top level must be a JSON object. Entries without a `fields` array
    /// (or with an unknown dialect) are skipped; bare-string fields are
    /// normalized to `{ name, type: "String" }`.
    pub fn from_json(json: &str) -> Result<Self, SchemaImportError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| SchemaImportError::ParseError(e.to_string()))?;

        let Value::Object(entries) = value else {
            return Err(SchemaImportError::InvalidFormat(
                "top level must be an object keyed by table name".to_string(),
            ));
        };

        let mut set = SchemaSet::new();
        for (name, entry) in entries {
            match normalize_entry(&entry) {
                Some(table) => {
                    set.tables.insert(name, table);
                }
                None => {
                    tracing::warn!(table = %name, "skipping schema entry with no fields array or an unknown type");
                }
            }
        }

        Ok(set)
    }
}

fn normalize_entry(entry: &Value) -> Option<TableSchema> {
    let object = entry.as_object()?;
    let fields = object.get("fields")?.as_array()?;

    let dialect = match object.get("type").and_then(Value::as_str) {
        Some(name) => Dialect::parse(name)?,
        None => Dialect::MongoDb,
    };

    let descriptors = fields.iter().filter_map(|field| match field {
        Value::String(name) => Some(FieldDescriptor::new(name.clone(), "String")),
        Value::Object(map) => {
            let name = map.get("name")?.as_str()?;
            let field_type = map.get("type").and_then(Value::as_str).unwrap_or_default();
            Some(FieldDescriptor::new(name, field_type))
        }
        _ => None,
    });

    Some(TableSchema::new(dialect, descriptors))
}

/// Errors raised by schema edit operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaEditError {
    #[error("Field name must not be empty")]
    EmptyFieldName,

    #[error("Field '{0}' already exists")]
    DuplicateField(String),

    #[error("Field '{0}' not found")]
    FieldNotFound(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),
}

/// Errors raised when importing a schema document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaImportError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid schema document: {0}")]
    InvalidFormat(String),
}
