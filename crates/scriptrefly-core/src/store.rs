//! Persistence port and the stores that mirror state through it
//!
//! `RuleStore` and `SchemaStore` keep an in-memory snapshot and write the
//! whole document back through a `ConfigStore` on every mutation. A failed
//! write leaves the snapshot untouched.

use crate::rules::{RuleEditError, RuleImportError, RuleTable, ValidationRule, ValueKind};
use crate::schema::{Dialect, SchemaEditError, SchemaImportError, SchemaSet, TableSchema};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key under which the schema document is stored
pub const SCHEMA_KEY: &str = "dbConfig";

/// Key under which the rule document is stored
pub const RULES_KEY: &str = "validationRules";

/// Errors from a persistence backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error for key '{key}': {message}")]
    IoError { key: String, message: String },

    #[error("Invalid store key '{0}'")]
    InvalidKey(String),
}

/// Key-value persistence port
pub trait ConfigStore {
    /// Load the value stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete the value under `key`; missing keys are not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds the last complete write
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl ConfigStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::IoError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let io_error = |e: std::io::Error| StoreError::IoError {
            key: key.to_string(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(&self.dir).map_err(io_error)?;
        std::fs::write(&path, value).map_err(io_error)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::IoError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Rule store errors
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error(transparent)]
    Import(#[from] RuleImportError),

    #[error(transparent)]
    Edit(#[from] RuleEditError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

/// Session rule table mirrored to a `ConfigStore`
#[derive(Debug)]
pub struct RuleStore<S: ConfigStore> {
    table: RuleTable,
    store: S,
}

impl<S: ConfigStore> RuleStore<S> {
    /// Re-hydrate from the store; an absent document yields an empty table
    pub fn load(store: S) -> Result<Self, RuleStoreError> {
        let table = match store.load(RULES_KEY)? {
            Some(json) => RuleTable::from_json(&json)?,
            None => RuleTable::new(),
        };
        tracing::debug!(rules = table.len(), "loaded rule table");
        Ok(Self { table, store })
    }

    /// Current table snapshot
    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Ordered rules of one bucket
    pub fn get_rules(&self, dialect: Dialect, kind: ValueKind) -> &[ValidationRule] {
        self.table.rules(dialect, kind)
    }

    /// Replace the table with an imported document; the table is unchanged on error
    pub fn import_rules(&mut self, document: &str) -> Result<&RuleTable, RuleStoreError> {
        let imported = RuleTable::from_json(document)?;
        self.commit(imported)?;
        tracing::info!(rules = self.table.len(), "imported rule table");
        Ok(&self.table)
    }

    /// Serialize the whole table
    pub fn export_rules(&self) -> Result<String, RuleStoreError> {
        self.table
            .to_json()
            .map_err(|e| RuleStoreError::SerializeError(e.to_string()))
    }

    /// Replace the table with the built-in rules
    pub fn reset_to_default(&mut self) -> Result<&RuleTable, RuleStoreError> {
        self.commit(RuleTable::builtin())?;
        tracing::info!("rule table reset to defaults");
        Ok(&self.table)
    }

    pub fn add_rule(&mut self, dialect: Dialect, kind: ValueKind, rule: ValidationRule) -> Result<(), RuleStoreError> {
        let mut next = self.table.clone();
        next.add_rule(dialect, kind, rule)?;
        self.commit(next)
    }

    pub fn update_rule(&mut self, dialect: Dialect, kind: ValueKind, rule: ValidationRule) -> Result<(), RuleStoreError> {
        let mut next = self.table.clone();
        next.update_rule(dialect, kind, rule)?;
        self.commit(next)
    }

    pub fn remove_rule(&mut self, dialect: Dialect, kind: ValueKind, id: &str) -> Result<ValidationRule, RuleStoreError> {
        let mut next = self.table.clone();
        let removed = next.remove_rule(dialect, kind, id)?;
        self.commit(next)?;
        Ok(removed)
    }

    fn commit(&mut self, next: RuleTable) -> Result<(), RuleStoreError> {
        let json = next
            .to_json()
            .map_err(|e| RuleStoreError::SerializeError(e.to_string()))?;
        self.store.save(RULES_KEY, &json)?;
        self.table = next;
        Ok(())
    }
}

/// Schema store errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaStoreError {
    #[error(transparent)]
    Import(#[from] SchemaImportError),

    #[error(transparent)]
    Edit(#[from] SchemaEditError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

/// Session schema set mirrored to a `ConfigStore`
#[derive(Debug)]
pub struct SchemaStore<S: ConfigStore> {
    schemas: SchemaSet,
    store: S,
}

impl<S: ConfigStore> SchemaStore<S> {
    /// Re-hydrate from the store; an absent document yields no tables
    pub fn load(store: S) -> Result<Self, SchemaStoreError> {
        let schemas = match store.load(SCHEMA_KEY)? {
            Some(json) => SchemaSet::from_json(&json)?,
            None => SchemaSet::new(),
        };
        tracing::debug!(tables = schemas.len(), "loaded schema set");
        Ok(Self { schemas, store })
    }

    /// Current snapshot
    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    /// Insert or replace one table
    pub fn upsert_table(&mut self, name: &str, table: TableSchema) -> Result<(), SchemaStoreError> {
        let mut next = self.schemas.clone();
        next.upsert(name, table);
        self.commit(next)?;
        tracing::info!(table = name, "saved table schema");
        Ok(())
    }

    /// Delete one table
    pub fn remove_table(&mut self, name: &str) -> Result<TableSchema, SchemaStoreError> {
        let mut next = self.schemas.clone();
        let removed = next
            .remove(name)
            .ok_or_else(|| SchemaEditError::TableNotFound(name.to_string()))?;
        self.commit(next)?;
        Ok(removed)
    }

    /// Apply a field edit to one table
    pub fn edit_table<F>(&mut self, name: &str, edit: F) -> Result<(), SchemaStoreError>
    where
        F: FnOnce(&mut TableSchema) -> Result<(), SchemaEditError>,
    {
        let mut next = self.schemas.clone();
        let table = next
            .get_mut(name)
            .ok_or_else(|| SchemaEditError::TableNotFound(name.to_string()))?;
        edit(table)?;
        self.commit(next)
    }

    /// Replace all tables with an imported document
    pub fn import_schemas(&mut self, document: &str) -> Result<&SchemaSet, SchemaStoreError> {
        let imported = SchemaSet::from_json(document)?;
        self.commit(imported)?;
        tracing::info!(tables = self.schemas.len(), "imported schema set");
        Ok(&self.schemas)
    }

    /// Serialize all tables
    pub fn export_schemas(&self) -> Result<String, SchemaStoreError> {
        self.schemas
            .to_json()
            .map_err(|e| SchemaStoreError::SerializeError(e.to_string()))
    }

    fn commit(&mut self, next: SchemaSet) -> Result<(), SchemaStoreError> {
        let json = next
            .to_json()
            .map_err(|e| SchemaStoreError::SerializeError(e.to_string()))?;
        self.store.save(SCHEMA_KEY, &json)?;
        self.schemas = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSeverity;
    use crate::schema::FieldDescriptor;
    use pretty_assertions::assert_eq;

    /// Store whose writes always fail
    struct ReadOnlyStore;

    impl ConfigStore for ReadOnlyStore {
        fn load(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn save(&self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::IoError {
                key: key.to_string(),
                message: "read-only".to_string(),
            })
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn rule_store_starts_empty() {
        let store = RuleStore::load(MemoryStore::new()).unwrap();
        assert!(store.table().is_empty());
    }

    #[test]
    fn rule_store_mirrors_mutations() {
        let mut store = RuleStore::load(MemoryStore::new()).unwrap();
        store.reset_to_default().unwrap();
        store
            .add_rule(
                Dialect::MySql,
                ValueKind::Array,
                ValidationRule::new("a1", "json array", r"^'\[.*\]'$", "arrays are stored as JSON text", RuleSeverity::Info),
            )
            .unwrap();

        let saved = store.store.load(RULES_KEY).unwrap().unwrap();
        let reloaded = RuleStore::load(MemoryStore::new()).and_then(|mut s| {
            s.import_rules(&saved)?;
            Ok(s)
        });
        assert_eq!(reloaded.unwrap().table(), store.table());
    }

    #[test]
    fn invalid_import_leaves_rules_unchanged() {
        let mut store = RuleStore::load(MemoryStore::new()).unwrap();
        store.reset_to_default().unwrap();
        let before = store.table().clone();

        let err = store.import_rules(r#"{ "MongoDB": {} }"#).unwrap_err();
        assert!(matches!(err, RuleStoreError::Import(RuleImportError::MissingDialect(Dialect::MySql))));
        assert_eq!(store.table(), &before);
    }

    #[test]
    fn failed_save_leaves_rules_unchanged() {
        let mut store = RuleStore::load(ReadOnlyStore).unwrap();
        assert!(matches!(store.reset_to_default(), Err(RuleStoreError::Store(_))));
        assert!(store.table().is_empty());
    }

    #[test]
    fn export_import_preserves_ids() {
        let mut store = RuleStore::load(MemoryStore::new()).unwrap();
        store.reset_to_default().unwrap();
        let exported = store.export_rules().unwrap();

        let mut other = RuleStore::load(MemoryStore::new()).unwrap();
        other.import_rules(&exported).unwrap();

        for dialect in Dialect::ALL {
            for kind in ValueKind::ALL {
                let ids = |s: &RuleStore<MemoryStore>| {
                    s.get_rules(dialect, kind).iter().map(|r| r.id.clone()).collect::<Vec<_>>()
                };
                assert_eq!(ids(&other), ids(&store));
            }
        }
    }

    #[test]
    fn schema_store_edits_and_persists() {
        let mut store = SchemaStore::load(MemoryStore::new()).unwrap();
        store
            .upsert_table(
                "users",
                TableSchema::new(Dialect::MySql, vec![FieldDescriptor::new("id", "BIGINT")]),
            )
            .unwrap();
        store
            .edit_table("users", |t| t.add_field(FieldDescriptor::new("name", "VARCHAR")))
            .unwrap();

        assert!(matches!(
            store.edit_table("ghosts", |_| Ok(())),
            Err(SchemaStoreError::Edit(SchemaEditError::TableNotFound(_)))
        ));

        let saved = store.store.load(SCHEMA_KEY).unwrap().unwrap();
        assert_eq!(saved, store.export_schemas().unwrap());

        let reloaded = SchemaStore::load(MemoryStore::new()).and_then(|mut s| {
            s.import_schemas(&saved)?;
            Ok(s)
        });
        assert_eq!(reloaded.unwrap().schemas().get("users").unwrap().field_names(), vec!["id", "name"]);

        store.remove_table("users").unwrap();
        assert!(store.schemas().is_empty());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));

        assert_eq!(store.load(RULES_KEY).unwrap(), None);
        store.save(RULES_KEY, "{}").unwrap();
        assert_eq!(store.load(RULES_KEY).unwrap().as_deref(), Some("{}"));
        store.remove(RULES_KEY).unwrap();
        store.remove(RULES_KEY).unwrap();
        assert_eq!(store.load(RULES_KEY).unwrap(), None);

        assert!(matches!(store.save("../escape", "x"), Err(StoreError::InvalidKey(_))));
    }
}
