//! Field type -> rule bucket resolution

use scriptrefly_core::ValueKind;

/// Substrings of a lowercased field type, checked in order
const KIND_MARKERS: [(ValueKind, &[&str]); 6] = [
    (ValueKind::Array, &["array", "list", "set"]),
    (ValueKind::Object, &["object", "map", "document", "json"]),
    (ValueKind::Boolean, &["bool", "bit"]),
    (ValueKind::Date, &["date", "time"]),
    (ValueKind::String, &["char", "text", "string", "uuid", "clob", "enum"]),
    (
        ValueKind::Number,
        &["int", "long", "short", "byte", "double", "float", "decimal", "numeric", "number", "real"],
    ),
];

/// Resolve the rule bucket for a schema field type.
///
/// Works across both vocabularies in use: Java-derived kinds (`Integer`,
/// `Decimal128`, `Date`) and native column types (`BIGINT`, `VARCHAR`,
/// `TIMESTAMP`). Unknown types have no bucket and are not type-checked.
pub fn resolve_value_kind(field_type: &str) -> Option<ValueKind> {
    let lowered = field_type.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }

    // ObjectId values are written as strings in scripts
    if lowered.contains("objectid") {
        return Some(ValueKind::String);
    }

    KIND_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
        .map(|(kind, _)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_derived_kinds() {
        assert_eq!(resolve_value_kind("Integer"), Some(ValueKind::Number));
        assert_eq!(resolve_value_kind("Decimal128"), Some(ValueKind::Number));
        assert_eq!(resolve_value_kind("String"), Some(ValueKind::String));
        assert_eq!(resolve_value_kind("Boolean"), Some(ValueKind::Boolean));
        assert_eq!(resolve_value_kind("Date"), Some(ValueKind::Date));
        assert_eq!(resolve_value_kind("Array"), Some(ValueKind::Array));
        assert_eq!(resolve_value_kind("Object"), Some(ValueKind::Object));
        assert_eq!(resolve_value_kind("java.time.Instant"), Some(ValueKind::Date));
        assert_eq!(resolve_value_kind("ObjectId"), Some(ValueKind::String));
    }

    #[test]
    fn native_column_types() {
        assert_eq!(resolve_value_kind("BIGINT"), Some(ValueKind::Number));
        assert_eq!(resolve_value_kind("VARCHAR"), Some(ValueKind::String));
        assert_eq!(resolve_value_kind("LONGTEXT"), Some(ValueKind::String));
        assert_eq!(resolve_value_kind("TIMESTAMP"), Some(ValueKind::Date));
        assert_eq!(resolve_value_kind("DATETIME"), Some(ValueKind::Date));
        assert_eq!(resolve_value_kind("BIT"), Some(ValueKind::Boolean));
        assert_eq!(resolve_value_kind("JSON"), Some(ValueKind::Object));
    }

    #[test]
    fn unknown_types_have_no_bucket() {
        assert_eq!(resolve_value_kind(""), None);
        assert_eq!(resolve_value_kind("BLOB"), None);
        assert_eq!(resolve_value_kind("geometry"), None);
    }
}
