//! Field extraction from MyBatis mapper XML
//!
//! Reads `<id>` and `<result>` bindings in document order. Native JDBC type
//! names are carried through untouched.

use regex::Regex;
use scriptrefly_core::{push_unique, FieldDescriptor};
use std::sync::LazyLock;

static BINDING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(id|result)\b([^>]*)>").expect("static regex must compile"));

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex must compile")
});

static XML_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex must compile"));

/// Type recorded when a binding has no `jdbcType`
pub const DEFAULT_JDBC_TYPE: &str = "VARCHAR";

/// Extract fields from `<id>`/`<result>` bindings
pub fn extract_mapping_fields(source: &str) -> Vec<FieldDescriptor> {
    let document = XML_COMMENT_RE.replace_all(source, "");
    let mut fields = Vec::new();

    for binding in BINDING_RE.captures_iter(&document) {
        let mut property = None;
        let mut column = None;
        let mut jdbc_type = None;

        for attr in ATTRIBUTE_RE.captures_iter(&binding[2]) {
            let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str().trim());
            match &attr[1] {
                "property" => property = value,
                "column" => column = value,
                "jdbcType" => jdbc_type = value,
                _ => {}
            }
        }

        let Some(name) = property.or(column).filter(|n| !n.is_empty()) else {
            tracing::debug!(tag = &binding[1], "binding without property or column");
            continue;
        };

        let field_type = jdbc_type.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_JDBC_TYPE);
        push_unique(&mut fields, FieldDescriptor::new(name, field_type));
    }

    tracing::debug!(fields = fields.len(), "extracted mapping fields");
    fields
}
