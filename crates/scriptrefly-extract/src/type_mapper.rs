//! Java field type -> document value-kind mapping

/// Package prefixes of the JDK and its bundled APIs
const STANDARD_PREFIXES: [&str; 6] = ["java.", "javax.", "sun.", "com.sun.", "org.w3c.", "org.xml."];

fn mapped_kind(source_type: &str) -> Option<&'static str> {
    let kind = match source_type {
        "String" | "Character" | "char" | "UUID" => "String",
        "Integer" | "int" | "Byte" | "byte" | "Short" | "short" => "Integer",
        "Long" | "long" => "Long",
        "Double" | "double" => "Double",
        "Float" | "float" => "Float",
        "Boolean" | "boolean" => "Boolean",
        "BigDecimal" => "Decimal128",
        "Date" | "LocalDate" | "LocalDateTime" | "Calendar" => "Date",
        "List" | "ArrayList" | "LinkedList" | "Set" | "HashSet" | "TreeSet" => "Array",
        "Map" | "HashMap" | "TreeMap" => "Object",
        _ => return None,
    };
    Some(kind)
}

/// Map a Java type name to the value-kind stored in the schema.
///
/// Known primitives, wrappers and collections map to a canonical kind;
/// other JDK types (dot-qualified under a standard package) pass through
/// unchanged; anything else is an embedded document, `"Object"`.
pub fn map_type(source_type: &str) -> String {
    let trimmed = source_type.trim();

    if trimmed.ends_with("[]") {
        return "Array".to_string();
    }

    // Generic arguments do not change the container kind
    let base = trimmed.split('<').next().unwrap_or(trimmed).trim();

    if let Some(kind) = mapped_kind(base) {
        return kind.to_string();
    }

    if STANDARD_PREFIXES.iter().any(|prefix| base.starts_with(prefix)) {
        return base.to_string();
    }

    "Object".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_and_wrappers() {
        assert_eq!(map_type("int"), "Integer");
        assert_eq!(map_type("Short"), "Integer");
        assert_eq!(map_type("long"), "Long");
        assert_eq!(map_type("char"), "String");
        assert_eq!(map_type("boolean"), "Boolean");
        assert_eq!(map_type("BigDecimal"), "Decimal128");
        assert_eq!(map_type("LocalDateTime"), "Date");
    }

    #[test]
    fn collections() {
        assert_eq!(map_type("List<String>"), "Array");
        assert_eq!(map_type("HashMap<String, Object>"), "Object");
        assert_eq!(map_type("String[]"), "Array");
    }

    #[test]
    fn standard_types_pass_through() {
        assert_eq!(map_type("java.time.Instant"), "java.time.Instant");
        assert_eq!(map_type("javax.money.MonetaryAmount"), "javax.money.MonetaryAmount");
    }

    #[test]
    fn user_types_are_objects() {
        assert_eq!(map_type("ApplicantMG"), "Object");
        assert_eq!(map_type("com.acme.Address"), "Object");
        assert_eq!(map_type(""), "Object");
    }

    #[test]
    fn mapping_is_deterministic() {
        for ty in ["String", "Integer", "int", "Long", "Double", "Boolean", "Date", "List", "Map", "Foo"] {
            assert_eq!(map_type(ty), map_type(ty));
        }
    }
}
