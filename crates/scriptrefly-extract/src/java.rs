//! Field extraction from Java class sources
//!
//! Best-effort pattern scan, not a Java parser. Malformed input degrades to
//! an empty extraction; nothing here returns an error.

use crate::type_mapper::map_type;
use regex::Regex;
use scriptrefly_core::{push_unique, FieldDescriptor};
use std::sync::LazyLock;

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bclass\s+(\w+)(?:\s*<[^{]*?>)?(?:\s+extends\s+([\w.]+))?")
        .expect("static regex must compile")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:public|protected|private)\s+((?:(?:static|final|transient|volatile)\s+)*)([\w.]+(?:\s*<[^;=(){}]*>)?(?:\s*\[\s*\])*)\s+(\w+)\s*(?:=[^;]*)?;",
    )
    .expect("static regex must compile")
});

/// Identifiers never reported as fields
const RESERVED_NAMES: [&str; 1] = ["class"];

/// Result of scanning one class source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassExtraction {
    /// Declared class name
    pub class_name: Option<String>,

    /// Instance fields in declaration order, unique by name
    pub fields: Vec<FieldDescriptor>,

    /// Simple name of the `extends` target
    pub parent_name: Option<String>,
}

impl ClassExtraction {
    /// True when no class declaration was recognized
    pub fn is_unrecognized(&self) -> bool {
        self.class_name.is_none()
    }
}

/// Extract the fields and parent class of a Java class source
pub fn extract_fields(source: &str) -> ClassExtraction {
    let code = strip_comments(source);

    let Some(class) = CLASS_RE.captures(&code) else {
        tracing::debug!("no class declaration found");
        return ClassExtraction::default();
    };

    let class_name = class[1].to_string();
    let parent_name = class.get(2).map(|m| simple_name(m.as_str()).to_string());

    let mut fields = Vec::new();
    for caps in FIELD_RE.captures_iter(&code) {
        if caps[1].split_whitespace().any(|modifier| modifier == "static") {
            continue;
        }

        let name = &caps[3];
        if RESERVED_NAMES.contains(&name) {
            continue;
        }

        let added = push_unique(&mut fields, FieldDescriptor::new(name, map_type(&caps[2])));
        if !added {
            tracing::debug!(field = name, "dropping duplicate field declaration");
        }
    }

    tracing::debug!(class_name = %class_name, fields = fields.len(), parent = ?parent_name, "extracted class fields");

    ClassExtraction {
        class_name: Some(class_name),
        fields,
        parent_name,
    }
}

/// Check whether `source` declares a class named `class_name`
pub fn declares_class(source: &str, class_name: &str) -> bool {
    let code = strip_comments(source);
    CLASS_RE
        .captures_iter(&code)
        .any(|caps| &caps[1] == class_name)
}

fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

/// Replace `//` and `/* */` comments with whitespace, leaving string and
/// char literals alone. Newlines are kept so line structure survives.
fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Code,
        Line,
        Block,
        Literal(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::Line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push(' ');
                    state = State::Block;
                }
                '"' | '\'' => {
                    out.push(c);
                    state = State::Literal(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                }
            }
            State::Literal(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote || c == '\n' {
                    state = State::Code;
                }
            }
        }
    }

    out
}
