//! MongoDB shell shapes: `db.<collection>.<verb>(...)` and
//! `db.getCollection("<collection>").<verb>(...)`

use crate::lexer::{find_top_level, matching_close, split_top_level, trim_statement, unquote};
use crate::tokenizer::Tokenized;
use regex::Regex;
use std::sync::LazyLock;

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^db\s*\.\s*(?:getCollection\s*\(\s*(?:"([^"]+)"|'([^']+)')\s*\)|([\w$]+))\s*\.\s*(\w+)\s*\("#,
    )
    .expect("static regex must compile")
});

/// How a verb's arguments are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallShape {
    /// (query?, projection?)
    Find,
    /// (query)
    Query,
    /// (query?)
    Count,
    /// (query, update)
    Update,
    /// (query, replacement)
    Replace,
    /// (document)
    InsertOne,
    /// ([document, ...])
    InsertMany,
}

fn call_shape(verb: &str) -> Option<CallShape> {
    let shape = match verb {
        "find" | "findOne" => CallShape::Find,
        "deleteOne" | "deleteMany" | "remove" | "findOneAndDelete" => CallShape::Query,
        "countDocuments" => CallShape::Count,
        "update" | "updateOne" | "updateMany" | "findOneAndUpdate" => CallShape::Update,
        "replaceOne" => CallShape::Replace,
        "insertOne" => CallShape::InsertOne,
        "insertMany" => CallShape::InsertMany,
        _ => return None,
    };
    Some(shape)
}

/// Update operators whose scalar operands are type-checked
const ASSIGNING_OPERATORS: [&str; 2] = ["$set", "$inc"];

/// Query operators compared against a single value
const COMPARISON_OPERATORS: [&str; 6] = ["$eq", "$ne", "$gt", "$gte", "$lt", "$lte"];

/// Query operators compared against each element of an array
const MEMBERSHIP_OPERATORS: [&str; 2] = ["$in", "$nin"];

/// Logical operators holding an array of sub-queries
const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// A value as written in a shell document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Value<'a> {
    Object(&'a str),
    Array(&'a str),
    Scalar(&'a str),
}

impl<'a> Value<'a> {
    pub(crate) fn classify(raw: &'a str) -> Self {
        let raw = raw.trim();
        if enclosed(raw, '{', '}') {
            Value::Object(raw)
        } else if enclosed(raw, '[', ']') {
            Value::Array(&raw[1..raw.len() - 1])
        } else {
            Value::Scalar(raw)
        }
    }
}

fn enclosed(raw: &str, open: char, close: char) -> bool {
    raw.starts_with(open) && raw.ends_with(close) && matching_close(raw, 0) == Some(raw.len() - 1)
}

/// Key/value entries of an object literal; anything else has none
pub(crate) fn entries(document: &str) -> Vec<(String, &str)> {
    let document = document.trim();
    if !enclosed(document, '{', '}') {
        return Vec::new();
    }

    split_top_level(&document[1..document.len() - 1], ',')
        .into_iter()
        .filter_map(|entry| {
            let colon = find_top_level(entry, ':')?;
            let key = unquote(&entry[..colon]).to_string();
            (!key.is_empty()).then(|| (key, entry[colon + 1..].trim()))
        })
        .collect()
}

pub(crate) fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

fn is_regex_literal(raw: &str) -> bool {
    raw.len() > 1 && raw.starts_with('/')
}

/// One recognized collection method call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call<'a> {
    pub collection: &'a str,
    pub verb: &'a str,
    pub shape: CallShape,

    /// Top-level arguments, trimmed
    pub args: Vec<&'a str>,
}

impl<'a> Call<'a> {
    /// Argument at `index`, empty when absent
    pub fn arg(&self, index: usize) -> &'a str {
        self.args.get(index).copied().unwrap_or("")
    }
}

/// Parse a statement (already passed through `trim_statement`) as a
/// collection method call
pub(crate) fn parse_call(statement: &str) -> Option<Call<'_>> {
    let caps = CALL_RE.captures(statement)?;
    let verb = caps.get(4)?.as_str();
    let Some(shape) = call_shape(verb) else {
        tracing::debug!(verb, "unsupported collection method");
        return None;
    };

    let collection = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
    let open = caps.get(0).map_or(0, |m| m.end() - 1);
    let close = matching_close(statement, open)?;

    Some(Call {
        collection: collection.as_str(),
        verb,
        shape,
        args: split_top_level(&statement[open + 1..close], ','),
    })
}

pub(crate) fn tokenize(line: &str) -> Tokenized {
    let Some(call) = parse_call(trim_statement(line)) else {
        return Tokenized::default();
    };

    let mut tokenized = Tokenized::for_target(call.collection);
    let arg = |index: usize| call.arg(index);

    match call.shape {
        CallShape::Find => {
            parse_query(&mut tokenized, arg(0));
            for (field, _) in entries(arg(1)) {
                if !is_operator(&field) {
                    tokenized.touch(&field);
                }
            }
        }
        CallShape::Query | CallShape::Count => parse_query(&mut tokenized, arg(0)),
        CallShape::Update => {
            parse_query(&mut tokenized, arg(0));
            parse_update(&mut tokenized, arg(1));
        }
        CallShape::Replace => {
            parse_query(&mut tokenized, arg(0));
            parse_document(&mut tokenized, arg(1));
        }
        CallShape::InsertOne => parse_document(&mut tokenized, arg(0)),
        CallShape::InsertMany => {
            if let Value::Array(items) = Value::classify(arg(0)) {
                for item in split_top_level(items, ',') {
                    parse_document(&mut tokenized, item);
                }
            }
        }
    }

    tokenized
}

fn parse_query(tokenized: &mut Tokenized, query: &str) {
    for (key, value) in entries(query) {
        if LOGICAL_OPERATORS.contains(&key.as_str()) {
            if let Value::Array(items) = Value::classify(value) {
                for item in split_top_level(items, ',') {
                    parse_query(tokenized, item);
                }
            }
            continue;
        }

        // $where, $text, $expr and friends are left to the syntax rules
        if is_operator(&key) {
            continue;
        }

        match Value::classify(value) {
            Value::Scalar(raw) if is_regex_literal(raw) => tokenized.touch(&key),
            Value::Scalar(raw) => tokenized.assign(&key, raw),
            Value::Array(_) => tokenized.touch(&key),
            Value::Object(body) => parse_condition(tokenized, &key, body),
        }
    }
}

/// `{ $op: operand, ... }` on one field; a plain sub-document is opaque
fn parse_condition(tokenized: &mut Tokenized, field: &str, body: &str) {
    tokenized.touch(field);

    let operators = entries(body);
    if operators.is_empty() || !operators.iter().all(|(key, _)| is_operator(key)) {
        return;
    }

    for (operator, operand) in operators {
        if COMPARISON_OPERATORS.contains(&operator.as_str()) {
            if let Value::Scalar(raw) = Value::classify(operand) {
                tokenized.assign(field, raw);
            }
        } else if MEMBERSHIP_OPERATORS.contains(&operator.as_str()) {
            if let Value::Array(items) = Value::classify(operand) {
                for item in split_top_level(items, ',') {
                    if let Value::Scalar(raw) = Value::classify(item) {
                        tokenized.assign(field, raw);
                    }
                }
            }
        }
    }
}

fn parse_update(tokenized: &mut Tokenized, update: &str) {
    let operators = entries(update);

    // Legacy update() with a replacement document
    if !operators.iter().any(|(key, _)| is_operator(key)) {
        parse_document(tokenized, update);
        return;
    }

    for (operator, body) in operators {
        let assigning = ASSIGNING_OPERATORS.contains(&operator.as_str());
        for (field, value) in entries(body) {
            match Value::classify(value) {
                Value::Scalar(raw) if assigning => tokenized.assign(&field, raw),
                _ => tokenized.touch(&field),
            }
        }
    }
}

fn parse_document(tokenized: &mut Tokenized, document: &str) {
    for (field, value) in entries(document) {
        if is_operator(&field) {
            continue;
        }
        match Value::classify(value) {
            Value::Scalar(raw) => tokenized.assign(&field, raw),
            Value::Object(_) | Value::Array(_) => tokenized.touch(&field),
        }
    }
}
