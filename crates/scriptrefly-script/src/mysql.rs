//! MySQL statement shapes: UPDATE, INSERT, DELETE, SELECT

use crate::lexer::{
    find_keyword, find_keywords, find_top_level, matching_close, normalize_identifier, split_top_level,
    trim_statement, unqualified,
};
use crate::tokenizer::Tokenized;
use regex::Regex;
use std::sync::LazyLock;

/// Optionally backtick-quoted, optionally dot-qualified identifier
const IDENT: &str = r"`?[\w$]+`?(?:\s*\.\s*`?[\w$]+`?)*";

fn pattern(template: &str) -> Regex {
    Regex::new(&template.replace("IDENT", IDENT)).expect("static regex must compile")
}

static UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)^UPDATE\s+(?:(?:LOW_PRIORITY|IGNORE)\s+)*(IDENT)(?:\s+(?:AS\s+)?\w+)?\s+SET\s+(.*)$")
});

static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)^(?:INSERT|REPLACE)\s+(?:(?:LOW_PRIORITY|DELAYED|HIGH_PRIORITY|IGNORE)\s+)*INTO\s+(IDENT)(.*)$")
});

static DELETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)^DELETE\s+(?:(?:LOW_PRIORITY|QUICK|IGNORE)\s+)*FROM\s+(IDENT)(.*)$")
});

static SELECT_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^SELECT\s+(.*)$"));

static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)^\s*(IDENT)(.*)$"));

static COLUMN_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^(?:DISTINCT\s+)?(IDENT)(?:\s+(?:AS\s+)?`?\w+`?)?$"));

static COLUMN_REF_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^`?[A-Za-z_]\w*`?\s*\.\s*`?[A-Za-z_]\w*`?$"));

/// Arithmetic starting from a column (`age + 1`, `t.score * 2`)
static ARITHMETIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?s)^`?[A-Za-z_][\w$]*`?(?:\s*\.\s*`?[A-Za-z_][\w$]*`?)?\s*[-+*/%]\s*\S.*$")
});

static IS_NULL_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^(IDENT)\s+IS\s+(?:NOT\s+)?NULL$"));

static BETWEEN_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?is)^(IDENT)\s+(?:NOT\s+)?BETWEEN\s+(.+?)\s+AND\s+(.+)$"));

static IN_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^(IDENT)\s+(?:NOT\s+)?IN\s*\((.*)\)$"));

static LIKE_RE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^(IDENT)\s+(?:NOT\s+)?LIKE\s+(.+)$"));

static COMPARE_RE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?s)^(IDENT)\s*(?:<=>|<=|>=|<>|!=|=|<|>)\s*(.+)$"));

/// Keywords ending a WHERE clause
const CLAUSE_END: [&str; 5] = ["GROUP", "ORDER", "LIMIT", "HAVING", "UNION"];

pub(crate) fn tokenize(line: &str) -> Tokenized {
    let statement = trim_statement(line);

    if let Some(caps) = UPDATE_RE.captures(statement) {
        let mut tokenized = Tokenized::for_target(normalize_identifier(&caps[1]));
        let body = caps.get(2).map_or("", |m| m.as_str());
        let (set_clause, where_clause) = split_where(body);
        parse_set_list(&mut tokenized, set_clause);
        if let Some(clause) = where_clause {
            parse_where(&mut tokenized, clause);
        }
        return tokenized;
    }

    if let Some(caps) = INSERT_RE.captures(statement) {
        let mut tokenized = Tokenized::for_target(normalize_identifier(&caps[1]));
        parse_insert_body(&mut tokenized, caps.get(2).map_or("", |m| m.as_str()));
        return tokenized;
    }

    if let Some(caps) = DELETE_RE.captures(statement) {
        let mut tokenized = Tokenized::for_target(normalize_identifier(&caps[1]));
        if let (_, Some(clause)) = split_where(caps.get(2).map_or("", |m| m.as_str())) {
            parse_where(&mut tokenized, clause);
        }
        return tokenized;
    }

    if let Some(caps) = SELECT_RE.captures(statement) {
        return tokenize_select(caps.get(1).map_or("", |m| m.as_str()));
    }

    Tokenized::default()
}

fn tokenize_select(body: &str) -> Tokenized {
    let Some(from_at) = find_keyword(body, "FROM") else {
        return Tokenized::default();
    };
    let projection = &body[..from_at];
    let Some(table) = TABLE_RE.captures(&body[from_at + "FROM".len()..]) else {
        return Tokenized::default();
    };

    let mut tokenized = Tokenized::for_target(normalize_identifier(&table[1]));

    for column in split_top_level(projection, ',') {
        if let Some(caps) = COLUMN_RE.captures(column) {
            tokenized.touch(&field_name(&caps[1]));
        }
    }

    if let (_, Some(clause)) = split_where(table.get(2).map_or("", |m| m.as_str())) {
        parse_where(&mut tokenized, clause);
    }

    tokenized
}

/// Split `body` at a top-level WHERE; the WHERE clause is cut before any
/// GROUP BY / ORDER BY / LIMIT tail
fn split_where(body: &str) -> (&str, Option<&str>) {
    let Some(at) = find_keyword(body, "WHERE") else {
        return (body, None);
    };

    let clause = &body[at + "WHERE".len()..];
    let end = CLAUSE_END
        .iter()
        .filter_map(|keyword| find_keyword(clause, keyword))
        .min()
        .unwrap_or(clause.len());

    (&body[..at], Some(clause[..end].trim()))
}

fn parse_set_list(tokenized: &mut Tokenized, list: &str) {
    for item in split_top_level(list, ',') {
        let Some(eq) = find_top_level(item, '=') else {
            continue;
        };
        record_value(tokenized, &field_name(&item[..eq]), &item[eq + 1..]);
    }
}

fn parse_insert_body(tokenized: &mut Tokenized, body: &str) {
    let body = body.trim_start();

    if body.starts_with('(') {
        let Some(close) = matching_close(body, 0) else {
            return;
        };
        let columns: Vec<String> = split_top_level(&body[1..close], ',')
            .into_iter()
            .map(field_name)
            .collect();
        for column in &columns {
            tokenized.touch(column);
        }

        let rest = &body[close + 1..];
        let values_at = find_keyword(rest, "VALUES")
            .map(|at| at + "VALUES".len())
            .or_else(|| find_keyword(rest, "VALUE").map(|at| at + "VALUE".len()));
        let Some(values_at) = values_at else {
            return;
        };

        for row in split_top_level(&rest[values_at..], ',') {
            let Some(inner) = row.strip_prefix('(').and_then(|r| r.strip_suffix(')')) else {
                continue;
            };
            for (column, value) in columns.iter().zip(split_top_level(inner, ',')) {
                record_value(tokenized, column, value);
            }
        }
    } else if let Some(at) = find_keyword(body, "SET") {
        parse_set_list(tokenized, &body[at + "SET".len()..]);
    }
}

fn parse_where(tokenized: &mut Tokenized, clause: &str) {
    for condition in split_conditions(clause) {
        parse_condition(tokenized, condition);
    }
}

/// Split on top-level AND/OR, keeping `BETWEEN x AND y` together
fn split_conditions(clause: &str) -> Vec<&str> {
    let mut cuts: Vec<(usize, usize)> = find_keywords(clause, "AND")
        .into_iter()
        .map(|at| (at, "AND".len()))
        .chain(find_keywords(clause, "OR").into_iter().map(|at| (at, "OR".len())))
        .collect();
    cuts.sort_unstable();

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut between_bound = false;

    for (at, len) in cuts {
        let segment = &clause[start..at];
        if len == "AND".len() && !between_bound && find_keyword(segment, "BETWEEN").is_some() {
            between_bound = true;
            continue;
        }
        pieces.push(segment.trim());
        start = at + len;
        between_bound = false;
    }
    pieces.push(clause[start..].trim());

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn parse_condition(tokenized: &mut Tokenized, condition: &str) {
    let mut condition = condition.trim();
    while let Some(rest) = strip_not(condition) {
        condition = rest;
    }

    if condition.starts_with('(') && matching_close(condition, 0) == Some(condition.len() - 1) {
        parse_where(tokenized, &condition[1..condition.len() - 1]);
        return;
    }

    if let Some(caps) = IS_NULL_RE.captures(condition) {
        tokenized.touch(&field_name(&caps[1]));
    } else if let Some(caps) = BETWEEN_RE.captures(condition) {
        let field = field_name(&caps[1]);
        record_value(tokenized, &field, &caps[2]);
        record_value(tokenized, &field, &caps[3]);
    } else if let Some(caps) = IN_RE.captures(condition) {
        let field = field_name(&caps[1]);
        tokenized.touch(&field);
        let list = &caps[2];
        if find_keyword(list, "SELECT").is_none() {
            for value in split_top_level(list, ',') {
                record_value(tokenized, &field, value);
            }
        }
    } else if let Some(caps) = LIKE_RE.captures(condition) {
        record_value(tokenized, &field_name(&caps[1]), &caps[2]);
    } else if let Some(caps) = COMPARE_RE.captures(condition) {
        record_value(tokenized, &field_name(&caps[1]), &caps[2]);
    }
}

/// Record a value written to or compared with `field`. Qualified column
/// references and arithmetic on a column only touch the field.
fn record_value(tokenized: &mut Tokenized, field: &str, value: &str) {
    let value = value.trim();
    if COLUMN_REF_RE.is_match(value) || ARITHMETIC_RE.is_match(value) {
        tokenized.touch(field);
    } else {
        tokenized.assign(field, value);
    }
}

fn strip_not(condition: &str) -> Option<&str> {
    let head = condition.get(..4)?;
    if head.eq_ignore_ascii_case("NOT ") {
        Some(condition[4..].trim_start())
    } else {
        None
    }
}

/// Column name without quotes or table qualifier
fn field_name(raw: &str) -> String {
    let compact: String = raw.split_whitespace().collect();
    unqualified(&normalize_identifier(&compact)).to_string()
}
