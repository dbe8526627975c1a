//! Quote- and bracket-aware scanning shared by the dialect tokenizers
//!
//! Quotes are `'`, `"` and `` ` ``; a backslash escapes the next character
//! inside a quote. Brackets are `()`, `[]` and `{}`.

/// One character of scanned input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanned {
    /// Byte offset in the input
    pub offset: usize,

    pub ch: char,

    /// Bracket nesting depth; an opener and its closer share a depth
    pub depth: usize,

    /// Inside a quoted literal (the delimiting quotes themselves included)
    pub quoted: bool,
}

impl Scanned {
    /// Outside every quote and bracket
    pub fn is_top_level(&self) -> bool {
        self.depth == 0 && !self.quoted
    }
}

/// Result of scanning a whole input
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub chars: Vec<Scanned>,

    /// Quote left open at end of input
    pub open_quote: Option<char>,
}

pub fn is_quote(ch: char) -> bool {
    matches!(ch, '\'' | '"' | '`')
}

pub fn is_opener(ch: char) -> bool {
    matches!(ch, '(' | '[' | '{')
}

pub fn is_closer(ch: char) -> bool {
    matches!(ch, ')' | ']' | '}')
}

/// Scan `input`, tracking quotes and bracket depth
pub fn scan(input: &str) -> Scan {
    let mut chars = Vec::with_capacity(input.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in input.char_indices() {
        if let Some(q) = quote {
            chars.push(Scanned { offset, ch, depth, quoted: true });
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        if is_quote(ch) {
            quote = Some(ch);
            chars.push(Scanned { offset, ch, depth, quoted: true });
        } else if is_opener(ch) {
            chars.push(Scanned { offset, ch, depth, quoted: false });
            depth += 1;
        } else if is_closer(ch) {
            depth = depth.saturating_sub(1);
            chars.push(Scanned { offset, ch, depth, quoted: false });
        } else {
            chars.push(Scanned { offset, ch, depth, quoted: false });
        }
    }

    Scan { chars, open_quote: quote }
}

/// Split on `separator` where it appears at top level; pieces are trimmed
/// and empty pieces dropped
pub fn split_top_level(input: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for c in scan(input).chars {
        if c.ch == separator && c.is_top_level() {
            pieces.push(&input[start..c.offset]);
            start = c.offset + c.ch.len_utf8();
        }
    }
    pieces.push(&input[start..]);

    pieces.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Byte offset of the first top-level `needle`
pub fn find_top_level(input: &str, needle: char) -> Option<usize> {
    scan(input)
        .chars
        .into_iter()
        .find(|c| c.ch == needle && c.is_top_level())
        .map(|c| c.offset)
}

/// Byte offset of the bracket closing the opener at `open_offset`
pub fn matching_close(input: &str, open_offset: usize) -> Option<usize> {
    let scanned = scan(input);
    let opener = scanned.chars.iter().find(|c| c.offset == open_offset)?;
    if opener.quoted || !is_opener(opener.ch) {
        return None;
    }

    scanned
        .chars
        .iter()
        .find(|c| c.offset > open_offset && !c.quoted && is_closer(c.ch) && c.depth == opener.depth)
        .map(|c| c.offset)
}

/// Byte offsets of every top-level, whole-word, case-insensitive `keyword`
pub fn find_keywords(input: &str, keyword: &str) -> Vec<usize> {
    let bytes = input.as_bytes();
    let len = keyword.len();

    scan(input)
        .chars
        .into_iter()
        .filter(|c| c.is_top_level())
        .map(|c| c.offset)
        .filter(|&at| {
            let Some(candidate) = input.get(at..at + len) else {
                return false;
            };
            let before_ok = at == 0 || !is_word_byte(bytes[at - 1]);
            let after_ok = bytes.get(at + len).map_or(true, |b| !is_word_byte(*b));
            before_ok && after_ok && candidate.eq_ignore_ascii_case(keyword)
        })
        .collect()
}

/// First offset of [`find_keywords`]
pub fn find_keyword(input: &str, keyword: &str) -> Option<usize> {
    find_keywords(input, keyword).into_iter().next()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Trim whitespace and cut the line at its first top-level `;`, `#` or
/// `-- ` comment
pub fn trim_statement(line: &str) -> &str {
    let trimmed = line.trim();
    let end = scan(trimmed)
        .chars
        .into_iter()
        .find(|c| c.is_top_level() && (c.ch == ';' || starts_comment(&trimmed[c.offset..])))
        .map_or(trimmed.len(), |c| c.offset);

    trimmed[..end].trim_end()
}

/// MySQL comment openers: `#`, and `--` followed by whitespace or end of line
fn starts_comment(rest: &str) -> bool {
    if rest.starts_with('#') {
        return true;
    }
    rest.strip_prefix("--")
        .is_some_and(|after| after.is_empty() || after.starts_with(char::is_whitespace))
}

/// Strip one pair of matching surrounding quotes
pub fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    let mut chars = raw.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && is_quote(first) && raw.len() >= 2 => &raw[1..raw.len() - 1],
        _ => raw,
    }
}

/// Normalize a possibly quoted, dot-qualified identifier
/// (`` `db`.`users` `` becomes `db.users`)
pub fn normalize_identifier(raw: &str) -> String {
    raw.split('.')
        .map(unquote)
        .collect::<Vec<_>>()
        .join(".")
}

/// Last dot segment of a normalized identifier
pub fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
