//! Quote and bracket balance checks on a whole line

use scriptrefly_script::lexer::{is_closer, is_opener, scan};

/// A delimiter kind that can be left unbalanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delimiter {
    SingleQuote,
    DoubleQuote,
    Backtick,
    Parenthesis,
    Bracket,
    Brace,
}

impl Delimiter {
    fn from_char(ch: char) -> Option<Self> {
        let delimiter = match ch {
            '\'' => Self::SingleQuote,
            '"' => Self::DoubleQuote,
            '`' => Self::Backtick,
            '(' | ')' => Self::Parenthesis,
            '[' | ']' => Self::Bracket,
            '{' | '}' => Self::Brace,
            _ => return None,
        };
        Some(delimiter)
    }

    fn closer(&self) -> char {
        match self {
            Self::SingleQuote => '\'',
            Self::DoubleQuote => '"',
            Self::Backtick => '`',
            Self::Parenthesis => ')',
            Self::Bracket => ']',
            Self::Brace => '}',
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SingleQuote => "single quotes",
            Self::DoubleQuote => "double quotes",
            Self::Backtick => "backticks",
            Self::Parenthesis => "parentheses",
            Self::Bracket => "square brackets",
            Self::Brace => "braces",
        };
        write!(f, "unbalanced {}", name)
    }
}

/// Delimiters left unbalanced on `line`, each reported once, in the order
/// the problem was found
pub fn check_structure(line: &str) -> Vec<Delimiter> {
    let scanned = scan(line);
    let mut problems = Vec::new();
    let mut open: Vec<Delimiter> = Vec::new();

    for c in scanned.chars.iter().filter(|c| !c.quoted) {
        let Some(delimiter) = Delimiter::from_char(c.ch) else {
            continue;
        };

        if is_opener(c.ch) {
            open.push(delimiter);
        } else if is_closer(c.ch) {
            // Close back to the nearest matching opener; skipped openers are unbalanced
            match open.iter().rposition(|d| d.closer() == c.ch) {
                Some(at) => {
                    for skipped in open.drain(at..).skip(1) {
                        report(&mut problems, skipped);
                    }
                }
                None => report(&mut problems, delimiter),
            }
        }
    }

    if let Some(quote) = scanned.open_quote.and_then(Delimiter::from_char) {
        report(&mut problems, quote);
    }

    for delimiter in open {
        report(&mut problems, delimiter);
    }

    problems
}

fn report(problems: &mut Vec<Delimiter>, delimiter: Delimiter) {
    if !problems.contains(&delimiter) {
        problems.push(delimiter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn balanced_lines() {
        assert!(check_structure("UPDATE t SET a = '(x' WHERE b IN (1, 2);").is_empty());
        assert!(check_structure(r#"db.c.find({"a": [1, {"b": ")"}]})"#).is_empty());
        assert!(check_structure(r"SELECT 'it\'s'").is_empty());
    }

    #[test]
    fn unbalanced_lines() {
        assert_eq!(check_structure("SELECT (a FROM t"), vec![Delimiter::Parenthesis]);
        assert_eq!(check_structure("SELECT a) FROM t"), vec![Delimiter::Parenthesis]);
        assert_eq!(check_structure("UPDATE t SET a = 'x WHERE b = 1"), vec![Delimiter::SingleQuote]);
        assert_eq!(check_structure(r#"db.c.find({"a": [1})"#), vec![Delimiter::Bracket]);
        assert_eq!(check_structure("f(a]"), vec![Delimiter::Bracket, Delimiter::Parenthesis]);
    }

    #[test]
    fn messages() {
        assert_eq!(Delimiter::DoubleQuote.to_string(), "unbalanced double quotes");
        assert_eq!(Delimiter::Brace.to_string(), "unbalanced braces");
    }
}
