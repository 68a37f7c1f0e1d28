//! Dialect trait and shared escaping helpers.

/// ClickHouse keywords that force identifier quoting even for simple names.
const QUOTED_KEYWORDS: &[&str] = &[
    "select", "from", "where", "group", "order", "by", "having", "limit", "offset", "join",
    "left", "right", "inner", "full", "cross", "on", "using", "and", "or", "not", "union",
    "intersect", "except", "distinct", "as", "in", "like", "settings", "sample", "window",
    "case", "when", "then", "else", "end", "table", "with",
];

fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !QUOTED_KEYWORDS.contains(&name.to_lowercase().as_str())
}

/// Backquote an identifier, escaping backslashes and backquotes.
pub fn backquote(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{}`", escaped)
}

/// Quote an identifier only when required.
pub fn escape_identifier(name: &str) -> String {
    if is_simple_identifier(name) {
        name.to_string()
    } else {
        backquote(name)
    }
}

/// Single-quote a string literal, escaping backslashes and quotes.
pub fn escape_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Dialect-specific text emission.
pub trait SqlGenerator {
    fn dialect_name(&self) -> &'static str;

    /// Whether constants become named placeholders with a parameter
    /// side-table instead of inline literals.
    fn parameterized(&self) -> bool;

    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }

    fn string_literal(&self, value: &str) -> String {
        escape_string(value)
    }

    /// Whether a trailing SETTINGS clause is emitted.
    fn supports_settings(&self) -> bool;

    /// Render property access into a JSON field.
    fn property_access(&self, base: String, keys: &[String]) -> String;

    /// Render a regex match / non-match comparison.
    fn regex_match(&self, left: String, right: String, negated: bool) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("events"), "events");
        assert_eq!(escape_identifier("some field"), "`some field`");
        assert_eq!(escape_identifier("group"), "`group`");
        assert_eq!(escape_identifier("a`b"), "`a\\`b`");
        assert_eq!(escape_identifier("1abc"), "`1abc`");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("test"), "'test'");
        assert_eq!(escape_string("it's"), "'it\\'s'");
        assert_eq!(escape_string("a\\b"), "'a\\\\b'");
    }
}
