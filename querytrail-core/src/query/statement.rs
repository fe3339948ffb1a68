use serde::Serialize;
use std::fmt;

/// Coarse SQL verb of a query, derived once from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    pub const ALL: [StatementKind; 5] = [
        StatementKind::Select,
        StatementKind::Insert,
        StatementKind::Update,
        StatementKind::Delete,
        StatementKind::Other,
    ];

    /// Classify a query by its leading keyword.
    ///
    /// Leading whitespace, `--` line comments, `/* */` block comments and opening
    /// parentheses are skipped before the first word is compared case-insensitively.
    pub fn classify(query: &str) -> Self {
        let word = first_word(query);

        if word.eq_ignore_ascii_case("select") {
            StatementKind::Select
        } else if word.eq_ignore_ascii_case("insert") {
            StatementKind::Insert
        } else if word.eq_ignore_ascii_case("update") {
            StatementKind::Update
        } else if word.eq_ignore_ascii_case("delete") {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Other => "other",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn first_word(query: &str) -> &str {
    let mut rest = query;

    loop {
        rest = rest.trim_start();

        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(comment) = rest.strip_prefix("/*") {
            // Unterminated block comment swallows the whole query.
            rest = comment.split_once("*/").map_or("", |(_, tail)| tail);
        } else if let Some(tail) = rest.strip_prefix('(') {
            rest = tail;
        } else {
            break;
        }
    }

    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}
