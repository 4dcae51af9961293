//! SELECT-only validator for machine-generated SQL
//!
//! Checks run in a fixed order and stop at the first violation:
//! 1. placeholder tokens (`?`, `:name`, `$1`)
//! 2. forbidden keywords as whole words, case-insensitive
//! 3. stacked statements (any `;` besides one trailing)
//! 4. the statement must start with `SELECT`
//!
//! This is a keyword/pattern classifier, not a SQL parser. Comments and string
//! literals are not interpreted: a forbidden keyword or a `;` inside either is
//! still rejected, and a comment in front of `SELECT` fails check 4. The
//! session-level search path set by the executor is the second layer.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Statement keywords that are never allowed, anywhere in the text.
pub const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "DELETE", "UPDATE", "DROP", "ALTER", "INSERT", "TRUNCATE", "CREATE",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Generated SQL contains a placeholder: {0}")]
    PlaceholderDetected(String),

    #[error("Forbidden SQL operation detected: {0}")]
    ForbiddenOperation(String),

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("Only SELECT queries are allowed")]
    NotASelect,
}

impl ValidationError {
    /// Stable snake_case code for callers that map errors to responses
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::PlaceholderDetected(_) => "placeholder_detected",
            ValidationError::ForbiddenOperation(_) => "forbidden_operation",
            ValidationError::MultipleStatements => "multiple_statements",
            ValidationError::NotASelect => "not_a_select",
        }
    }
}

/// SQL text that has cleared every validator check.
///
/// The field is private and [`validate_sql`] is the only constructor, so
/// anything typed `ValidatedSql` has been through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql {
    text: String,
}

impl ValidatedSql {
    /// Executable text, without the optional trailing semicolon
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for ValidatedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for ValidatedSql {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // `::type` casts are not placeholders, hence the `[^:]` guard
        Regex::new(r"(\?)|(?:^|[^:])(:[A-Za-z_][A-Za-z0-9_]*)|(\$[0-9]+)")
            .expect("placeholder pattern is valid")
    })
}

fn keyword_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FORBIDDEN_KEYWORDS
            .iter()
            .map(|keyword| {
                let pattern = Regex::new(&format!(r"(?i)\b{}\b", keyword))
                    .expect("keyword pattern is valid");
                (*keyword, pattern)
            })
            .collect()
    })
}

fn find_placeholder(sql: &str) -> Option<String> {
    let captures = placeholder_pattern().captures(sql)?;
    (1..=3)
        .filter_map(|group| captures.get(group))
        .map(|m| m.as_str().to_string())
        .next()
}

fn find_forbidden_keyword(sql: &str) -> Option<&'static str> {
    keyword_patterns()
        .iter()
        .find(|(_, pattern)| pattern.is_match(sql))
        .map(|(keyword, _)| *keyword)
}

/// Run the four checks against generated SQL.
pub fn validate_sql(sql: &str) -> Result<ValidatedSql, ValidationError> {
    if let Some(token) = find_placeholder(sql) {
        return Err(ValidationError::PlaceholderDetected(token));
    }

    if let Some(keyword) = find_forbidden_keyword(sql) {
        return Err(ValidationError::ForbiddenOperation(keyword.to_string()));
    }

    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        return Err(ValidationError::MultipleStatements);
    }

    let body = body.trim();
    if !body.to_uppercase().starts_with("SELECT") {
        return Err(ValidationError::NotASelect);
    }

    Ok(ValidatedSql {
        text: body.to_string(),
    })
}
