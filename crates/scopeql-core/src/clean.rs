//! Cleanup of raw model output before validation

use regex::Regex;
use std::sync::OnceLock;

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)```sql|```").expect("fence pattern is valid"))
}

fn escape_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\([_*])").expect("escape pattern is valid"))
}

/// Remove markdown code fences and markdown-style escapes (`\_`, `\*`), then trim.
///
/// Text without fences or escapes comes back only trimmed.
pub fn clean_sql(raw: &str) -> String {
    let without_fences = fence_pattern().replace_all(raw, "");
    escape_pattern()
        .replace_all(&without_fences, "$1")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_sql_fence() {
        let raw = "```sql\nSELECT name FROM acme.customer\n```";
        assert_eq!(clean_sql(raw), "SELECT name FROM acme.customer");
    }

    #[test]
    fn test_removes_uppercase_and_bare_fences() {
        assert_eq!(clean_sql("```SQL\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_unescapes_markdown_escapes() {
        assert_eq!(
            clean_sql(r"SELECT \* FROM acme.shop\_order WHERE customer\_id = 4"),
            "SELECT * FROM acme.shop_order WHERE customer_id = 4"
        );
    }

    #[test]
    fn test_plain_sql_unchanged() {
        let sql = "SELECT email FROM acme.customer";
        assert_eq!(clean_sql(sql), sql);
        assert_eq!(clean_sql(""), "");
    }
}
