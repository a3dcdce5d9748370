//! Content-format sniffing for tool-result text.
//!
//! Tool output arrives as untyped text; display picks a treatment by
//! sniffing. The cascade below is a fixed priority order, not content
//! negotiation: input valid as several formats always resolves to the
//! earliest matching rule. Changing the order is a behavior change.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Detected format of a tool-result text part.
#[derive(Debug, Clone, PartialEq)]
pub enum SniffedFormat {
    /// Parsed as structured data; carries the parsed value for pretty-printing.
    Json(Value),
    Sql,
    Html,
    Markdown,
    Plain,
}

static SQL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(select|insert|update|delete|create|alter|drop|with|explain|show|describe)\b")
        .expect("valid sql regex")
});

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?[a-z][a-z0-9-]*(\s[^>]*)?/?>").expect("valid html regex")
});

static MARKDOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6}\s|\s*[-*+]\s|>\s|```)|\[[^\]]+\]\([^)]+\)")
        .expect("valid markdown regex")
});

/// Sniffs the format of `text` by the fixed cascade:
/// JSON parse, SQL keyword, HTML tag, markdown marker, plain text.
pub fn sniff(text: &str) -> SniffedFormat {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return SniffedFormat::Plain;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && matches!(value, Value::Object(_) | Value::Array(_))
    {
        return SniffedFormat::Json(value);
    }
    if SQL_RE.is_match(trimmed) {
        return SniffedFormat::Sql;
    }
    if HTML_TAG_RE.is_match(trimmed) {
        return SniffedFormat::Html;
    }
    if MARKDOWN_RE.is_match(trimmed) {
        return SniffedFormat::Markdown;
    }
    SniffedFormat::Plain
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn detects_json_objects_and_arrays() {
        assert_eq!(
            sniff(r#"{"rows": 3}"#),
            SniffedFormat::Json(json!({"rows": 3}))
        );
        assert_eq!(sniff("[1,2,3]"), SniffedFormat::Json(json!([1, 2, 3])));
    }

    #[test]
    fn bare_scalars_are_not_json() {
        // "42" and "true" parse as JSON but display better as plain text.
        assert_eq!(sniff("42"), SniffedFormat::Plain);
        assert_eq!(sniff("true"), SniffedFormat::Plain);
    }

    #[test]
    fn detects_sql_keywords_case_insensitively() {
        assert_eq!(sniff("SELECT * FROM users"), SniffedFormat::Sql);
        assert_eq!(sniff("  with t as (select 1) select * from t"), SniffedFormat::Sql);
        assert_eq!(sniff("explain select 1"), SniffedFormat::Sql);
    }

    #[test]
    fn detects_html_tags() {
        assert_eq!(sniff("here is <table><tr></tr></table>"), SniffedFormat::Html);
        assert_eq!(sniff("<br/>"), SniffedFormat::Html);
    }

    #[test]
    fn detects_markdown_markers() {
        assert_eq!(sniff("# Heading\nbody"), SniffedFormat::Markdown);
        assert_eq!(sniff("- item one\n- item two"), SniffedFormat::Markdown);
        assert_eq!(sniff("see [docs](https://example.com)"), SniffedFormat::Markdown);
        assert_eq!(sniff("> quoted"), SniffedFormat::Markdown);
    }

    #[test]
    fn falls_back_to_plain() {
        assert_eq!(sniff("just some words"), SniffedFormat::Plain);
        assert_eq!(sniff("   "), SniffedFormat::Plain);
    }

    /// Sniffer priority law: valid JSON wins even when the same input also
    /// matches markdown (or SQL) patterns.
    #[test]
    fn json_wins_over_markdown_and_sql() {
        let ambiguous = "{\"note\": \"# looks like a heading\"}";
        assert!(matches!(sniff(ambiguous), SniffedFormat::Json(_)));

        let sqlish_json = r#"{"query": "select * from t"}"#;
        assert!(matches!(sniff(sqlish_json), SniffedFormat::Json(_)));
    }

    #[test]
    fn sql_wins_over_markdown() {
        // A SQL statement containing a markdown-looking list marker.
        assert_eq!(sniff("select '- item' as bullet"), SniffedFormat::Sql);
    }

    #[test]
    fn html_wins_over_markdown() {
        assert_eq!(sniff("<b>bold</b> and [link](x)"), SniffedFormat::Html);
    }
}
