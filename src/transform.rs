use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Attributes parsed from leading `-- Name: value` comment lines.
pub type QueryAttributes = IndexMap<String, String>;

static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*--[ \t]+(\w+):([^\r\n]+)[\r\n]*").expect("static regex"));

// Leading `--` comment lines (attribute lines included) belong to the
// preserved head of the statement.
static SELECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^((?:\s*--[^\r\n]*[\r\n]+)*\s*SELECT)\b(.*)$").expect("static regex")
});

/// Extracts query attributes: each leading comment line of the form
/// `-- Name: value` becomes one entry, in order.
///
/// # Examples
///
/// ```rust
/// use sqlx_placeholders::transform::extract_attributes;
///
/// let attrs = extract_attributes("-- CACHE: 60\n-- LABEL: users\nSELECT 1");
/// assert_eq!(attrs.get("CACHE").map(String::as_str), Some("60"));
/// assert_eq!(attrs.get("LABEL").map(String::as_str), Some("users"));
/// ```
pub fn extract_attributes(sql: &str) -> QueryAttributes {
    let mut attrs = IndexMap::new();
    let mut rest = sql;
    while let Some(caps) = ATTR_RE.captures(rest) {
        let end = caps.get(0).map_or(0, |m| m.end());
        attrs.insert(caps[1].to_owned(), caps[2].trim().to_owned());
        rest = &rest[end..];
    }
    attrs
}

/// Rewrites a SELECT so MySQL tracks the unlimited row count
/// (`SQL_CALC_FOUND_ROWS`). Requesting a total for anything that is not a
/// SELECT is a misuse of the rewrite contract and fails hard.
pub fn calc_total(sql: &str) -> Result<String> {
    match SELECT_RE.captures(sql) {
        Some(caps) => Ok(format!("{} SQL_CALC_FOUND_ROWS{}", &caps[1], &caps[2])),
        None => Err(Error::UnsupportedTransform {
            kind: "CALC_TOTAL",
            sql: sql.to_owned(),
        }),
    }
}

/// The follow-up statement that reads the total tracked by [`calc_total`].
pub fn get_total() -> &'static str {
    "SELECT FOUND_ROWS()"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_attributes() {
        let attrs = extract_attributes("-- CACHE: 60s\n-- NAME: top users\nSELECT 1");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["CACHE"], "60s");
        assert_eq!(attrs["NAME"], "top users");
    }

    #[test]
    fn test_extract_attributes_stops_at_sql() {
        let attrs = extract_attributes("SELECT 1 -- CACHE: 60");
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_extract_attributes_requires_colon_form() {
        // A plain comment line is not an attribute.
        let attrs = extract_attributes("-- just a note\nSELECT 1");
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_calc_total_injects_modifier() {
        assert_eq!(
            calc_total("SELECT * FROM t LIMIT 10").unwrap(),
            "SELECT SQL_CALC_FOUND_ROWS * FROM t LIMIT 10"
        );
        assert_eq!(
            calc_total("  select id FROM t").unwrap(),
            "  select SQL_CALC_FOUND_ROWS id FROM t"
        );
    }

    #[test]
    fn test_calc_total_skips_leading_comment_lines() {
        assert_eq!(
            calc_total("-- CACHE: 60\nSELECT * FROM t LIMIT 10").unwrap(),
            "-- CACHE: 60\nSELECT SQL_CALC_FOUND_ROWS * FROM t LIMIT 10"
        );
        assert_eq!(
            calc_total("-- A: 1\n-- just a note\n  SELECT id FROM t").unwrap(),
            "-- A: 1\n-- just a note\n  SELECT SQL_CALC_FOUND_ROWS id FROM t"
        );
    }

    #[test]
    fn test_calc_total_rejects_non_select() {
        let err = calc_total("UPDATE t SET a = 1").unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransform { kind, .. } if kind == "CALC_TOTAL"));
    }
}
