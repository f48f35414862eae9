/// Driver-supplied escaping rules.
///
/// The expansion engine never quotes anything itself; every scalar and
/// identifier it inlines goes through this trait, and the regions of a
/// template the scanner must copy verbatim (string literals, quoted
/// identifiers, block comments) are described by [`Escaper::ignored_region`]
/// since their grammar is driver-specific too.
pub trait Escaper {
    /// Escapes the string form of a scalar for inclusion in query text,
    /// including the surrounding quotes.
    fn escape_scalar(&self, raw: &str) -> String;

    /// Escapes an identifier. Dotted multi-part names (`db.table`) are
    /// escaped part by part and rejoined with `.`.
    fn escape_ident(&self, name: &str) -> String;

    /// If `rest` starts with a literal or comment that must be copied
    /// verbatim, returns its byte length. `--` line comments are handled by
    /// the scanner itself and need not be matched here.
    fn ignored_region(&self, rest: &str) -> Option<usize>;
}

/// MySQL escaping: single-quoted strings with backslash escapes, backtick
/// identifiers with doubling.
///
/// # Examples
///
/// ```rust
/// use sqlx_placeholders::{Escaper, MysqlEscaper};
///
/// assert_eq!(MysqlEscaper.escape_scalar("O'Brien"), r"'O\'Brien'");
/// assert_eq!(MysqlEscaper.escape_ident("db.users"), "`db`.`users`");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlEscaper;

impl Escaper for MysqlEscaper {
    fn escape_scalar(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len() + 2);
        out.push('\'');
        for ch in raw.chars() {
            match ch {
                '\\' => out.push_str(r"\\"),
                '\'' => out.push_str(r"\'"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str(r"\n"),
                '\r' => out.push_str(r"\r"),
                '\0' => out.push_str(r"\0"),
                '\x1a' => out.push_str(r"\Z"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
        out
    }

    fn escape_ident(&self, name: &str) -> String {
        name.split('.')
            .map(|part| format!("`{}`", part.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn ignored_region(&self, rest: &str) -> Option<usize> {
        let bytes = rest.as_bytes();
        match bytes.first()? {
            b'\'' | b'"' => Some(quoted_len(bytes)),
            b'`' => Some(backtick_len(bytes)),
            b'/' if bytes.get(1) == Some(&b'*') => Some(block_comment_len(bytes)),
            _ => None,
        }
    }
}

/// Length of a `'...'` or `"..."` literal with backslash escapes.
/// An unterminated literal swallows the rest of the input.
fn quoted_len(bytes: &[u8]) -> usize {
    let quote = bytes[0];
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Length of a backtick identifier; `` `` `` inside doubles the backtick.
fn backtick_len(bytes: &[u8]) -> usize {
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            if bytes.get(i + 1) == Some(&b'`') {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

fn block_comment_len(bytes: &[u8]) -> usize {
    let mut i = 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_scalar_special_chars() {
        assert_eq!(MysqlEscaper.escape_scalar("plain"), "'plain'");
        assert_eq!(MysqlEscaper.escape_scalar("a'b"), r"'a\'b'");
        assert_eq!(MysqlEscaper.escape_scalar("a\\b"), r"'a\\b'");
        assert_eq!(MysqlEscaper.escape_scalar("a\nb"), r"'a\nb'");
    }

    #[test]
    fn test_escape_ident_dotted() {
        assert_eq!(MysqlEscaper.escape_ident("users"), "`users`");
        assert_eq!(MysqlEscaper.escape_ident("db.users"), "`db`.`users`");
        assert_eq!(MysqlEscaper.escape_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_ignored_region_quoted() {
        assert_eq!(MysqlEscaper.ignored_region("'a?b' rest"), Some(5));
        assert_eq!(MysqlEscaper.ignored_region(r"'a\'?' x"), Some(6));
        assert_eq!(MysqlEscaper.ignored_region("\"x?\" y"), Some(4));
        assert_eq!(MysqlEscaper.ignored_region("`c``d?` z"), Some(7));
        assert_eq!(MysqlEscaper.ignored_region("/* ? */ q"), Some(7));
        assert_eq!(MysqlEscaper.ignored_region("plain"), None);
    }

    #[test]
    fn test_ignored_region_unterminated() {
        assert_eq!(MysqlEscaper.ignored_region("'open"), Some(5));
        assert_eq!(MysqlEscaper.ignored_region("/* open"), Some(7));
    }
}
