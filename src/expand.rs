use crate::cache::{expansion_key, ExpandCache};
use crate::escape::Escaper;
use crate::value::Value;

/// Inline marker emitted when a value-consuming placeholder finds no
/// remaining argument.
pub const MARKER_NO_VALUE: &str = "SQLPH_ERROR_NO_VALUE";
/// Inline marker emitted when a default-typed placeholder receives a
/// non-scalar value.
pub const MARKER_VALUE_NOT_SCALAR: &str = "SQLPH_ERROR_VALUE_NOT_SCALAR";
/// Inline marker emitted when `?a` receives a non-collection value.
pub const MARKER_VALUE_NOT_ARRAY: &str = "SQLPH_ERROR_VALUE_NOT_ARRAY";
/// Inline marker emitted when a `?#` collection entry is not a string.
pub const MARKER_ARRAY_VALUE_NOT_STRING: &str = "SQLPH_ERROR_ARRAY_VALUE_NOT_STRING";

/// What went wrong at a single placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("no argument left for placeholder")]
    NoValue,
    #[error("value is not a scalar")]
    ValueNotScalar,
    #[error("value is not a sequence or mapping")]
    ValueNotArray,
    #[error("collection entry is not a string")]
    ArrayValueNotString,
}

impl DiagnosticKind {
    /// The marker text substituted into the expanded SQL for this kind.
    pub fn marker(self) -> &'static str {
        match self {
            DiagnosticKind::NoValue => MARKER_NO_VALUE,
            DiagnosticKind::ValueNotScalar => MARKER_VALUE_NOT_SCALAR,
            DiagnosticKind::ValueNotArray => MARKER_VALUE_NOT_ARRAY,
            DiagnosticKind::ArrayValueNotString => MARKER_ARRAY_VALUE_NOT_STRING,
        }
    }
}

/// A placeholder-level problem found during expansion.
///
/// Expansion never aborts for these; the marker text lands in the output so
/// the condition stays visible in logs and executed text, and the structured
/// record lets callers fail fast instead when they prefer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} ({token} at byte {offset})")]
pub struct Diagnostic {
    /// Placeholder token as written, e.g. `?a`.
    pub token: String,
    /// Byte offset of the token in the original template.
    pub offset: usize,
    /// Zero-based ordinal among value-consuming placeholders.
    pub index: usize,
    pub kind: DiagnosticKind,
}

/// Outcome of one expansion: the final SQL text plus any placeholder
/// diagnostics collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub sql: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl Expansion {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Strict view: the SQL when expansion was clean, otherwise the first
    /// diagnostic as an [`Error`](crate::Error).
    pub fn ok(self) -> crate::Result<String> {
        match self.diagnostics.into_iter().next() {
            None => Ok(self.sql),
            Some(diag) => Err(diag.into()),
        }
    }
}

/// Parser state threaded through the recursive scan. Each optional block
/// saves and restores `skip_hit` around its interior, so collapse decisions
/// never leak between sibling or nested blocks.
struct State<'v> {
    args: &'v [Value],
    next: usize,
    consumed: usize,
    skip_hit: bool,
    diagnostics: Vec<Diagnostic>,
}

impl State<'_> {
    fn diag(&mut self, kind: DiagnosticKind, token: &str, offset: usize, out: &mut String) {
        let index = match kind {
            // The argument queue was already empty, so nothing was consumed.
            DiagnosticKind::NoValue => self.consumed,
            _ => self.consumed.saturating_sub(1),
        };
        self.diagnostics.push(Diagnostic {
            token: token.to_owned(),
            offset,
            index,
            kind,
        });
        out.push_str(kind.marker());
    }
}

/// The placeholder expansion engine.
///
/// Parses a template left to right and substitutes each `?`-token with the
/// next unconsumed argument, escaped through the driver-supplied
/// [`Escaper`]. Optional `{...}` blocks vanish when a placeholder inside
/// them resolves from [`Value::Skip`]; string literals and comments are
/// copied verbatim.
///
/// # Examples
///
/// ```rust
/// use sqlx_placeholders::{Expander, MysqlEscaper, Value};
///
/// let expander = Expander::new(&MysqlEscaper);
/// let exp = expander.expand(
///     "SELECT * FROM users WHERE name = ? { AND age > ?d }",
///     &[Value::from("O'Brien"), Value::Skip],
/// );
/// assert_eq!(exp.sql, r"SELECT * FROM users WHERE name = 'O\'Brien' ");
/// ```
pub struct Expander<'a> {
    escaper: &'a dyn Escaper,
    ident_prefix: &'a str,
}

impl<'a> Expander<'a> {
    pub fn new(escaper: &'a dyn Escaper) -> Self {
        Self {
            escaper,
            ident_prefix: "",
        }
    }

    /// Sets the identifier prefix emitted for `?_`.
    pub fn with_ident_prefix(mut self, prefix: &'a str) -> Self {
        self.ident_prefix = prefix;
        self
    }

    /// Expands `template` against `args`.
    pub fn expand(&self, template: &str, args: &[Value]) -> Expansion {
        let mut state = State {
            args,
            next: 0,
            consumed: 0,
            skip_hit: false,
            diagnostics: Vec::new(),
        };
        let sql = self.expand_region(template, 0, &mut state);
        Expansion {
            sql,
            diagnostics: state.diagnostics,
        }
    }

    /// Like [`expand`](Self::expand), but memoized through `cache`.
    /// Identical (template, arguments, prefix) triples return the cached
    /// expansion byte for byte.
    pub fn expand_cached(&self, template: &str, args: &[Value], cache: &ExpandCache) -> Expansion {
        let key = expansion_key(template, args, self.ident_prefix);
        if let Some(hit) = cache.get(&key) {
            tracing::trace!(template, "placeholder cache hit");
            return hit;
        }
        let expansion = self.expand(template, args);
        cache.insert(key, expansion.clone());
        expansion
    }

    /// Recursive scan over one region of the template. `base` is the byte
    /// offset of `input` within the original template, kept for
    /// diagnostics.
    fn expand_region(&self, input: &str, base: usize, state: &mut State<'_>) -> String {
        let mut out = String::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            let rest = &input[i..];
            // Ignored regions take priority over blocks and placeholders.
            if rest.starts_with("--") {
                let len = line_comment_len(rest);
                out.push_str(&rest[..len]);
                i += len;
            } else if let Some(len) = self.escaper.ignored_region(rest) {
                let len = len.max(1);
                out.push_str(&rest[..len]);
                i += len;
            } else if rest.starts_with('{') {
                match self.find_block_end(input, i) {
                    Some(close) => {
                        let interior = &input[i + 1..close];
                        let saved = state.skip_hit;
                        state.skip_hit = false;
                        let expanded = self.expand_region(interior, base + i + 1, state);
                        if !state.skip_hit {
                            out.push(' ');
                            out.push_str(&expanded);
                            out.push(' ');
                        }
                        state.skip_hit = saved;
                        i = close + 1;
                    }
                    None => {
                        // Unbalanced brace: treat as literal text.
                        out.push('{');
                        i += 1;
                    }
                }
            } else if rest.starts_with('?') {
                let tag = rest[1..]
                    .chars()
                    .next()
                    .filter(|c| "_dsafno#".contains(*c));
                let token_len = 1 + tag.map_or(0, char::len_utf8);
                self.resolve(tag, &rest[..token_len], base + i, state, &mut out);
                i += token_len;
            } else {
                match rest.chars().next() {
                    Some(ch) => {
                        out.push(ch);
                        i += ch.len_utf8();
                    }
                    None => break,
                }
            }
        }
        out
    }

    /// Finds the `}` matching the `{` at `open`, honoring ignored regions
    /// while counting braces.
    fn find_block_end(&self, input: &str, open: usize) -> Option<usize> {
        let mut depth = 1usize;
        let mut i = open + 1;
        while i < input.len() {
            let rest = &input[i..];
            if rest.starts_with("--") {
                i += line_comment_len(rest);
            } else if let Some(len) = self.escaper.ignored_region(rest) {
                i += len.max(1);
            } else if rest.starts_with('{') {
                depth += 1;
                i += 1;
            } else if rest.starts_with('}') {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            } else {
                match rest.chars().next() {
                    Some(ch) => i += ch.len_utf8(),
                    None => break,
                }
            }
        }
        None
    }

    /// Resolves one placeholder token against the argument queue.
    fn resolve(
        &self,
        tag: Option<char>,
        token: &str,
        offset: usize,
        state: &mut State<'_>,
        out: &mut String,
    ) {
        // ?_ expands to the identifier prefix and consumes nothing.
        if tag == Some('_') {
            out.push_str(self.ident_prefix);
            return;
        }

        if state.next >= state.args.len() {
            state.diag(DiagnosticKind::NoValue, token, offset, out);
            return;
        }
        let value = &state.args[state.next];
        state.next += 1;
        state.consumed += 1;

        if matches!(value, Value::Skip) {
            state.skip_hit = true;
            return;
        }

        match tag {
            Some('a') => self.resolve_array(value, token, offset, state, out),
            Some('#') => self.resolve_ident(value, token, offset, state, out),
            Some('n') => {
                if value.is_falsy() {
                    out.push_str("NULL");
                } else {
                    out.push_str(&value.to_int().to_string());
                }
            }
            Some('o') => self.resolve_order(value, out),
            _ => {
                // Default, ?s, ?d, ?f: NULL passes through for all of them.
                if matches!(value, Value::Null) {
                    out.push_str("NULL");
                    return;
                }
                match tag {
                    Some('d') => out.push_str(&value.to_int().to_string()),
                    Some('f') => out.push_str(&value.to_float().to_string()),
                    _ => {
                        if value.is_scalar() {
                            out.push_str(&self.escaper.escape_scalar(&value.render()));
                        } else {
                            state.diag(DiagnosticKind::ValueNotScalar, token, offset, out);
                        }
                    }
                }
            }
        }
    }

    /// `?a`: comma-joined value list (sequence) or `ident = value` pairs
    /// (mapping). A falsy value flags the enclosing block for collapse.
    fn resolve_array(
        &self,
        value: &Value,
        token: &str,
        offset: usize,
        state: &mut State<'_>,
        out: &mut String,
    ) {
        if value.is_falsy() {
            state.skip_hit = true;
        }
        let parts: Vec<String> = match value {
            Value::Seq(items) => items.iter().map(|v| self.scalar_or_null(v)).collect(),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| {
                    format!("{} = {}", self.escaper.escape_ident(k), self.scalar_or_null(v))
                })
                .collect(),
            Value::IdentMap(entries) => entries
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{} = {}",
                        self.escaper.escape_ident(k),
                        self.escaper.escape_scalar(v)
                    )
                })
                .collect(),
            _ => {
                state.diag(DiagnosticKind::ValueNotArray, token, offset, out);
                return;
            }
        };
        out.push_str(&parts.join(", "));
    }

    /// `?#`: quoted identifier, list of identifiers, or `alias.identifier`
    /// pairs.
    fn resolve_ident(
        &self,
        value: &Value,
        token: &str,
        offset: usize,
        state: &mut State<'_>,
        out: &mut String,
    ) {
        let parts: Vec<String> = match value {
            Value::Seq(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Str(name) => parts.push(self.escaper.escape_ident(name)),
                        _ => {
                            state.diag(DiagnosticKind::ArrayValueNotString, token, offset, out);
                            return;
                        }
                    }
                }
                parts
            }
            Value::IdentMap(entries) => entries
                .iter()
                .map(|(alias, name)| {
                    format!(
                        "{}.{}",
                        self.escaper.escape_ident(alias),
                        self.escaper.escape_ident(name)
                    )
                })
                .collect(),
            Value::Map(entries) => {
                let mut parts = Vec::with_capacity(entries.len());
                for (alias, v) in entries {
                    match v {
                        Value::Str(name) => parts.push(format!(
                            "{}.{}",
                            self.escaper.escape_ident(alias),
                            self.escaper.escape_ident(name)
                        )),
                        _ => {
                            state.diag(DiagnosticKind::ArrayValueNotString, token, offset, out);
                            return;
                        }
                    }
                }
                parts
            }
            other => vec![self.escaper.escape_ident(&other.render())],
        };
        out.push_str(&parts.join(", "));
    }

    /// `?o`: multilevel ORDER BY. Mapping entries carry a direction,
    /// sequence entries and bare scalars are column names.
    fn resolve_order(&self, value: &Value, out: &mut String) {
        let parts: Vec<String> = match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(col, dir)| {
                    let dir = if dir.render().eq_ignore_ascii_case("DESC") {
                        "DESC"
                    } else {
                        "ASC"
                    };
                    format!("{} {}", self.escaper.escape_ident(col), dir)
                })
                .collect(),
            Value::IdentMap(entries) => entries
                .iter()
                .map(|(col, dir)| {
                    let dir = if dir.eq_ignore_ascii_case("DESC") {
                        "DESC"
                    } else {
                        "ASC"
                    };
                    format!("{} {}", self.escaper.escape_ident(col), dir)
                })
                .collect(),
            Value::Seq(items) => items
                .iter()
                .map(|item| self.escaper.escape_ident(&item.render()))
                .collect(),
            Value::Null => Vec::new(),
            other => vec![self.escaper.escape_ident(&other.render())],
        };
        out.push_str(&parts.join(", "));
    }

    fn scalar_or_null(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_owned(),
            other => self.escaper.escape_scalar(&other.render()),
        }
    }
}

/// Length of a `--` comment: everything up to (excluding) the line break.
fn line_comment_len(rest: &str) -> usize {
    rest.find(['\r', '\n']).unwrap_or(rest.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::MysqlEscaper;

    fn expand(template: &str, args: &[Value]) -> Expansion {
        Expander::new(&MysqlEscaper).expand(template, args)
    }

    fn sql(template: &str, args: &[Value]) -> String {
        let exp = expand(template, args);
        assert!(exp.is_clean(), "unexpected diagnostics: {:?}", exp.diagnostics);
        exp.sql
    }

    #[test]
    fn test_plain_template_unchanged() {
        assert_eq!(sql("SELECT * FROM users", &[]), "SELECT * FROM users");
    }

    #[test]
    fn test_scalar_placeholders() {
        assert_eq!(sql("?", &["x".into()]), "'x'");
        assert_eq!(sql("?", &[7.into()]), "'7'");
        assert_eq!(sql("?d", &["12.7".into()]), "12");
        assert_eq!(sql("?d", &["junk".into()]), "0");
        assert_eq!(sql("?f", &["1.5".into()]), "1.5");
        assert_eq!(sql("?s", &[true.into()]), "'1'");
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(sql("?", &[Value::Null]), "NULL");
        assert_eq!(sql("?d", &[Value::Null]), "NULL");
        assert_eq!(sql("?f", &[Value::Null]), "NULL");
    }

    #[test]
    fn test_n_placeholder() {
        assert_eq!(sql("?n", &[0.into()]), "NULL");
        assert_eq!(sql("?n", &["".into()]), "NULL");
        assert_eq!(sql("?n", &["15x".into()]), "15");
    }

    #[test]
    fn test_arguments_consumed_in_order() {
        assert_eq!(
            sql("a=? b=?d c=?", &["x".into(), "2".into(), "y".into()]),
            "a='x' b=2 c='y'"
        );
    }

    #[test]
    fn test_ident_prefix_consumes_no_argument() {
        let expander = Expander::new(&MysqlEscaper).with_ident_prefix("app_");
        let exp = expander.expand("SELECT * FROM ?_users WHERE id = ?d", &[3.into()]);
        assert_eq!(exp.sql, "SELECT * FROM app_users WHERE id = 3");
    }

    #[test]
    fn test_unknown_tag_is_literal_text() {
        assert_eq!(sql("?x", &["v".into()]), "'v'x");
    }

    #[test]
    fn test_exhausted_arguments_emit_marker() {
        let exp = expand("a=? b=?", &["x".into()]);
        assert_eq!(exp.sql, format!("a='x' b={MARKER_NO_VALUE}"));
        assert_eq!(exp.diagnostics.len(), 1);
        assert_eq!(exp.diagnostics[0].kind, DiagnosticKind::NoValue);
        assert_eq!(exp.diagnostics[0].token, "?");
        assert!(exp.ok().is_err());
    }

    #[test]
    fn test_non_scalar_for_default_type() {
        let exp = expand("?", &[Value::seq([1, 2])]);
        assert_eq!(exp.sql, MARKER_VALUE_NOT_SCALAR);
        assert_eq!(exp.diagnostics[0].kind, DiagnosticKind::ValueNotScalar);
    }

    #[test]
    fn test_optional_block_with_value() {
        assert_eq!(sql("{a=?}", &["v".into()]), " a='v' ");
    }

    #[test]
    fn test_optional_block_skipped() {
        assert_eq!(sql("{a=?}", &[Value::Skip]), "");
    }

    #[test]
    fn test_nested_block_inner_collapse_does_not_leak() {
        // Only the inner placeholder is skipped: the inner block vanishes,
        // the outer block survives.
        assert_eq!(sql("{x{y?}}", &[Value::Skip]), " x ");
        assert_eq!(sql("{x{y?}}", &["v".into()]), " x y'v'  ");
    }

    #[test]
    fn test_nested_block_outer_collapse() {
        // Outer placeholder skipped: the whole block goes, even though the
        // inner block expanded fine.
        assert_eq!(sql("{x {y?} ?}", &[1.into(), Value::Skip]), "");
        // Inner-only skip keeps the outer block.
        assert_eq!(sql("{x {y?} ?}", &[Value::Skip, 2.into()]), " x  '2' ");
    }

    #[test]
    fn test_sibling_blocks_do_not_leak() {
        assert_eq!(
            sql("{a=?}{b=?}", &[Value::Skip, "v".into()]),
            " b='v' "
        );
    }

    #[test]
    fn test_skip_outside_block_collapses_nothing_else() {
        // A top-level skip just omits its own text.
        assert_eq!(sql("a=? {b=?}", &[Value::Skip, 1.into()]), "a=  b='1' ");
    }

    #[test]
    fn test_array_placeholder_mapping() {
        let exp = sql(
            "SET ?a",
            &[Value::map([("a", Value::Int(1)), ("b", Value::Null)])],
        );
        assert_eq!(exp, "SET `a` = '1', `b` = NULL");
    }

    #[test]
    fn test_array_placeholder_sequence() {
        assert_eq!(sql("IN(?a)", &[Value::seq([1, 2])]), "IN('1', '2')");
    }

    #[test]
    fn test_array_placeholder_empty_collapses_block() {
        assert_eq!(sql("{WHERE id IN(?a)}", &[Value::Seq(vec![])]), "");
    }

    #[test]
    fn test_array_placeholder_wrong_shape() {
        let exp = expand("?a", &["scalar".into()]);
        assert_eq!(exp.sql, MARKER_VALUE_NOT_ARRAY);
        assert_eq!(exp.diagnostics[0].kind, DiagnosticKind::ValueNotArray);
    }

    #[test]
    fn test_identifier_placeholder() {
        assert_eq!(sql("?#", &["col".into()]), "`col`");
        assert_eq!(sql("?#", &["db.users".into()]), "`db`.`users`");
        assert_eq!(
            sql("?#", &[Value::ident_map([("t", "col")])]),
            "`t`.`col`"
        );
        assert_eq!(
            sql("?#", &[Value::ident_map([("a", "x"), ("b", "y")])]),
            "`a`.`x`, `b`.`y`"
        );
        assert_eq!(sql("?#", &[Value::seq(["a", "b"])]), "`a`, `b`");
    }

    #[test]
    fn test_identifier_placeholder_non_string_entry() {
        let exp = expand("?#", &[Value::seq([1])]);
        assert_eq!(exp.sql, MARKER_ARRAY_VALUE_NOT_STRING);
        assert_eq!(
            exp.diagnostics[0].kind,
            DiagnosticKind::ArrayValueNotString
        );
    }

    #[test]
    fn test_order_placeholder() {
        assert_eq!(
            sql(
                "ORDER BY ?o",
                &[Value::map([("name", Value::from("desc")), ("id", Value::from("up"))])]
            ),
            "ORDER BY `name` DESC, `id` ASC"
        );
        assert_eq!(sql("ORDER BY ?o", &[Value::seq(["name"])]), "ORDER BY `name`");
        assert_eq!(sql("ORDER BY ?o", &["name".into()]), "ORDER BY `name`");
    }

    #[test]
    fn test_quoted_literals_are_not_expanded() {
        assert_eq!(
            sql("SELECT '?' FROM t WHERE a=?d", &[5.into()]),
            "SELECT '?' FROM t WHERE a=5"
        );
        assert_eq!(sql("SELECT `we?ird` FROM t", &[]), "SELECT `we?ird` FROM t");
        assert_eq!(sql("/* ? */ ?d", &[5.into()]), "/* ? */ 5");
    }

    #[test]
    fn test_line_comment_is_not_expanded() {
        assert_eq!(sql("-- set ?d here\n?d", &[5.into()]), "-- set ?d here\n5");
    }

    #[test]
    fn test_braces_inside_literals_do_not_open_blocks() {
        assert_eq!(sql("SELECT '{' , ?d", &[1.into()]), "SELECT '{' , 1");
        assert_eq!(sql("{a=? '}'}", &["v".into()]), " a='v' '}' ");
    }

    #[test]
    fn test_unbalanced_brace_is_literal() {
        assert_eq!(sql("a { b ?d", &[1.into()]), "a { b 1");
    }

    #[test]
    fn test_skip_for_typed_placeholder() {
        assert_eq!(sql("{LIMIT ?d}", &[Value::Skip]), "");
    }
}
