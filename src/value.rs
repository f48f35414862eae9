use indexmap::IndexMap;

/// A query argument.
///
/// Placeholder expansion works on a closed set of value shapes instead of
/// runtime type inspection. Scalars feed the default/`?d`/`?f`/`?n`
/// placeholders, [`Value::Seq`] and [`Value::Map`] feed `?a` and `?o`,
/// [`Value::IdentMap`] feeds `?#`, and [`Value::Skip`] is the sentinel that
/// omits a placeholder and collapses its enclosing optional block.
///
/// # Examples
///
/// ```rust
/// use sqlx_placeholders::Value;
///
/// let args: Vec<Value> = vec![42.into(), "O'Brien".into(), Value::Skip];
/// assert_eq!(args[0], Value::Int(42));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence, used by `?a` (value lists) and `?o` (column lists).
    Seq(Vec<Value>),
    /// Ordered field-name -> value mapping, used by `?a` (SET clauses) and
    /// `?o` (column -> direction).
    Map(IndexMap<String, Value>),
    /// Ordered alias -> identifier mapping, used by `?#`.
    IdentMap(IndexMap<String, String>),
    /// Skip sentinel: omit this placeholder and mark the enclosing optional
    /// block for collapse.
    Skip,
}

impl Value {
    /// Builds a [`Value::Map`] from ordered `(field, value)` pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a [`Value::IdentMap`] from ordered `(alias, identifier)` pairs.
    pub fn ident_map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::IdentMap(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds a [`Value::Seq`] from an ordered list of values.
    pub fn seq<V, I>(entries: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Seq(entries.into_iter().map(Into::into).collect())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Loose emptiness test: NULL, `false`, zero, the empty string, `"0"`
    /// and empty collections all count as falsy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null | Value::Skip => true,
            Value::Bool(b) => !b,
            Value::Int(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty() || s == "0",
            Value::Seq(v) => v.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::IdentMap(m) => m.is_empty(),
        }
    }

    /// String form used for scalar escaping. Booleans render as `1` and the
    /// empty string, matching the loose string conversion of the reference
    /// databases this layer targets.
    pub fn render(&self) -> String {
        match self {
            Value::Null | Value::Skip => String::new(),
            Value::Bool(true) => "1".to_owned(),
            Value::Bool(false) => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Seq(_) | Value::Map(_) | Value::IdentMap(_) => String::new(),
        }
    }

    /// Integer conversion for `?d` and `?n`: truncating for floats, a
    /// leading-number parse for strings, 0 when nothing parses. Non-empty
    /// collections convert to 1.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Null | Value::Skip => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(n) => *n,
            Value::Float(f) => *f as i64,
            Value::Str(s) => leading_number(s) as i64,
            Value::Seq(_) | Value::Map(_) | Value::IdentMap(_) => !self.is_falsy() as i64,
        }
    }

    /// Float conversion for `?f`; the rendered text always uses `.` as the
    /// decimal separator regardless of locale.
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Null | Value::Skip => 0.0,
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(n) => *n as f64,
            Value::Float(f) => *f,
            Value::Str(s) => leading_number(s),
            Value::Seq(_) | Value::Map(_) | Value::IdentMap(_) => 0.0,
        }
    }

    /// Rendering used when a value becomes a mapping key during result
    /// reshaping. `None` means "no key" (the reshaper auto-indexes instead).
    pub fn render_key(&self) -> Option<String> {
        match self {
            Value::Null | Value::Skip => None,
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_owned()),
            Value::Int(n) => Some(n.to_string()),
            // Fractional keys truncate, like loosely typed array keys do.
            Value::Float(f) => Some((*f as i64).to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::Seq(_) | Value::Map(_) | Value::IdentMap(_) => None,
        }
    }

    /// Feeds a stable, shape-tagged serialization of the value into a cache
    /// key hasher. Equal values always produce equal bytes.
    pub(crate) fn hash_bytes(&self, out: &mut Vec<u8>) {
        fn push_str(out: &mut Vec<u8>, s: &str) {
            out.extend_from_slice(&(s.len() as u64).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        match self {
            Value::Null => out.push(0),
            Value::Bool(b) => {
                out.push(1);
                out.push(*b as u8);
            }
            Value::Int(n) => {
                out.push(2);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Value::Float(f) => {
                out.push(3);
                out.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::Str(s) => {
                out.push(4);
                push_str(out, s);
            }
            Value::Seq(items) => {
                out.push(5);
                out.extend_from_slice(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.hash_bytes(out);
                }
            }
            Value::Map(entries) => {
                out.push(6);
                out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
                for (k, v) in entries {
                    push_str(out, k);
                    v.hash_bytes(out);
                }
            }
            Value::IdentMap(entries) => {
                out.push(7);
                out.extend_from_slice(&(entries.len() as u64).to_le_bytes());
                for (k, v) in entries {
                    push_str(out, k);
                    push_str(out, v);
                }
            }
            Value::Skip => out.push(8),
        }
    }
}

/// Parses the longest numeric prefix of `s` (sign, digits, optional
/// fraction and exponent), returning 0.0 when none exists.
fn leading_number(s: &str) -> f64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
        }
        if frac > end + 1 {
            end = frac;
        }
    }
    if end == digits_start {
        return 0.0;
    }
    // Exponent is accepted only when it is complete ("1e" parses as 1).
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_digits = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits {
            end = exp;
        }
    }
    t[..end].parse::<f64>().unwrap_or(0.0)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falsy_values() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Int(0).is_falsy());
        assert!(Value::Str("".into()).is_falsy());
        assert!(Value::Str("0".into()).is_falsy());
        assert!(Value::Seq(vec![]).is_falsy());
        assert!(!Value::Int(7).is_falsy());
        assert!(!Value::Str("0.0".into()).is_falsy());
    }

    #[test]
    fn test_int_conversion() {
        assert_eq!(Value::Str("42abc".into()).to_int(), 42);
        assert_eq!(Value::Str("12.7".into()).to_int(), 12);
        assert_eq!(Value::Str("abc".into()).to_int(), 0);
        assert_eq!(Value::Float(3.9).to_int(), 3);
        assert_eq!(Value::Bool(true).to_int(), 1);
        assert_eq!(Value::seq([1]).to_int(), 1);
        assert_eq!(Value::Seq(vec![]).to_int(), 0);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(Value::Str("1.5kg".into()).to_float(), 1.5);
        assert_eq!(Value::Str("-2e2".into()).to_float(), -200.0);
        assert_eq!(Value::Str("1e".into()).to_float(), 1.0);
        assert_eq!(Value::Int(3).to_float(), 3.0);
    }

    #[test]
    fn test_float_renders_with_dot() {
        // Locale-independent: the decimal separator is always a point.
        assert_eq!(Value::Float(1.5).render(), "1.5");
        assert_eq!(Value::Float(1.0).render(), "1");
    }

    #[test]
    fn test_render_key() {
        assert_eq!(Value::Null.render_key(), None);
        assert_eq!(Value::Int(5).render_key().as_deref(), Some("5"));
        assert_eq!(Value::Float(5.9).render_key().as_deref(), Some("5"));
        assert_eq!(Value::Str("k".into()).render_key().as_deref(), Some("k"));
    }

    #[test]
    fn test_hash_bytes_distinguishes_shapes() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        Value::Str("1".into()).hash_bytes(&mut a);
        Value::Int(1).hash_bytes(&mut b);
        assert_ne!(a, b);

        let mut c = Vec::new();
        let mut d = Vec::new();
        Value::seq(["x", "y"]).hash_bytes(&mut c);
        Value::seq(["xy"]).hash_bytes(&mut d);
        assert_ne!(c, d);
    }
}
