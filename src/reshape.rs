use std::cmp::Ordering;
use std::collections::HashSet;

use indexmap::IndexMap;

use crate::value::Value;

/// Column-name prefix (case-insensitive) marking a nesting-key column.
pub const ARRAY_KEY_MARKER: &str = "ARRAY_KEY";
/// Column-name prefix (case-insensitive) marking the parent-id column of a
/// forest result.
pub const PARENT_KEY_MARKER: &str = "PARENT_KEY";

/// One result row: an ordered mapping of column name to value.
pub type Row = IndexMap<String, Value>;

/// A node of a nested keyed mapping built from `ARRAY_KEY*` columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyed {
    /// A single remaining field, collapsed to its value.
    Cell(Value),
    /// A full row (more than one field remained after key stripping).
    Row(Row),
    /// One nesting dimension.
    Map(IndexMap<String, Keyed>),
}

/// A forest node: the original row (id and parent-id columns stripped) plus
/// its ordered children, keyed by child id.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestNode {
    pub row: Row,
    pub children: IndexMap<String, ForestNode>,
}

/// Root-id -> node mapping produced by the forest build.
pub type Forest = IndexMap<String, ForestNode>;

/// Result of reshaping a flat row-set.
#[derive(Debug, Clone, PartialEq)]
pub enum Reshaped {
    /// No convention columns present: the rows pass through unchanged.
    Rows(Vec<Row>),
    /// `ARRAY_KEY*` columns only: a nested keyed mapping.
    Keyed(Keyed),
    /// `ARRAY_KEY*` plus a `PARENT_KEY*` column: a parent/child forest.
    Forest(Forest),
}

impl Reshaped {
    /// Rows accessor for results that were not transformed.
    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Reshaped::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Replaces the innermost dimension by its first value, turning a
    /// mapping of rows into a mapping of cells (the `select_col` shape).
    /// A plain row-set becomes an auto-indexed mapping of first-column
    /// values; forests are returned unchanged.
    pub fn shrink_last_dimension(self) -> Reshaped {
        match self {
            Reshaped::Rows(rows) => {
                let mut out = IndexMap::with_capacity(rows.len());
                for (i, row) in rows.into_iter().enumerate() {
                    out.insert(i.to_string(), shrink(Keyed::Row(row)));
                }
                Reshaped::Keyed(Keyed::Map(out))
            }
            Reshaped::Keyed(keyed) => Reshaped::Keyed(shrink(keyed)),
            forest => forest,
        }
    }
}

fn shrink(keyed: Keyed) -> Keyed {
    match keyed {
        Keyed::Cell(v) => Keyed::Cell(v),
        Keyed::Row(mut row) => Keyed::Cell(
            row.shift_remove_index(0)
                .map(|(_, v)| v)
                .unwrap_or(Value::Null),
        ),
        Keyed::Map(entries) => {
            // A map whose first element is already a cell IS the last
            // dimension; it collapses to that cell.
            if let Some((_, Keyed::Cell(_))) = entries.first() {
                match entries.into_iter().next() {
                    Some((_, cell)) => cell,
                    None => Keyed::Map(IndexMap::new()),
                }
            } else {
                Keyed::Map(entries.into_iter().map(|(k, v)| (k, shrink(v))).collect())
            }
        }
    }
}

/// Reshapes a flat row-set according to the column-name conventions.
///
/// Columns named `ARRAY_KEY*` become nesting dimensions (sorted naturally
/// by full column name, first name outermost); a `PARENT_KEY*` column turns
/// the result into a forest keyed by the first `ARRAY_KEY*` column. Without
/// convention columns the rows are returned untouched.
///
/// # Examples
///
/// ```rust
/// use indexmap::IndexMap;
/// use sqlx_placeholders::{reshape, Keyed, Reshaped, Row, Value};
///
/// let mut row: Row = IndexMap::new();
/// row.insert("ARRAY_KEY".into(), Value::from("a"));
/// row.insert("total".into(), Value::Int(3));
/// match reshape(vec![row]) {
///     Reshaped::Keyed(Keyed::Map(m)) => {
///         assert_eq!(m.get("a"), Some(&Keyed::Cell(Value::Int(3))));
///     }
///     other => panic!("unexpected shape: {other:?}"),
/// }
/// ```
pub fn reshape(rows: Vec<Row>) -> Reshaped {
    let Some(first) = rows.first() else {
        return Reshaped::Rows(rows);
    };

    let mut array_keys: Vec<String> = Vec::new();
    let mut parent_key: Option<String> = None;
    for name in first.keys() {
        if starts_with_marker(name, ARRAY_KEY_MARKER) {
            array_keys.push(name.clone());
        } else if starts_with_marker(name, PARENT_KEY_MARKER) {
            // At most one parent key is recognized; the last one wins.
            parent_key = Some(name.clone());
        }
    }
    if array_keys.is_empty() {
        return Reshaped::Rows(rows);
    }
    array_keys.sort_by(|a, b| natural_cmp(a, b));

    match parent_key {
        None => Reshaped::Keyed(hash_build(rows, &array_keys)),
        Some(pk) => Reshaped::Forest(forest_build(rows, &array_keys[0], &pk)),
    }
}

fn starts_with_marker(name: &str, marker: &str) -> bool {
    name.len() >= marker.len() && name[..marker.len()].eq_ignore_ascii_case(marker)
}

/// Builds the nested keyed mapping. Each row walks the sorted key columns,
/// removing them and descending one dimension per key; a NULL key value
/// appends under the next free auto-index instead.
fn hash_build(rows: Vec<Row>, keys: &[String]) -> Keyed {
    let mut root: IndexMap<String, Keyed> = IndexMap::new();
    for mut row in rows {
        let path: Vec<Option<String>> = keys
            .iter()
            .map(|k| row.shift_remove(k).unwrap_or(Value::Null).render_key())
            .collect();
        let leaf = if row.len() == 1 {
            match row.shift_remove_index(0) {
                Some((_, v)) => Keyed::Cell(v),
                None => Keyed::Row(Row::new()),
            }
        } else {
            Keyed::Row(row)
        };

        let Some((last, inits)) = path.split_last() else {
            continue;
        };
        let mut current = &mut root;
        for key in inits {
            let key = resolve_key(current, key);
            let entry = current
                .entry(key)
                .or_insert_with(|| Keyed::Map(IndexMap::new()));
            // A leaf stored here by an earlier row gives way to the deeper
            // dimensions of this one.
            if !matches!(entry, Keyed::Map(_)) {
                *entry = Keyed::Map(IndexMap::new());
            }
            current = match entry {
                Keyed::Map(m) => m,
                _ => unreachable!(),
            };
        }
        let key = resolve_key(current, last);
        current.insert(key, leaf);
    }
    Keyed::Map(root)
}

/// NULL keys auto-index: one past the largest existing numeric key.
fn resolve_key(level: &IndexMap<String, Keyed>, key: &Option<String>) -> String {
    match key {
        Some(k) => k.clone(),
        None => level
            .keys()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1)
            .to_string(),
    }
}

/// Builds the parent/child forest: arena of stripped rows keyed by id
/// first, then edges, then roots, materialized last so no node is mutated
/// while it is being linked.
fn forest_build(rows: Vec<Row>, id_col: &str, pid_col: &str) -> Forest {
    let mut arena: IndexMap<String, Row> = IndexMap::new();
    let mut edges: Vec<(String, Option<String>)> = Vec::new();

    for mut row in rows {
        let id = row
            .shift_remove(id_col)
            .unwrap_or(Value::Null)
            .render_key();
        let pid = row
            .shift_remove(pid_col)
            .unwrap_or(Value::Null)
            .render_key();
        // Rows without an id cannot take part in any subtree.
        let Some(id) = id else { continue };
        // Self-parented rows count as roots.
        let pid = pid.filter(|p| *p != id);
        arena.insert(id.clone(), row);
        edges.push((id, pid));
    }

    let mut children: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut roots: Vec<String> = Vec::new();
    for (id, pid) in &edges {
        match pid {
            Some(pid) if arena.contains_key(pid) => {
                let siblings = children.entry(pid.clone()).or_default();
                if !siblings.contains(id) {
                    siblings.push(id.clone());
                }
            }
            // Unknown parents (including NULL and dangling ids) make roots.
            _ => {
                if !roots.contains(id) {
                    roots.push(id.clone());
                }
            }
        }
    }

    let mut in_progress = HashSet::new();
    roots
        .iter()
        .map(|id| {
            (
                id.clone(),
                materialize(id, &arena, &children, &mut in_progress),
            )
        })
        .collect()
}

fn materialize(
    id: &str,
    arena: &IndexMap<String, Row>,
    children: &IndexMap<String, Vec<String>>,
    in_progress: &mut HashSet<String>,
) -> ForestNode {
    in_progress.insert(id.to_owned());
    let mut node = ForestNode {
        row: arena.get(id).cloned().unwrap_or_default(),
        children: IndexMap::new(),
    };
    if let Some(child_ids) = children.get(id) {
        for child in child_ids {
            // Duplicate ids can splice a node under its own descendant;
            // such links are skipped rather than recursed into.
            if in_progress.contains(child) {
                continue;
            }
            node.children
                .insert(child.clone(), materialize(child, arena, children, in_progress));
        }
    }
    in_progress.remove(id);
    node
}

/// Numeric-aware string ordering: digit runs compare by value, everything
/// else byte-wise ("KEY2" sorts before "KEY10").
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ab, bb) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < ab.len() && j < bb.len() {
        if ab[i].is_ascii_digit() && bb[j].is_ascii_digit() {
            let si = i;
            while i < ab.len() && ab[i].is_ascii_digit() {
                i += 1;
            }
            let sj = j;
            while j < bb.len() && bb[j].is_ascii_digit() {
                j += 1;
            }
            let na = a[si..i].trim_start_matches('0');
            let nb = b[sj..j].trim_start_matches('0');
            let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
            if ord != Ordering::Equal {
                return ord;
            }
        } else {
            let ord = ab[i].cmp(&bb[j]);
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }
    (ab.len() - i).cmp(&(bb.len() - j))
}
