//! Table and column reference rewriting inside DAX expressions.
//!
//! Only references are touched: string literals and bracketed names
//! (`[Measure]`, `[Column]`) are matched as whole tokens and passed through.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// String literal | bracketed name | quoted table | bare identifier.
static TABLE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"]|"")*"|\[[^\]]*\]|'((?:[^']|'')+)'|\b([A-Za-z_][A-Za-z0-9_]*)\b"#)
        .expect("valid regex")
});

/// String literal | `Table[Column]` / `'Table'[Column]`.
static COLUMN_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"]|"")*"|('(?:[^']|'')+'|[A-Za-z_][A-Za-z0-9_]*)\[([^\]]+)\]"#)
        .expect("valid regex")
});

/// String literal | qualified `Table[Column]` | bare `[Measure]`.
static MEASURE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"]|"")*"|(?:'(?:[^']|'')+'|[A-Za-z_][A-Za-z0-9_]*)\[[^\]]*\]|\[([^\]]+)\]"#)
        .expect("valid regex")
});

/// Every table-like token of an expression: quoted names and bare
/// identifiers outside string literals and brackets. Identifiers followed by
/// `(` are function calls and are skipped.
pub fn table_tokens(expr: &str) -> Vec<String> {
    TABLE_TOKEN_RE
        .captures_iter(expr)
        .filter_map(|caps| {
            caps.get(1).map(|m| unescape(m.as_str())).or_else(|| {
                caps.get(2)
                    .filter(|m| !is_function_call(expr, m.end()))
                    .map(|m| m.as_str().to_string())
            })
        })
        .collect()
}

/// Every `(table, column)` pair referenced as `Table[Column]`.
pub fn column_references(expr: &str) -> Vec<(String, String)> {
    COLUMN_REF_RE
        .captures_iter(expr)
        .filter_map(|caps| {
            let table = caps.get(1)?;
            let column = caps.get(2)?;
            Some((table_name(table.as_str()), column.as_str().to_string()))
        })
        .collect()
}

/// Look up a table name the way DAX resolves it: exact match first, then
/// case-insensitively. Returns the map's own key with its value.
pub fn find_table<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<(&'a String, &'a V)> {
    map.get_key_value(name).or_else(|| {
        let folded = name.to_lowercase();
        map.iter().find(|(key, _)| key.to_lowercase() == folded)
    })
}

/// Case-insensitive lookup of a `(table, column)` pair, exact match first.
pub fn find_column<'a>(
    map: &'a HashMap<(String, String), String>,
    table: &str,
    column: &str,
) -> Option<(&'a (String, String), &'a String)> {
    map.get_key_value(&(table.to_string(), column.to_string()))
        .or_else(|| {
            let (table, column) = (table.to_lowercase(), column.to_lowercase());
            map.iter()
                .find(|((t, c), _)| t.to_lowercase() == table && c.to_lowercase() == column)
        })
}

/// Rename table references found in `tables`.
pub fn rename_tables(expr: &str, tables: &HashMap<String, String>) -> String {
    TABLE_TOKEN_RE
        .replace_all(expr, |caps: &Captures<'_>| {
            if let Some(quoted) = caps.get(1) {
                if let Some((_, new)) = find_table(tables, &unescape(quoted.as_str())) {
                    return quote(new);
                }
            } else if let Some(bare) = caps.get(2).filter(|m| !is_function_call(expr, m.end())) {
                if let Some((_, new)) = find_table(tables, bare.as_str()) {
                    return if is_plain_identifier(new) {
                        new.clone()
                    } else {
                        quote(new)
                    };
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}

/// Rename `Table[Column]` references whose pair is in `columns`. The table
/// part keeps its original spelling.
pub fn rename_columns(expr: &str, columns: &HashMap<(String, String), String>) -> String {
    COLUMN_REF_RE
        .replace_all(expr, |caps: &Captures<'_>| {
            if let (Some(table), Some(column)) = (caps.get(1), caps.get(2)) {
                if let Some((_, new)) = find_column(columns, &table_name(table.as_str()), column.as_str())
                {
                    return format!("{}[{new}]", table.as_str());
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}

/// Rename unqualified `[Measure]` references. Qualified `Table[Column]`
/// forms and string literals are left alone.
pub fn rename_measures(expr: &str, measures: &HashMap<String, String>) -> String {
    MEASURE_REF_RE
        .replace_all(expr, |caps: &Captures<'_>| {
            if let Some(name) = caps.get(1) {
                if let Some((_, new)) = find_table(measures, name.as_str()) {
                    return format!("[{new}]");
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}

fn is_function_call(expr: &str, end: usize) -> bool {
    expr[end..].trim_start().starts_with('(')
}

fn table_name(part: &str) -> String {
    match part.strip_prefix('\'').and_then(|p| p.strip_suffix('\'')) {
        Some(inner) => unescape(inner),
        None => part.to_string(),
    }
}

fn unescape(quoted_inner: &str) -> String {
    quoted_inner.replace("''", "'")
}

fn quote(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
