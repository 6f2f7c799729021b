//! Mapping CSV loading and the rename tables derived from it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use pbirkit_shared::{MAPPING_COLUMNS, MappingRow, PbirError, Result};

/// Byte-order mark some spreadsheet tools prepend to CSV exports.
const BOM: char = '\u{feff}';

/// Load the actionable rows of a mapping CSV.
///
/// The header must contain every column of [`MAPPING_COLUMNS`]; extra columns
/// are ignored. Rows that are not actionable are dropped.
pub fn load_mapping(csv_path: &Path, delimiter: u8) -> Result<Vec<MappingRow>> {
    let content = std::fs::read_to_string(csv_path).map_err(|e| PbirError::io(csv_path, e))?;
    parse_mapping(content.strip_prefix(BOM).unwrap_or(&content), delimiter)
}

/// Parse mapping CSV text. See [`load_mapping`].
pub fn parse_mapping(text: &str, delimiter: u8) -> Result<Vec<MappingRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = MAPPING_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(PbirError::validation(format!(
            "mapping CSV must contain the columns {}; missing {}",
            MAPPING_COLUMNS.join(", "),
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in reader.deserialize::<MappingRow>() {
        let row = record?;
        if row.is_actionable() {
            rows.push(row);
        } else {
            dropped += 1;
        }
    }

    info!(rows = rows.len(), dropped, "mapping loaded");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Rename tables
// ---------------------------------------------------------------------------

/// Lookup tables built from mapping rows.
#[derive(Debug, Clone, Default)]
pub struct RenameMap {
    /// `old table → new table`, only for rows that actually rename.
    pub tables: HashMap<String, String>,
    /// `(effective table, old column) → new column`.
    pub columns: HashMap<(String, String), String>,
    watched: HashSet<String>,
}

impl RenameMap {
    /// Build the lookups. A column key uses the table's new name when the
    /// table is renamed, because the entity pass runs before the property
    /// pass.
    pub fn from_rows(rows: &[MappingRow]) -> Self {
        let mut map = Self::default();

        for row in rows {
            map.watched.insert(row.old_tbl.clone());
            if row.renames_table() {
                map.tables.insert(row.old_tbl.clone(), row.new_tbl.clone());
            }
        }

        for row in rows.iter().filter(|r| r.has_column()) {
            let table = map.effective_table(&row.old_tbl).to_string();
            map.columns
                .insert((table, row.old_col.clone()), row.new_col.clone());
        }

        debug!(
            tables = map.tables.len(),
            columns = map.columns.len(),
            "rename map built"
        );
        map
    }

    /// Table name after renames.
    pub fn effective_table<'a>(&'a self, table: &'a str) -> &'a str {
        self.tables.get(table).map(String::as_str).unwrap_or(table)
    }

    /// Whether any mapping row names `table` as its old table.
    pub fn watches_table(&self, table: &str) -> bool {
        self.watched.contains(table)
    }

    /// The watched table a DAX token refers to. DAX names are
    /// case-insensitive, so an exact match is tried first and then a
    /// case-folded one.
    pub fn watched_table(&self, token: &str) -> Option<&str> {
        if let Some(name) = self.watched.get(token) {
            return Some(name);
        }
        let folded = token.to_lowercase();
        self.watched
            .iter()
            .find(|name| name.to_lowercase() == folded)
            .map(String::as_str)
    }

    /// Whether there is nothing to look up.
    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Match tracking
// ---------------------------------------------------------------------------

/// Identifiers encountered while patching, used to report mapping rows that
/// matched nothing.
#[derive(Debug, Clone, Default)]
pub struct MatchLog {
    tables: HashSet<String>,
    columns: HashSet<(String, String)>,
}

impl MatchLog {
    /// Record an old table name seen in a document.
    pub fn table(&mut self, name: &str) {
        if !self.tables.contains(name) {
            self.tables.insert(name.to_string());
        }
    }

    /// Record a `(effective table, column)` pair seen in a document.
    pub fn column(&mut self, table: &str, column: &str) {
        self.columns.insert((table.to_string(), column.to_string()));
    }

    /// Rows whose identifying fields were never encountered.
    pub fn unmatched(&self, rows: &[MappingRow], renames: &RenameMap) -> Vec<MappingRow> {
        rows.iter()
            .filter(|row| {
                if row.has_column() {
                    let table = renames.effective_table(&row.old_tbl).to_string();
                    !self.columns.contains(&(table, row.old_col.clone()))
                } else {
                    !self.tables.contains(&row.old_tbl)
                }
            })
            .cloned()
            .collect()
    }
}
