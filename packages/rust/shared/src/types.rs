//! Core domain types for PBIR metadata export and batch updates.

use serde::{Deserialize, Serialize};

/// Header of the exported metadata CSV, in column order.
pub const METADATA_COLUMNS: [&str; 6] = [
    "Report",
    "Page",
    "Table",
    "Column or Measure",
    "Expression",
    "Used In",
];

/// Columns a mapping CSV must provide.
pub const MAPPING_COLUMNS: [&str; 4] = ["old_tbl", "old_col", "new_tbl", "new_col"];

// ---------------------------------------------------------------------------
// MetadataRecord
// ---------------------------------------------------------------------------

/// One row of the exported metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Report name (the `<Name>.Report` folder without its suffix).
    #[serde(rename = "Report")]
    pub report: String,
    /// Display name of the page the reference lives on.
    #[serde(rename = "Page")]
    pub page: String,
    /// Referenced table (entity).
    #[serde(rename = "Table")]
    pub table: String,
    /// Referenced column or measure.
    #[serde(rename = "Column or Measure")]
    pub column: String,
    /// DAX expression, for report-level measures.
    #[serde(rename = "Expression")]
    pub expression: Option<String>,
    /// Usage context: visual type, `Drillthrough`, `Filters` or `Bookmarks`.
    #[serde(rename = "Used In")]
    pub used_in: Option<String>,
}

// ---------------------------------------------------------------------------
// MappingRow
// ---------------------------------------------------------------------------

/// One rename instruction read from a mapping CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingRow {
    /// Current table name.
    #[serde(default)]
    pub old_tbl: String,
    /// Current column or measure name (empty for table-only renames).
    #[serde(default)]
    pub old_col: String,
    /// New table name (empty or equal to `old_tbl` to keep it).
    #[serde(default)]
    pub new_tbl: String,
    /// New column or measure name.
    #[serde(default)]
    pub new_col: String,
}

impl MappingRow {
    /// Build a row from its four fields.
    pub fn new(
        old_tbl: impl Into<String>,
        old_col: impl Into<String>,
        new_tbl: impl Into<String>,
        new_col: impl Into<String>,
    ) -> Self {
        Self {
            old_tbl: old_tbl.into(),
            old_col: old_col.into(),
            new_tbl: new_tbl.into(),
            new_col: new_col.into(),
        }
    }

    /// Identity row for a `(table, column)` pair.
    pub fn identity(table: &str, column: &str) -> Self {
        Self::new(table, column, table, column)
    }

    /// A row is actionable when it names a table and either a new table or a
    /// complete column rename.
    pub fn is_actionable(&self) -> bool {
        !self.old_tbl.is_empty()
            && (!self.new_tbl.is_empty() || (!self.old_col.is_empty() && !self.new_col.is_empty()))
    }

    /// Whether the row renames its table.
    pub fn renames_table(&self) -> bool {
        !self.new_tbl.is_empty() && self.new_tbl != self.old_tbl
    }

    /// Whether the row carries a column rename (possibly an identity one).
    pub fn has_column(&self) -> bool {
        !self.old_col.is_empty() && !self.new_col.is_empty()
    }
}

impl std::fmt::Display for MappingRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_column() {
            write!(f, "{}[{}]", self.old_tbl, self.old_col)
        } else {
            write!(f, "{}", self.old_tbl)
        }
    }
}
