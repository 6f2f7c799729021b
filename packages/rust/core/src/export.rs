//! Metadata export: project directory → metadata CSV.
//!
//! Every document is scanned for field references and report-level measure
//! definitions. References pick up the expression of a matching definition,
//! unreferenced definitions are appended, and exact duplicates are dropped.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use pbirkit_shared::{
    ExportOptions, MAPPING_COLUMNS, METADATA_COLUMNS, MappingRow, MetadataRecord, PbirError,
    Result,
};

use crate::document::{PageResolver, read_document, report_name};
use crate::extract::{ExtractedField, extract_fields};
use crate::progress::ProgressReporter;
use crate::walker::find_documents;

/// Result of a metadata export.
#[derive(Debug)]
pub struct ExportResult {
    /// Where the CSV was written.
    pub csv_path: PathBuf,
    /// Documents found in the project.
    pub documents_scanned: usize,
    /// Documents skipped because they could not be read or parsed.
    pub documents_skipped: usize,
    /// Data rows written.
    pub row_count: usize,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Raw output of a project scan, before merging.
#[derive(Debug, Default)]
pub struct MetadataScan {
    /// One record per field reference, in document order.
    pub references: Vec<MetadataRecord>,
    /// One record per report-level measure definition.
    pub definitions: Vec<MetadataRecord>,
    /// Documents found in the project.
    pub documents_scanned: usize,
    /// Documents skipped because they could not be read or parsed.
    pub documents_skipped: usize,
}

/// Scan every document of a project.
#[instrument(skip_all, fields(project = %project_dir.display()))]
pub fn scan_project(
    project_dir: &Path,
    opts: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> Result<MetadataScan> {
    let paths = find_documents(project_dir, &opts.extension)?;
    let mut pages = PageResolver::new(opts.na_value.clone());
    let mut scan = MetadataScan {
        documents_scanned: paths.len(),
        ..MetadataScan::default()
    };

    for (i, path) in paths.iter().enumerate() {
        progress.document_processed(path, i + 1, paths.len());

        let doc = match read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unable to process document, skipping");
                scan.documents_skipped += 1;
                continue;
            }
        };

        let report = report_name(path).unwrap_or_else(|| opts.na_value.clone());
        let page = pages.resolve(path, &doc.value);
        let fields = extract_fields(&doc.value);
        debug!(path = %path.display(), fields = fields.len(), "document scanned");

        for field in fields {
            match field {
                ExtractedField::Reference {
                    table,
                    column,
                    used_in,
                } => scan.references.push(MetadataRecord {
                    report: report.clone(),
                    page: page.clone(),
                    table,
                    column,
                    expression: None,
                    used_in,
                }),
                ExtractedField::Definition {
                    table,
                    measure,
                    expression,
                    used_in,
                } => scan.definitions.push(MetadataRecord {
                    report: report.clone(),
                    page: page.clone(),
                    table,
                    column: measure,
                    expression,
                    used_in,
                }),
            }
        }
    }

    Ok(scan)
}

/// Merge references with measure definitions and drop duplicates.
///
/// A reference takes the expression of the first definition with the same
/// report, table and measure. Definitions nobody references are kept as rows
/// of their own.
pub fn merge_records(
    references: Vec<MetadataRecord>,
    definitions: Vec<MetadataRecord>,
) -> Vec<MetadataRecord> {
    let mut expressions: HashMap<(String, String, String), Option<String>> = HashMap::new();
    for def in &definitions {
        expressions
            .entry(field_key(def))
            .or_insert_with(|| def.expression.clone());
    }

    let mut referenced = HashSet::new();
    let mut rows: Vec<MetadataRecord> = references
        .into_iter()
        .map(|mut record| {
            let key = field_key(&record);
            if let Some(expression) = expressions.get(&key) {
                record.expression = expression.clone();
            }
            referenced.insert(key);
            record
        })
        .collect();

    rows.extend(
        definitions
            .into_iter()
            .filter(|def| !referenced.contains(&field_key(def))),
    );

    let mut seen = HashSet::new();
    rows.retain(|row| seen.insert(row.clone()));
    rows
}

fn field_key(record: &MetadataRecord) -> (String, String, String) {
    (
        record.report.clone(),
        record.table.clone(),
        record.column.clone(),
    )
}

/// Scan a project and return the merged metadata table.
pub fn collect_metadata(
    project_dir: &Path,
    opts: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> Result<(Vec<MetadataRecord>, MetadataScan)> {
    let mut scan = scan_project(project_dir, opts, progress)?;
    let references = std::mem::take(&mut scan.references);
    let definitions = std::mem::take(&mut scan.definitions);
    Ok((merge_records(references, definitions), scan))
}

/// Export the metadata of every document below `project_dir` to `csv_path`.
#[instrument(skip_all, fields(project = %project_dir.display(), csv = %csv_path.display()))]
pub fn export_pbir_metadata_to_csv(
    project_dir: &Path,
    csv_path: &Path,
    opts: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> Result<ExportResult> {
    let start = Instant::now();

    progress.phase("Scanning report documents");
    let (records, scan) = collect_metadata(project_dir, opts, progress)?;

    progress.phase("Writing CSV");
    write_csv(csv_path, &METADATA_COLUMNS, &records, opts.delimiter)?;

    let result = ExportResult {
        csv_path: csv_path.to_path_buf(),
        documents_scanned: scan.documents_scanned,
        documents_skipped: scan.documents_skipped,
        row_count: records.len(),
        elapsed: start.elapsed(),
    };

    info!(
        documents = result.documents_scanned,
        skipped = result.documents_skipped,
        rows = result.row_count,
        elapsed_ms = result.elapsed.as_millis(),
        "metadata export complete"
    );
    progress.finished();

    Ok(result)
}

/// Write a mapping CSV with one identity row per distinct table/column pair
/// used in the project. Returns the number of rows written.
#[instrument(skip_all, fields(project = %project_dir.display(), csv = %csv_path.display()))]
pub fn export_mapping_template(
    project_dir: &Path,
    csv_path: &Path,
    opts: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> Result<usize> {
    progress.phase("Scanning report documents");
    let (records, _) = collect_metadata(project_dir, opts, progress)?;

    let mut seen = HashSet::new();
    let rows: Vec<MappingRow> = records
        .iter()
        .filter(|r| seen.insert((r.table.as_str(), r.column.as_str())))
        .map(|r| MappingRow::identity(&r.table, &r.column))
        .collect();

    progress.phase("Writing mapping template");
    write_csv(csv_path, &MAPPING_COLUMNS, &rows, opts.delimiter)?;

    info!(rows = rows.len(), "mapping template written");
    progress.finished();

    Ok(rows.len())
}

/// Write `rows` under an explicit header, so an empty table still has one.
fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T], delimiter: u8) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| PbirError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(file);

    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| PbirError::io(path, e))?;

    debug!(path = %path.display(), rows = rows.len(), "wrote CSV file");
    Ok(())
}
