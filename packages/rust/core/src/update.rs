//! Batch rename of tables and columns across a report project.
//!
//! Loads a mapping CSV, then patches every document of the project in two
//! passes (tables first, then columns and measures). Documents are only
//! rewritten when something actually changed.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use pbirkit_shared::{MappingRow, Result, UpdateOptions};

use crate::document::{read_document, write_document};
use crate::mapping::{MatchLog, RenameMap, load_mapping};
use crate::patch::{PatchOutcome, patch_document};
use crate::progress::ProgressReporter;
use crate::walker::find_documents;

// ---------------------------------------------------------------------------
// Update result
// ---------------------------------------------------------------------------

/// Result of a batch update.
#[derive(Debug)]
pub struct UpdateResult {
    /// Documents found in the project.
    pub documents_scanned: usize,
    /// Documents whose content changed (written unless `dry_run`).
    pub documents_updated: usize,
    /// Documents that could not be read, parsed or written.
    pub documents_failed: usize,
    /// Paths of the changed documents, in processing order.
    pub updated_paths: Vec<PathBuf>,
    /// Mapping rows that matched nothing in the project.
    pub unmatched: Vec<MappingRow>,
    /// Whether files were left untouched.
    pub dry_run: bool,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

// ---------------------------------------------------------------------------
// Update pipeline
// ---------------------------------------------------------------------------

/// Apply the renames listed in `csv_path` to every document of `project_dir`.
///
/// Fails before touching any document when the mapping cannot be loaded or
/// the project directory does not exist. Per-document failures are logged
/// and counted; the remaining documents are still processed.
#[instrument(skip_all, fields(project = %project_dir.display(), mapping = %csv_path.display()))]
pub fn batch_update_pbir_project(
    project_dir: &Path,
    csv_path: &Path,
    opts: &UpdateOptions,
    progress: &dyn ProgressReporter,
) -> Result<UpdateResult> {
    let start = Instant::now();

    progress.phase("Loading mapping");
    let rows = load_mapping(csv_path, opts.delimiter)?;
    let renames = RenameMap::from_rows(&rows);

    let paths = find_documents(project_dir, &opts.extension)?;
    let mut log = MatchLog::default();
    let mut result = UpdateResult {
        documents_scanned: paths.len(),
        documents_updated: 0,
        documents_failed: 0,
        updated_paths: Vec::new(),
        unmatched: Vec::new(),
        dry_run: opts.dry_run,
        elapsed: std::time::Duration::ZERO,
    };

    if renames.is_empty() {
        info!("mapping has no actionable rows, nothing to update");
    } else {
        progress.phase("Updating report documents");
        for (i, path) in paths.iter().enumerate() {
            progress.document_processed(path, i + 1, paths.len());

            match update_document(path, &renames, &mut log, opts) {
                Ok(outcome) if outcome.changed() => {
                    result.documents_updated += 1;
                    result.updated_paths.push(path.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unable to update document");
                    result.documents_failed += 1;
                }
            }
        }
    }

    result.unmatched = log.unmatched(&rows, &renames);
    for row in &result.unmatched {
        warn!(row = %row, "mapping row matched nothing in the project");
    }

    result.elapsed = start.elapsed();
    info!(
        documents = result.documents_scanned,
        updated = result.documents_updated,
        failed = result.documents_failed,
        unmatched = result.unmatched.len(),
        dry_run = result.dry_run,
        elapsed_ms = result.elapsed.as_millis(),
        "batch update complete"
    );
    progress.finished();

    Ok(result)
}

/// Patch a single document, writing it back when it changed.
fn update_document(
    path: &Path,
    renames: &RenameMap,
    log: &mut MatchLog,
    opts: &UpdateOptions,
) -> Result<PatchOutcome> {
    let mut doc = read_document(path)?;
    let outcome = patch_document(&mut doc.value, renames, log);

    if outcome.entities_changed {
        info!(path = %path.display(), "entity updated");
    }
    if outcome.properties_changed {
        info!(path = %path.display(), "property updated");
    }

    if outcome.changed() {
        if opts.dry_run {
            debug!(path = %path.display(), "dry run, not writing");
        } else {
            write_document(&doc, opts.indent)?;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::export_mapping_template;
    use crate::progress::SilentProgress;
    use crate::testutil::{definition_file, fixture_mapping, fixture_project, snapshot};
    use pbirkit_shared::ExportOptions;
    use serde_json::{Value, json};

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn write_mapping(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("mapping.csv");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn renames_fixture_project() {
        let project = fixture_project();
        let root = project.path();
        let before = snapshot(root);

        let result = batch_update_pbir_project(
            root,
            &fixture_mapping(),
            &UpdateOptions::default(),
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(result.documents_scanned, 10);
        assert_eq!(result.documents_updated, 6);
        assert_eq!(result.documents_failed, 0);
        assert!(result.unmatched.is_empty());

        let ext = read_json(&definition_file(root, "reportExtensions.json"));
        assert_eq!(ext["entities"][0]["name"], "Revenue");
        assert_eq!(
            ext["entities"][0]["measures"][0]["expression"],
            "SUM(Revenue[Net Amount])"
        );
        assert_eq!(
            ext["entities"][0]["measures"][1]["expression"],
            "DIVIDE([Total Sales], SUM('Revenue'[Quantity]))"
        );

        let card = read_json(&definition_file(root, "pages/ReportSection1/visuals/card1/visual.json"));
        let measure = &card["visual"]["query"]["queryState"]["Values"]["projections"][0]["field"]["Measure"];
        assert_eq!(measure["Expression"]["SourceRef"]["Entity"], "Revenue");
        assert_eq!(measure["Property"], "Total Sales");

        let table = read_json(&definition_file(root, "pages/ReportSection1/visuals/table1/visual.json"));
        let amount = &table["visual"]["query"]["queryState"]["Values"]["projections"][1]["field"]
            ["Aggregation"]["Expression"]["Column"];
        assert_eq!(amount["Expression"]["SourceRef"]["Entity"], "Revenue");
        assert_eq!(amount["Property"], "Net Amount");

        let page = read_json(&definition_file(root, "pages/ReportSection2/page.json"));
        let filter = &page["filterConfig"]["filters"][0];
        assert_eq!(filter["field"]["Column"]["Property"], "Colour");
        assert_eq!(
            filter.pointer("/filter/Where/0/Condition/Not/Expression/In/Expressions/0/Column/Property"),
            Some(&json!("Colour"))
        );

        let bookmark = read_json(&definition_file(root, "bookmarks/Bookmark1.bookmark.json"));
        assert_eq!(
            bookmark.pointer("/explorationState/filters/byExpr/0/expression/Column/Property"),
            Some(&json!("Colour"))
        );

        let after = snapshot(root);
        for rel in ["report.json", "pages/pages.json", "pages/ReportSection1/page.json", "bookmarks/bookmarks.json"] {
            let key = Path::new("Sales.Report/definition").join(rel);
            assert_eq!(before[&key], after[&key], "{rel} should be untouched");
        }
    }

    #[test]
    fn rewritten_documents_keep_layout() {
        let project = fixture_project();
        let root = project.path();
        let path = definition_file(root, "reportExtensions.json");
        let original = std::fs::read_to_string(&path).unwrap();

        batch_update_pbir_project(root, &fixture_mapping(), &UpdateOptions::default(), &SilentProgress)
            .unwrap();

        let updated = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            updated,
            original
                .replace("\"name\": \"Sales\"", "\"name\": \"Revenue\"")
                .replace("SUM(Sales[Amount])", "SUM(Revenue[Net Amount])")
                .replace("'Sales'[Quantity]", "'Revenue'[Quantity]")
        );
    }

    #[test]
    fn unmatched_rows_are_reported_and_nothing_changes() {
        let project = fixture_project();
        let out = tempfile::tempdir().unwrap();
        let mapping = write_mapping(out.path(), "old_tbl,old_col,new_tbl,new_col\nCustomer,,Client,\n");
        let before = snapshot(project.path());

        let result = batch_update_pbir_project(
            project.path(),
            &mapping,
            &UpdateOptions::default(),
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(result.documents_updated, 0);
        assert_eq!(result.unmatched, vec![MappingRow::new("Customer", "", "Client", "")]);
        assert_eq!(snapshot(project.path()), before);
    }

    #[test]
    fn measure_rename_reaches_dependent_measures() {
        let project = fixture_project();
        let root = project.path();
        let out = tempfile::tempdir().unwrap();
        let mapping = write_mapping(
            out.path(),
            "old_tbl,old_col,new_tbl,new_col\nSales,Total Sales,,Sales Total\n",
        );

        let result =
            batch_update_pbir_project(root, &mapping, &UpdateOptions::default(), &SilentProgress)
                .unwrap();

        assert_eq!(result.documents_updated, 2);
        assert!(result.unmatched.is_empty());

        let ext = read_json(&definition_file(root, "reportExtensions.json"));
        assert_eq!(ext["entities"][0]["measures"][0]["name"], "Sales Total");
        assert_eq!(
            ext["entities"][0]["measures"][1]["expression"],
            "DIVIDE([Sales Total], SUM('Sales'[Quantity]))"
        );

        let card = read_json(&definition_file(root, "pages/ReportSection1/visuals/card1/visual.json"));
        assert_eq!(
            card["visual"]["query"]["queryState"]["Values"]["projections"][0]["field"]["Measure"]["Property"],
            "Sales Total"
        );
    }

    #[test]
    fn short_mapping_rows_still_apply() {
        let project = fixture_project();
        let out = tempfile::tempdir().unwrap();
        let mapping = write_mapping(
            out.path(),
            "old_tbl,old_col,new_tbl,new_col\nProduct,Color,,Colour\nSales,,Revenue\n",
        );

        let result = batch_update_pbir_project(
            project.path(),
            &mapping,
            &UpdateOptions::default(),
            &SilentProgress,
        )
        .unwrap();

        assert!(result.unmatched.is_empty());
        let ext = read_json(&definition_file(project.path(), "reportExtensions.json"));
        assert_eq!(ext["entities"][0]["name"], "Revenue");
        let bookmark = read_json(&definition_file(project.path(), "bookmarks/Bookmark1.bookmark.json"));
        assert_eq!(
            bookmark.pointer("/explorationState/filters/byExpr/0/expression/Column/Property"),
            Some(&json!("Colour"))
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let project = fixture_project();
        let before = snapshot(project.path());
        let opts = UpdateOptions {
            dry_run: true,
            ..UpdateOptions::default()
        };

        let result =
            batch_update_pbir_project(project.path(), &fixture_mapping(), &opts, &SilentProgress)
                .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.documents_updated, 6);
        assert_eq!(snapshot(project.path()), before);
    }

    #[test]
    fn template_mapping_round_trips() {
        let project = fixture_project();
        let out = tempfile::tempdir().unwrap();
        let template = out.path().join("template.csv");
        export_mapping_template(project.path(), &template, &ExportOptions::default(), &SilentProgress)
            .unwrap();
        let before = snapshot(project.path());

        let result = batch_update_pbir_project(
            project.path(),
            &template,
            &UpdateOptions::default(),
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(result.documents_updated, 0);
        assert!(result.unmatched.is_empty());
        assert_eq!(snapshot(project.path()), before);
    }

    #[test]
    fn missing_mapping_columns_abort_before_any_write() {
        let project = fixture_project();
        let out = tempfile::tempdir().unwrap();
        let mapping = write_mapping(out.path(), "old_tbl,new_tbl\nSales,Revenue\n");
        let before = snapshot(project.path());

        let err = batch_update_pbir_project(
            project.path(),
            &mapping,
            &UpdateOptions::default(),
            &SilentProgress,
        )
        .unwrap_err();

        assert!(err.to_string().contains("old_col"));
        assert_eq!(snapshot(project.path()), before);
    }

    #[test]
    fn malformed_document_is_counted_and_skipped() {
        let project = fixture_project();
        std::fs::write(definition_file(project.path(), "broken.json"), "not json").unwrap();

        let result = batch_update_pbir_project(
            project.path(),
            &fixture_mapping(),
            &UpdateOptions::default(),
            &SilentProgress,
        )
        .unwrap();

        assert_eq!(result.documents_scanned, 11);
        assert_eq!(result.documents_failed, 1);
        assert_eq!(result.documents_updated, 6);
    }
}
