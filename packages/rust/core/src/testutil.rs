//! Helpers shared by the pipeline tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

/// Copy of the `Sales.Report` fixture project in a fresh temp directory.
pub(crate) fn fixture_project() -> tempfile::TempDir {
    let src = fixtures_root().join("pbir");
    let dir = tempfile::tempdir().expect("create temp dir");

    for entry in WalkDir::new(&src) {
        let entry = entry.expect("walk fixtures");
        let rel = entry.path().strip_prefix(&src).expect("fixture prefix");
        let target = dir.path().join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).expect("create fixture dir");
        } else {
            std::fs::copy(entry.path(), &target).expect("copy fixture file");
        }
    }

    dir
}

/// Path of the sample rename mapping.
pub(crate) fn fixture_mapping() -> PathBuf {
    fixtures_root().join("mapping").join("rename.csv")
}

/// Every file below `root` with its bytes, keyed by relative path.
pub(crate) fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.expect("walk snapshot"))
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).expect("prefix").to_path_buf();
            let bytes = std::fs::read(e.path()).expect("read snapshot file");
            (rel, bytes)
        })
        .collect()
}

/// Path of a document inside the fixture's report definition.
pub(crate) fn definition_file(root: &Path, rel: &str) -> PathBuf {
    root.join("Sales.Report").join("definition").join(rel)
}
