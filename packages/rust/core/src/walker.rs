//! Project directory walker.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use pbirkit_shared::{PbirError, Result};

/// Collect every file below `root` whose extension equals `extension`
/// (compared case-insensitively, without the leading dot).
///
/// Paths are returned sorted so that runs over the same tree produce rows in
/// the same order. Entries that cannot be read are skipped with a warning.
pub fn find_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PbirError::validation(format!(
            "project directory not found: {}",
            root.display()
        )));
    }

    let mut paths = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

        if matches {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    debug!(root = %root.display(), count = paths.len(), "documents found");

    Ok(paths)
}
