//! Progress callbacks for the export and update pipelines.

use std::path::Path;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once per document, before it is processed.
    fn document_processed(&self, path: &Path, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn finished(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_processed(&self, _path: &Path, _current: usize, _total: usize) {}
    fn finished(&self) {}
}
