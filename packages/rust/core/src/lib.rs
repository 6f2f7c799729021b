//! Core pipelines for PBIR report projects.
//!
//! Two end-to-end workflows live here: exporting the table/column/measure
//! references of a report project to a metadata CSV
//! ([`export_pbir_metadata_to_csv`]) and applying a rename mapping CSV to
//! every document of a project ([`batch_update_pbir_project`]).

pub mod dax;
pub mod document;
pub mod export;
pub mod extract;
pub mod mapping;
pub mod patch;
pub mod progress;
pub mod update;
pub mod walker;

#[cfg(test)]
mod testutil;

pub use export::{ExportResult, export_mapping_template, export_pbir_metadata_to_csv};
pub use progress::{ProgressReporter, SilentProgress};
pub use update::{UpdateResult, batch_update_pbir_project};
