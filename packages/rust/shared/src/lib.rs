//! Shared types, error model, and configuration for pbirkit.
//!
//! This crate is the foundation depended on by the other pbirkit crates.
//! It provides:
//! - [`PbirError`], the unified error type
//! - Domain types ([`MetadataRecord`], [`MappingRow`])
//! - Configuration ([`AppConfig`], [`ExportOptions`], [`UpdateOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExportConfig, ExportOptions, UpdateConfig, UpdateOptions, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PbirError, Result};
pub use types::{MAPPING_COLUMNS, METADATA_COLUMNS, MappingRow, MetadataRecord};
