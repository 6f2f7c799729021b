//! Application configuration for pbirkit.
//!
//! User config lives at `~/.pbirkit/pbirkit.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PbirError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pbirkit.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pbirkit";

// ---------------------------------------------------------------------------
// Config structs (matching pbirkit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata export settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// Batch update settings.
    #[serde(default)]
    pub update: UpdateConfig,
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Placeholder written when a report or page name cannot be resolved.
    #[serde(default = "default_na_value")]
    pub na_value: String,

    /// CSV delimiter, shared by exported files and mapping files.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Extension of the documents scanned inside a project.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            na_value: default_na_value(),
            delimiter: default_delimiter(),
            extension: default_extension(),
        }
    }
}

fn default_na_value() -> String {
    "NA".into()
}
fn default_delimiter() -> char {
    ','
}
fn default_extension() -> String {
    "json".into()
}

/// `[update]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Indent width used when a patched document is rewritten.
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Compute changes without writing any document.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            dry_run: false,
        }
    }
}

fn default_indent() -> usize {
    2
}

impl AppConfig {
    /// Reject values the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.export.delimiter.is_ascii() {
            return Err(PbirError::config(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.export.delimiter
            )));
        }
        if self.export.extension.trim_start_matches('.').is_empty() {
            return Err(PbirError::config("document extension must not be empty"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime options for metadata export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Placeholder for unresolvable report/page names.
    pub na_value: String,
    /// CSV delimiter byte.
    pub delimiter: u8,
    /// Document extension without the leading dot.
    pub extension: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExportOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            na_value: config.export.na_value.clone(),
            delimiter: u8::try_from(config.export.delimiter).unwrap_or(b','),
            extension: config.export.extension.trim_start_matches('.').to_string(),
        }
    }
}

/// Runtime options for the batch updater.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// CSV delimiter byte of the mapping file.
    pub delimiter: u8,
    /// Document extension without the leading dot.
    pub extension: String,
    /// Indent width for rewritten documents.
    pub indent: usize,
    /// Compute changes without writing.
    pub dry_run: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for UpdateOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            delimiter: u8::try_from(config.export.delimiter).unwrap_or(b','),
            extension: config.export.extension.trim_start_matches('.').to_string(),
            indent: config.update.indent,
            dry_run: config.update.dry_run,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pbirkit/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| PbirError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pbirkit/pbirkit.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PbirError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| PbirError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PbirError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PbirError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PbirError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
