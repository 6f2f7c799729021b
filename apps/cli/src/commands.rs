//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use pbirkit_core::{
    ProgressReporter, batch_update_pbir_project, export_mapping_template,
    export_pbir_metadata_to_csv,
};
use pbirkit_shared::{
    AppConfig, ExportOptions, UpdateOptions, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pbirkit: export and rename field references in PBIR report projects.
#[derive(Parser)]
#[command(
    name = "pbirkit",
    version,
    about = "Export PBIR report metadata to CSV and batch-rename tables and columns.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.pbirkit/pbirkit.toml.
    #[arg(long, global = true, env = "PBIRKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Export table/column/measure references of a project to a CSV file.
    Export {
        /// Report project directory.
        project_dir: PathBuf,

        /// Output CSV path.
        csv_path: PathBuf,
    },

    /// Apply a rename mapping CSV to every document of a project.
    Update {
        /// Report project directory.
        project_dir: PathBuf,

        /// Mapping CSV with old_tbl, old_col, new_tbl, new_col columns.
        csv_path: PathBuf,

        /// Report what would change without writing any file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Write an identity mapping CSV listing every field the project uses.
    Template {
        /// Report project directory.
        project_dir: PathBuf,

        /// Output mapping CSV path.
        csv_path: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pbirkit=info",
        1 => "pbirkit=debug",
        _ => "pbirkit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Export {
            project_dir,
            csv_path,
        } => cmd_export(config_path, &project_dir, &csv_path),
        Command::Update {
            project_dir,
            csv_path,
            dry_run,
        } => cmd_update(config_path, &project_dir, &csv_path, dry_run),
        Command::Template {
            project_dir,
            csv_path,
        } => cmd_template(config_path, &project_dir, &csv_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_export(config_path: Option<&Path>, project_dir: &Path, csv_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let opts = ExportOptions::from(&config);

    info!(
        project = %project_dir.display(),
        csv = %csv_path.display(),
        "exporting report metadata"
    );

    let reporter = CliProgress::new();
    let result = export_pbir_metadata_to_csv(project_dir, csv_path, &opts, &reporter)?;

    println!();
    println!("  Metadata exported!");
    println!("  Documents: {}", result.documents_scanned);
    println!("  Skipped:   {}", result.documents_skipped);
    println!("  Rows:      {}", result.row_count);
    println!("  CSV:       {}", result.csv_path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_update(
    config_path: Option<&Path>,
    project_dir: &Path,
    csv_path: &Path,
    dry_run: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let mut opts = UpdateOptions::from(&config);
    opts.dry_run |= dry_run;

    info!(
        project = %project_dir.display(),
        mapping = %csv_path.display(),
        dry_run = opts.dry_run,
        "updating report project"
    );

    let reporter = CliProgress::new();
    let result = batch_update_pbir_project(project_dir, csv_path, &opts, &reporter)?;

    println!();
    if result.dry_run {
        println!("  Dry run: no files were written.");
    } else {
        println!("  Report project updated!");
    }
    println!("  Documents: {}", result.documents_scanned);
    println!("  Updated:   {}", result.documents_updated);
    println!("  Failed:    {}", result.documents_failed);
    println!("  Unmatched: {}", result.unmatched.len());
    for row in &result.unmatched {
        println!("    - {row}");
    }
    if result.dry_run {
        for path in &result.updated_paths {
            println!("  would update {}", path.display());
        }
    }
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_template(config_path: Option<&Path>, project_dir: &Path, csv_path: &Path) -> Result<()> {
    let config = resolve_config(config_path)?;
    let opts = ExportOptions::from(&config);

    let reporter = CliProgress::new();
    let rows = export_mapping_template(project_dir, csv_path, &opts, &reporter)?;

    println!("Mapping template with {rows} rows written to: {}", csv_path.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{pos}/{len}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn document_processed(&self, path: &Path, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
        if let Some(name) = path.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
    }

    fn finished(&self) {
        self.bar.finish_and_clear();
    }
}
