//! pbirkit CLI: metadata export and batch renames for PBIR report projects.
//!
//! Exports the table, column and measure references of a report project to
//! CSV, and applies rename mappings back to every report document.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
