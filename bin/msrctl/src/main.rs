//! ---
//! msr_section: "05-cli"
//! msr_subsection: "binary"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Control CLI for managed database services."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use msr_common::config::{AppConfig, LoadedAppConfig};
use msr_common::logging::init_tracing;
use tracing::debug;

mod commands;
mod store;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile managed database services against declared specs",
    long_about = None
)]
struct Cli {
    /// Configuration file. `MSR_CONFIG` takes precedence when set.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding service records, overriding `state.directory`.
    #[arg(long = "state-dir", global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let LoadedAppConfig { mut config, source } = load_config(cli.config.as_deref())?;
    if let Some(state_dir) = cli.state_dir {
        config.state.directory = state_dir;
    }
    init_tracing("msrctl", &config.logging)?;
    debug!(config = %source.display(), "configuration loaded");
    commands::run(cli.command, &config)
}

fn load_config(explicit: Option<&Path>) -> Result<LoadedAppConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    candidates.push(PathBuf::from("msr.toml"));
    candidates.push(PathBuf::from("configs/msr.toml"));
    AppConfig::load_with_source(&candidates)
}
