//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run polls in an interactive console session
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

use clap::{Parser, Subcommand};

/// Chat polls and quizzes with live results.
#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = env!("CARGO_PKG_VERSION"),
    about = "Tally: chat polls and quizzes with live results"
)]
pub struct Cli {
    /// Use this config file instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive console session (default when no subcommand is given).
    Start {
        /// Act as this user instead of the configured one.
        #[arg(long)]
        user: Option<String>,

        /// Publish into this chat instead of the configured one.
        #[arg(long)]
        chat: Option<String>,
    },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::config::{self, Config, ConfigError};
use std::path::{Path, PathBuf};

/// Resolve the config path, honouring an explicit `--config`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(config::get_config_path)
}

/// Load the configuration the CLI should run with.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
}

/// Run the `config show` subcommand.
pub fn handle_config_show(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load(explicit)?;
    let pretty = serde_json::to_string_pretty(&cfg)?;
    println!("{}", pretty);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(explicit: Option<&Path>) {
    println!("{}", resolve_config_path(explicit).display());
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("tally {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("TALLY_BUILD_DATE"));
    println!("  Git commit: {}", env!("TALLY_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
