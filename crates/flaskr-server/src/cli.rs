//! Command-line interface: `serve` (the default) and `init-db`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "flaskr-server")]
#[command(about = "flaskr blog server")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "FLASKR_CONFIG_PATH", default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Clear the existing data and create new tables
    #[command(name = "init-db")]
    InitDb,
}
