//! CLI argument definitions using clap
//!
//! Commands:
//! - sqlgate validate [--config <path>]
//! - sqlgate validate-batch [--config <path>]
//! - sqlgate explain [--config <path>] [--text]
//! - sqlgate check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sqlgate - read-only, tenant-scoped, bounded SQL gate
#[derive(Parser, Debug)]
#[command(name = "sqlgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate one JSON request read from stdin
    Validate {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate one JSON request per stdin line
    ValidateBatch {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Explain how one request would be rewritten or why it is rejected
    Explain {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the human-readable report instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Load and validate a configuration file
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
