// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the deploy and destroy subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hadron")]
#[command(about = "Run declarative container deployment plans against Docker hosts")]
#[command(version)]
pub struct Cli {
    /// Log level for hadron and the plan program (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Output format: normal, quiet or json
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create and start every resource of a plan
    Deploy {
        /// Plan program: a cargo project directory or an executable
        #[arg(short, long)]
        plan: PathBuf,

        /// Report what would change without touching any host
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every resource of a plan in reverse dependency order
    Destroy {
        /// Plan program: a cargo project directory or an executable
        #[arg(short, long)]
        plan: PathBuf,
    },
}
