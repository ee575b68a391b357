// ABOUTME: Entry point for the hadron CLI application.
// ABOUTME: Parses arguments and re-invokes the plan program in the requested mode.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use hadron::config::Mode;
use hadron::error::Result;
use hadron::logging;
use hadron::output::{Output, OutputMode};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mode = match cli.output.as_deref() {
        Some(value) => match OutputMode::parse(value) {
            Some(mode) => mode,
            None => {
                eprintln!("Error: unknown output mode '{value}'");
                std::process::exit(2);
            }
        },
        None => OutputMode::from_env(),
    };
    let output = Output::new(mode);

    if let Err(e) = logging::init_logging(cli.log_level.as_deref()) {
        output.error(&e.to_string());
        std::process::exit(2);
    }

    if let Err(e) = run(cli, output).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let log_level = logging::resolve_level(cli.log_level.as_deref())?;
    match cli.command {
        Commands::Deploy { plan, dry_run } => {
            let mode = if dry_run { Mode::DryRun } else { Mode::Execute };
            commands::deploy(&plan, mode, log_level, output).await
        }
        Commands::Destroy { plan } => commands::destroy(&plan, log_level, output).await,
    }
}
