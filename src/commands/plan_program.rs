// ABOUTME: Locates and launches a plan program with the execution mode in its environment.
// ABOUTME: Cargo projects run through `cargo run --quiet`; executables run directly.

use hadron::config::{DESTROY_VAR, DRY_RUN_VAR, Mode};
use hadron::error::{Error, Result};
use hadron::logging::LOG_LEVEL_VAR;
use hadron::output::{OUTPUT_VAR, OutputMode};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanProgram {
    /// Directory holding the plan's Cargo.toml.
    Cargo(PathBuf),
    Executable(PathBuf),
}

impl PlanProgram {
    /// Accepts a cargo project directory, its Cargo.toml or any file inside
    /// it, or an executable file.
    pub fn locate(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PlanNotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            return if path.join("Cargo.toml").is_file() {
                Ok(PlanProgram::Cargo(path.to_path_buf()))
            } else {
                Err(Error::UnsupportedPlan(path.to_path_buf()))
            };
        }
        if is_executable(path) {
            return Ok(PlanProgram::Executable(path.to_path_buf()));
        }
        path.ancestors()
            .skip(1)
            .find(|dir| dir.join("Cargo.toml").is_file())
            .map(|dir| PlanProgram::Cargo(dir.to_path_buf()))
            .ok_or_else(|| Error::UnsupportedPlan(path.to_path_buf()))
    }

    fn command(&self) -> Command {
        match self {
            PlanProgram::Cargo(dir) => {
                let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
                let mut command = Command::new(cargo);
                command.args(["run", "--quiet"]).current_dir(dir);
                command
            }
            PlanProgram::Executable(path) => Command::new(path),
        }
    }

    /// Environment handed to the plan program.
    pub fn env(mode: Mode, log_level: &str, output: OutputMode) -> [(&'static str, String); 4] {
        [
            (DRY_RUN_VAR, (mode == Mode::DryRun).to_string()),
            (DESTROY_VAR, (mode == Mode::Destroy).to_string()),
            (LOG_LEVEL_VAR, log_level.to_string()),
            (OUTPUT_VAR, output.as_str().to_string()),
        ]
    }

    /// Run to completion with inherited stdio; a non-zero exit is an error.
    pub async fn run(&self, mode: Mode, log_level: &str, output: OutputMode) -> Result<()> {
        tracing::debug!(program = %self, %mode, "launching plan program");
        let status = self
            .command()
            .envs(Self::env(mode, log_level, output))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            tracing::warn!(program = %self, ?status, "plan program failed");
            Err(Error::PlanFailed(status))
        }
    }
}

impl fmt::Display for PlanProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanProgram::Cargo(dir) => write!(f, "{} (cargo)", dir.display()),
            PlanProgram::Executable(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "exe")
}
