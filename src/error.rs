// ABOUTME: Application-wide error types for hadron.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("plan not found: {}", .0.display())]
    PlanNotFound(PathBuf),

    #[error("cannot run plan at {}: expected a cargo project directory or an executable", .0.display())]
    UnsupportedPlan(PathBuf),

    #[error("plan program exited with {0}")]
    PlanFailed(std::process::ExitStatus),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid env file: {0}")]
    InvalidEnvFile(String),

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
