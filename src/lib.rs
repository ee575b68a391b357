// ABOUTME: Library root for hadron: declarative container deployment plans.
// ABOUTME: Plan programs depend on this crate; the CLI that launches them lives in main.rs.

pub mod config;
pub mod deploy;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod plan;
pub mod report;
pub mod runtime;
pub mod secrets;
pub mod ssh;
pub mod types;

pub use config::{HealthProbe, Mode, RestartPolicy};
pub use plan::Plan;
pub use report::{Outcome, Report, Status};
