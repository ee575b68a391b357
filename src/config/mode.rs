// ABOUTME: Plan execution mode and its selection from the environment.
// ABOUTME: The hadron CLI communicates the mode through HADRON_DRY_RUN and HADRON_DESTROY.

use serde::Serialize;
use std::fmt;

pub const DRY_RUN_VAR: &str = "HADRON_DRY_RUN";
pub const DESTROY_VAR: &str = "HADRON_DESTROY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Create and start everything that is missing.
    Execute,
    /// Decide what Execute would do without mutating remote state.
    DryRun,
    /// Remove remote resources in reverse dependency order.
    Destroy,
}

impl Mode {
    /// Destroy takes precedence over dry-run when both are set.
    pub fn from_env() -> Self {
        if flag(DESTROY_VAR) {
            Mode::Destroy
        } else if flag(DRY_RUN_VAR) {
            Mode::DryRun
        } else {
            Mode::Execute
        }
    }

    pub fn is_mutating(self) -> bool {
        !matches!(self, Mode::DryRun)
    }
}

fn flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Execute => f.write_str("execute"),
            Mode::DryRun => f.write_str("dry-run"),
            Mode::Destroy => f.write_str("destroy"),
        }
    }
}
