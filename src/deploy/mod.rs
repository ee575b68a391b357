// ABOUTME: Plan walks against container runtimes: Execute, DryRun and Destroy.
// ABOUTME: Shares one Context per run between the host workers and the plan-wide worker.

mod credentials;
mod destroyer;
mod error;
mod executor;
mod health;
mod walk;

pub use credentials::{CREDENTIAL_FIELDS, CredentialMemo, REGISTRY_FIELDS};
pub use error::{DeployError, DeployErrorKind};
pub use health::{HealthChecker, HealthStatus};

pub(crate) use destroyer::destroy;
pub(crate) use executor::execute;

use crate::plan::Graph;
use crate::report::Reporter;
use crate::runtime::Connector;
use crate::types::NodeIndex;
use tokio_util::sync::CancellationToken;

/// Everything a walk reads; only the reporter and credential memo are written.
pub(crate) struct Context<'a> {
    pub(crate) graph: &'a Graph,
    /// Topological order of `graph`.
    pub(crate) order: &'a [NodeIndex],
    pub(crate) reporter: &'a Reporter,
    pub(crate) connector: &'a dyn Connector,
    pub(crate) credentials: &'a CredentialMemo,
    pub(crate) cancel: CancellationToken,
    /// Parent of the per-host spans.
    pub(crate) span: tracing::Span,
}
