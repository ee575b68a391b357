// ABOUTME: Per-resource outcomes of a plan run and the final status derived from them.
// ABOUTME: Reporter is shared by concurrent workers; Report is the immutable result.

use crate::config::Mode;
use crate::deploy::{DeployError, DeployErrorKind, HealthStatus};
use crate::plan::{Descriptor, Graph, ResourceKind};
use crate::types::{Handle, NodeIndex};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

/// What happened to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Created,
    AlreadyExisted,
    /// DryRun: absent, Execute would create it.
    WouldCreate,
    /// Hosts connected, credentials resolved, images pinned.
    Ready,
    Removed,
    /// Destroy found nothing to remove.
    Absent,
    Skipped { reason: String },
    Failed { kind: DeployErrorKind, reason: String },
}

impl Outcome {
    pub(crate) fn failed(error: &DeployError) -> Self {
        Outcome::Failed {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    /// Whether dependents may proceed.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Skipped { .. } | Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => f.write_str("created"),
            Outcome::AlreadyExisted => f.write_str("already-existed"),
            Outcome::WouldCreate => f.write_str("would-create"),
            Outcome::Ready => f.write_str("ready"),
            Outcome::Removed => f.write_str("removed"),
            Outcome::Absent => f.write_str("absent"),
            Outcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            Outcome::Failed { reason, .. } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    #[serde(skip)]
    node: NodeIndex,
    pub kind: ResourceKind,
    pub name: String,
    /// Owning host for host-bound resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
}

impl Entry {
    /// Failed, skipped, or started but never became healthy.
    pub fn is_failure(&self) -> bool {
        !self.outcome.is_success() || self.health.is_some_and(|h| !h.is_healthy())
    }
}

/// Final verdict of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Status {
    Succeeded,
    PartiallySucceeded { failures: usize },
    /// Nothing ran: the plan failed validation.
    Aborted { reason: String },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Succeeded => f.write_str("succeeded"),
            Status::PartiallySucceeded { failures } => {
                write!(f, "partially succeeded with {} failures", failures)
            }
            Status::Aborted { reason } => write!(f, "aborted before execution: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub plan: String,
    pub mode: Mode,
    pub hostname: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    status: Status,
    entries: Vec<Entry>,
}

impl Report {
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Entries in plan registration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.name == name)
    }

    pub fn get<T: Descriptor>(&self, handle: Handle<T>) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.node == handle.node() && e.kind == T::KIND)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Succeeded
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

#[derive(Debug)]
struct Slot {
    kind: ResourceKind,
    name: String,
    host: Option<String>,
    outcome: Option<(Outcome, Option<HealthStatus>)>,
}

/// Collects outcomes from concurrent workers.
#[derive(Debug)]
pub(crate) struct Reporter {
    plan: String,
    mode: Mode,
    started_at: DateTime<Utc>,
    slots: Mutex<Vec<Slot>>,
}

impl Reporter {
    pub(crate) fn new(plan: &str, mode: Mode, graph: &Graph) -> Self {
        let slots = graph
            .indices()
            .map(|node| {
                let resource = graph.resource(node);
                Slot {
                    kind: resource.kind(),
                    name: resource.name(),
                    host: graph.host_of(node).map(|h| graph.resource(h).name()),
                    outcome: None,
                }
            })
            .collect();
        Self {
            plan: plan.to_string(),
            mode,
            started_at: Utc::now(),
            slots: Mutex::new(slots),
        }
    }

    /// First record for a node wins.
    pub(crate) fn record(&self, node: NodeIndex, outcome: Outcome, health: Option<HealthStatus>) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(node.0) else {
            return;
        };
        if slot.outcome.is_some() {
            return;
        }
        tracing::debug!(kind = %slot.kind, resource = %slot.name, %outcome, "recorded");
        slot.outcome = Some((outcome, health));
    }

    /// A report for a plan that never ran.
    pub(crate) fn abort(self, reason: String) -> Report {
        self.into_report(Vec::new(), Status::Aborted { reason })
    }

    pub(crate) fn finish(self) -> Report {
        let entries: Vec<Entry> = std::mem::take(&mut *self.slots.lock())
            .into_iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let (outcome, health) = slot.outcome?;
                Some(Entry {
                    node: NodeIndex(i),
                    kind: slot.kind,
                    name: slot.name,
                    host: slot.host,
                    outcome,
                    health,
                })
            })
            .collect();
        let failures = entries.iter().filter(|e| e.is_failure()).count();
        let status = if failures == 0 {
            Status::Succeeded
        } else {
            Status::PartiallySucceeded { failures }
        };
        self.into_report(entries, status)
    }

    fn into_report(self, entries: Vec<Entry>, status: Status) -> Report {
        Report {
            plan: self.plan,
            mode: self.mode,
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            status,
            entries,
        }
    }
}
