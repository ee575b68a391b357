// ABOUTME: Plan assembly errors raised by builders and the dependency graph.
// ABOUTME: Any of these aborts the plan before a single runtime call is made.

use super::resource::ResourceKind;
use crate::types::{ParseImageRefError, ResourceNameError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{kind} name '{name}' is invalid: {source}")]
    InvalidName {
        kind: ResourceKind,
        name: String,
        #[source]
        source: ResourceNameError,
    },

    #[error("{kind} '{name}' is missing required field '{field}'")]
    MissingField {
        kind: ResourceKind,
        name: String,
        field: &'static str,
    },

    #[error("{kind} '{name}' has invalid {field}: {reason}")]
    InvalidField {
        kind: ResourceKind,
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("invalid image reference '{reference}': {source}")]
    InvalidImage {
        reference: String,
        #[source]
        source: ParseImageRefError,
    },

    #[error("image '{0}' is not pinned to a digest")]
    UnpinnedImage(String),

    #[error("{kind} '{name}' is already registered{}", host.as_deref().map(|h| format!(" on host '{}'", h)).unwrap_or_default())]
    Duplicate {
        kind: ResourceKind,
        name: String,
        host: Option<String>,
    },

    #[error(
        "container '{container}' on host '{container_host}' cannot use {kind} '{resource}' on host '{resource_host}'"
    )]
    CrossHost {
        container: String,
        container_host: String,
        kind: ResourceKind,
        resource: String,
        resource_host: String,
    },

    #[error("{kind} handle belongs to a different plan")]
    ForeignHandle { kind: ResourceKind },

    #[error("dependency cycle among: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

impl ValidationError {
    pub(crate) fn field(
        kind: ResourceKind,
        name: &str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ValidationError::InvalidField {
            kind,
            name: name.to_string(),
            field,
            reason: reason.into(),
        }
    }
}
