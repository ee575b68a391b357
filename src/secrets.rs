// ABOUTME: Secret store capability used to resolve registry credentials.
// ABOUTME: Environment-backed store for real runs and an in-memory store for tests and embedding.

use crate::config::Environment;
use async_trait::async_trait;
use std::collections::HashMap;

/// Why a secret reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("unknown secret reference '{0}'")]
    UnknownReference(String),

    #[error("secret '{reference}' has no field '{field}'")]
    MissingField { reference: String, field: String },

    #[error("secret store error: {0}")]
    Backend(String),
}

/// Resolves a named secret into the requested fields.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns exactly the requested fields or fails.
    async fn resolve_credentials(
        &self,
        reference: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, String>, CredentialError>;
}

/// Reads secrets from variables named `<REFERENCE>_<FIELD>`, upper-cased with
/// every non-alphanumeric character replaced by `_`.
///
/// `ghcr-io` with field `password` reads `GHCR_IO_PASSWORD`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    environment: Environment,
}

impl EnvSecretStore {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn variable_name(reference: &str, field: &str) -> String {
        format!("{}_{}", reference, field)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn resolve_credentials(
        &self,
        reference: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, String>, CredentialError> {
        let found: Vec<(&str, Option<String>)> = fields
            .iter()
            .map(|f| (*f, self.environment.var(&Self::variable_name(reference, f))))
            .collect();

        if !found.is_empty() && found.iter().all(|(_, v)| v.is_none()) {
            return Err(CredentialError::UnknownReference(reference.to_string()));
        }

        found
            .into_iter()
            .map(|(field, value)| {
                value
                    .map(|v| (field.to_string(), v))
                    .ok_or_else(|| CredentialError::MissingField {
                        reference: reference.to_string(),
                        field: field.to_string(),
                    })
            })
            .collect()
    }
}

/// Fixed secrets held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, HashMap<String, String>>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret<I, K, V>(mut self, reference: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.secrets.insert(
            reference.into(),
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn resolve_credentials(
        &self,
        reference: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, String>, CredentialError> {
        let secret = self
            .secrets
            .get(reference)
            .ok_or_else(|| CredentialError::UnknownReference(reference.to_string()))?;
        fields
            .iter()
            .map(|field| {
                secret
                    .get(*field)
                    .map(|v| (field.to_string(), v.clone()))
                    .ok_or_else(|| CredentialError::MissingField {
                        reference: reference.to_string(),
                        field: field.to_string(),
                    })
            })
            .collect()
    }
}
