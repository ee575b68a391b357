// ABOUTME: Plan-lifetime memo over the secret store.
// ABOUTME: Concurrent workers asking for the same secret share one resolution, success or failure.

use crate::plan::{Registry, RegistryCredentials};
use crate::runtime::RegistryAuth;
use crate::secrets::{CredentialError, SecretStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Fields requested for registry logins.
pub const REGISTRY_FIELDS: [&str; 2] = ["username", "password"];

/// Every field a credential reference may carry. The memo fetches all of
/// them in one lookup per reference.
pub const CREDENTIAL_FIELDS: [&str; 3] = ["username", "password", "domain"];

/// Fields a secret may lack. Registry-only secrets carry no `domain`.
const OPTIONAL_FIELDS: [&str; 1] = ["domain"];

type Resolved = Result<Arc<HashMap<String, String>>, CredentialError>;

/// One secret store lookup per reference, shared by every caller.
pub struct CredentialMemo {
    store: Arc<dyn SecretStore>,
    cells: Mutex<HashMap<String, Arc<OnceCell<Resolved>>>>,
}

impl std::fmt::Debug for CredentialMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialMemo")
            .field("resolved", &self.cells.lock().len())
            .finish()
    }
}

impl CredentialMemo {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `fields` of `reference`. The first call fetches every field in
    /// [`CREDENTIAL_FIELDS`]; later calls, whatever fields they ask for, are
    /// answered from that result. Fields outside that set are never found.
    pub async fn resolve(
        &self,
        reference: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, String>, CredentialError> {
        let cell = Arc::clone(self.cells.lock().entry(reference.to_string()).or_default());
        let secret = cell
            .get_or_init(|| self.fetch(reference))
            .await
            .clone()?;

        fields
            .iter()
            .map(|field| {
                secret
                    .get(*field)
                    .map(|value| (field.to_string(), value.clone()))
                    .ok_or_else(|| CredentialError::MissingField {
                        reference: reference.to_string(),
                        field: field.to_string(),
                    })
            })
            .collect()
    }

    /// Asks the store for every credential field, dropping optional ones the
    /// secret does not have.
    async fn fetch(&self, reference: &str) -> Resolved {
        tracing::debug!(reference, "resolving credentials");
        let mut fields = CREDENTIAL_FIELDS.to_vec();
        let resolved = loop {
            match self.store.resolve_credentials(reference, &fields).await {
                Err(CredentialError::MissingField { field, .. })
                    if OPTIONAL_FIELDS.contains(&field.as_str())
                        && fields.contains(&field.as_str()) =>
                {
                    fields.retain(|f| *f != field);
                }
                other => break other.map(Arc::new),
            }
        };
        if let Err(ref e) = resolved {
            tracing::warn!(reference, error = %e, "credential resolution failed");
        }
        resolved
    }

    /// Login for `registry`, resolving secret references through the store.
    pub async fn registry_auth(&self, registry: &Registry) -> Result<RegistryAuth, CredentialError> {
        let (username, password) = match registry.credentials() {
            RegistryCredentials::Inline { username, password } => {
                (username.clone(), password.clone())
            }
            RegistryCredentials::Secret { reference } => {
                let fields = self.resolve(reference, &REGISTRY_FIELDS).await?;
                let field = |name: &str| {
                    fields
                        .get(name)
                        .cloned()
                        .ok_or_else(|| CredentialError::MissingField {
                            reference: reference.clone(),
                            field: name.to_string(),
                        })
                };
                (field("username")?, field("password")?)
            }
        };
        Ok(RegistryAuth {
            server: registry.domain().to_string(),
            username,
            password,
        })
    }
}
