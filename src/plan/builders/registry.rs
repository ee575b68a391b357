// ABOUTME: Builder for registries: a domain plus inline or secret-store credentials.
// ABOUTME: Images and containers from that domain gain an implicit edge to it.

use super::{Dependency, resolve_dependencies};
use crate::plan::error::ValidationError;
use crate::plan::resource::{Registry, RegistryCredentials, Resource, ResourceKind};
use crate::plan::Plan;
use crate::types::Handle;

const KIND: ResourceKind = ResourceKind::Registry;

#[must_use = "builders do nothing until build() is called"]
pub struct RegistryBuilder<'p> {
    plan: &'p Plan,
    domain: String,
    username: Option<String>,
    password: Option<String>,
    secret: Option<String>,
    depends_on: Vec<Dependency>,
}

impl<'p> RegistryBuilder<'p> {
    pub(crate) fn new(plan: &'p Plan, domain: impl Into<String>) -> Self {
        Self {
            plan,
            domain: domain.into(),
            username: None,
            password: None,
            secret: None,
            depends_on: Vec::new(),
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Resolve username and password through the plan's secret store.
    pub fn secret(mut self, reference: impl Into<String>) -> Self {
        self.secret = Some(reference.into());
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn build(self) -> Result<Handle<Registry>, ValidationError> {
        let plan = self.plan;
        plan.register(|_| {
            let domain = self.domain.trim().to_ascii_lowercase();
            if domain.is_empty() {
                return Err(ValidationError::MissingField {
                    kind: KIND,
                    name: self.domain.clone(),
                    field: "domain",
                });
            }
            if domain.contains('/') || domain.contains(char::is_whitespace) {
                return Err(ValidationError::field(
                    KIND,
                    &self.domain,
                    "domain",
                    "expected a bare host[:port]",
                ));
            }

            let credentials = match (self.username, self.password, self.secret) {
                (Some(username), Some(password), None) => {
                    RegistryCredentials::Inline { username, password }
                }
                (None, None, Some(reference)) if !reference.trim().is_empty() => {
                    RegistryCredentials::Secret { reference }
                }
                (None, None, None) => {
                    return Err(ValidationError::MissingField {
                        kind: KIND,
                        name: domain,
                        field: "credentials",
                    });
                }
                (_, _, Some(_)) => {
                    return Err(ValidationError::field(
                        KIND,
                        &domain,
                        "credentials",
                        "use either username/password or a secret reference",
                    ));
                }
                (Some(_), None, None) => {
                    return Err(ValidationError::MissingField {
                        kind: KIND,
                        name: domain,
                        field: "password",
                    });
                }
                (None, Some(_), None) => {
                    return Err(ValidationError::MissingField {
                        kind: KIND,
                        name: domain,
                        field: "username",
                    });
                }
            };

            let dependencies = resolve_dependencies(plan, &self.depends_on)?;
            Ok((
                Resource::Registry(Registry {
                    domain,
                    credentials,
                }),
                dependencies,
            ))
        })
    }
}
