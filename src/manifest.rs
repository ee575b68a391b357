// ABOUTME: Image manifests mapping symbolic image names to pinned references.
// ABOUTME: Loads YAML manifests and registers their registries and images in a plan.

use crate::deploy::CREDENTIAL_FIELDS;
use crate::plan::{Image, Plan, ValidationError};
use crate::types::{Handle, ImageRef};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    /// Secret references, each resolving to a registry login.
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub images: Vec<ManifestImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestImage {
    pub name: String,
    pub destination: Destination,
}

/// Where a mirrored image lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Destination {
    pub domain: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub digest: String,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn image(&self, name: &str) -> Option<&ManifestImage> {
        self.images.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to load manifest {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("failed to retrieve credentials '{reference}': {source}")]
    Credentials {
        reference: String,
        #[source]
        source: crate::secrets::CredentialError,
    },

    #[error("no such image '{0}' in manifest")]
    NoSuchImage(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Loads manifests by path.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Manifest, ManifestError>;
}

/// Reads YAML manifests from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileManifestSource;

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn load(&self, path: &Path) -> Result<Manifest, ManifestError> {
        let load_error = |reason: String| ManifestError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_error(e.to_string()))?;
        Manifest::parse(&content).map_err(|e| load_error(e.to_string()))
    }
}

impl Plan {
    /// Build the image called `name` in the manifest at `path`.
    ///
    /// Every credential reference in the manifest becomes a registry for its
    /// domain unless the plan already has one. The image itself is reused if
    /// an identical reference was already registered.
    pub async fn image_from_manifest(
        &self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<Handle<Image>, ManifestError> {
        let path = path.as_ref();
        let manifest = self.manifests().load(path).await?;
        tracing::debug!(manifest = %path.display(), images = manifest.images.len(), "manifest loaded");

        for reference in &manifest.credentials {
            self.register_manifest_registry(reference).await?;
        }

        let entry = manifest
            .image(name)
            .ok_or_else(|| ManifestError::NoSuchImage(name.to_string()))?;
        let destination = &entry.destination;
        let reference = ImageRef::new(
            destination.domain.clone(),
            destination.name.clone(),
            destination.version.clone(),
            Some(destination.digest.clone()),
        )
        .map_err(|source| ValidationError::InvalidImage {
            reference: format!("{}/{}", destination.domain, destination.name),
            source,
        })?;

        if let Some(existing) = self.find_image(&reference) {
            return Ok(existing);
        }
        Ok(self.image_ref(reference).build()?)
    }

    async fn register_manifest_registry(&self, reference: &str) -> Result<(), ManifestError> {
        let secret = self
            .credentials()
            .resolve(reference, &CREDENTIAL_FIELDS)
            .await
            .map_err(|source| ManifestError::Credentials {
                reference: reference.to_string(),
                source,
            })?;
        let field = |name: &str| secret.get(name).cloned().unwrap_or_default();

        let domain = field("domain");
        if self.find_registry(domain.trim()).is_some() {
            return Ok(());
        }
        let _registry = self
            .registry(domain)
            .username(field("username"))
            .password(field("password"))
            .build()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
credentials:
  - mirror
images:
  - name: api
    destination:
      domain: registry.acme.dev
      name: mirror/api
      version: "1.4"
      digest: sha256:9b2a5f6e1c3d4b8a7f0e2d1c6b5a4f3e2d1c0b9a8f7e6d5c4b3a2f1e0d9c8b7a
"#;

    #[test]
    fn parses_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.credentials, vec!["mirror".to_string()]);
        let api = manifest.image("api").unwrap();
        assert_eq!(api.destination.domain, "registry.acme.dev");
        assert_eq!(api.destination.version.as_deref(), Some("1.4"));
        assert!(manifest.image("web").is_none());
    }

    #[test]
    fn sections_are_optional() {
        let manifest = Manifest::parse("images: []\n").unwrap();
        assert!(manifest.credentials.is_empty());
    }
}
