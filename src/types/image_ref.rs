// ABOUTME: Image reference parsing into domain, name, version and digest parts.
// ABOUTME: Handles forms like ghcr.io/org/app:1.2@sha256:..., app@sha256:..., app:tag.

use std::fmt;
use thiserror::Error;

/// Registry used when a reference names no domain.
pub const DEFAULT_DOMAIN: &str = "docker.io";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),

    #[error("invalid digest '{0}': expected <algorithm>:<hex>")]
    InvalidDigest(String),
}

/// A parsed image reference. The digest may be absent here; plans only
/// accept references that carry one (see [`ImageRef::is_pinned`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    domain: String,
    name: String,
    version: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        version: Option<String>,
        digest: Option<String>,
    ) -> Result<Self, ParseImageRefError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ParseImageRefError::Empty);
        }
        if let Some(ref d) = digest {
            validate_digest(d)?;
        }
        let domain = domain.into().trim().to_ascii_lowercase();
        Ok(Self {
            domain: if domain.is_empty() {
                DEFAULT_DOMAIN.to_string()
            } else {
                domain
            },
            name,
            version: version.filter(|v| !v.is_empty()),
            digest,
        })
    }

    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !"/:.-_@".contains(*c))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (reference, digest) = match input.split_once('@') {
            Some((before, after)) => {
                validate_digest(after)?;
                (before, Some(after.to_string()))
            }
            None => (input, None),
        };

        // A colon after the last slash separates the version; one before it
        // belongs to a registry port.
        let (path, version) = match reference.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, Some(after.to_string())),
            _ => (reference, None),
        };

        // Registry hosts are case-insensitive; keep them lowercase.
        let (domain, name) = match path.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_ascii_lowercase(), rest.to_string())
            }
            _ => (DEFAULT_DOMAIN.to_string(), path.to_string()),
        };

        if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            domain,
            name,
            version,
            digest,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Whether the reference is content-addressed.
    pub fn is_pinned(&self) -> bool {
        self.digest.is_some()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.name)?;
        if let Some(ref version) = self.version {
            write!(f, ":{}", version)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

fn validate_digest(digest: &str) -> Result<(), ParseImageRefError> {
    let invalid = || ParseImageRefError::InvalidDigest(digest.to_string());
    let (algorithm, hex) = digest.split_once(':').ok_or_else(invalid)?;
    if algorithm.is_empty()
        || !algorithm.chars().all(|c| c.is_ascii_alphanumeric())
        || hex.is_empty()
        || !hex.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(invalid());
    }
    Ok(())
}
