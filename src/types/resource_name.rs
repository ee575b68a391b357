// ABOUTME: Validated names for hosts, networks, volumes and containers.
// ABOUTME: Accepts the character set the Docker engine allows for object names.

use std::fmt;
use thiserror::Error;

/// Docker rejects longer object names on some storage drivers.
const MAX_LEN: usize = 128;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceNameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("name must start with a letter or digit")]
    InvalidStart,

    #[error("invalid character in name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(value: &str) -> Result<Self, ResourceNameError> {
        let Some(first) = value.chars().next() else {
            return Err(ResourceNameError::Empty);
        };

        if value.len() > MAX_LEN {
            return Err(ResourceNameError::TooLong);
        }

        if !first.is_ascii_alphanumeric() {
            return Err(ResourceNameError::InvalidStart);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        {
            return Err(ResourceNameError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
