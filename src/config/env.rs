// ABOUTME: Environment lookup for plan programs, backed by an optional .env file.
// ABOUTME: Process variables always win over values read from the file.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Parse `.env` content: `KEY=value` lines, optional `export ` prefix,
/// `#` comments, and single- or double-quoted values.
pub fn parse_env_file(content: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();

    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::InvalidEnvFile(format!("line {}: expected KEY=value", number + 1))
        })?;
        let key = key.trim();
        if key.is_empty() || key.chars().any(|c| !c.is_ascii_alphanumeric() && c != '_') {
            return Err(Error::InvalidEnvFile(format!(
                "line {}: invalid variable name '{}'",
                number + 1,
                key
            )));
        }

        vars.insert(key.to_string(), unquote(value.trim()));
    }

    Ok(vars)
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            let inner = &value[1..value.len() - 1];
            return if quote == '"' {
                inner.replace("\\n", "\n").replace("\\\"", "\"")
            } else {
                inner.to_string()
            };
        }
    }
    // Unquoted values may carry a trailing comment.
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Variables visible to a plan program.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    file: HashMap<String, String>,
}

impl Environment {
    /// Environment backed only by process variables.
    pub fn process() -> Self {
        Self::default()
    }

    /// Load a `.env` file as a fallback layer under the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(Self {
            file: parse_env_file(&content)?,
        })
    }

    /// Like [`Environment::load`], but a missing file yields the process environment.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Ok(Self {
                file: parse_env_file(&content)?,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::process()),
            Err(e) => Err(e.into()),
        }
    }

    /// Required variable. Empty values are allowed.
    pub fn get(&self, key: &str) -> Result<String> {
        self.var(key)
            .ok_or_else(|| Error::MissingEnvVar(key.to_string()))
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.var(key).unwrap_or_else(|| default.to_string())
    }

    /// Process variable, else the file's value.
    pub fn var(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.file.get(key).cloned())
    }
}
