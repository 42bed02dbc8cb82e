//! Config file schema and the errors raised while loading it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env_subst::AllowList;

/// Root configuration, as read from `.kube-envsubst.{toml,yaml,yml,json}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvsubstConfig {
    /// Variable names allowed for substitution.
    #[serde(alias = "allowedVars")]
    pub allowed_vars: Vec<String>,

    /// Variable name prefixes allowed for substitution.
    #[serde(alias = "allowedPrefixes")]
    pub allowed_prefixes: Vec<String>,

    /// Fail on allow-listed variables that are undefined. Defaults to true.
    pub strict: Option<bool>,
}

impl EnvsubstConfig {
    /// Overlay command-line values. Non-empty lists replace the file's lists,
    /// an explicit strict flag replaces the file's setting.
    pub fn merge_with(
        &self,
        allowed_vars: Vec<String>,
        allowed_prefixes: Vec<String>,
        strict: Option<bool>,
    ) -> EnvsubstConfig {
        EnvsubstConfig {
            allowed_vars: if allowed_vars.is_empty() {
                self.allowed_vars.clone()
            } else {
                allowed_vars
            },
            allowed_prefixes: if allowed_prefixes.is_empty() {
                self.allowed_prefixes.clone()
            } else {
                allowed_prefixes
            },
            strict: strict.or(self.strict),
        }
    }

    /// Trim allow-list entries and drop blank ones. A list that only held
    /// blank entries is rejected: an empty prefix would cover every name.
    pub fn cleaned(self, path: &Path) -> Result<EnvsubstConfig, ConfigError> {
        let empty = |field: &'static str| ConfigError::EmptyList {
            path: path.to_path_buf(),
            field,
        };
        Ok(EnvsubstConfig {
            allowed_vars: clean_names(&self.allowed_vars).ok_or_else(|| empty("allowedVars"))?,
            allowed_prefixes: clean_names(&self.allowed_prefixes)
                .ok_or_else(|| empty("allowedPrefixes"))?,
            strict: self.strict,
        })
    }

    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.allowed_vars.clone(), self.allowed_prefixes.clone())
    }
}

/// Trim every entry and drop the blank ones. Returns `None` when `values`
/// was non-empty but nothing survived.
pub fn clean_names(values: &[String]) -> Option<Vec<String>> {
    let cleaned: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if !values.is_empty() && cleaned.is_empty() {
        return None;
    }
    Some(cleaned)
}

/// Errors from config and env-file loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{field} in {} holds only blank entries", path.display())]
    EmptyList { path: PathBuf, field: &'static str },

    #[error("unsupported config format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to load env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
}
