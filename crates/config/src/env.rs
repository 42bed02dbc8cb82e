//! Read-only access to environment variables.
//!
//! The substitution engine never touches `std::env` directly; it goes through
//! [`EnvSource`] so callers can layer an env file over the process
//! environment and tests can inject a fixed map.

use std::{collections::BTreeMap, path::Path};

use tracing::debug;

use crate::schema::ConfigError;

/// Lookup and enumeration of environment variables.
pub trait EnvSource: Send + Sync {
    /// Value of `name`, or `None` when it is not defined.
    fn lookup(&self, name: &str) -> Option<String>;

    /// Every defined variable as `(name, value)` pairs.
    fn vars(&self) -> Vec<(String, String)>;
}

/// The environment of the current process.
///
/// Variables whose name or value is not valid UTF-8 are treated as undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var_os(name).and_then(|v| v.into_string().ok())
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

/// A fixed set of variables held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvSource for MapEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// An overlay of variables on top of a base source. Overlay values win.
pub struct LayeredEnv<B> {
    overlay: MapEnv,
    base: B,
}

impl<B: EnvSource> LayeredEnv<B> {
    pub fn new(overlay: MapEnv, base: B) -> Self {
        Self { overlay, base }
    }
}

impl<B: EnvSource> EnvSource for LayeredEnv<B> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.overlay
            .lookup(name)
            .or_else(|| self.base.lookup(name))
    }

    fn vars(&self) -> Vec<(String, String)> {
        let mut merged: BTreeMap<String, String> = self.base.vars().into_iter().collect();
        merged.extend(self.overlay.vars());
        merged.into_iter().collect()
    }
}

/// Parse a dotenv file into a [`MapEnv`] without mutating the process
/// environment.
pub fn load_env_file(path: &Path) -> Result<MapEnv, ConfigError> {
    let iter = dotenvy::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut env = MapEnv::new();
    for item in iter {
        let (name, value) = item.map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        env.insert(name, value);
    }
    debug!(path = %path.display(), count = env.len(), "loaded env file");
    Ok(env)
}
