//! Selective environment substitution for manifests.
//!
//! The engine ([`Envsubst`]) replaces only allow-listed `$VAR` / `${VAR}`
//! placeholders. This crate also owns the environment accessor and the
//! `.kube-envsubst.*` config file.

pub mod env;
pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    env::{EnvSource, LayeredEnv, MapEnv, ProcessEnv, load_env_file},
    env_subst::{AllowList, Coverage, Envsubst, SubstError},
    loader::{discover_and_load, find_config_file, load_config},
    schema::{ConfigError, EnvsubstConfig, clean_names},
};
