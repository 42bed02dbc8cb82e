use std::path::{Path, PathBuf};

use tracing::debug;

use crate::schema::{ConfigError, EnvsubstConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    ".kube-envsubst.toml",
    ".kube-envsubst.yaml",
    ".kube-envsubst.yml",
    ".kube-envsubst.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<EnvsubstConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&raw, path)?.cleaned(path)?;
    debug!(
        path = %path.display(),
        allowed_vars = config.allowed_vars.len(),
        allowed_prefixes = config.allowed_prefixes.len(),
        "loaded config"
    );
    Ok(config)
}

/// Find the first config file in `dir`.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Load the explicit config file if given, otherwise the first one found in
/// the working directory. Returns the default config when there is none.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<EnvsubstConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match find_config_file(Path::new(".")) {
        Some(path) => load_config(&path),
        None => {
            debug!("no config file found, using defaults");
            Ok(EnvsubstConfig::default())
        },
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<EnvsubstConfig, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
