use std::path::Path;

use crate::error::ConfigurationError;
use crate::model::BuildNodeConfig;

use super::types::ExecutorConfig;

const LOCAL_CONFIG: &str = "tierbuild.toml";

/// Loads `./tierbuild.toml` if present, otherwise defaults, then applies env overrides.
pub fn load_default() -> anyhow::Result<ExecutorConfig> {
    let local_config = Path::new(LOCAL_CONFIG);
    let cfg = if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<ExecutorConfig>(&s)?
    } else {
        ExecutorConfig::default()
    };
    Ok(apply_env_overrides(cfg))
}

pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<ExecutorConfig> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<ExecutorConfig>(&s)?;
    Ok(apply_env_overrides(cfg))
}

fn apply_env_overrides(mut cfg: ExecutorConfig) -> ExecutorConfig {
    if let Ok(v) = std::env::var("TIERBUILD_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    if let Ok(v) = std::env::var("TIERBUILD_SHELL") {
        let parts: Vec<String> = v.split_whitespace().map(str::to_string).collect();
        if !parts.is_empty() {
            cfg.shell = parts;
        }
    }
    if let Ok(v) = std::env::var("TIERBUILD_CAPTURE_BYTES") {
        match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => cfg.capture_bytes = n,
            _ => tracing::warn!(value = %v, "ignoring invalid TIERBUILD_CAPTURE_BYTES"),
        }
    }
    cfg
}

/// Reads a build tree from a `.json` or `.toml` file (chosen by extension).
pub fn load_build_tree(path: impl AsRef<Path>) -> Result<BuildNodeConfig, ConfigurationError> {
    let path = path.as_ref();
    let s = std::fs::read_to_string(path)
        .map_err(|e| ConfigurationError::Io(format!("{}: {e}", path.display())))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    if is_toml {
        parse_build_tree_toml(&s)
    } else {
        parse_build_tree_json(&s)
    }
}

pub fn parse_build_tree_json(s: &str) -> Result<BuildNodeConfig, ConfigurationError> {
    serde_json::from_str(s).map_err(|e| ConfigurationError::Parse(e.to_string()))
}

pub fn parse_build_tree_toml(s: &str) -> Result<BuildNodeConfig, ConfigurationError> {
    toml::from_str(s).map_err(|e| ConfigurationError::Parse(e.to_string()))
}
