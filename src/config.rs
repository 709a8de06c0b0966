use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GameLensError, GameLensResult};

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "GAMELENS_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub saliency: SaliencyConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Longest side of the working canvas the detector runs on.
    #[serde(default = "default_max_dim")]
    pub max_dim: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_dim: default_max_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaliencyConfig {
    #[serde(default = "default_max_dim")]
    pub max_dim: u32,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            max_dim: default_max_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Run saliency analysis on a dedicated worker thread when available.
    #[serde(default = "default_true")]
    pub background: bool,
    /// How long to wait for the worker before falling back to inline execution.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            background: true,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_max_dim() -> u32 {
    400
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> GameLensResult<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found via {}", CONFIG_ENV_VAR);
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{} points at a missing file", CONFIG_ENV_VAR);
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("gamelens").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(GameLensError::Config(
        "config.toml not found via GAMELENS_CONFIG, next to executable, in working directory or user config dir".into(),
    ))
}

pub fn load_config() -> GameLensResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> GameLensResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        background = config.executor.background,
        "config loaded"
    );
    Ok(config)
}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> GameLensResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if config.detection.max_dim == 0 || config.saliency.max_dim == 0 {
        return Err(GameLensError::Config("max_dim must be positive".into()));
    }
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> GameLensResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.detection.max_dim, 400);
        assert_eq!(cfg.saliency.max_dim, 400);
        assert!(cfg.executor.background);
        assert_eq!(cfg.executor.timeout_ms, 15_000);
    }

    #[test]
    fn partial_sections_override_only_given_keys() {
        let cfg = parse_config("[executor]\nbackground = false\n\n[saliency]\nmax_dim = 256\n").unwrap();
        assert!(!cfg.executor.background);
        assert_eq!(cfg.executor.timeout_ms, 15_000);
        assert_eq!(cfg.saliency.max_dim, 256);
        assert_eq!(cfg.detection.max_dim, 400);
    }

    #[test]
    fn zero_max_dim_is_rejected() {
        let err = parse_config("[detection]\nmax_dim = 0\n").unwrap_err();
        assert!(matches!(err, GameLensError::Config(_)));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let path = std::env::temp_dir().join(format!("gamelens-config-{}.toml", std::process::id()));
        let mut cfg = AppConfig::default();
        cfg.executor.timeout_ms = 2_500;
        cfg.detection.max_dim = 320;
        save_config(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.executor.timeout_ms, 2_500);
        assert_eq!(loaded.detection.max_dim, 320);
    }
}
