use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_RELATIVE_PATH: &str = ".tally/config.toml";

#[derive(Debug, Clone, Default)]
pub struct RepoConfig {
    pub storage_path: Option<PathBuf>,
    pub mirror_path: Option<PathBuf>,
    pub default_subject: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRepoConfig {
    version: Option<u32>,
    storage: Option<RawStorageConfig>,
    mirror: Option<RawMirrorConfig>,
    defaults: Option<RawDefaultsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStorageConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMirrorConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDefaultsConfig {
    subject: Option<String>,
}

pub fn config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_RELATIVE_PATH)
}

pub fn load_config(base: &Path) -> Result<Option<RepoConfig>> {
    let path = config_path(base);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let parsed: RawRepoConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(validate_config(parsed, &path)?))
}

fn validate_config(raw: RawRepoConfig, path: &Path) -> Result<RepoConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != 1 {
        bail!(
            "{} has unsupported version {version}; expected version = 1",
            path.display()
        );
    }

    Ok(RepoConfig {
        storage_path: raw
            .storage
            .and_then(|s| sanitize_optional(s.path))
            .map(PathBuf::from),
        mirror_path: raw
            .mirror
            .and_then(|m| sanitize_optional(m.path))
            .map(PathBuf::from),
        default_subject: raw.defaults.and_then(|d| sanitize_optional(d.subject)),
    })
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// XDG state dir, then `$HOME/.local/state`, then a repo-local fallback.
pub fn default_db_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tally").join("ledger.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("tally")
            .join("ledger.db");
    }
    PathBuf::from(".tally/ledger.db")
}
