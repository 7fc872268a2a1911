//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILDIG_CONFIG` (environment variable)
//! 2. `~/Library/Application Support/maildig/config.toml` (macOS)
//!    `~/.config/maildig/config.toml` (Linux)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MAILDIG_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Locations of the mail store.
    pub store: StoreConfig,
    /// Search limits.
    pub search: SearchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Locations of the mail store. Unset paths are derived from the home
/// directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the `V<N>` version directories
    /// (default: `~/Library/Mail`).
    pub mail_root: Option<PathBuf>,
    /// Index database (default: `<version root>/MailData/Envelope Index`).
    pub index_path: Option<PathBuf>,
    /// Account database (default: `~/Library/Accounts/Accounts4.sqlite`).
    pub accounts_path: Option<PathBuf>,
}

/// Search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result count when the caller does not give one.
    pub default_limit: usize,
    /// Upper bound on any requested result count.
    pub max_limit: usize,
    /// Characters of context on each side of an attachment match.
    pub snippet_radius: usize,
    /// Directory levels scanned when looking for container files.
    pub max_scan_depth: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
            snippet_radius: 80,
            max_scan_depth: 16,
        }
    }
}

impl SearchConfig {
    /// Apply the default and the upper bound to a requested limit.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration from `$MAILDIG_CONFIG` or the standard location.
///
/// A missing file gives the defaults silently; an unreadable or malformed
/// one gives the defaults with a warning.
pub fn load_config() -> Config {
    load_config_from(config_file_path())
}

/// Load configuration from `path`, with the same fallbacks as [`load_config`].
pub fn load_config_from(path: Option<PathBuf>) -> Config {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Config::default();
    };
    match read_config(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring config file, using defaults");
            Config::default()
        }
    }
}

/// Parse one config file.
pub fn read_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("maildig").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("maildig")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("maildig.log")
}

/// Mail data root, configured or `~/Library/Mail`.
pub fn mail_root(config: &Config) -> PathBuf {
    config.store.mail_root.clone().unwrap_or_else(|| {
        home_dir().join("Library").join("Mail")
    })
}

/// Account database, configured or `~/Library/Accounts/Accounts4.sqlite`.
pub fn accounts_path(config: &Config) -> PathBuf {
    config.store.accounts_path.clone().unwrap_or_else(|| {
        home_dir()
            .join("Library")
            .join("Accounts")
            .join("Accounts4.sqlite")
    })
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
