//! Server configuration.
//!
//! Three layers, highest priority first:
//!   1. CLI flags / environment (clap, `TASKD_*`)
//!   2. optional TOML file (`--config`, default `taskd.toml`)
//!   3. built-in defaults
//!
//! A missing database connection string is deliberately not an error: the
//! server still starts, logs a warning, and store-backed routes answer 500
//! until one is configured.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SLOW_QUERY_MS: u64 = 100;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML file ───────────────────────────────────────────────────────────────

/// File-level overrides. Every field is optional; absent fields fall
/// through to the defaults.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 3000).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// SQLite connection string, e.g. "sqlite://taskd.db?mode=rwc".
    database_url: Option<String>,
    /// Log level filter, e.g. "debug" or "info,taskd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) or "json".
    log_format: Option<String>,
    /// Warn about SQLite statements slower than this many milliseconds
    /// (0 disables; default: 100).
    slow_query_threshold_ms: Option<u64>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config file, using defaults");
            None
        }
    }
}

// ─── Resolved config ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    /// `None` means run without storage.
    pub database_url: Option<String>,
    pub log: String,
    /// "pretty" or "json".
    pub log_format: String,
    pub slow_query_threshold_ms: u64,
}

impl ServerConfig {
    /// Layer CLI/env values over the TOML file over the defaults.
    pub fn new(
        port: Option<u16>,
        bind_address: Option<String>,
        database_url: Option<String>,
        log: Option<String>,
        config_file: Option<PathBuf>,
    ) -> Self {
        let path = config_file.unwrap_or_else(|| PathBuf::from("taskd.toml"));
        let toml = load_toml(&path).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let bind_address = bind_address
            .filter(|s| !s.is_empty())
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);
        // An empty or whitespace-only connection string counts as unset.
        let database_url = database_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or(toml.database_url.filter(|s| !s.trim().is_empty()));
        let log = log
            .filter(|s| !s.is_empty())
            .or(toml.log)
            .unwrap_or_else(|| "info".to_string());
        let log_format = std::env::var("TASKD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());
        let slow_query_threshold_ms =
            toml.slow_query_threshold_ms.unwrap_or(DEFAULT_SLOW_QUERY_MS);

        Self {
            port,
            bind_address,
            database_url,
            log,
            log_format,
            slow_query_threshold_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let config = ServerConfig::new(None, None, None, None, Some(PathBuf::from("/nonexistent")));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert!(config.database_url.is_none());
        assert_eq!(config.log, "info");
    }

    #[test]
    fn cli_overrides_toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskd.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "port = 4000\nlog = \"debug\"").unwrap();

        let config = ServerConfig::new(Some(5000), None, None, None, Some(path.clone()));
        assert_eq!(config.port, 5000); // CLI wins
        assert_eq!(config.log, "debug"); // TOML fills the gap

        let config = ServerConfig::new(None, None, None, None, Some(path));
        assert_eq!(config.port, 4000); // TOML wins over default
    }

    #[test]
    fn blank_database_url_counts_as_unset() {
        let config = ServerConfig::new(
            None,
            None,
            Some("   ".to_string()),
            None,
            Some(PathBuf::from("/nonexistent")),
        );
        assert!(config.database_url.is_none());
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskd.toml");
        std::fs::write(&path, "port = [not toml").unwrap();

        let config = ServerConfig::new(None, None, None, None, Some(path));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
