// crates/todo-tracks-server/src/config/file.rs
// File-based configuration from ~/.todo-tracks/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure
#[derive(Debug, Deserialize, Default)]
pub struct TracksConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Marker scanning section
#[derive(Debug, Deserialize, Default)]
pub struct ScanConfig {
    pub todo_regex: Option<String>,
    /// Comma-separated path regexes
    pub exclude_paths: Option<String>,
    pub max_concurrency: Option<usize>,
    /// Lines shown before and after a marker in its details
    pub context_lines: Option<usize>,
    pub warm_cache: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ServerConfig {
    pub port: Option<u16>,
}

impl TracksConfig {
    /// Load config from `path`, or ~/.todo-tracks/config.toml when none is given
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Get the default config file path
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".todo-tracks")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[scan]
todo_regex = "FIXME"
exclude_paths = "vendor/,node_modules/"
max_concurrency = 4

[server]
port = 9000
"#;
        let config: TracksConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.scan.todo_regex.as_deref(), Some("FIXME"));
        assert_eq!(config.scan.max_concurrency, Some(4));
        assert_eq!(config.scan.context_lines, None);
        assert_eq!(config.server.port, Some(9000));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: TracksConfig = toml::from_str("").unwrap();
        assert!(config.scan.todo_regex.is_none());
        assert!(config.server.port.is_none());
    }

    #[test]
    fn test_load_missing_and_invalid_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = TracksConfig::load(Some(dir.path().join("absent.toml").as_path()));
        assert!(missing.scan.max_concurrency.is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[scan\nmax_concurrency = ").unwrap();
        let config = TracksConfig::load(Some(bad.as_path()));
        assert!(config.scan.max_concurrency.is_none());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan]\ncontext_lines = 2\nwarm_cache = false\n").unwrap();
        let config = TracksConfig::load(Some(path.as_path()));
        assert_eq!(config.scan.context_lines, Some(2));
        assert_eq!(config.scan.warm_cache, Some(false));
    }
}
