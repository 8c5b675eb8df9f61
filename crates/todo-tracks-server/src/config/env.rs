// crates/todo-tracks-server/src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use tracing::{debug, warn};

/// Overrides read from TODO_TRACKS_* environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// TODO_TRACKS_REGEX
    pub todo_regex: Option<String>,
    /// TODO_TRACKS_EXCLUDE
    pub exclude_paths: Option<String>,
    /// TODO_TRACKS_MAX_CONCURRENCY
    pub max_concurrency: Option<usize>,
    /// TODO_TRACKS_PORT
    pub port: Option<u16>,
    /// TODO_TRACKS_WARM_CACHE
    pub warm_cache: Option<bool>,
}

impl EnvConfig {
    /// Load all environment configuration (call once at startup)
    pub fn load() -> Self {
        let config = Self::from_lookup(|name| std::env::var(name).ok());
        debug!(config = ?config, "Loaded environment configuration");
        config
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            todo_regex: read("TODO_TRACKS_REGEX"),
            exclude_paths: read("TODO_TRACKS_EXCLUDE"),
            max_concurrency: read("TODO_TRACKS_MAX_CONCURRENCY")
                .and_then(|v| parse_number("TODO_TRACKS_MAX_CONCURRENCY", &v)),
            port: read("TODO_TRACKS_PORT").and_then(|v| parse_number("TODO_TRACKS_PORT", &v)),
            warm_cache: read("TODO_TRACKS_WARM_CACHE").and_then(|v| parse_bool(&v)),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(var = name, value, "Ignoring non-numeric environment value");
            None
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
