// crates/todo-tracks-server/src/config/mod.rs
// Configuration layers: defaults < config file < environment < command line

pub mod env;
pub mod file;

pub use env::EnvConfig;
pub use file::TracksConfig;

use crate::error::{Result, TrackError};
use crate::markers::DEFAULT_MAX_CONCURRENCY;
use crate::pattern::{DEFAULT_TODO_REGEX, PatternMatcher};

pub const DEFAULT_CONTEXT_LINES: usize = 5;
pub const DEFAULT_PORT: u16 = 8080;

/// Effective settings for every repository handle in the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub todo_regex: String,
    /// Comma-separated path regexes excluded from revision scans
    pub exclude_paths: String,
    pub max_concurrency: usize,
    pub context_lines: usize,
    pub port: u16,
    /// Aggregate every branch head in the background when a repository opens
    pub warm_cache: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            todo_regex: DEFAULT_TODO_REGEX.to_string(),
            exclude_paths: String::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            context_lines: DEFAULT_CONTEXT_LINES,
            port: DEFAULT_PORT,
            warm_cache: true,
        }
    }
}

impl Settings {
    /// Defaults overlaid with the file, then the environment
    pub fn layered(file: &TracksConfig, env: &EnvConfig) -> Self {
        let defaults = Self::default();
        Self {
            todo_regex: env
                .todo_regex
                .clone()
                .or_else(|| file.scan.todo_regex.clone())
                .unwrap_or(defaults.todo_regex),
            exclude_paths: env
                .exclude_paths
                .clone()
                .or_else(|| file.scan.exclude_paths.clone())
                .unwrap_or(defaults.exclude_paths),
            max_concurrency: env
                .max_concurrency
                .or(file.scan.max_concurrency)
                .unwrap_or(defaults.max_concurrency),
            context_lines: file.scan.context_lines.unwrap_or(defaults.context_lines),
            port: env.port.or(file.server.port).unwrap_or(defaults.port),
            warm_cache: env
                .warm_cache
                .or(file.scan.warm_cache)
                .unwrap_or(defaults.warm_cache),
        }
    }

    /// Compile the marker and exclusion patterns, rejecting bad settings
    pub fn matcher(&self) -> Result<PatternMatcher> {
        if self.max_concurrency == 0 {
            return Err(TrackError::Config("max_concurrency must be at least 1".into()));
        }
        PatternMatcher::new(&self.todo_regex, &self.exclude_paths)
    }
}
