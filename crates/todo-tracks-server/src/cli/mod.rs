// crates/todo-tracks-server/src/cli/mod.rs
// CLI module for todo-tracks commands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use todo_tracks::config::{EnvConfig, Settings, TracksConfig};

pub mod scan;
pub mod serve;

pub use scan::{run_branches, run_scan, run_status};
pub use serve::run_serve;

#[derive(Parser)]
#[command(name = "todo-tracks")]
#[command(about = "Track TODO markers across the branches of git repositories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the JSON API for every repository under the root (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip aggregating branch heads at startup
        #[arg(long)]
        no_warm: bool,
    },

    /// Print the markers of one revision as JSON
    Scan {
        /// Branch name or full revision hash
        #[arg(short, long)]
        revision: String,
    },

    /// Print the per-branch status of one marker as JSON
    Status {
        /// Branch name or full revision hash the marker was seen at
        #[arg(short, long)]
        revision: String,

        /// Path of the file holding the marker
        #[arg(short, long)]
        file: String,

        /// 1-based line number of the marker
        #[arg(short, long)]
        line: usize,
    },

    /// Print the branch heads as JSON
    Branches,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Repository (scan/status/branches) or directory searched for repositories (serve)
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,

    /// Regex a line must match to count as a marker
    #[arg(long, global = true)]
    pub todo_regex: Option<String>,

    /// Comma-separated regexes of paths to skip
    #[arg(long, global = true)]
    pub exclude_paths: Option<String>,

    /// Maximum concurrent per-file extractions
    #[arg(long, global = true)]
    pub max_concurrency: Option<usize>,

    /// Config file (default: ~/.todo-tracks/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Defaults < config file < environment < flags
    pub fn settings(&self) -> Settings {
        let file = TracksConfig::load(self.config.as_deref());
        let mut settings = Settings::layered(&file, &EnvConfig::load());
        if let Some(regex) = &self.todo_regex {
            settings.todo_regex = regex.clone();
        }
        if let Some(excludes) = &self.exclude_paths {
            settings.exclude_paths = excludes.clone();
        }
        if let Some(max) = self.max_concurrency {
            settings.max_concurrency = max;
        }
        settings
    }

    pub fn repo_root(&self) -> PathBuf {
        self.repo_root.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }
}
