// crates/todo-tracks-server/src/main.rs
// todo-tracks - TODO markers tracked across git branches

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env files (global first, then project - project overrides)
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".todo-tracks/.env"));
    }
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Server logs progress; one-shot commands keep stderr quiet
    let log_level = if cli.global.verbose {
        Level::DEBUG
    } else {
        match &cli.command {
            Some(Commands::Serve { .. }) | None => Level::INFO,
            Some(_) => Level::WARN,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut settings = cli.global.settings();
    let root = cli.global.repo_root();

    match cli.command {
        None => {
            cli::run_serve(&root, settings).await?;
        }
        Some(Commands::Serve { port, no_warm }) => {
            if let Some(port) = port {
                settings.port = port;
            }
            if no_warm {
                settings.warm_cache = false;
            }
            cli::run_serve(&root, settings).await?;
        }
        Some(Commands::Scan { revision }) => {
            cli::run_scan(&root, &settings, &revision).await?;
        }
        Some(Commands::Status {
            revision,
            file,
            line,
        }) => {
            cli::run_status(&root, &settings, &revision, &file, line).await?;
        }
        Some(Commands::Branches) => {
            cli::run_branches(&root, &settings).await?;
        }
    }

    Ok(())
}
