// crates/todo-tracks-server/src/cli/scan.rs
// One-shot commands against a single repository

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use todo_tracks::Repository;
use todo_tracks::config::Settings;
use tracing::debug;

/// Open without background warm-up; one-shot commands compute only what they print
fn open(root: &Path, settings: &Settings) -> Result<Arc<Repository>> {
    let settings = Settings {
        warm_cache: false,
        ..settings.clone()
    };
    Ok(Repository::open(root, &settings)?)
}

pub async fn run_scan(root: &Path, settings: &Settings, revision: &str) -> Result<()> {
    let repo = open(root, settings)?;
    let revision = repo.resolve_revision(revision).await?;
    let markers = repo.revision_markers(&revision).await?;
    debug!(stats = ?repo.cache_stats(), "Scan complete");
    println!("{}", serde_json::to_string_pretty(&*markers)?);
    Ok(())
}

pub async fn run_status(
    root: &Path,
    settings: &Settings,
    revision: &str,
    file: &str,
    line: usize,
) -> Result<()> {
    let repo = open(root, settings)?;
    let revision = repo.resolve_revision(revision).await?;
    let id = repo.validate_marker(revision.as_str(), file, line).await?;
    let status = repo.marker_status(&id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn run_branches(root: &Path, settings: &Settings) -> Result<()> {
    let repo = open(root, settings)?;
    let aliases = repo.list_aliases().await?;
    println!("{}", serde_json::to_string_pretty(&aliases)?);
    Ok(())
}
