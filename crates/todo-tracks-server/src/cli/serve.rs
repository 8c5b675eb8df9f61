// crates/todo-tracks-server/src/cli/serve.rs
// Discover repositories and serve the JSON API

use anyhow::{Result, bail};
use std::path::Path;
use todo_tracks::Repository;
use todo_tracks::config::Settings;
use todo_tracks::discover::find_repositories;
use todo_tracks::web;
use tracing::info;

pub async fn run_serve(root: &Path, settings: Settings) -> Result<()> {
    let paths = find_repositories(root);
    if paths.is_empty() {
        bail!("No git repositories found under {}", root.display());
    }

    let mut repos = Vec::with_capacity(paths.len());
    for path in &paths {
        let repo = Repository::open(path, &settings)?;
        info!(repo = %path.display(), id = repo.id(), "Serving repository");
        repos.push(repo);
    }

    let state = web::state::AppState::new(repos);
    let app = web::create_router(state);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("todo-tracks running on http://localhost:{}", settings.port);
    println!("todo-tracks running on http://localhost:{}", settings.port);

    axum::serve(listener, app).await?;

    Ok(())
}
