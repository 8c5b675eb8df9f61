// crates/todo-tracks-server/src/web/state.rs
// Web server state: the served repositories, keyed by repo id

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, TrackError};
use crate::repository::Repository;
use todo_tracks_types::RepoSummary;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repos: Arc<BTreeMap<String, Arc<Repository>>>,
}

impl AppState {
    pub fn new(repos: Vec<Arc<Repository>>) -> Self {
        let repos = repos
            .into_iter()
            .map(|repo| (repo.id().to_string(), repo))
            .collect();
        Self {
            repos: Arc::new(repos),
        }
    }

    /// Look up the repository a request names.
    ///
    /// The id may be omitted when exactly one repository is served.
    pub fn repo(&self, id: Option<&str>) -> Result<Arc<Repository>> {
        match id {
            Some(id) => self
                .repos
                .get(id)
                .cloned()
                .ok_or_else(|| TrackError::InvalidInput(format!("unknown repository '{}'", id))),
            None if self.repos.len() == 1 => self
                .repos
                .values()
                .next()
                .cloned()
                .ok_or_else(|| TrackError::InvalidInput("no repositories served".into())),
            None => Err(TrackError::InvalidInput(
                "missing required parameter 'repo'".into(),
            )),
        }
    }

    /// Served repositories, sorted by path
    pub fn summaries(&self) -> Vec<RepoSummary> {
        let mut summaries: Vec<RepoSummary> = self.repos.values().map(|r| r.summary()).collect();
        summaries.sort_by(|a, b| a.path.cmp(&b.path));
        summaries
    }
}
