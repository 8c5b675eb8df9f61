// crates/todo-tracks-server/src/git/mod.rs
// Version-control backend boundary
//
// - VcsBackend: raw textual queries the core depends on
// - cli: the implementation that shells out to `git`
// - memory: an in-process commit graph rendering the same output grammar
// - parse: the output grammar (branch listing, ls-tree, porcelain blame, log, patches)

mod cli;
mod memory;
pub mod parse;

pub use cli::GitCli;
pub use memory::{CallCounts, MemoryBackend};

use crate::error::{Result, TrackError};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;
use todo_tracks_types::{BlobId, Revision};
use tokio::process::Command;
use tracing::debug;

/// Single-valued commit metadata fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionField {
    Subject,
    AuthorName,
    AuthorEmail,
    Timestamp,
}

impl RevisionField {
    /// `git show --format` placeholder for this field
    pub fn format(self) -> &'static str {
        match self {
            RevisionField::Subject => "%s",
            RevisionField::AuthorName => "%an",
            RevisionField::AuthorEmail => "%ae",
            RevisionField::Timestamp => "%ct",
        }
    }
}

/// Queries the marker pipeline issues against version control.
///
/// Every method returns the backend's raw text; parsing lives in [`parse`] so
/// that all implementations are held to the same grammar. A failing query is
/// an internal error, except where the method documents a boolean answer.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Working directory of the repository
    fn root(&self) -> &Path;

    /// `git branch -av` style listing, one ref per line
    async fn list_branches(&self) -> Result<String>;

    /// `git ls-tree -r -z` listing for a revision, NUL-terminated records
    async fn list_tree(&self, revision: &Revision) -> Result<String>;

    /// Raw bytes of one blob
    async fn read_blob(&self, blob: &BlobId) -> Result<Vec<u8>>;

    /// Porcelain attribution of the single 1-based `line` of `path` at `revision`
    async fn blame_line(&self, revision: &Revision, path: &str, line: usize) -> Result<String>;

    async fn revision_field(&self, revision: &Revision, field: RevisionField) -> Result<String>;

    /// One-line log of commits whose patch changes the number of occurrences
    /// of `text`, reachable from `include` but not from `exclude`
    async fn search_history(
        &self,
        text: &[u8],
        exclude: &Revision,
        include: &[Revision],
    ) -> Result<String>;

    /// Full patch of one commit, bytes as stored
    async fn show_commit(&self, revision: &Revision) -> Result<Vec<u8>>;

    /// Whether `ancestor` is part of `descendant`'s history (a revision is its own ancestor)
    async fn is_ancestor(&self, ancestor: &Revision, descendant: &Revision) -> Result<bool>;

    /// Whether `revision` names an existing commit
    async fn revision_exists(&self, revision: &str) -> Result<bool>;

    /// `git remote -v` listing
    async fn list_remotes(&self) -> Result<String>;
}

/// Validate that a git ref doesn't look like a CLI flag (defense-in-depth)
pub(crate) fn validate_ref(r: &str) -> Result<()> {
    if r.starts_with('-') {
        return Err(TrackError::InvalidRevision(format!("Invalid git ref: '{}'", r)));
    }
    if r.contains('\0') || r.contains('\n') || r.contains('\r') {
        return Err(TrackError::InvalidRevision(
            "Invalid git ref: contains forbidden characters".to_string(),
        ));
    }
    Ok(())
}

fn display_args<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|a| a.as_ref().to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run git and hand back the raw process output, whatever the exit status.
pub(crate) async fn run_git<S: AsRef<OsStr>>(project_path: &Path, args: &[S]) -> Result<Output> {
    debug!(args = %display_args(args), "git");
    Command::new("git")
        .args(args)
        .current_dir(project_path)
        .output()
        .await
        .map_err(|e| TrackError::Git(format!("Failed to run git {}: {}", display_args(args), e)))
}

/// Run a git command and return stdout bytes, or an error on non-zero exit.
pub(crate) async fn git_cmd_bytes<S: AsRef<OsStr>>(project_path: &Path, args: &[S]) -> Result<Vec<u8>> {
    let output = run_git(project_path, args).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TrackError::Git(format!(
            "git {} failed: {}",
            display_args(args),
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Run a git command and return its untrimmed stdout as text.
pub(crate) async fn git_cmd_raw<S: AsRef<OsStr>>(project_path: &Path, args: &[S]) -> Result<String> {
    let stdout = git_cmd_bytes(project_path, args).await?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

/// Run a git command and return trimmed stdout, or an error.
pub(crate) async fn git_cmd<S: AsRef<OsStr>>(project_path: &Path, args: &[S]) -> Result<String> {
    Ok(git_cmd_raw(project_path, args).await?.trim().to_string())
}
