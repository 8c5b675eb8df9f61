// crates/todo-tracks-server/src/discover.rs
// Find git working trees below a directory

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Stable identifier for a repository path: first 16 hex chars of its SHA-256
pub fn repo_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Every directory under `root` (inclusive) holding a `.git` directory.
///
/// The walk does not descend into a repository once found, so nested
/// checkouts and submodules are not reported separately.
pub fn find_repositories(root: &Path) -> Vec<PathBuf> {
    let mut repos = Vec::new();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.path().join(".git").is_dir() {
            debug!(path = %entry.path().display(), "Found repository");
            repos.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }

    repos.sort();
    repos
}
