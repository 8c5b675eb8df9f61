// crates/todo-tracks-server/src/browse.rs
// Browse links for a file line: GitHub when a remote allows it, else the local raw view

use todo_tracks_types::Revision;

fn github_suffix(revision: &Revision, path: &str, line: usize) -> String {
    format!("/blob/{}/{}#L{}", revision, path, line)
}

/// Map one remote URL to its GitHub web root, if it is a GitHub remote
fn github_root(remote_url: &str) -> Option<String> {
    let repo = remote_url.strip_suffix(".git")?;
    if repo.starts_with("https://github.com/") {
        return Some(repo.to_string());
    }
    repo.strip_prefix("git@github.com:")
        .map(|name| format!("https://github.com/{}", name))
}

/// Local `/raw` link served by the dashboard server
pub fn raw_url(repo_id: &str, revision: &Revision, path: &str, line: usize) -> String {
    format!(
        "/raw?repo={}&revision={}&fileName={}&lineNumber={}",
        urlencoding::encode(repo_id),
        urlencoding::encode(revision.as_str()),
        urlencoding::encode(path),
        line
    )
}

/// Pick a browse URL from `git remote -v` output.
///
/// The first GitHub remote wins; without one (or when the remote listing
/// failed, `remotes == None`) the raw link is returned.
pub fn browse_url(
    remotes: Option<&str>,
    repo_id: &str,
    revision: &Revision,
    path: &str,
    line: usize,
) -> String {
    let github = remotes.and_then(|listing| {
        listing.lines().find_map(|remote| {
            let (_, rest) = remote.split_once('\t')?;
            let url = rest.split(' ').next()?;
            github_root(url)
        })
    });
    match github {
        Some(root) => root + &github_suffix(revision, path, line),
        None => raw_url(repo_id, revision, path, line),
    }
}
