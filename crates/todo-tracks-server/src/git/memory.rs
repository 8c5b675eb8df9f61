// crates/todo-tracks-server/src/git/memory.rs
// In-process commit graph that renders git's output grammar
//
// Used as the test double for the marker pipeline. Queries are answered by
// rendering the same text git would print, so every test also exercises the
// parsers in `parse`.

use super::{RevisionField, VcsBackend};
use crate::error::{Result, TrackError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use todo_tracks_types::{BlobId, Revision};

/// First commit timestamp; later commits are a minute apart
const BASE_TIMESTAMP: i64 = 1_400_000_000;

#[derive(Debug, Clone)]
struct Commit {
    parents: Vec<Revision>,
    files: BTreeMap<String, BlobId>,
    subject: String,
    author_name: String,
    author_email: String,
    timestamp: i64,
}

#[derive(Debug, Default)]
struct Graph {
    commits: HashMap<Revision, Commit>,
    /// Creation order, oldest first
    order: Vec<Revision>,
    blobs: HashMap<BlobId, String>,
    branches: BTreeMap<String, Revision>,
    head: Option<String>,
    remotes: Vec<(String, String)>,
    scripted_blames: HashMap<(Revision, String, usize), String>,
}

/// How often each query has run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub branch_listings: usize,
    pub tree_listings: usize,
    pub blob_reads: usize,
    pub blames: usize,
    pub history_searches: usize,
    pub commit_patches: usize,
    pub ancestry_checks: usize,
}

#[derive(Debug, Default)]
struct Counters {
    branch_listings: AtomicUsize,
    tree_listings: AtomicUsize,
    blob_reads: AtomicUsize,
    blames: AtomicUsize,
    history_searches: AtomicUsize,
    commit_patches: AtomicUsize,
    ancestry_checks: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())[..40].to_string()
}

/// In-memory [`VcsBackend`] built from explicit file snapshots.
///
/// ```ignore
/// let backend = MemoryBackend::new("/repo");
/// let r1 = backend.commit(&[], &[("file.txt", "// TODO fix\n")], "Add TODO");
/// backend.set_branch("main", &r1);
/// ```
#[derive(Debug)]
pub struct MemoryBackend {
    root: PathBuf,
    graph: RwLock<Graph>,
    counters: Counters,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            graph: RwLock::new(Graph::default()),
            counters: Counters::default(),
            latency: None,
        }
    }

    /// Delay every query, to widen race windows in concurrency tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Record a commit whose tree is exactly `files` (path, content).
    pub fn commit(&self, parents: &[&Revision], files: &[(&str, &str)], subject: &str) -> Revision {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);

        let mut tree = BTreeMap::new();
        for (path, content) in files {
            let blob = BlobId::new(digest(&["blob", content]));
            graph.blobs.insert(blob.clone(), content.to_string());
            tree.insert(path.to_string(), blob);
        }

        let sequence = graph.order.len().to_string();
        let mut parts: Vec<&str> = vec!["commit", subject, &sequence];
        parts.extend(parents.iter().map(|p| p.as_str()));
        for (path, blob) in &tree {
            parts.push(path);
            parts.push(blob.as_str());
        }
        let revision = Revision::new(digest(&parts));

        let commit = Commit {
            parents: parents.iter().map(|p| (*p).clone()).collect(),
            files: tree,
            subject: subject.to_string(),
            author_name: "Test User".to_string(),
            author_email: "test@example.com".to_string(),
            timestamp: BASE_TIMESTAMP + graph.order.len() as i64 * 60,
        };
        graph.commits.insert(revision.clone(), commit);
        graph.order.push(revision.clone());
        revision
    }

    /// Point a branch at a revision; the first branch created is the current one
    pub fn set_branch(&self, name: &str, revision: &Revision) {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        graph.branches.insert(name.to_string(), revision.clone());
        if graph.head.is_none() {
            graph.head = Some(name.to_string());
        }
    }

    pub fn add_remote(&self, name: &str, url: &str) {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        graph.remotes.push((name.to_string(), url.to_string()));
    }

    /// Answer one attribution query with fixed porcelain text
    pub fn script_blame(&self, revision: &Revision, path: &str, line: usize, porcelain: &str) {
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        graph
            .scripted_blames
            .insert((revision.clone(), path.to_string(), line), porcelain.to_string());
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            branch_listings: c.branch_listings.load(Ordering::SeqCst),
            tree_listings: c.tree_listings.load(Ordering::SeqCst),
            blob_reads: c.blob_reads.load(Ordering::SeqCst),
            blames: c.blames.load(Ordering::SeqCst),
            history_searches: c.history_searches.load(Ordering::SeqCst),
            commit_patches: c.commit_patches.load(Ordering::SeqCst),
            ancestry_checks: c.ancestry_checks.load(Ordering::SeqCst),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Graph {
    fn commit(&self, revision: &Revision) -> Result<&Commit> {
        self.commits
            .get(revision)
            .ok_or_else(|| TrackError::Git(format!("fatal: bad revision '{}'", revision)))
    }

    fn content(&self, revision: &Revision, path: &str) -> Option<&str> {
        let blob = self.commits.get(revision)?.files.get(path)?;
        self.blobs.get(blob).map(String::as_str)
    }

    fn ancestors(&self, revision: &Revision) -> Result<HashSet<Revision>> {
        self.commit(revision)?;
        let mut seen = HashSet::new();
        let mut stack = vec![revision.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&current) {
                stack.extend(commit.parents.iter().cloned());
            }
        }
        Ok(seen)
    }

    fn occurrences(&self, files: Option<&BTreeMap<String, BlobId>>, path: &str, text: &str) -> usize {
        files
            .and_then(|f| f.get(path))
            .and_then(|blob| self.blobs.get(blob))
            .map(|content| content.matches(text).count())
            .unwrap_or(0)
    }

    /// Follow first parents while the previous snapshot still holds an
    /// identical line; that oldest snapshot is the origin.
    fn attribute(&self, revision: &Revision, path: &str, line: usize) -> Result<(Revision, usize, String)> {
        let content = self.content(revision, path).ok_or_else(|| {
            TrackError::Git(format!("fatal: no such path {} in {}", path, revision))
        })?;
        let text = content
            .lines()
            .nth(line.wrapping_sub(1))
            .ok_or_else(|| {
                TrackError::Git(format!(
                    "fatal: file {} has only {} lines",
                    path,
                    content.lines().count()
                ))
            })?
            .to_string();

        let mut origin = (revision.clone(), line);
        let mut current = revision;
        loop {
            let commit = self.commit(current)?;
            let Some(parent) = commit.parents.first() else {
                break;
            };
            let Some(index) = self
                .content(parent, path)
                .and_then(|c| c.lines().position(|l| l == text))
            else {
                break;
            };
            origin = (parent.clone(), index + 1);
            current = parent;
        }

        Ok((origin.0, origin.1, text))
    }
}

/// C-quote a path the way blame's `filename` line does
fn quote_path(path: &str) -> String {
    if !path.chars().any(|c| c == '"' || c == '\\' || c.is_ascii_control()) {
        return path.to_string();
    }
    let mut quoted = String::from("\"");
    for c in path.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\t' => quoted.push_str("\\t"),
            '\n' => quoted.push_str("\\n"),
            c if c.is_ascii_control() => quoted.push_str(&format!("\\{:03o}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[async_trait]
impl VcsBackend for MemoryBackend {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn list_branches(&self) -> Result<String> {
        self.pause().await;
        bump(&self.counters.branch_listings);
        let graph = self.read();
        let mut lines = Vec::new();
        for (name, revision) in &graph.branches {
            let marker = if graph.head.as_deref() == Some(name.as_str()) { "*" } else { " " };
            let subject = graph.commit(revision).map(|c| c.subject.as_str()).unwrap_or("");
            lines.push(format!("{} {:<24} {} {}", marker, name, revision, subject));
        }
        Ok(lines.join("\n"))
    }

    async fn list_tree(&self, revision: &Revision) -> Result<String> {
        self.pause().await;
        bump(&self.counters.tree_listings);
        let graph = self.read();
        let commit = graph.commit(revision)?;
        let mut out = String::new();
        for (path, blob) in &commit.files {
            out.push_str(&format!("100644 blob {}\t{}\0", blob, path));
        }
        Ok(out)
    }

    async fn read_blob(&self, blob: &BlobId) -> Result<Vec<u8>> {
        self.pause().await;
        bump(&self.counters.blob_reads);
        let graph = self.read();
        graph
            .blobs
            .get(blob)
            .map(|content| content.as_bytes().to_vec())
            .ok_or_else(|| TrackError::Git(format!("fatal: bad object {}", blob)))
    }

    async fn blame_line(&self, revision: &Revision, path: &str, line: usize) -> Result<String> {
        self.pause().await;
        bump(&self.counters.blames);
        let graph = self.read();
        if let Some(scripted) = graph
            .scripted_blames
            .get(&(revision.clone(), path.to_string(), line))
        {
            return Ok(scripted.clone());
        }

        let (origin, origin_line, text) = graph.attribute(revision, path, line)?;
        let commit = graph.commit(&origin)?;
        Ok(format!(
            "{origin} {origin_line} {line} 1\n\
             author {name}\n\
             author-mail <{email}>\n\
             author-time {time}\n\
             author-tz +0000\n\
             committer {name}\n\
             committer-mail <{email}>\n\
             committer-time {time}\n\
             committer-tz +0000\n\
             summary {subject}\n\
             filename {quoted}\n\
             \t{text}\n",
            name = commit.author_name,
            email = commit.author_email,
            time = commit.timestamp,
            subject = commit.subject,
            quoted = quote_path(path),
        ))
    }

    async fn revision_field(&self, revision: &Revision, field: RevisionField) -> Result<String> {
        self.pause().await;
        let graph = self.read();
        let commit = graph.commit(revision)?;
        Ok(match field {
            RevisionField::Subject => commit.subject.clone(),
            RevisionField::AuthorName => commit.author_name.clone(),
            RevisionField::AuthorEmail => commit.author_email.clone(),
            RevisionField::Timestamp => commit.timestamp.to_string(),
        })
    }

    async fn search_history(
        &self,
        text: &[u8],
        exclude: &Revision,
        include: &[Revision],
    ) -> Result<String> {
        self.pause().await;
        bump(&self.counters.history_searches);
        let graph = self.read();
        // Stored contents are UTF-8, so other needles occur nowhere
        let Ok(text) = std::str::from_utf8(text) else {
            return Ok(String::new());
        };

        let excluded = graph.ancestors(exclude)?;
        let mut reachable = HashSet::new();
        for revision in include {
            reachable.extend(graph.ancestors(revision)?);
        }

        let mut lines = Vec::new();
        for revision in graph.order.iter().rev() {
            if !reachable.contains(revision) || excluded.contains(revision) {
                continue;
            }
            let commit = graph.commit(revision)?;
            let parent_files = commit
                .parents
                .first()
                .and_then(|p| graph.commits.get(p))
                .map(|c| &c.files);
            let paths: BTreeSet<&String> = commit
                .files
                .keys()
                .chain(parent_files.into_iter().flat_map(|f| f.keys()))
                .collect();
            let changed = paths.iter().any(|path| {
                graph.occurrences(parent_files, path, text)
                    != graph.occurrences(Some(&commit.files), path, text)
            });
            if changed {
                lines.push(format!("{} {}", revision, commit.subject));
            }
        }
        Ok(lines.join("\n"))
    }

    async fn show_commit(&self, revision: &Revision) -> Result<Vec<u8>> {
        self.pause().await;
        bump(&self.counters.commit_patches);
        let graph = self.read();
        let commit = graph.commit(revision)?;
        let parent = commit.parents.first().and_then(|p| graph.commits.get(p));

        let mut out = format!(
            "commit {}\nAuthor: {} <{}>\n\n    {}\n\n",
            revision, commit.author_name, commit.author_email, commit.subject
        );

        let paths: BTreeSet<&String> = commit
            .files
            .keys()
            .chain(parent.into_iter().flat_map(|p| p.files.keys()))
            .collect();
        for path in paths {
            let old_blob = parent.and_then(|p| p.files.get(path));
            let new_blob = commit.files.get(path);
            if old_blob == new_blob {
                continue;
            }
            let old = old_blob.and_then(|b| graph.blobs.get(b)).map(String::as_str);
            let new = new_blob.and_then(|b| graph.blobs.get(b)).map(String::as_str);

            out.push_str(&format!("diff --git a/{path} b/{path}\n"));
            match old {
                Some(_) => out.push_str(&format!("--- a/{path}\n")),
                None => out.push_str("--- /dev/null\n"),
            }
            match new {
                Some(_) => out.push_str(&format!("+++ b/{path}\n")),
                None => out.push_str("+++ /dev/null\n"),
            }

            let diff = similar::TextDiff::from_lines(old.unwrap_or(""), new.unwrap_or(""));
            for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
                out.push_str(&hunk.to_string());
            }
        }
        Ok(out.into_bytes())
    }

    async fn is_ancestor(&self, ancestor: &Revision, descendant: &Revision) -> Result<bool> {
        self.pause().await;
        bump(&self.counters.ancestry_checks);
        let graph = self.read();
        graph.commit(ancestor)?;
        Ok(graph.ancestors(descendant)?.contains(ancestor))
    }

    async fn revision_exists(&self, revision: &str) -> Result<bool> {
        self.pause().await;
        let graph = self.read();
        Ok(graph.commits.contains_key(&Revision::new(revision)))
    }

    async fn list_remotes(&self) -> Result<String> {
        self.pause().await;
        let graph = self.read();
        let mut lines = Vec::new();
        for (name, url) in &graph.remotes {
            lines.push(format!("{}\t{} (fetch)", name, url));
            lines.push(format!("{}\t{} (push)", name, url));
        }
        Ok(lines.join("\n"))
    }
}
