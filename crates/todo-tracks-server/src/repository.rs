// crates/todo-tracks-server/src/repository.rs
// Repository facade: the operations the web and CLI layers consume

use crate::browse;
use crate::cache::RepoCaches;
use crate::config::{DEFAULT_CONTEXT_LINES, Settings};
use crate::discover;
use crate::error::{Result, TrackError};
use crate::git::parse;
use crate::git::{GitCli, RevisionField, VcsBackend};
use crate::markers::{BlobMarkerExtractor, DEFAULT_MAX_CONCURRENCY, RevisionMarkerAggregator};
use crate::pattern::{ExcludeSet, PatternMatcher};
use crate::status::BranchStatusResolver;
use crate::tree::TreeIndex;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use todo_tracks_types::{
    Alias, BranchStatus, MarkerDetails, MarkerId, MarkerLine, RepoSummary, Revision,
    RevisionMetadata, is_full_hash,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-handle tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoOptions {
    pub max_concurrency: usize,
    /// Lines shown on each side of a marker in its details
    pub context_lines: usize,
}

impl Default for RepoOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

impl From<&Settings> for RepoOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_concurrency: settings.max_concurrency,
            context_lines: settings.context_lines,
        }
    }
}

/// Completed entries in each of a handle's caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub trees: usize,
    pub blobs: usize,
    pub revisions: usize,
}

/// One repository handle.
///
/// Owns its caches for the life of the process; nothing is shared between
/// handles. Cheap to share behind an `Arc`.
pub struct Repository {
    id: String,
    path: PathBuf,
    backend: Arc<dyn VcsBackend>,
    matcher: Arc<PatternMatcher>,
    caches: Arc<RepoCaches>,
    trees: TreeIndex,
    extractor: BlobMarkerExtractor,
    aggregator: RevisionMarkerAggregator,
    status: BranchStatusResolver,
    context_lines: usize,
}

impl Repository {
    /// Open the git working tree at `path`, warming its cache if configured
    pub fn open(path: &Path, settings: &Settings) -> Result<Arc<Self>> {
        let matcher = settings.matcher()?;
        let backend = Arc::new(GitCli::new(path));
        let repo = Arc::new(Self::with_backend(backend, matcher, RepoOptions::from(settings)));
        if settings.warm_cache {
            repo.start_warmup();
        }
        Ok(repo)
    }

    pub fn with_backend(
        backend: Arc<dyn VcsBackend>,
        matcher: PatternMatcher,
        options: RepoOptions,
    ) -> Self {
        let path = backend.root().to_path_buf();
        let matcher = Arc::new(matcher);
        let caches = Arc::new(RepoCaches::new());
        let trees = TreeIndex::new(backend.clone(), caches.clone());
        let extractor = BlobMarkerExtractor::new(backend.clone(), matcher.clone(), caches.clone());
        let aggregator = RevisionMarkerAggregator::new(
            extractor.clone(),
            trees.clone(),
            caches.clone(),
            options.max_concurrency,
        );
        let status = BranchStatusResolver::new(backend.clone(), trees.clone());

        Self {
            id: discover::repo_id(&path),
            path,
            backend,
            matcher,
            caches,
            trees,
            extractor,
            aggregator,
            status,
            context_lines: options.context_lines,
        }
    }

    /// Aggregate every current branch head in the background.
    ///
    /// Races freely with foreground requests; whichever asks first computes.
    pub fn start_warmup(self: &Arc<Self>) -> JoinHandle<()> {
        let repo = Arc::clone(self);
        tokio::spawn(async move {
            let aliases = match repo.list_aliases().await {
                Ok(aliases) => aliases,
                Err(e) => {
                    warn!(repo = %repo.path.display(), error = %e, "Cache warm-up could not list branches");
                    return;
                }
            };
            let heads: BTreeSet<Revision> = aliases.into_iter().map(|a| a.revision).collect();
            info!(repo = %repo.path.display(), heads = heads.len(), "Warming marker cache");

            let results = join_all(heads.iter().map(|rev| repo.revision_markers(rev))).await;
            for (revision, result) in heads.iter().zip(results) {
                if let Err(e) = result {
                    warn!(revision = %revision, error = %e, "Cache warm-up failed for revision");
                }
            }
            info!(repo = %repo.path.display(), "Marker cache warm");
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> RepoSummary {
        RepoSummary {
            path: self.path.display().to_string(),
            repo_id: self.id.clone(),
        }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            trees: self.caches.trees.len(),
            blobs: self.caches.blobs.len(),
            revisions: self.caches.revisions.len(),
        }
    }

    // ═══════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════

    /// Current branch heads, listed fresh
    pub async fn list_aliases(&self) -> Result<Vec<Alias>> {
        Ok(parse::parse_branches(&self.backend.list_branches().await?))
    }

    pub async fn revision_metadata(&self, revision: &Revision) -> Result<RevisionMetadata> {
        let (subject, author_name, author_email, timestamp) = tokio::try_join!(
            self.backend.revision_field(revision, RevisionField::Subject),
            self.backend.revision_field(revision, RevisionField::AuthorName),
            self.backend.revision_field(revision, RevisionField::AuthorEmail),
            self.backend.revision_field(revision, RevisionField::Timestamp),
        )?;
        Ok(RevisionMetadata {
            revision: revision.clone(),
            timestamp: parse::parse_timestamp(&timestamp)?,
            subject,
            author_name,
            author_email,
        })
    }

    /// Full content of a file at a revision, invalid UTF-8 replaced
    pub async fn file_contents(&self, revision: &Revision, path: &str) -> Result<String> {
        let blob = self.trees.blob_for(revision, path).await?;
        let bytes = self.backend.read_blob(&blob).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Lines `start..=end` (1-based) of a file, clamped to the file, each
    /// followed by a newline. Empty when `start > end`.
    pub async fn file_snippet(
        &self,
        revision: &Revision,
        path: &str,
        start: usize,
        end: usize,
    ) -> Result<String> {
        let content = self.file_contents(revision, path).await?;
        let start = start.max(1);
        let mut snippet = String::new();
        for line in parse::split_lines(&content)
            .skip(start - 1)
            .take((end + 1).saturating_sub(start))
        {
            snippet.push_str(line);
            snippet.push('\n');
        }
        Ok(snippet)
    }

    /// Markers at a revision under the handle's configured exclusions
    pub async fn revision_markers(&self, revision: &Revision) -> Result<Arc<Vec<MarkerLine>>> {
        self.aggregator
            .aggregate(revision, self.matcher.excludes())
            .await
    }

    /// Markers at a revision under an explicit exclusion set
    pub async fn revision_markers_excluding(
        &self,
        revision: &Revision,
        excludes: &ExcludeSet,
    ) -> Result<Arc<Vec<MarkerLine>>> {
        self.aggregator.aggregate(revision, excludes).await
    }

    pub async fn file_markers(&self, revision: &Revision, path: &str) -> Result<Arc<Vec<MarkerLine>>> {
        self.extractor.extract(revision, path).await
    }

    /// Metadata of the marker's revision plus the surrounding lines
    pub async fn marker_details(&self, id: &MarkerId) -> Result<MarkerDetails> {
        let start = id.line_number.saturating_sub(self.context_lines);
        let end = id.line_number + self.context_lines;
        let (revision_metadata, context) = tokio::try_join!(
            self.revision_metadata(&id.revision),
            self.file_snippet(&id.revision, &id.file_name, start, end),
        )?;
        Ok(MarkerDetails {
            id: id.clone(),
            revision_metadata,
            context,
        })
    }

    pub async fn marker_status(&self, id: &MarkerId) -> Result<BranchStatus> {
        self.status.resolve(id).await
    }

    /// Link to view a file line, preferring a GitHub remote
    pub async fn browse_url(&self, revision: &Revision, path: &str, line: usize) -> String {
        let remotes = match self.backend.list_remotes().await {
            Ok(out) => Some(out),
            Err(e) => {
                debug!(error = %e, "Remote listing failed, using raw link");
                None
            }
        };
        browse::browse_url(remotes.as_deref(), &self.id, revision, path, line)
    }

    // ═══════════════════════════════════════
    // VALIDATION
    // ═══════════════════════════════════════

    /// Accept only a full hash naming an existing commit
    pub async fn validate_revision(&self, revision: &str) -> Result<Revision> {
        if !is_full_hash(revision) {
            return Err(TrackError::InvalidRevision(format!(
                "'{}' is not a full revision hash",
                revision
            )));
        }
        if !self.backend.revision_exists(revision).await? {
            return Err(TrackError::InvalidRevision(format!(
                "revision {} does not exist",
                revision
            )));
        }
        Ok(Revision::new(revision))
    }

    pub async fn validate_path(&self, revision: &Revision, path: &str) -> Result<()> {
        if self.trees.tree(revision).await?.contains(path) {
            Ok(())
        } else {
            Err(TrackError::PathNotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            })
        }
    }

    pub async fn validate_line_number(&self, revision: &Revision, path: &str, line: usize) -> Result<()> {
        let content = self.file_contents(revision, path).await?;
        let count = parse::split_lines(&content).count();
        if line == 0 || line > count {
            return Err(TrackError::LineOutOfRange {
                line,
                path: path.to_string(),
                revision: revision.to_string(),
            });
        }
        Ok(())
    }

    /// Validate all three parts of a user-supplied marker identity, in order
    pub async fn validate_marker(&self, revision: &str, path: &str, line: usize) -> Result<MarkerId> {
        let revision = self.validate_revision(revision).await?;
        self.validate_path(&revision, path).await?;
        self.validate_line_number(&revision, path, line).await?;
        Ok(MarkerId {
            revision,
            file_name: path.to_string(),
            line_number: line,
        })
    }

    /// Resolve a full hash or a branch name to a revision
    pub async fn resolve_revision(&self, name: &str) -> Result<Revision> {
        if is_full_hash(name) {
            return self.validate_revision(name).await;
        }
        self.list_aliases()
            .await?
            .into_iter()
            .find(|alias| alias.branch == name)
            .map(|alias| alias.revision)
            .ok_or_else(|| TrackError::InvalidRevision(format!("no branch named '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MemoryBackend;
    use crate::pattern::DEFAULT_TODO_REGEX;

    fn open(backend: Arc<MemoryBackend>) -> Repository {
        let matcher = PatternMatcher::new(DEFAULT_TODO_REGEX, "").unwrap();
        Repository::with_backend(backend, matcher, RepoOptions::default())
    }

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("line {i}\n")).collect()
    }

    #[tokio::test]
    async fn test_file_snippet_clamps() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let content = numbered(4);
        let r1 = backend.commit(&[], &[("a.txt", content.as_str())], "Init");
        let repo = open(backend);

        assert_eq!(repo.file_snippet(&r1, "a.txt", 2, 3).await.unwrap(), "line 2\nline 3\n");
        assert_eq!(repo.file_snippet(&r1, "a.txt", 0, 1).await.unwrap(), "line 1\n");
        assert_eq!(repo.file_snippet(&r1, "a.txt", 3, 99).await.unwrap(), "line 3\nline 4\n");
        assert_eq!(repo.file_snippet(&r1, "a.txt", 3, 2).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_marker_details_context_window() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let content = numbered(20);
        let r1 = backend.commit(&[], &[("a.txt", content.as_str())], "Numbers");
        let repo = open(backend);

        let id = MarkerId {
            revision: r1.clone(),
            file_name: "a.txt".to_string(),
            line_number: 10,
        };
        let details = repo.marker_details(&id).await.unwrap();
        assert!(details.context.starts_with("line 5\n"));
        assert!(details.context.ends_with("line 15\n"));
        assert_eq!(details.context.lines().count(), 11);
        assert_eq!(details.revision_metadata.subject, "Numbers");
        assert_eq!(details.revision_metadata.author_email, "test@example.com");
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.txt", "one\ntwo\n")], "Init");
        let repo = open(backend);

        let err = repo.validate_revision("abc").await.unwrap_err();
        assert!(matches!(err, TrackError::InvalidRevision(_)));
        let err = repo.validate_revision(&"f".repeat(40)).await.unwrap_err();
        assert!(matches!(err, TrackError::InvalidRevision(_)));

        let err = repo.validate_marker(r1.as_str(), "b.txt", 1).await.unwrap_err();
        assert!(matches!(err, TrackError::PathNotFound { .. }));
        let err = repo.validate_marker(r1.as_str(), "a.txt", 3).await.unwrap_err();
        assert!(matches!(err, TrackError::LineOutOfRange { .. }));
        let err = repo.validate_marker(r1.as_str(), "a.txt", 0).await.unwrap_err();
        assert!(err.is_validation());

        let id = repo.validate_marker(r1.as_str(), "a.txt", 2).await.unwrap();
        assert_eq!(id.line_number, 2);
    }

    #[tokio::test]
    async fn test_resolve_revision_by_branch() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.txt", "x\n")], "Init");
        backend.set_branch("main", &r1);
        let repo = open(backend);

        assert_eq!(repo.resolve_revision("main").await.unwrap(), r1);
        assert_eq!(repo.resolve_revision(r1.as_str()).await.unwrap(), r1);
        assert!(repo.resolve_revision("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_warmup_populates_cache() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "// TODO: warm\n")], "Init");
        let r2 = backend.commit(&[&r1], &[("a.rs", "// TODO: warm\nx\n")], "Next");
        backend.set_branch("main", &r2);
        backend.set_branch("old", &r1);
        backend.set_branch("same", &r2);
        let repo = Arc::new(open(backend.clone()));

        repo.start_warmup().await.unwrap();
        assert_eq!(repo.cache_stats().revisions, 2);

        let blob_reads = backend.calls().blob_reads;
        repo.revision_markers(&r2).await.unwrap();
        assert_eq!(backend.calls().blob_reads, blob_reads);
    }

    #[tokio::test]
    async fn test_browse_url_without_remote() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "x\n")], "Init");
        let repo = open(backend);
        let url = repo.browse_url(&r1, "a.rs", 1).await;
        assert!(url.starts_with(&format!("/raw?repo={}", repo.id())));
    }
}
