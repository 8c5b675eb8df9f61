// crates/todo-tracks-server/src/markers/extract.rs
// Per-blob marker scan with line attribution

use crate::cache::RepoCaches;
use crate::error::Result;
use crate::git::VcsBackend;
use crate::git::parse;
use crate::pattern::PatternMatcher;
use crate::tree::TreeIndex;
use std::sync::Arc;
use todo_tracks_types::{BlobId, MarkerLine, Revision};
use tracing::debug;

/// Finds marker lines in one file and attributes each to its origin.
///
/// Results are memoized by blob, so a file that is unchanged across revisions
/// or copied to several paths is scanned once. The cached list carries the
/// path and revision of whichever caller scanned it first; attribution makes
/// that irrelevant for identical content.
#[derive(Clone)]
pub struct BlobMarkerExtractor {
    backend: Arc<dyn VcsBackend>,
    matcher: Arc<PatternMatcher>,
    caches: Arc<RepoCaches>,
    trees: TreeIndex,
}

impl BlobMarkerExtractor {
    pub fn new(
        backend: Arc<dyn VcsBackend>,
        matcher: Arc<PatternMatcher>,
        caches: Arc<RepoCaches>,
    ) -> Self {
        let trees = TreeIndex::new(backend.clone(), caches.clone());
        Self {
            backend,
            matcher,
            caches,
            trees,
        }
    }

    /// Markers of `path` as it exists at `revision`
    pub async fn extract(&self, revision: &Revision, path: &str) -> Result<Arc<Vec<MarkerLine>>> {
        let blob = self.trees.blob_for(revision, path).await?;
        self.extract_blob(revision, path, &blob).await
    }

    /// Markers of an already resolved blob
    pub async fn extract_blob(
        &self,
        revision: &Revision,
        path: &str,
        blob: &BlobId,
    ) -> Result<Arc<Vec<MarkerLine>>> {
        self.caches
            .blobs
            .get_or_compute(blob, || self.scan(revision, path, blob))
            .await
    }

    async fn scan(&self, revision: &Revision, path: &str, blob: &BlobId) -> Result<Arc<Vec<MarkerLine>>> {
        let bytes = self.backend.read_blob(blob).await?;
        let content = String::from_utf8_lossy(&bytes);

        let mut markers = Vec::new();
        for (i, line) in parse::split_lines(&content).enumerate() {
            if !self.matcher.is_marker(line) {
                continue;
            }
            let out = self.backend.blame_line(revision, path, i + 1).await?;
            // One matched line may attribute to several sections; keep them all
            markers.extend(parse::parse_blame(path, &out)?);
        }

        debug!(path, blob = %blob, markers = markers.len(), "Scanned blob");
        Ok(Arc::new(markers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;
    use crate::git::MemoryBackend;
    use crate::pattern::DEFAULT_TODO_REGEX;

    fn extractor(backend: Arc<MemoryBackend>) -> BlobMarkerExtractor {
        let matcher = PatternMatcher::new(DEFAULT_TODO_REGEX, "").unwrap();
        BlobMarkerExtractor::new(backend, Arc::new(matcher), Arc::new(RepoCaches::new()))
    }

    #[tokio::test]
    async fn test_extract_attributes_each_marker() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "fn a() {}\n// TODO: first\n")], "First");
        let r2 = backend.commit(
            &[&r1],
            &[("a.rs", "fn a() {}\n// TODO: first\nfn b() {}\n// TODO: second\n")],
            "Second",
        );

        let markers = extractor(backend.clone()).extract(&r2, "a.rs").await.unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].revision, r1);
        assert_eq!(markers[0].line_number, 2);
        assert_eq!(markers[0].contents, "// TODO: first");
        assert_eq!(markers[1].revision, r2);
        assert_eq!(markers[1].line_number, 4);
        assert_eq!(backend.calls().blames, 2);
    }

    #[tokio::test]
    async fn test_shared_blob_scanned_once() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let content = "// TODO: shared\n";
        let r1 = backend.commit(&[], &[("a.txt", content), ("b.txt", content)], "Copy");

        let extractor = extractor(backend.clone());
        let a = extractor.extract(&r1, "a.txt").await.unwrap();
        let b = extractor.extract(&r1, "b.txt").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(backend.calls().blob_reads, 1);
        assert_eq!(backend.calls().blames, 1);
    }

    #[tokio::test]
    async fn test_multi_section_attribution_preserved() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "// TODO: split\n")], "Add");
        let origin_a = "a".repeat(40);
        let origin_b = "b".repeat(40);
        backend.script_blame(
            &r1,
            "a.rs",
            1,
            &format!(
                "{origin_a} 3 1 1\nfilename old.rs\n\t// TODO: split\n{origin_b} 9 1 1\n\t// TODO: split\n"
            ),
        );

        let markers = extractor(backend).extract(&r1, "a.rs").await.unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].revision.as_str(), origin_a);
        assert_eq!(markers[0].file_name, "old.rs");
        assert_eq!(markers[1].revision.as_str(), origin_b);
        assert_eq!(markers[1].file_name, "a.rs");
        assert_eq!(markers[1].line_number, 9);
    }

    #[tokio::test]
    async fn test_malformed_attribution_fails_and_is_not_cached() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "// TODO: broken\n")], "Add");
        backend.script_blame(&r1, "a.rs", 1, "garbage\n");

        let extractor = extractor(backend.clone());
        let err = extractor.extract(&r1, "a.rs").await.unwrap_err();
        assert!(matches!(err, TrackError::MalformedOutput(_)));

        assert!(extractor.extract(&r1, "a.rs").await.is_err());
        assert_eq!(backend.calls().blob_reads, 2);
    }

    #[tokio::test]
    async fn test_file_without_markers() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "fn main() {}\n")], "Add");
        let markers = extractor(backend.clone()).extract(&r1, "a.rs").await.unwrap();
        assert!(markers.is_empty());
        assert_eq!(backend.calls().blames, 0);
    }
}
