// crates/todo-tracks-server/src/status.rs
// Per-branch status of one marker: present, missing, or removed

use crate::error::{Result, TrackError};
use crate::git::VcsBackend;
use crate::git::parse;
use crate::tree::TreeIndex;
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use todo_tracks_types::{Alias, BranchStatus, MarkerId, Revision};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Present,
    Missing,
    Removed,
}

/// Classifies every branch head against one marker.
///
/// Branch tips move, so aliases are listed fresh on every call and nothing
/// here is cached.
#[derive(Clone)]
pub struct BranchStatusResolver {
    backend: Arc<dyn VcsBackend>,
    trees: TreeIndex,
}

impl BranchStatusResolver {
    pub fn new(backend: Arc<dyn VcsBackend>, trees: TreeIndex) -> Self {
        Self { backend, trees }
    }

    pub async fn resolve(&self, id: &MarkerId) -> Result<BranchStatus> {
        let contents = self.marker_contents(id).await?;
        let aliases = parse::parse_branches(&self.backend.list_branches().await?);
        let closing = self.closing_revisions(id, &contents, &aliases).await?;

        let placements = try_join_all(
            aliases
                .iter()
                .map(|alias| self.classify(&id.revision, alias, &closing)),
        )
        .await?;

        let mut status = BranchStatus::default();
        for (alias, placement) in aliases.into_iter().zip(placements) {
            match placement {
                Placement::Present => status.present.push(alias),
                Placement::Missing => status.missing.push(alias),
                Placement::Removed => status.removed.push(alias),
            }
        }

        debug!(
            revision = %id.revision,
            file = %id.file_name,
            line = id.line_number,
            present = status.present.len(),
            missing = status.missing.len(),
            removed = status.removed.len(),
            "Resolved marker status"
        );
        Ok(status)
    }

    /// Exact bytes of the marker line as recorded at the marker's revision
    pub async fn marker_contents(&self, id: &MarkerId) -> Result<Vec<u8>> {
        let blob = self.trees.blob_for(&id.revision, &id.file_name).await?;
        let content = self.backend.read_blob(&blob).await?;
        parse::split_byte_lines(&content)
            .nth(id.line_number.wrapping_sub(1))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| TrackError::LineOutOfRange {
                line: id.line_number,
                path: id.file_name.clone(),
                revision: id.revision.to_string(),
            })
    }

    /// Commits outside the marker's history that delete its line without
    /// re-adding it, newest first.
    pub async fn closing_revisions(
        &self,
        id: &MarkerId,
        contents: &[u8],
        aliases: &[Alias],
    ) -> Result<Vec<Revision>> {
        if contents.is_empty() {
            return Ok(Vec::new());
        }
        let heads: Vec<Revision> = aliases
            .iter()
            .map(|a| &a.revision)
            .filter(|r| **r != id.revision)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if heads.is_empty() {
            return Ok(Vec::new());
        }

        let log = self
            .backend
            .search_history(contents, &id.revision, &heads)
            .await?;
        let candidates = parse::parse_log_revisions(&log)?;
        let patches = try_join_all(candidates.iter().map(|rev| self.backend.show_commit(rev))).await?;

        Ok(candidates
            .into_iter()
            .zip(patches)
            .filter(|(_, patch)| parse::patch_closes(patch, contents))
            .map(|(rev, _)| rev)
            .collect())
    }

    async fn classify(
        &self,
        marker_revision: &Revision,
        alias: &Alias,
        closing: &[Revision],
    ) -> Result<Placement> {
        if alias.revision == *marker_revision {
            return Ok(Placement::Present);
        }
        if !self
            .backend
            .is_ancestor(marker_revision, &alias.revision)
            .await?
        {
            return Ok(Placement::Missing);
        }
        for revision in closing {
            if self.backend.is_ancestor(revision, &alias.revision).await? {
                return Ok(Placement::Removed);
            }
        }
        Ok(Placement::Present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RepoCaches;
    use crate::git::MemoryBackend;

    fn resolver(backend: Arc<MemoryBackend>) -> BranchStatusResolver {
        let backend: Arc<dyn VcsBackend> = backend;
        let trees = TreeIndex::new(backend.clone(), Arc::new(RepoCaches::new()));
        BranchStatusResolver::new(backend, trees)
    }

    fn ten_lines(marker_line: Option<&str>) -> String {
        let mut lines: Vec<String> = (1..=9).map(|i| format!("line {i}")).collect();
        if let Some(marker) = marker_line {
            lines.push(marker.to_string());
        }
        lines.push("tail".to_string());
        lines.join("\n") + "\n"
    }

    fn marker(revision: &Revision, file: &str, line: usize) -> MarkerId {
        MarkerId {
            revision: revision.clone(),
            file_name: file.to_string(),
            line_number: line,
        }
    }

    fn names(aliases: &[Alias]) -> Vec<&str> {
        aliases.iter().map(|a| a.branch.as_str()).collect()
    }

    #[tokio::test]
    async fn test_removed_on_feature_present_on_main() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let with_marker = ten_lines(Some("// TODO fix"));
        let r1 = backend.commit(&[], &[("file.txt", with_marker.as_str())], "Add TODO");
        let without = ten_lines(None);
        let r2 = backend.commit(&[&r1], &[("file.txt", without.as_str())], "Fix it");
        backend.set_branch("main", &r1);
        backend.set_branch("feature", &r2);

        let status = resolver(backend).resolve(&marker(&r1, "file.txt", 10)).await.unwrap();
        assert_eq!(names(&status.present), vec!["main"]);
        assert_eq!(names(&status.removed), vec!["feature"]);
        assert!(status.missing.is_empty());
    }

    #[tokio::test]
    async fn test_unmerged_topic_marker_missing_elsewhere() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let base = backend.commit(&[], &[("a.rs", "fn a() {}\n")], "Base");
        let topic = backend.commit(&[&base], &[("a.rs", "fn a() {}\n// TODO: topic\n")], "Topic");
        let main = backend.commit(&[&base], &[("a.rs", "fn a() {}\nfn b() {}\n")], "Main");
        backend.set_branch("main", &main);
        backend.set_branch("release", &base);
        backend.set_branch("topic", &topic);

        let status = resolver(backend).resolve(&marker(&topic, "a.rs", 2)).await.unwrap();
        assert_eq!(names(&status.present), vec!["topic"]);
        assert_eq!(names(&status.missing), vec!["main", "release"]);
        assert!(status.removed.is_empty());
    }

    #[tokio::test]
    async fn test_descendant_without_removal_is_present() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "// TODO: keep\n")], "Add");
        let r2 = backend.commit(&[&r1], &[("a.rs", "// TODO: keep\nmore\n")], "Extend");
        backend.set_branch("main", &r2);

        let status = resolver(backend).resolve(&marker(&r1, "a.rs", 1)).await.unwrap();
        assert_eq!(names(&status.present), vec!["main"]);
        assert_eq!(status.len(), 1);
    }

    #[tokio::test]
    async fn test_moved_line_is_not_a_removal() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "// TODO: move me\nx\n")], "Add");
        let r2 = backend.commit(&[&r1], &[("b.rs", "// TODO: move me\nx\n")], "Rename");
        backend.set_branch("main", &r2);

        let resolver = resolver(backend.clone());
        let id = marker(&r1, "a.rs", 1);
        let contents = resolver.marker_contents(&id).await.unwrap();
        let aliases = parse::parse_branches(&backend.list_branches().await.unwrap());
        let closing = resolver.closing_revisions(&id, &contents, &aliases).await.unwrap();
        assert!(closing.is_empty());

        let status = resolver.resolve(&id).await.unwrap();
        assert_eq!(names(&status.present), vec!["main"]);
    }

    #[tokio::test]
    async fn test_no_branches_yields_empty_status() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "// TODO: lonely\n")], "Add");

        let status = resolver(backend.clone()).resolve(&marker(&r1, "a.rs", 1)).await.unwrap();
        assert!(status.is_empty());
        assert_eq!(backend.calls().history_searches, 0);
    }

    #[tokio::test]
    async fn test_partition_is_total_and_disjoint() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("f.rs", "// TODO: track\n")], "Add");
        let r2 = backend.commit(&[&r1], &[("f.rs", "done\n")], "Remove");
        let r3 = backend.commit(&[&r1], &[("f.rs", "// TODO: track\nmore\n")], "Keep");
        let other = backend.commit(&[], &[("g.rs", "unrelated\n")], "Orphan");
        for (name, rev) in [("a", &r1), ("b", &r2), ("c", &r3), ("d", &other), ("e", &r2)] {
            backend.set_branch(name, rev);
        }

        let status = resolver(backend).resolve(&marker(&r1, "f.rs", 1)).await.unwrap();
        assert_eq!(status.len(), 5);
        let mut all: Vec<&str> = names(&status.present);
        all.extend(names(&status.missing));
        all.extend(names(&status.removed));
        all.sort();
        assert_eq!(all, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(names(&status.removed), vec!["b", "e"]);
        assert_eq!(names(&status.missing), vec!["d"]);
    }

    #[tokio::test]
    async fn test_line_out_of_range_is_validation_error() {
        let backend = Arc::new(MemoryBackend::new("/repo"));
        let r1 = backend.commit(&[], &[("a.rs", "one\n")], "Add");
        let err = resolver(backend).resolve(&marker(&r1, "a.rs", 3)).await.unwrap_err();
        assert!(matches!(err, TrackError::LineOutOfRange { line: 3, .. }));
        assert!(err.is_validation());
    }
}
