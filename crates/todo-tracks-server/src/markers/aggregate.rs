// crates/todo-tracks-server/src/markers/aggregate.rs
// Revision-wide marker aggregation over a bounded worker pool

use super::BlobMarkerExtractor;
use crate::cache::{RepoCaches, RevisionKey};
use crate::error::{Result, TrackError};
use crate::pattern::ExcludeSet;
use crate::tree::TreeIndex;
use std::sync::Arc;
use todo_tracks_types::{MarkerLine, Revision};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

/// Default cap on concurrent per-file extractions
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Collects the markers of every non-excluded path in a revision.
///
/// One task per path, each holding a pool permit while it extracts. The pool
/// is shared by every aggregation on the handle, including cache warm-up.
#[derive(Clone)]
pub struct RevisionMarkerAggregator {
    extractor: BlobMarkerExtractor,
    trees: TreeIndex,
    caches: Arc<RepoCaches>,
    pool: Arc<Semaphore>,
}

impl RevisionMarkerAggregator {
    pub fn new(
        extractor: BlobMarkerExtractor,
        trees: TreeIndex,
        caches: Arc<RepoCaches>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            trees,
            caches,
            pool: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// All markers at `revision`, skipping paths matched by `excludes`.
    ///
    /// Any single path failing fails the whole aggregate, and nothing is cached.
    pub async fn aggregate(
        &self,
        revision: &Revision,
        excludes: &ExcludeSet,
    ) -> Result<Arc<Vec<MarkerLine>>> {
        let key = RevisionKey::new(revision, excludes);
        self.caches
            .revisions
            .get_or_compute(&key, || self.collect(revision, excludes))
            .await
    }

    async fn collect(&self, revision: &Revision, excludes: &ExcludeSet) -> Result<Arc<Vec<MarkerLine>>> {
        let tree = self.trees.tree(revision).await?;

        let mut tasks = JoinSet::new();
        let mut skipped = 0usize;
        for (index, entry) in tree.entries().iter().enumerate() {
            if excludes.is_excluded(&entry.path) {
                skipped += 1;
                continue;
            }
            let extractor = self.extractor.clone();
            let pool = self.pool.clone();
            let revision = revision.clone();
            let entry = entry.clone();
            tasks.spawn(async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .map_err(|_| TrackError::Cancelled)?;
                let markers = extractor
                    .extract_blob(&revision, &entry.path, &entry.blob)
                    .await?;
                Ok::<_, TrackError>((index, markers))
            });
        }

        // Reassemble in tree order so output is stable across runs
        let mut per_path: Vec<Option<Arc<Vec<MarkerLine>>>> = vec![None; tree.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, markers) = joined??;
            per_path[index] = Some(markers);
        }
        let mut markers = Vec::new();
        for path_markers in per_path.into_iter().flatten() {
            markers.extend(path_markers.iter().cloned());
        }

        info!(
            revision = %revision,
            files = tree.len() - skipped,
            skipped,
            markers = markers.len(),
            "Aggregated revision markers"
        );
        Ok(Arc::new(markers))
    }
}
