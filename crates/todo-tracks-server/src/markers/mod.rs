// crates/todo-tracks-server/src/markers/mod.rs
// Marker extraction pipeline
//
// - extract: one blob's matching lines, attributed to their origin commits
// - aggregate: every surviving path of a revision, fanned out over a bounded pool

mod aggregate;
mod extract;

pub use aggregate::{DEFAULT_MAX_CONCURRENCY, RevisionMarkerAggregator};
pub use extract::BlobMarkerExtractor;
