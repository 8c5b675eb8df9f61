// crates/todo-tracks-types/src/lib.rs
// Shared data model for todo-tracks (server + dashboard clients)
// No native-only dependencies allowed here
//
// Field names are PascalCase on the wire so existing dashboard clients keep working.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════

/// Length of a full hex commit/blob digest
pub const HASH_LEN: usize = 40;

/// Check that a string is exactly one full-length hex digest
pub fn is_full_hash(s: &str) -> bool {
    s.len() == HASH_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Content-addressed commit identifier (40 hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Revision {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Content-addressed identifier for one file's content.
///
/// The same blob shows up at many (revision, path) pairs, which is what makes
/// blob-level results reusable across revisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════
// DOMAIN TYPES
// ═══════════════════════════════════════

/// A branch name pointing at a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alias {
    pub branch: String,
    pub revision: Revision,
}

/// The attributed origin of one line matching the marker pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarkerLine {
    /// Commit that introduced the line
    pub revision: Revision,
    pub file_name: String,
    /// 1-based line number in `revision`
    pub line_number: usize,
    pub contents: String,
}

/// Identity of a marker as presented to a caller.
///
/// `revision` is the revision the caller was looking at, which is not
/// necessarily the revision that introduced the line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarkerId {
    pub revision: Revision,
    pub file_name: String,
    pub line_number: usize,
}

impl From<&MarkerLine> for MarkerId {
    fn from(line: &MarkerLine) -> Self {
        Self {
            revision: line.revision.clone(),
            file_name: line.file_name.clone(),
            line_number: line.line_number,
        }
    }
}

/// Commit metadata shown next to a marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RevisionMetadata {
    pub revision: Revision,
    /// Commit timestamp, seconds since the epoch
    pub timestamp: i64,
    pub subject: String,
    pub author_name: String,
    pub author_email: String,
}

/// Marker identity plus commit metadata and surrounding source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarkerDetails {
    pub id: MarkerId,
    pub revision_metadata: RevisionMetadata,
    pub context: String,
}

/// Per-branch classification of one marker.
///
/// Every alias known at resolution time lands in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStatus {
    #[serde(rename = "BranchesMissing")]
    pub missing: Vec<Alias>,
    #[serde(rename = "BranchesPresent")]
    pub present: Vec<Alias>,
    #[serde(rename = "BranchesRemoved")]
    pub removed: Vec<Alias>,
}

impl BranchStatus {
    /// Total number of classified aliases
    pub fn len(&self) -> usize {
        self.missing.len() + self.present.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One served repository, as listed by `/repos`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepoSummary {
    pub path: String,
    pub repo_id: String,
}
