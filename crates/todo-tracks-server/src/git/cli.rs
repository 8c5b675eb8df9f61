// crates/todo-tracks-server/src/git/cli.rs
// VcsBackend over the git command line

use super::{RevisionField, VcsBackend, git_cmd, git_cmd_bytes, git_cmd_raw, run_git, validate_ref};
use crate::error::{Result, TrackError};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use todo_tracks_types::{BlobId, Revision};

/// Shells out to `git` in the repository's working directory.
///
/// Each query is one child process; there is no timeout, so a hung git
/// invocation hangs its caller.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl VcsBackend for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn list_branches(&self) -> Result<String> {
        git_cmd(
            &self.root,
            &["branch", "-av", "--list", "--abbrev=40", "--no-color"],
        )
        .await
    }

    async fn list_tree(&self, revision: &Revision) -> Result<String> {
        validate_ref(revision.as_str())?;
        // -z: paths are emitted verbatim, never C-quoted
        git_cmd_raw(&self.root, &["ls-tree", "-r", "-z", revision.as_str()]).await
    }

    async fn read_blob(&self, blob: &BlobId) -> Result<Vec<u8>> {
        validate_ref(blob.as_str())?;
        git_cmd_bytes(&self.root, &["show", blob.as_str()]).await
    }

    async fn blame_line(&self, revision: &Revision, path: &str, line: usize) -> Result<String> {
        validate_ref(revision.as_str())?;
        let range = format!("{},+1", line);
        git_cmd_raw(
            &self.root,
            &[
                "blame",
                "--root",
                "--line-porcelain",
                "-L",
                range.as_str(),
                revision.as_str(),
                "--",
                path,
            ],
        )
        .await
    }

    async fn revision_field(&self, revision: &Revision, field: RevisionField) -> Result<String> {
        validate_ref(revision.as_str())?;
        let format = format!("--format={}", field.format());
        git_cmd(&self.root, &["show", revision.as_str(), format.as_str(), "-s"]).await
    }

    async fn search_history(
        &self,
        text: &[u8],
        exclude: &Revision,
        include: &[Revision],
    ) -> Result<String> {
        if include.is_empty() {
            // With no positive refs git would fall back to HEAD
            return Ok(String::new());
        }
        validate_ref(exclude.as_str())?;
        // The needle goes to git byte for byte so non-UTF-8 lines still match
        let mut pickaxe = OsString::from("-S");
        pickaxe.push(OsStr::from_bytes(text));
        let mut args: Vec<OsString> = ["log", "--pretty=oneline", "--no-abbrev-commit", "--no-color"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(pickaxe);
        args.push(OsString::from(format!("^{}", exclude)));
        for revision in include {
            validate_ref(revision.as_str())?;
            args.push(OsString::from(revision.as_str()));
        }
        git_cmd(&self.root, args.as_slice()).await
    }

    async fn show_commit(&self, revision: &Revision) -> Result<Vec<u8>> {
        validate_ref(revision.as_str())?;
        git_cmd_bytes(&self.root, &["show", "--no-color", revision.as_str()]).await
    }

    async fn is_ancestor(&self, ancestor: &Revision, descendant: &Revision) -> Result<bool> {
        validate_ref(ancestor.as_str())?;
        validate_ref(descendant.as_str())?;
        let output = run_git(
            &self.root,
            &[
                "merge-base",
                "--is-ancestor",
                ancestor.as_str(),
                descendant.as_str(),
            ],
        )
        .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(TrackError::Git(format!(
                "git merge-base --is-ancestor {} {} failed: {}",
                ancestor,
                descendant,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn revision_exists(&self, revision: &str) -> Result<bool> {
        validate_ref(revision)?;
        let output = run_git(&self.root, &["ls-tree", "--name-only", revision]).await?;
        Ok(output.status.success())
    }

    async fn list_remotes(&self) -> Result<String> {
        git_cmd(&self.root, &["remote", "-v"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::parse;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn init_git_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test User"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
    }

    fn commit_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>, message: &str) -> Revision {
        std::fs::write(dir.join(name), contents).unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", message]);
        Revision::new(git(dir, &["rev-parse", "HEAD"]))
    }

    #[tokio::test]
    async fn test_tree_and_blob_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let rev = commit_file(temp_dir.path(), "notes.txt", "one\n// TODO: two\n", "Initial commit");

        let backend = GitCli::new(temp_dir.path());
        let listing = backend.list_tree(&rev).await.unwrap();
        let entries = parse::parse_tree(&listing).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "notes.txt");

        let content = backend.read_blob(&entries[0].blob).await.unwrap();
        assert_eq!(content, b"one\n// TODO: two\n");
    }

    #[tokio::test]
    async fn test_blame_line_parses() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let rev = commit_file(temp_dir.path(), "a.rs", "fn a() {}\n// TODO: b\n", "Add a");

        let backend = GitCli::new(temp_dir.path());
        let out = backend.blame_line(&rev, "a.rs", 2).await.unwrap();
        let lines = parse::parse_blame("a.rs", &out).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].revision, rev);
        assert_eq!(lines[0].line_number, 2);
        assert_eq!(lines[0].contents, "// TODO: b");
    }

    #[tokio::test]
    async fn test_is_ancestor_exit_codes() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let first = commit_file(temp_dir.path(), "a.txt", "1\n", "First");
        let second = commit_file(temp_dir.path(), "a.txt", "2\n", "Second");

        let backend = GitCli::new(temp_dir.path());
        assert!(backend.is_ancestor(&first, &second).await.unwrap());
        assert!(!backend.is_ancestor(&second, &first).await.unwrap());
        assert!(backend.is_ancestor(&first, &first).await.unwrap());

        let bogus = Revision::new("f".repeat(40));
        assert!(backend.is_ancestor(&bogus, &first).await.is_err());
    }

    #[tokio::test]
    async fn test_revision_metadata_fields() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let rev = commit_file(temp_dir.path(), "a.txt", "1\n", "Write the first line");

        let backend = GitCli::new(temp_dir.path());
        let subject = backend.revision_field(&rev, RevisionField::Subject).await.unwrap();
        assert_eq!(subject, "Write the first line");
        let email = backend.revision_field(&rev, RevisionField::AuthorEmail).await.unwrap();
        assert_eq!(email, "test@example.com");
        let timestamp = backend.revision_field(&rev, RevisionField::Timestamp).await.unwrap();
        assert!(parse::parse_timestamp(&timestamp).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_revision_exists() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let rev = commit_file(temp_dir.path(), "a.txt", "1\n", "First");

        let backend = GitCli::new(temp_dir.path());
        assert!(backend.revision_exists(rev.as_str()).await.unwrap());
        assert!(!backend.revision_exists(&"0".repeat(40)).await.unwrap());
        assert!(backend.revision_exists("--all").await.is_err());
    }

    #[tokio::test]
    async fn test_search_history_without_heads_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let rev = commit_file(temp_dir.path(), "a.txt", "TODO\n", "First");

        let backend = GitCli::new(temp_dir.path());
        let out = backend.search_history(b"TODO", &rev, &[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_tree_listing_keeps_unusual_paths_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        std::fs::write(temp_dir.path().join("tab\there.txt"), "x\n").unwrap();
        let rev = commit_file(temp_dir.path(), "we\"ird.txt", "// TODO quoted\n", "Odd names");

        let backend = GitCli::new(temp_dir.path());
        let entries = parse::parse_tree(&backend.list_tree(&rev).await.unwrap()).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["tab\there.txt", "we\"ird.txt"]);

        let out = backend.blame_line(&rev, "we\"ird.txt", 1).await.unwrap();
        let lines = parse::parse_blame("we\"ird.txt", &out).unwrap();
        assert_eq!(lines[0].file_name, "we\"ird.txt");
        assert_eq!(lines[0].contents, "// TODO quoted");
    }

    #[tokio::test]
    async fn test_search_history_matches_non_utf8_bytes() {
        let temp_dir = TempDir::new().unwrap();
        init_git_repo(temp_dir.path());
        let line: &[u8] = b"// TODO caf\xe9 fix";
        let added = commit_file(temp_dir.path(), "a.c", [b"int x;\n".as_slice(), line, b"\n"].concat(), "Add");
        let removed = commit_file(temp_dir.path(), "a.c", "int x;\n", "Remove");

        let backend = GitCli::new(temp_dir.path());
        let out = backend.search_history(line, &added, &[removed.clone()]).await.unwrap();
        assert_eq!(parse::parse_log_revisions(&out).unwrap(), vec![removed.clone()]);

        let patch = backend.show_commit(&removed).await.unwrap();
        assert!(parse::patch_closes(&patch, line));
    }
}
