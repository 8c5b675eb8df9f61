// crates/todo-tracks-server/src/git/parse.rs
// Grammar of the git output the marker pipeline consumes

use crate::error::{Result, TrackError};
use todo_tracks_types::{Alias, BlobId, MarkerLine, Revision, is_full_hash};

/// One blob entry of a recursive tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob: BlobId,
}

/// Split file content into lines the way line numbers are counted.
///
/// A trailing newline does not start an extra line.
pub fn split_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines()
}

/// [`split_lines`] over raw bytes, for content that need not be UTF-8
pub fn split_byte_lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content
        .split_inclusive(|b| *b == b'\n')
        .map(|line| match line.strip_suffix(b"\n") {
            Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
            None => line,
        })
}

/// Parse `git branch -av --abbrev=40` output.
///
/// A line is a branch iff, after dropping the `* ` current-branch prefix, it
/// has at least two whitespace-separated fields and the second is a full hash.
/// Symbolic refs (`origin/HEAD -> origin/main`) and detached heads fall out.
pub fn parse_branches(out: &str) -> Vec<Alias> {
    out.lines()
        .filter_map(|line| {
            let line = line.trim_matches(|c: char| c == '*' || c.is_whitespace());
            let mut fields = line.split_whitespace();
            let branch = fields.next()?;
            let revision = fields.next()?;
            is_full_hash(revision).then(|| Alias {
                branch: branch.to_string(),
                revision: Revision::new(revision),
            })
        })
        .collect()
}

/// Parse `git ls-tree -r -z` output into blob entries.
///
/// Records are NUL-terminated: `<mode> SP <type> SP <object> TAB <path>`.
/// Everything after the first tab is the path, so paths holding spaces, tabs,
/// quotes or newlines survive. Records without a tab fall back to splitting on
/// single spaces with the remainder as the path. Non-blob entries (submodule
/// commits) are skipped.
pub fn parse_tree(out: &str) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    for line in out.split('\0') {
        if line.trim().is_empty() {
            continue;
        }

        let (meta, path) = match line.split_once('\t') {
            Some((meta, path)) => (meta, path),
            None => {
                let mut parts = line.splitn(4, ' ');
                let (Some(mode), Some(kind), Some(object), Some(path)) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return Err(TrackError::MalformedOutput(format!("ls-tree line: {}", line)));
                };
                let meta_len = mode.len() + kind.len() + object.len() + 2;
                (&line[..meta_len], path)
            }
        };

        let fields: Vec<&str> = meta.split_whitespace().collect();
        let [_mode, kind, object] = fields.as_slice() else {
            return Err(TrackError::MalformedOutput(format!("ls-tree line: {}", line)));
        };
        if *kind != "blob" {
            continue;
        }
        if !is_full_hash(object) || path.is_empty() {
            return Err(TrackError::MalformedOutput(format!("ls-tree line: {}", line)));
        }

        entries.push(TreeEntry {
            path: path.to_string(),
            blob: BlobId::new(*object),
        });
    }

    Ok(entries)
}

/// Parse `git blame --line-porcelain` output.
///
/// Each section is a header `<revision> <origLine> <finalLine> [<count>]`,
/// metadata lines, and finally the tab-prefixed source line. A
/// `filename <path>` metadata line overrides `default_path` for its section.
/// Every section becomes one [`MarkerLine`], in reported order.
pub fn parse_blame(default_path: &str, out: &str) -> Result<Vec<MarkerLine>> {
    let mut result = Vec::new();
    let mut lines = out.lines();

    while let Some(header) = lines.next() {
        if header.is_empty() {
            continue;
        }

        let mut parts = header.split(' ');
        let revision = parts
            .next()
            .filter(|r| is_full_hash(r))
            .ok_or_else(|| TrackError::MalformedOutput(format!("blame header: {}", header)))?;
        let line_number = parts
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| TrackError::MalformedOutput(format!("blame header: {}", header)))?;

        let mut file_name = default_path.to_string();
        let contents = loop {
            match lines.next() {
                Some(line) => {
                    if let Some(source) = line.strip_prefix('\t') {
                        break source.to_string();
                    }
                    if let Some(name) = line.strip_prefix("filename ") {
                        file_name = unquote_path(name);
                    }
                }
                None => {
                    return Err(TrackError::MalformedOutput(format!(
                        "blame section for {} has no source line",
                        revision
                    )));
                }
            }
        };

        result.push(MarkerLine {
            revision: Revision::new(revision),
            file_name,
            line_number,
            contents,
        });
    }

    if result.is_empty() {
        return Err(TrackError::MalformedOutput(format!(
            "empty blame output for {}",
            default_path
        )));
    }

    Ok(result)
}

/// Parse `git log --pretty=oneline --no-abbrev-commit` into revisions
pub fn parse_log_revisions(out: &str) -> Result<Vec<Revision>> {
    let mut revisions = Vec::new();
    for line in out.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let hash = line.split_whitespace().next().unwrap_or_default();
        if !is_full_hash(hash) {
            return Err(TrackError::MalformedOutput(format!("log line: {}", line)));
        }
        revisions.push(Revision::new(hash));
    }
    Ok(revisions)
}

/// Whether a commit patch removes a line equal to `contents` without also
/// adding one back. Compared as bytes, since neither side need be UTF-8.
pub fn patch_closes(patch: &[u8], contents: &[u8]) -> bool {
    let mut removes = false;
    for line in split_byte_lines(patch) {
        if let Some(added) = line.strip_prefix(b"+")
            && added == contents
        {
            return false;
        }
        if let Some(removed) = line.strip_prefix(b"-")
            && removed == contents
        {
            removes = true;
        }
    }
    removes
}

/// Undo git's C-style path quoting (`"we\"ird.txt"`, `"caf\303\251"`).
///
/// Names git left unquoted are returned as they are.
pub fn unquote_path(name: &str) -> String {
    let Some(inner) = name
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return name.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        rest = tail;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let Some((&escaped, tail)) = rest.split_first() else {
            bytes.push(b);
            break;
        };
        rest = tail;
        match escaped {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b't' => bytes.push(b'\t'),
            b'n' => bytes.push(b'\n'),
            b'v' => bytes.push(0x0b),
            b'f' => bytes.push(0x0c),
            b'r' => bytes.push(b'\r'),
            b'0'..=b'7' => {
                let digits: Vec<u8> = std::iter::once(escaped)
                    .chain(rest.iter().copied().take(2).take_while(|d| (b'0'..=b'7').contains(d)))
                    .collect();
                rest = &rest[digits.len() - 1..];
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                bytes.push((value & 0xff) as u8);
            }
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse a `%ct` commit timestamp
pub fn parse_timestamp(out: &str) -> Result<i64> {
    out.trim()
        .parse::<i64>()
        .map_err(|e| TrackError::MalformedOutput(format!("timestamp '{}': {}", out.trim(), e)))
}
