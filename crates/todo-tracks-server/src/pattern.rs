// crates/todo-tracks-server/src/pattern.rs
// Marker pattern and path exclusions, compiled once per repository handle

use crate::error::Result;
use regex::Regex;

/// Matches "todo" in any case when not embedded in a longer word
pub const DEFAULT_TODO_REGEX: &str = "(^|[^[:alpha:]])(t|T)(o|O)(d|D)(o|O)[^[:alpha:]]";

/// Compiled set of path-exclusion regexes.
///
/// A path is excluded when any regex finds a match anywhere in it.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Regex>,
    key: String,
}

impl ExcludeSet {
    /// Parse a comma-separated list of regexes; blank entries are ignored
    pub fn parse(list: &str) -> Result<Self> {
        let sources: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let patterns = sources
            .iter()
            .map(|s| Regex::new(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            key: sources.join(","),
        })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Canonical text of the set, used to key cached aggregates
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The marker pattern plus the handle's default exclusions
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    marker: Regex,
    excludes: ExcludeSet,
}

impl PatternMatcher {
    pub fn new(todo_regex: &str, exclude_paths: &str) -> Result<Self> {
        Ok(Self {
            marker: Regex::new(todo_regex)?,
            excludes: ExcludeSet::parse(exclude_paths)?,
        })
    }

    pub fn is_marker(&self, line: &str) -> bool {
        self.marker.is_match(line)
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.is_excluded(path)
    }

    pub fn excludes(&self) -> &ExcludeSet {
        &self.excludes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;

    fn default_matcher() -> PatternMatcher {
        PatternMatcher::new(DEFAULT_TODO_REGEX, "").unwrap()
    }

    #[test]
    fn test_default_pattern_matches_markers() {
        let matcher = default_matcher();
        assert!(matcher.is_marker("// TODO: handle errors"));
        assert!(matcher.is_marker("# todo fix"));
        assert!(matcher.is_marker("/* ToDo(alice) */"));
        assert!(matcher.is_marker("TODO "));
    }

    #[test]
    fn test_default_pattern_skips_embedded_words() {
        let matcher = default_matcher();
        assert!(!matcher.is_marker("let mastodon = 1;"));
        assert!(!matcher.is_marker("todos.push(item);"));
        // Needs a trailing non-letter
        assert!(!matcher.is_marker("// TODO"));
    }

    #[test]
    fn test_exclude_set_parse() {
        let excludes = ExcludeSet::parse(" vendor/ , ,\\.min\\.js$").unwrap();
        assert_eq!(excludes.key(), "vendor/,\\.min\\.js$");
        assert!(excludes.is_excluded("third_party/vendor/lib.c"));
        assert!(excludes.is_excluded("static/app.min.js"));
        assert!(!excludes.is_excluded("src/main.rs"));
    }

    #[test]
    fn test_empty_exclude_set() {
        let excludes = ExcludeSet::parse("").unwrap();
        assert!(excludes.is_empty());
        assert!(!excludes.is_excluded("anything"));
        assert_eq!(excludes.key(), "");
    }

    #[test]
    fn test_invalid_pattern_rejected_up_front() {
        let result = PatternMatcher::new("(unclosed", "");
        assert!(matches!(result, Err(TrackError::Pattern(_))));
        let result = PatternMatcher::new(DEFAULT_TODO_REGEX, "[bad");
        assert!(matches!(result, Err(TrackError::Pattern(_))));
    }
}
