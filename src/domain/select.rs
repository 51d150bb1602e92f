//! File selection by path prefix

use std::sync::Arc;

use super::archive::SourceFile;

/// Filters `files` by include and exclude prefixes
///
/// A file is kept when its relative path starts with any include prefix and
/// with no exclude prefix. Matching is plain string comparison, so `foo`
/// also matches `foobar/x`. The input order is preserved.
pub fn select<S: AsRef<str>>(
    files: &[Arc<SourceFile>],
    includes: &[S],
    excludes: &[S],
) -> Vec<Arc<SourceFile>> {
    files
        .iter()
        .filter(|file| matches_any(file.relative_path(), includes))
        .filter(|file| excludes.is_empty() || !matches_any(file.relative_path(), excludes))
        .cloned()
        .collect()
}

fn matches_any<S: AsRef<str>>(path: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix.as_ref()))
}
