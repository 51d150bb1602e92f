//! Candidate file enumeration
//!
//! Every regular file under the source root whose name contains a dot is a
//! candidate. Hidden files and everything under hidden directories are
//! skipped. Relative paths use the platform separator, since that is what
//! include and exclude prefixes are matched against.

use std::path::{Path, MAIN_SEPARATOR_STR};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::domain::SourceFile;

/// Lists candidate files under `root`, sorted by path
pub fn scan_sources(root: &Path) -> Result<Vec<Arc<SourceFile>>> {
    if !root.is_dir() {
        anyhow::bail!("Source directory not found: {}", root.display());
    }

    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve source directory: {}", root.display()))?;

    let mut files = Vec::new();

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry
            .with_context(|| format!("Failed to walk source directory: {}", root.display()))?;

        if !entry.file_type().is_file() || !entry.file_name().to_string_lossy().contains('.') {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&root)
            .with_context(|| format!("File outside source root: {}", entry.path().display()))?;

        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(MAIN_SEPARATOR_STR);

        files.push(Arc::new(SourceFile::new(entry.path(), relative)));
    }

    debug!(root = %root.display(), count = files.len(), "scanned source files");
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn sep(path: &str) -> String {
        path.replace('/', MAIN_SEPARATOR_STR)
    }

    #[test]
    fn lists_files_with_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "core/A.java");
        touch(dir.path(), "core/util/B.java");
        touch(dir.path(), "leds/LedColor.java");
        touch(dir.path(), "README");

        let files = scan_sources(dir.path()).unwrap();
        let rel: Vec<_> = files.iter().map(|f| f.relative_path().to_string()).collect();

        assert_eq!(
            rel,
            vec![sep("core/A.java"), sep("core/util/B.java"), sep("leds/LedColor.java")]
        );
    }

    #[test]
    fn absolute_paths_point_at_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "core/A.java");

        let files = scan_sources(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].absolute_path().is_absolute());
        assert_eq!(fs::read_to_string(files[0].absolute_path()).unwrap(), "core/A.java");
    }

    #[test]
    fn directories_with_dots_are_not_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("v1.2")).unwrap();
        touch(dir.path(), "v1.2/X.java");

        let files = scan_sources(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path(), sep("v1.2/X.java"));
    }

    #[test]
    fn hidden_entries_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "core/A.java");
        touch(dir.path(), "core/.DS_Store");
        touch(dir.path(), "core/.idea/ws.xml");
        touch(dir.path(), ".git/config.d/x.cfg");

        let files = scan_sources(dir.path()).unwrap();
        let rel: Vec<_> = files.iter().map(|f| f.relative_path().to_string()).collect();
        assert_eq!(rel, vec![sep("core/A.java")]);
    }

    #[test]
    fn hidden_root_is_still_scanned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(".sources");
        touch(&root, "core/A.java");

        let files = scan_sources(&root).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = scan_sources(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("Source directory not found"));
    }
}
