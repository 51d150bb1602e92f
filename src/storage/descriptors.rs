//! Descriptor discovery
//!
//! Descriptors live in a single directory and are recognised by their file
//! name suffix (`.archive.md` by default). Loading reads every descriptor
//! into an unstarted [`Archive`] and registers it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::domain::{Archive, Registry};

/// Store for descriptor files
pub struct DescriptorStore {
    /// Directory containing descriptor files
    dir: PathBuf,

    /// File name suffix that marks a descriptor
    suffix: String,
}

impl DescriptorStore {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists descriptor paths, sorted by file name
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            anyhow::bail!("Descriptor directory not found: {}", self.dir.display());
        }

        let mut paths = Vec::new();

        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory: {}", self.dir.display()))?
        {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            let is_descriptor = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(&self.suffix));

            if is_descriptor && path.is_file() {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Reads one descriptor into an unstarted archive
    pub fn read(&self, path: &Path) -> Result<Archive> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read descriptor: {}", path.display()))?;

        Ok(Archive::new(path, text))
    }

    /// Reads every descriptor into a registry
    pub fn load_registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();

        for path in self.paths()? {
            let archive = self.read(&path)?;
            debug!(archive = archive.name(), path = %path.display(), "registered descriptor");
            registry.insert(archive)?;
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArchiveState, BuildError};
    use tempfile::TempDir;

    #[test]
    fn finds_descriptors_by_suffix() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("full.archive.md"), "@ver 1\n").unwrap();
        fs::write(dir.path().join("core.archive.md"), "@ver 1\n").unwrap();
        fs::write(dir.path().join("notes.md"), "not a descriptor").unwrap();
        fs::create_dir(dir.path().join("dir.archive.md")).unwrap();

        let store = DescriptorStore::new(dir.path(), ".archive.md");
        let names: Vec<_> = store
            .paths()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["core.archive.md", "full.archive.md"]);
    }

    #[test]
    fn loads_unstarted_archives() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("core.archive.md"), "@ver 1.0\n@include core/\n").unwrap();
        fs::write(dir.path().join("leds.v2.archive.md"), "@ver 2\n").unwrap();

        let registry = DescriptorStore::new(dir.path(), ".archive.md")
            .load_registry()
            .unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["core", "leds.v2"]);
        let core = registry.get("core").unwrap();
        assert_eq!(core.state(), ArchiveState::Unstarted);
        assert_eq!(core.text(), "@ver 1.0\n@include core/\n");
    }

    #[test]
    fn custom_suffix() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("core.pkg.txt"), "@ver 1\n").unwrap();
        fs::write(dir.path().join("full.archive.md"), "@ver 1\n").unwrap();

        let registry = DescriptorStore::new(dir.path(), ".pkg.txt")
            .load_registry()
            .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["core"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("core.a.md"), "@ver 1\n").unwrap();
        fs::write(dir.path().join("core.b.md"), "@ver 1\n").unwrap();

        let err = DescriptorStore::new(dir.path(), ".md")
            .load_registry()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::DuplicateArchive { .. })
        ));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = DescriptorStore::new(dir.path().join("nope"), ".archive.md");
        assert!(store.paths().is_err());
    }
}
