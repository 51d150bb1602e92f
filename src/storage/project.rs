//! Project management
//!
//! A project is a directory holding `srcpack.toml`. It resolves the
//! configured directories and guards a build run with a lock file.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use super::config::{Config, ProjectConfig, CONFIG_FILE_NAME};
use super::descriptors::DescriptorStore;

/// Lock file held for the duration of a build run
const LOCK_FILE_NAME: &str = ".srcpack.lock";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a srcpack project. Run 'srcpack init' first.")]
    NotInProject,

    #[error("Another build is running in {0}")]
    Locked(PathBuf),
}

/// A srcpack project
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = std::path::absolute(&root)
            .with_context(|| format!("Failed to resolve project root: {}", root.display()))?;

        if !root.join(CONFIG_FILE_NAME).is_file() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;
        debug!(root = %root.display(), "opened project");

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Opens the project at `root` if given, otherwise searches upward
    pub fn open_at(root: Option<&Path>) -> Result<Self> {
        match root {
            Some(root) => Self::open(root),
            None => Self::open_current(),
        }
    }

    /// Initializes a new project at the given path
    ///
    /// An existing `srcpack.toml` is kept as is; missing directories are
    /// created from whatever configuration is in effect.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create project directory: {}", root.display()))?;

        let config_path = root.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            let body = toml::to_string_pretty(&ProjectConfig::default())
                .context("Failed to serialize default config")?;
            let content = format!(
                "# srcpack configuration\n\
                 # Descriptors in descriptor_dir select files from source_dir;\n\
                 # every build replaces output_dir.\n\n{}",
                body
            );
            fs::write(&config_path, content)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let project = Self::open(root)?;

        for dir in [project.source_root(), project.descriptor_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the project section of the configuration
    pub fn settings(&self) -> &ProjectConfig {
        &self.config.project
    }

    /// Root directory of the candidate files
    pub fn source_root(&self) -> PathBuf {
        self.root.join(&self.config.project.source_dir)
    }

    /// Directory containing descriptor files
    pub fn descriptor_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.descriptor_dir)
    }

    /// Directory replaced by a successful build
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.output_dir)
    }

    /// Returns the descriptor store
    pub fn descriptor_store(&self) -> DescriptorStore {
        DescriptorStore::new(
            self.descriptor_dir(),
            self.config.project.descriptor_suffix.clone(),
        )
    }

    /// Takes the exclusive run lock, failing if another run holds it
    pub fn lock(&self) -> Result<RunLock> {
        let path = self.root.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.try_lock_exclusive()
            .map_err(|_| ProjectError::Locked(self.root.clone()))?;
        debug!(lock = %path.display(), "acquired run lock");

        Ok(RunLock { file })
    }
}

/// Exclusive lock on the project, released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert!(dir.path().join(CONFIG_FILE_NAME).is_file());
        assert!(project.source_root().is_dir());
        assert!(project.descriptor_dir().is_dir());
        assert!(!project.output_dir().exists());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Project::init(dir.path()).unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "source_dir = \"java\"\n").unwrap();
        let project = Project::init(dir.path()).unwrap();

        assert_eq!(project.source_root(), dir.path().join("java"));
        assert!(dir.path().join("java").is_dir());
    }

    #[test]
    fn written_config_parses_to_defaults() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();
        assert_eq!(project.settings(), &ProjectConfig::default());
    }

    #[test]
    fn open_non_project_fails() {
        let dir = TempDir::new().unwrap();
        let err = Project::open(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProjectError>(),
            Some(ProjectError::NotInProject)
        ));
    }

    #[test]
    fn open_at_explicit_root() {
        let dir = TempDir::new().unwrap();
        Project::init(dir.path()).unwrap();

        let project = Project::open_at(Some(dir.path())).unwrap();
        assert_eq!(project.root(), dir.path());
        assert_eq!(project.descriptor_store().dir(), dir.path().join("archives.d"));
    }

    #[test]
    fn second_lock_is_refused() {
        let dir = TempDir::new().unwrap();
        let project = Project::init(dir.path()).unwrap();

        let lock = project.lock().unwrap();
        let err = project.lock().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProjectError>(),
            Some(ProjectError::Locked(_))
        ));

        drop(lock);
        assert!(project.lock().is_ok());
    }
}
