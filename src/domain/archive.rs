//! Archive domain model
//!
//! An archive is defined by one descriptor file. It starts out `Unstarted`,
//! is `BeingBuilt` while its directives and dependencies are resolved, and
//! ends `Finished` with a version and a resolved file list.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::registry::BuildError;

/// Build lifecycle of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveState {
    #[default]
    Unstarted,
    BeingBuilt,
    Finished,
}

impl ArchiveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveState::Unstarted => "unstarted",
            ArchiveState::BeingBuilt => "being_built",
            ArchiveState::Finished => "finished",
        }
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file discovered under the source root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    absolute_path: PathBuf,
    relative_path: String,
}

impl SourceFile {
    pub fn new(absolute_path: impl Into<PathBuf>, relative_path: impl Into<String>) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            relative_path: relative_path.into(),
        }
    }

    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    /// Path relative to the source root, using the platform separator
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }
}

/// Machine-readable receipt written next to each artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub files: Vec<String>,
}

/// One archive and its build state
#[derive(Debug, Clone)]
pub struct Archive {
    name: String,
    source_path: PathBuf,
    text: String,
    version: Option<String>,
    include_prefixes: Vec<String>,
    exclude_prefixes: Vec<String>,
    required_archives: Vec<String>,
    files: Vec<Arc<SourceFile>>,
    description: String,
    state: ArchiveState,
}

impl Archive {
    /// Creates an unstarted archive from a descriptor path and its contents
    pub fn new(source_path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let name = archive_name(&source_path);

        Self {
            name,
            source_path,
            text: text.into(),
            version: None,
            include_prefixes: Vec::new(),
            exclude_prefixes: Vec::new(),
            required_archives: Vec::new(),
            files: Vec::new(),
            description: String::new(),
            state: ArchiveState::Unstarted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Raw descriptor text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn include_prefixes(&self) -> &[String] {
        &self.include_prefixes
    }

    pub fn exclude_prefixes(&self) -> &[String] {
        &self.exclude_prefixes
    }

    pub fn required_archives(&self) -> &[String] {
        &self.required_archives
    }

    /// Resolved files: own selection first, then every required archive's files
    pub fn files(&self) -> &[Arc<SourceFile>] {
        &self.files
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> ArchiveState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == ArchiveState::Finished
    }

    /// Moves `Unstarted` to `BeingBuilt`
    pub fn begin_build(&mut self) -> Result<(), BuildError> {
        match self.state {
            ArchiveState::Unstarted => {
                self.state = ArchiveState::BeingBuilt;
                Ok(())
            }
            ArchiveState::BeingBuilt | ArchiveState::Finished => Err(BuildError::AlreadyStarted {
                archive: self.name.clone(),
                state: self.state,
            }),
        }
    }

    /// Records what the descriptor declared while building
    pub(crate) fn set_rules(
        &mut self,
        includes: Vec<String>,
        excludes: Vec<String>,
        requires: Vec<String>,
    ) {
        self.include_prefixes = includes;
        self.exclude_prefixes = excludes;
        self.required_archives = requires;
    }

    /// Moves `BeingBuilt` to `Finished`
    pub fn finish(
        &mut self,
        version: String,
        files: Vec<Arc<SourceFile>>,
        description: String,
    ) -> Result<(), BuildError> {
        if self.state != ArchiveState::BeingBuilt {
            return Err(BuildError::InvalidTransition {
                archive: self.name.clone(),
                from: self.state,
                to: ArchiveState::Finished,
            });
        }

        self.version = Some(version);
        self.files = files;
        self.description = description;
        self.state = ArchiveState::Finished;
        Ok(())
    }

    /// Returns the manifest of a finished archive
    pub fn manifest(&self) -> Option<Manifest> {
        if !self.is_finished() {
            return None;
        }

        Some(Manifest {
            version: self.version.clone()?,
            files: self
                .files
                .iter()
                .map(|f| f.relative_path().to_string())
                .collect(),
        })
    }
}

/// Derives an archive name by dropping the last two extensions
///
/// `tools/core.archive.md` becomes `core`.
pub fn archive_name(path: &Path) -> String {
    let once = path.file_stem().map(Path::new).unwrap_or(path);
    let twice = once.file_stem().unwrap_or(once.as_os_str());
    twice.to_string_lossy().into_owned()
}
