//! Configuration handling for srcpack
//!
//! Configuration is stored in `srcpack.toml` at the project root and
//! `~/.config/srcpack/config.toml` (global).

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File that marks a project root
pub const CONFIG_FILE_NAME: &str = "srcpack.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Packaging format of emitted artifacts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// Uncompressed tar
    #[default]
    Tar,
    /// Gzip-compressed tar
    TarGz,
}

impl ArtifactFormat {
    /// File extension of the artifact, without a leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Tar => "tar",
            ArtifactFormat::TarGz => "tar.gz",
        }
    }
}

/// How each finished archive is written out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmitConfig {
    /// Directory inside the artifact that holds the selected files
    pub frame_dir: PathBuf,

    /// Directory inside the artifact that holds `files_{name}.json`
    pub manifest_dir: PathBuf,

    /// Artifact format
    pub format: ArtifactFormat,

    /// Publish the description as `{name}.md` next to the artifact
    pub write_description: bool,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            frame_dir: PathBuf::from("src"),
            manifest_dir: PathBuf::from("srcpack"),
            format: ArtifactFormat::Tar,
            write_description: true,
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Root of the candidate files, relative to the project root
    pub source_dir: PathBuf,

    /// Directory containing descriptor files
    pub descriptor_dir: PathBuf,

    /// Directory replaced with the artifacts of a successful build
    pub output_dir: PathBuf,

    /// File name suffix that marks a descriptor
    pub descriptor_suffix: String,

    /// Emitter settings
    pub emit: EmitConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            descriptor_dir: PathBuf::from("archives.d"),
            output_dir: PathBuf::from("archives"),
            descriptor_suffix: ".archive.md".to_string(),
            emit: EmitConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Checks values that would make a build meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.descriptor_suffix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "descriptor_suffix must not be empty".to_string(),
            ));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "output_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Rejects an output directory that a build must never delete
    ///
    /// Paths are compared after lexical normalisation against `root`, so
    /// `./src`, `src/gen` and `src/..` are caught as well as `src`. The
    /// output directory may not be the project root or one of its
    /// ancestors, and may not overlap the source or descriptor directory.
    pub fn check_output_dir(&self, root: &Path, output_dir: &Path) -> Result<(), ConfigError> {
        let root = normalize_path(root);
        let output = normalize_path(&root.join(output_dir));

        if output == root || root.starts_with(&output) {
            return Err(ConfigError::Invalid(format!(
                "output_dir '{}' would delete the project root",
                output_dir.display()
            )));
        }

        let protected = [
            ("source_dir", &self.source_dir),
            ("descriptor_dir", &self.descriptor_dir),
        ];

        for (key, dir) in protected {
            let dir = normalize_path(&root.join(dir));
            if output.starts_with(&dir) || dir.starts_with(&output) {
                return Err(ConfigError::Invalid(format!(
                    "output_dir '{}' overlaps {} '{}' and would be deleted on every build",
                    output_dir.display(),
                    key,
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Resolves `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "srcpack", "srcpack").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .validate()
            .and_then(|()| config.check_output_dir(project_root, &config.output_dir))
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the project root by looking for `srcpack.toml`
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(&current)
    }

    /// Finds the project root starting at `start` and walking up
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(CONFIG_FILE_NAME).is_file() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
