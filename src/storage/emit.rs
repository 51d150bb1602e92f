//! Artifact emission
//!
//! Each finished archive is laid out in its own temporary directory:
//!
//! ```text
//! {frame_dir}/
//! └── core/A.java          # every resolved file, by relative path
//! {manifest_dir}/
//! └── files_{name}.json    # {"version": ..., "files": [...]}
//! ```
//!
//! That directory is packed into `{name}.tar` (or `.tar.gz`) inside the run
//! staging directory, next to `{name}.md` holding the description. Only
//! after every archive of the run has been emitted does [`RunStaging::publish`]
//! replace the output directory.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::config::{ArtifactFormat, EmitConfig};
use crate::domain::Archive;

/// What was written for one archive
#[derive(Debug, Clone, Serialize)]
pub struct EmittedArchive {
    pub name: String,
    pub version: String,
    pub file_count: usize,
    pub artifact: PathBuf,
    pub description: Option<PathBuf>,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Temporary directory collecting the artifacts of one run
///
/// Dropping it without publishing deletes everything it holds.
pub struct RunStaging {
    dir: TempDir,
}

impl RunStaging {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("srcpack-run-")
            .tempdir()
            .context("Failed to create run staging directory")?;

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes the artifact, manifest and description of a finished archive
    pub fn emit(&self, archive: &Archive, config: &EmitConfig) -> Result<EmittedArchive> {
        emit_archive(archive, config, self.path())
    }

    /// Replaces `output_dir` with the staged artifacts
    pub fn publish(self, output_dir: &Path) -> Result<()> {
        info!(output = %output_dir.display(), "replacing output directory");

        if output_dir.exists() {
            fs::remove_dir_all(output_dir).with_context(|| {
                format!("Failed to remove output directory: {}", output_dir.display())
            })?;
        }

        copy_tree(self.path(), output_dir)
    }
}

/// Emits one finished archive into `out_dir`
pub fn emit_archive(archive: &Archive, config: &EmitConfig, out_dir: &Path) -> Result<EmittedArchive> {
    let started = Instant::now();
    let name = archive.name();
    let manifest = archive
        .manifest()
        .ok_or_else(|| anyhow::anyhow!("Archive '{}' has not finished building", name))?;

    let description = if config.write_description {
        let path = out_dir.join(format!("{}.md", name));
        fs::write(&path, archive.description())
            .with_context(|| format!("Failed to write description: {}", path.display()))?;
        Some(path)
    } else {
        None
    };

    let staging = tempfile::Builder::new()
        .prefix(&format!("srcpack-{}-", name))
        .tempdir()
        .with_context(|| format!("Failed to create staging directory for '{}'", name))?;
    debug!(archive = name, staging = %staging.path().display(), "staging archive");

    let manifest_dir = staging.path().join(&config.manifest_dir);
    fs::create_dir_all(&manifest_dir)
        .with_context(|| format!("Failed to create directory: {}", manifest_dir.display()))?;

    let manifest_path = manifest_dir.join(format!("files_{}.json", name));
    let file = File::create(&manifest_path)
        .with_context(|| format!("Failed to create manifest: {}", manifest_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &manifest).context("Failed to serialize manifest")?;
    writer.flush().context("Failed to flush manifest")?;

    let frame = staging.path().join(&config.frame_dir);
    fs::create_dir_all(&frame)
        .with_context(|| format!("Failed to create directory: {}", frame.display()))?;

    for source in archive.files() {
        let dst = frame.join(source.relative_path());
        debug!(archive = name, file = source.relative_path(), "copying");

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::copy(source.absolute_path(), &dst).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.absolute_path().display(),
                dst.display()
            )
        })?;
    }

    let artifact = out_dir.join(format!("{}.{}", name, config.format.extension()));
    write_artifact(staging.path(), &artifact, config.format)?;
    let elapsed = started.elapsed();
    info!(
        archive = name,
        artifact = %artifact.display(),
        elapsed_ms = elapsed.as_millis() as u64,
        "packed archive"
    );

    Ok(EmittedArchive {
        name: name.to_string(),
        version: manifest.version,
        file_count: manifest.files.len(),
        artifact,
        description,
        elapsed,
    })
}

/// Packs the contents of `src` into a tar artifact
fn write_artifact(src: &Path, artifact: &Path, format: ArtifactFormat) -> Result<()> {
    let file = File::create(artifact)
        .with_context(|| format!("Failed to create artifact: {}", artifact.display()))?;
    let writer = BufWriter::new(file);

    let mut writer = match format {
        ArtifactFormat::Tar => append_tree(writer, src)?,
        ArtifactFormat::TarGz => {
            let encoder = GzEncoder::new(writer, Compression::default());
            append_tree(encoder, src)?
                .finish()
                .context("Failed to finish gzip stream")?
        }
    };

    writer
        .flush()
        .with_context(|| format!("Failed to flush artifact: {}", artifact.display()))
}

fn append_tree<W: Write>(writer: W, src: &Path) -> Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder
        .append_dir_all(".", src)
        .with_context(|| format!("Failed to archive {}", src.display()))?;
    builder.into_inner().context("Failed to finish tar archive")
}

/// Copies every file and directory under `src` into `dst`
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Path outside staging: {}", entry.path().display()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }

    Ok(())
}
