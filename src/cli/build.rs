//! Build and check commands

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use super::output::Output;
use crate::domain::{BuildError, Registry};
use crate::storage::{scan_sources, Project, RunStaging};

/// One archive of a finished run, as reported to the user
#[derive(Debug, Serialize)]
struct ArchiveSummary {
    name: String,
    version: String,
    files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u64>,
}

/// Report of a whole build run
#[derive(Debug, Serialize)]
struct BuildReport {
    output: PathBuf,
    elapsed_ms: u64,
    archives: Vec<ArchiveSummary>,
}

/// Builds every archive and replaces the output directory
pub fn build(output: &Output, project: &Project, output_dir: Option<&Path>) -> Result<()> {
    let started = Instant::now();

    let target = match output_dir {
        Some(dir) => std::path::absolute(dir)
            .with_context(|| format!("Failed to resolve output directory: {}", dir.display()))?,
        None => project.output_dir(),
    };
    project
        .settings()
        .check_output_dir(project.root(), &target)
        .context("Refusing to build into this output directory")?;

    let _lock = project.lock()?;
    let (registry, order) = resolve(output, project)?;

    let staging = RunStaging::new()?;
    output.verbose_ctx("build", &format!("Staging into {}", staging.path().display()));

    let mut archives = Vec::with_capacity(order.len());
    for name in &order {
        let archive = registry
            .get(name)
            .ok_or_else(|| BuildError::ArchiveNotFound(name.clone()))?;
        let emitted = staging.emit(archive, &project.settings().emit)?;

        archives.push(ArchiveSummary {
            name: emitted.name,
            version: emitted.version,
            files: emitted.file_count,
            artifact: emitted.artifact.file_name().map(|f| target.join(f)),
            elapsed_ms: Some(emitted.elapsed.as_millis() as u64),
        });
    }

    staging.publish(&target)?;

    let report = BuildReport {
        output: target,
        elapsed_ms: started.elapsed().as_millis() as u64,
        archives,
    };

    output.report(&report, || {
        for summary in &report.archives {
            let artifact = summary
                .artifact
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let files = format!("{} files", summary.files);
            output.row(&[
                summary.name.as_str(),
                summary.version.as_str(),
                files.as_str(),
                artifact.as_str(),
            ]);
        }
        output.success(&format!(
            "Built {} archive(s) into {} in {:.2}s",
            report.archives.len(),
            report.output.display(),
            report.elapsed_ms as f64 / 1000.0
        ));
    })
}

/// Resolves every archive without emitting anything
pub fn check(output: &Output, project: &Project) -> Result<()> {
    let (registry, order) = resolve(output, project)?;

    let summaries: Vec<_> = order
        .iter()
        .filter_map(|name| registry.get(name))
        .map(|archive| ArchiveSummary {
            name: archive.name().to_string(),
            version: archive.version().unwrap_or_default().to_string(),
            files: archive.files().len(),
            artifact: None,
            elapsed_ms: None,
        })
        .collect();

    output.report(&summaries, || {
        for summary in &summaries {
            let files = format!("{} files", summary.files);
            output.row(&[summary.name.as_str(), summary.version.as_str(), files.as_str()]);
        }
        output.success(&format!("{} archive(s) resolved", summaries.len()));
    })
}

/// Scans sources, loads descriptors and builds them all
///
/// Returns the registry together with the order archives finished in.
fn resolve(output: &Output, project: &Project) -> Result<(Registry, Vec<String>)> {
    let files = scan_sources(&project.source_root())?;
    output.verbose_ctx("build", &format!("Found {} candidate files", files.len()));

    let mut registry = project.descriptor_store().load_registry()?;
    output.verbose_ctx("build", &format!("Loaded {} descriptors", registry.len()));

    let order = registry.build_all(&files)?;
    Ok((registry, order))
}
