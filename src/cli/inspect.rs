//! Read-only commands: list, show and graph

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::output::Output;
use crate::domain::{declared_requirements, BuildError, DependencyGraph};
use crate::storage::{scan_sources, Project};

#[derive(Debug, Serialize)]
struct DescriptorEntry<'a> {
    name: &'a str,
    path: &'a Path,
}

#[derive(Debug, Serialize)]
struct ArchiveDetail<'a> {
    name: &'a str,
    version: &'a str,
    requires: &'a [String],
    files: Vec<&'a str>,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct GraphEntry {
    name: String,
    requires: Vec<String>,
    required_by: Vec<String>,
}

/// Lists discovered descriptors without building them
pub fn list(output: &Output, project: &Project) -> Result<()> {
    let store = project.descriptor_store();
    let registry = store.load_registry()?;
    output.verbose_ctx("list", &format!("Found {} descriptors", registry.len()));

    let entries: Vec<_> = registry
        .iter()
        .map(|archive| DescriptorEntry {
            name: archive.name(),
            path: archive.source_path(),
        })
        .collect();

    output.report(&entries, || {
        if entries.is_empty() {
            println!("No descriptors found in {}", store.dir().display());
        }
        for entry in &entries {
            let path = entry.path.display().to_string();
            output.row(&[entry.name, path.as_str()]);
        }
    })
}

/// Resolves one archive and prints its version, files and description
pub fn show(output: &Output, project: &Project, name: &str) -> Result<()> {
    let files = scan_sources(&project.source_root())?;
    let mut registry = project.descriptor_store().load_registry()?;

    registry.build(name, &files)?;
    output.verbose_ctx(
        "show",
        &format!("Resolved {} after {:?}", name, registry.finish_order()),
    );
    let archive = registry
        .get(name)
        .ok_or_else(|| BuildError::ArchiveNotFound(name.to_string()))?;

    let detail = ArchiveDetail {
        name: archive.name(),
        version: archive.version().unwrap_or_default(),
        requires: archive.required_archives(),
        files: archive.files().iter().map(|f| f.relative_path()).collect(),
        description: archive.description(),
    };

    output.report(&detail, || {
        println!("{} {}", detail.name, detail.version);
        if !detail.requires.is_empty() {
            println!("requires: {}", detail.requires.join(", "));
        }

        output.blank();
        println!("Files ({}):", detail.files.len());
        for path in &detail.files {
            println!("  {}", path);
        }

        if !detail.description.trim().is_empty() {
            output.blank();
            print!("{}", detail.description);
        }
    })
}

/// Prints declared requirements in dependency order, or as DOT
pub fn graph(output: &Output, project: &Project, dot: bool) -> Result<()> {
    let registry = project.descriptor_store().load_registry()?;
    let graph = DependencyGraph::from_registry(&registry)?;

    if dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    let order = graph.topological_order()?;
    output.verbose_ctx("graph", &format!("{} archives in dependency order", order.len()));

    let mut entries = Vec::with_capacity(order.len());
    for name in order {
        let requires = match registry.get(&name) {
            Some(archive) => declared_requirements(archive)?,
            None => Vec::new(),
        };
        let required_by = graph.dependents(&name);
        entries.push(GraphEntry {
            name,
            requires,
            required_by,
        });
    }

    output.report(&entries, || {
        for entry in &entries {
            let requires = if entry.requires.is_empty() {
                "-".to_string()
            } else {
                entry.requires.join(", ")
            };
            output.row(&[entry.name.as_str(), requires.as_str()]);
        }
    })
}
