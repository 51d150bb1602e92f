//! Declared `requires` graph
//!
//! A static view of which archive requires which, read straight from the
//! descriptors without building anything. Used for inspection; building
//! itself resolves dependencies through [`Registry::build`](super::Registry::build).
//! Uses petgraph for graph operations.

use petgraph::algo::toposort;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use super::archive::Archive;
use super::registry::Registry;
use super::tag::{self, DirectiveKind};

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Requires graph contains a cycle through '{0}'")]
    CycleDetected(String),

    #[error("Archive '{0}' requires non-existent archive '{1}'")]
    ArchiveNotFound(String, String),

    #[error("Archive '{0}' is not in the graph")]
    UnknownArchive(String),

    #[error("Archive '{0}' has a 'requires' directive without an archive name on line {1}")]
    MissingName(String, usize),
}

/// Archives and their declared `requires` edges
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph, edges point from dependency to dependent
    graph: DiGraph<String, &'static str>,

    /// Map from archive name to node index
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds the graph from every archive in a registry
    pub fn from_registry(registry: &Registry) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        for archive in registry.iter() {
            graph.add_archive(archive.name());
        }

        for archive in registry.iter() {
            for required in declared_requirements(archive)? {
                graph.add_dependency(archive.name(), &required)?;
            }
        }

        Ok(graph)
    }

    pub fn add_archive(&mut self, name: &str) {
        if !self.node_map.contains_key(name) {
            let idx = self.graph.add_node(name.to_string());
            self.node_map.insert(name.to_string(), idx);
        }
    }

    /// Adds an edge: `archive` requires `required`
    pub fn add_dependency(&mut self, archive: &str, required: &str) -> Result<(), GraphError> {
        let archive_idx = *self
            .node_map
            .get(archive)
            .ok_or_else(|| GraphError::UnknownArchive(archive.to_string()))?;

        let required_idx = *self
            .node_map
            .get(required)
            .ok_or_else(|| GraphError::ArchiveNotFound(archive.to_string(), required.to_string()))?;

        if self.graph.find_edge(required_idx, archive_idx).is_none() {
            self.graph.add_edge(required_idx, archive_idx, "requires");
        }

        Ok(())
    }

    /// Direct requirements of an archive
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.neighbors(name, petgraph::Direction::Incoming)
    }

    /// Archives that directly require `name`
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.neighbors(name, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: petgraph::Direction) -> Vec<String> {
        let Some(&idx) = self.node_map.get(name) else {
            return vec![];
        };

        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        names.sort();
        names
    }

    /// All archives, requirements before the archives that need them
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        toposort(&self.graph, None)
            .map(|order| {
                order
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect()
            })
            .map_err(|cycle| {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                GraphError::CycleDetected(name)
            })
    }

    /// Renders the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.graph))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

/// Names listed in an archive's `requires` directives, in file order
pub fn declared_requirements(archive: &Archive) -> Result<Vec<String>, GraphError> {
    tag::parse(archive.text())
        .directives
        .iter()
        .filter(|d| d.kind() == Ok(DirectiveKind::Requires))
        .map(|d| {
            d.text(0)
                .map(str::to_string)
                .map_err(|e| GraphError::MissingName(archive.name().to_string(), e.line + 1))
        })
        .collect()
}
