//! Domain models for srcpack
//!
//! Contains the descriptor language and the build engine without any I/O
//! concerns.

mod archive;
mod graph;
mod registry;
mod select;
pub mod tag;

pub use archive::{archive_name, Archive, ArchiveState, Manifest, SourceFile};
pub use graph::{declared_requirements, DependencyGraph, GraphError};
pub use registry::{BuildError, Registry};
pub use select::select;
pub use tag::{parse, Argument, ArityError, Directive, DirectiveKind, ParsedDescriptor};
