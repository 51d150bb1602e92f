//! # Storage Layer
//!
//! Everything that touches the filesystem: configuration, descriptor
//! discovery, source scanning and artifact emission.
//!
//! ## Project Structure
//!
//! ```text
//! project/
//! ├── srcpack.toml          # Project configuration
//! ├── .srcpack.lock         # Held while a build runs
//! ├── src/                  # Candidate files (source_dir)
//! ├── archives.d/           # Descriptors (descriptor_dir)
//! │   └── core.archive.md
//! └── archives/             # Replaced by every successful build (output_dir)
//!     ├── core.md
//!     └── core.tar
//! ```
//!
//! ## Failure Safety
//!
//! Artifacts are written to a temporary run directory first. The output
//! directory is only replaced once every archive has been emitted, so a
//! failed build leaves the previous output untouched.
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a srcpack project
//! - [`DescriptorStore`] - Finds descriptors and loads them into a registry
//! - [`RunStaging`] - Collects artifacts and publishes them
//! - [`Config`] - Project and global configuration

mod config;
mod descriptors;
mod emit;
mod project;
mod scan;

pub use config::{
    ArtifactFormat, Config, ConfigError, EmitConfig, GlobalConfig, OutputFormat, ProjectConfig,
    CONFIG_FILE_NAME,
};
pub use descriptors::DescriptorStore;
pub use emit::{emit_archive, EmittedArchive, RunStaging};
pub use project::{Project, ProjectError, RunLock};
pub use scan::scan_sources;
