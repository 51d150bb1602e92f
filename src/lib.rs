//! srcpack - Build source archives from tagged descriptor files
//!
//! Each descriptor is a small markdown document whose `@` directives pick
//! files out of a shared source tree by path prefix and pull in the files of
//! other archives. A build resolves every descriptor, packs the selected
//! files with a manifest into a tar artifact and publishes the description
//! next to it.

pub mod cli;
pub mod domain;
pub mod storage;

pub use domain::{Archive, ArchiveState, BuildError, Registry, SourceFile};
