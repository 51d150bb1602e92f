//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init` | Write `srcpack.toml` and create the source and descriptor directories |
//! | `build` | Resolve every archive, emit artifacts, replace the output directory |
//! | `check` | Resolve every archive without writing anything |
//! | `list` | List discovered descriptors |
//! | `show` | Resolve one archive and print its files and description |
//! | `graph` | Print the declared `requires` graph |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! Use `--verbose` (or `-v`) for debug events, or set `SRCPACK_LOG` to any
//! tracing filter:
//! ```bash
//! SRCPACK_LOG=srcpack::domain=debug srcpack build
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod build;
mod inspect;
mod output;

pub use app::{report_error, run, Cli, Commands};
pub use output::{Output, OutputFormat};
