//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{build, inspect};
use crate::domain::BuildError;
use crate::storage::{Config, Project, ProjectError};

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "SRCPACK_LOG";

#[derive(Parser)]
#[command(name = "srcpack")]
#[command(author, version, about = "Build source archives from tagged descriptor files")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (defaults to the nearest directory holding srcpack.toml)
    #[arg(long, global = true, env = "SRCPACK_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new srcpack project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Build every archive and replace the output directory
    Build {
        /// Output directory (overrides output_dir from srcpack.toml)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Resolve every archive without writing anything
    Check,

    /// List discovered descriptors
    List,

    /// Resolve one archive and print its contents
    Show {
        /// Archive name
        archive: String,
    },

    /// Print the declared requires graph
    Graph {
        /// Render as Graphviz DOT
        #[arg(long)]
        dot: bool,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format);

    output.verbose("srcpack starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path.display()));
            let project = Project::init(&path)?;
            output.success(&format!(
                "Initialized srcpack project at {}",
                project.root().display()
            ));
        }

        Commands::Build { output: dir } => {
            let project = Project::open_at(cli.root.as_deref())?;
            build::build(&output, &project, dir.as_deref())?
        }

        Commands::Check => {
            let project = Project::open_at(cli.root.as_deref())?;
            build::check(&output, &project)?
        }

        Commands::List => {
            let project = Project::open_at(cli.root.as_deref())?;
            inspect::list(&output, &project)?
        }

        Commands::Show { archive } => {
            let project = Project::open_at(cli.root.as_deref())?;
            inspect::show(&output, &project, &archive)?
        }

        Commands::Graph { dot } => {
            let project = Project::open_at(cli.root.as_deref())?;
            inspect::graph(&output, &project, dot)?
        }
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// Prints a failed run to stderr
///
/// Descriptor and project problems are the user's to fix and get a one-line
/// message; anything else is printed with its full cause chain.
pub fn report_error(err: &anyhow::Error) {
    if err.downcast_ref::<BuildError>().is_some() || err.downcast_ref::<ProjectError>().is_some() {
        eprintln!("Error: {}", err);
    } else {
        eprintln!("Error: {:?}", err);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "srcpack=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber may already be set when embedded; keep the existing one
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
