use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::enums::{ModeArg, TargetArg};

/// Available kiln subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build entries into the output directory
    ///
    /// Writes content-addressed artifacts and a manifest.json. Unchanged
    /// inputs are served from the build cache.
    Build(BuildArgs),

    /// Watch the project and decide hot updates
    ///
    /// Loads the module graph once, then prints a hot-update, style-update
    /// or reload decision for every batch of file changes.
    Dev(DevArgs),
}

/// Options shared by every command that loads a project.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Entry points, relative to the project root
    ///
    /// Overrides build.entries from kiln.toml.
    ///
    /// Examples:
    ///   kiln build src/main.ts
    ///   kiln build src/main.ts src/worker.ts
    #[arg(value_name = "ENTRY")]
    pub entries: Vec<String>,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration profile to apply (e.g. production)
    #[arg(short, long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Target environment
    #[arg(short, long, value_enum)]
    pub target: Option<TargetArg>,

    /// Build mode
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output directory for artifacts and manifest.json
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Build without reading or writing the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Ignore cached results but store fresh ones
    #[arg(long, conflicts_with = "no_cache")]
    pub force: bool,

    /// Build twice from scratch and fail if the outputs differ
    #[arg(long)]
    pub verify: bool,

    /// Print the build fingerprint as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the dev command
#[derive(Args, Debug)]
pub struct DevArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Quiet period before a batch of changes is decided, in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce: Option<u64>,
}
