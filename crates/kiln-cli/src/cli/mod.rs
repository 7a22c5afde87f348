//! Command-line interface definition.
//!
//! - `kiln build` - build entries into content-addressed artifacts
//! - `kiln dev` - watch the project and print HMR decisions

mod commands;
pub mod enums;
mod tests;

use clap::Parser;

pub use commands::{BuildArgs, Command, DevArgs, ProjectArgs};
pub use enums::{ModeArg, TargetArg};

/// Kiln - deterministic builds with content-addressed caching
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Deterministic builds with content-addressed caching",
    long_about = "Kiln builds JavaScript, TypeScript and CSS entries into content-addressed\n\
                  artifacts. Identical inputs produce identical bytes on every machine, and\n\
                  unchanged work is served from a persistent cache."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
