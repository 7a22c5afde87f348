//! Kiln CLI - deterministic builds from the command line.
//!
//! - [`cli`] - argument definitions
//! - [`commands`] - `kiln build` and `kiln dev`
//! - [`dev`] - file watching for dev sessions
//! - [`error`] - error types and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - terminal output
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
