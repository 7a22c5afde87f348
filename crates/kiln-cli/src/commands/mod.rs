//! Command implementations for the kiln CLI.
//!
//! - [`build`] - Build entries into content-addressed artifacts
//! - [`dev`] - Watch the project and print hot-update decisions
//!
//! Each command provides an `execute` function that takes the parsed
//! arguments and returns a Result.

pub mod build;
pub mod dev;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use dev::execute as dev_execute;
