use std::fmt;

use crate::hash::HashError;
use crate::interop::InteropError;
use crate::module_id::ModuleId;
use crate::runtime::RuntimeError;

/// An import that names no real or virtual module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolutionFailure {
    /// Root-relative path of the importing module.
    pub importer: String,
    pub specifier: String,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' imported from {}", self.specifier, self.importer)
    }
}

/// Errors raised by graph construction and validation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// One or more edges of a single update could not be resolved. The graph
    /// was left untouched.
    #[error("unresolved imports: {}", format_failures(.0))]
    Unresolved(Vec<ResolutionFailure>),

    /// An edge points at a module that is not in the graph.
    #[error("dangling edge {from} -> {to} ('{specifier}')")]
    DanglingEdge {
        from: ModuleId,
        to: ModuleId,
        specifier: String,
    },

    #[error("module not found: {0}")]
    ModuleNotFound(ModuleId),
}

fn format_failures(failures: &[ResolutionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error types for kiln-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Interop(#[from] InteropError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Result type alias for kiln-graph operations.
pub type Result<T> = std::result::Result<T, Error>;
