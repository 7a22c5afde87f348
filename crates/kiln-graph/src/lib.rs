//! # kiln-graph
//!
//! Foundation for the kiln build engine: module identity, canonical hashing,
//! the runtime abstraction and the module dependency graph.
//!
//! Everything here is deterministic. Module ids are derived from the module
//! kind and its root-relative path, and every hash goes through
//! [`canonical_hash`], so two machines building the same project agree on
//! every identity.
//!
//! ## Building a graph
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln_graph::{DependencyGraph, EdgeSpec, ModuleKind, NativeRuntime, RuntimeResolver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(NativeRuntime::new());
//! let resolver = Arc::new(RuntimeResolver::new(runtime, "/project"));
//! let graph = DependencyGraph::new("/project", resolver);
//!
//! let entry = graph.add_or_update_node(
//!     "src/main.ts",
//!     ModuleKind::File,
//!     vec![EdgeSpec::static_import("./app")],
//! )?;
//! graph.mark_entry(&entry)?;
//! # Ok(())
//! # }
//! ```

pub mod css;
pub mod edge;
pub mod error;
pub mod hash;
pub mod interop;
pub mod module;
pub mod module_id;
pub mod path;
pub mod resolver;
pub mod runtime;

mod memory;

pub use css::{CssPrecedenceResolver, DEFAULT_LAYERS};
pub use edge::{EdgeKind, EdgeMetadata, EdgeSpec, GraphEdge, Precedence};
pub use error::{Error, GraphError, ResolutionFailure, Result};
pub use hash::{CanonicalHasher, ContentHash, HashError, canonical_hash, hash_bytes};
pub use interop::{
    ExportMap, InteropError, analyze_exports, is_self_accepting, scan_dependencies,
};
pub use memory::DependencyGraph;
pub use module::{GraphNode, ModuleKind};
pub use module_id::ModuleId;
pub use path::{is_virtual, normalize_path, normalize_path_from, relative_to_root};
pub use resolver::{ModuleResolver, ResolvedModule, RuntimeResolver};
pub use runtime::{FileMetadata, MemoryRuntime, Runtime, RuntimeError, RuntimeResult};

#[cfg(not(target_family = "wasm"))]
pub use runtime::NativeRuntime;
