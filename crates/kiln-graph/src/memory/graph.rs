use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;

use crate::css::CssPrecedenceResolver;
use crate::module::GraphNode;
use crate::module_id::ModuleId;
use crate::resolver::{ModuleResolver, ResolvedModule};

/// Module dependency graph.
///
/// Cloning is cheap and clones share storage. Mutation happens only through
/// graph construction on a single logical thread; readers get `Arc` node
/// snapshots that stay valid after later updates.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub(super) inner: Arc<RwLock<GraphInner>>,
    pub(super) resolver: Arc<dyn ModuleResolver>,
    pub(super) root: Arc<str>,
    pub(super) css: CssPrecedenceResolver,
}

#[derive(Debug, Default)]
pub(super) struct GraphInner {
    pub nodes: HashMap<ModuleId, Arc<GraphNode>>,
    pub by_path: HashMap<String, ModuleId>,
    /// Target to importers; maintained on every update so lookups cost
    /// O(in-degree).
    pub reverse: HashMap<ModuleId, BTreeSet<ModuleId>>,
    pub entries: BTreeSet<ModuleId>,
    /// Every module id the graph has seen, loaded or not.
    pub known: HashMap<ModuleId, ResolvedModule>,
}
