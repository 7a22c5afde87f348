//! Hot module replacement decisions.
//!
//! For every changed file the [`HmrEngine`] decides between a hot update at
//! one or more boundaries, a stylesheet swap, or a full reload. Decisions
//! read the dependency graph's reverse edges and the modules' export shapes;
//! they never plan or build.

mod engine;
mod session;

pub use engine::HmrEngine;
pub use session::DevSession;

use std::collections::BTreeSet;

use kiln_graph::{ModuleId, ModuleKind};
use serde::{Deserialize, Serialize};

/// What to do about one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrDecision {
    /// Re-execute the boundaries, sorted by id.
    HotUpdate { boundaries: Vec<ModuleId> },
    /// Swap a stylesheet in place.
    StyleUpdate { module: ModuleId },
    Reload { reason: String },
}

impl HmrDecision {
    pub fn reload(reason: impl Into<String>) -> Self {
        HmrDecision::Reload {
            reason: reason.into(),
        }
    }

    pub fn is_reload(&self) -> bool {
        matches!(self, HmrDecision::Reload { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            HmrDecision::HotUpdate { .. } => "hot-update",
            HmrDecision::StyleUpdate { .. } => "style-update",
            HmrDecision::Reload { .. } => "reload",
        }
    }
}

impl std::fmt::Display for HmrDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HmrDecision::HotUpdate { boundaries } => {
                let ids: Vec<&str> = boundaries.iter().map(ModuleId::as_str).collect();
                write!(f, "hot-update [{}]", ids.join(", "))
            }
            HmrDecision::StyleUpdate { module } => write!(f, "style-update {module}"),
            HmrDecision::Reload { reason } => write!(f, "reload ({reason})"),
        }
    }
}

/// A changed module as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleChange {
    pub id: ModuleId,
    /// Root-relative path, for analysis and reporting.
    pub path: String,
    pub kind: ModuleKind,
    /// New content; `None` when the file could not be read.
    pub source: Option<String>,
}

/// Per-module HMR bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    pub id: ModuleId,
    pub importers: BTreeSet<ModuleId>,
    pub imported: BTreeSet<ModuleId>,
    pub is_self_accepting: bool,
    /// Milliseconds since the epoch of the last hot or style update.
    pub last_hmr_timestamp: Option<i64>,
}

/// Decisions for a batch of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HmrBatch {
    /// One decision per changed module, sorted by id.
    pub decisions: Vec<(ModuleId, HmrDecision)>,
}

impl HmrBatch {
    /// Any reload makes the whole batch a reload.
    pub fn is_reload(&self) -> bool {
        self.decisions.iter().any(|(_, d)| d.is_reload())
    }

    /// Combined decision for the batch.
    ///
    /// A reload if any change needs one; otherwise the union of hot-update
    /// boundaries, or the style swap when only one stylesheet changed.
    pub fn decision(&self) -> Option<HmrDecision> {
        if let Some((_, reload)) = self.decisions.iter().find(|(_, d)| d.is_reload()) {
            return Some(reload.clone());
        }
        match self.decisions.as_slice() {
            [] => None,
            [(_, only)] => Some(only.clone()),
            _ => Some(HmrDecision::HotUpdate {
                boundaries: self.boundaries(),
            }),
        }
    }

    /// Every module to re-execute or swap, sorted and deduplicated.
    pub fn boundaries(&self) -> Vec<ModuleId> {
        let mut all: BTreeSet<ModuleId> = BTreeSet::new();
        for (_, decision) in &self.decisions {
            match decision {
                HmrDecision::HotUpdate { boundaries } => all.extend(boundaries.iter().cloned()),
                HmrDecision::StyleUpdate { module } => {
                    all.insert(module.clone());
                }
                HmrDecision::Reload { .. } => {}
            }
        }
        all.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}
