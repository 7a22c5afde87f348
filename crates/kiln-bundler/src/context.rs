//! Explicit build context.
//!
//! Every pipeline and HMR call receives a [`BuildContext`] instead of reaching
//! for a process-wide logger. The context carries the [`Reporter`] that
//! records why each decision was made, and the [`AbortSignal`] checked before
//! each chunk starts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Pipeline stage a decision or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Init,
    Graph,
    Plan,
    Execute,
    Optimize,
    Emit,
    Audit,
    Hmr,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Graph => "graph",
            Stage::Plan => "plan",
            Stage::Execute => "execute",
            Stage::Optimize => "optimize",
            Stage::Emit => "emit",
            Stage::Audit => "audit",
            Stage::Hmr => "hmr",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for build decisions (cache hits, chunk merges, HMR outcomes).
pub trait Reporter: Send + Sync + std::fmt::Debug {
    fn report(&self, stage: Stage, decision: &str, reason: &str);
}

/// Default reporter: forwards every decision as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, stage: Stage, decision: &str, reason: &str) {
        tracing::debug!(stage = %stage, decision, reason, "build decision");
    }
}

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvent {
    pub stage: Stage,
    pub decision: String,
    pub reason: String,
}

/// Reporter that keeps every decision in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    /// Decisions recorded for `stage`, in order.
    pub fn decisions(&self, stage: Stage) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.stage == stage)
            .map(|event| event.decision.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, stage: Stage, decision: &str, reason: &str) {
        self.events.lock().push(ReportEvent {
            stage,
            decision: decision.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Cooperative cancellation flag shared between a build and its caller.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call context threaded through the pipeline and the HMR engine.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub reporter: Arc<dyn Reporter>,
    pub abort: AbortSignal,
}

impl BuildContext {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            abort: AbortSignal::new(),
        }
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn report(&self, stage: Stage, decision: &str, reason: &str) {
        self.reporter.report(stage, decision, reason);
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}
