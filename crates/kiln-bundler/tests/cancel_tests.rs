//! Cooperative cancellation: an aborted build stops between chunks and never
//! starts the chunks still waiting for a slot.

mod helpers;

use std::sync::Arc;

use helpers::{memory_options, project};
use kiln_bundler::{AbortSignal, BuildContext, BuildError, Reporter, Stage, build};
use parking_lot::Mutex;

/// Records decisions and pulls the abort signal after `limit` built chunks.
#[derive(Debug)]
struct AbortAfter {
    signal: AbortSignal,
    limit: usize,
    events: Mutex<Vec<(Stage, String, String)>>,
}

impl AbortAfter {
    fn new(signal: AbortSignal, limit: usize) -> Self {
        Self {
            signal,
            limit,
            events: Mutex::new(Vec::new()),
        }
    }

    fn built(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(stage, decision, _)| *stage == Stage::Execute && decision == "chunk-built")
            // reason reads "<chunk> (<n> modules)"
            .filter_map(|(_, _, reason)| reason.split(' ').next().map(str::to_string))
            .collect()
    }

    fn decisions(&self, stage: Stage) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(s, _, _)| *s == stage)
            .map(|(_, decision, _)| decision.clone())
            .collect()
    }
}

impl Reporter for AbortAfter {
    fn report(&self, stage: Stage, decision: &str, reason: &str) {
        let mut events = self.events.lock();
        events.push((stage, decision.to_string(), reason.to_string()));
        let built = events
            .iter()
            .filter(|(s, d, _)| *s == Stage::Execute && d == "chunk-built")
            .count();
        if built >= self.limit {
            self.signal.abort();
        }
    }
}

#[tokio::test]
async fn abort_after_first_wave_skips_later_waves() {
    let signal = AbortSignal::new();
    let reporter = Arc::new(AbortAfter::new(signal.clone(), 1));
    let ctx = BuildContext::new(reporter.clone()).with_abort(signal);

    let err = build(memory_options("/p", project("/p")), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Cancelled));
    // waves are [main~page], [main, page]
    assert_eq!(reporter.built(), vec!["main~page".to_string()]);
    assert!(reporter.decisions(Stage::Execute).contains(&"cancelled".to_string()));
    assert!(reporter.decisions(Stage::Emit).is_empty());
}

#[tokio::test]
async fn abort_inside_a_wave_leaves_queued_chunks_unstarted() {
    let signal = AbortSignal::new();
    let reporter = Arc::new(AbortAfter::new(signal.clone(), 2));
    let ctx = BuildContext::new(reporter.clone()).with_abort(signal);

    // one slot: main and page run one after the other in the second wave
    let options = memory_options("/p", project("/p")).max_parallel_chunks(1);
    let err = build(options, &ctx).await.unwrap_err();

    assert!(matches!(err, BuildError::Cancelled));
    let built = reporter.built();
    assert_eq!(built.len(), 2);
    assert_eq!(built[0], "main~page");
    assert!(built[1] == "main" || built[1] == "page");
}

#[tokio::test]
async fn signal_raised_before_the_build_stops_at_the_first_wave() {
    let signal = AbortSignal::new();
    signal.abort();
    let reporter = Arc::new(AbortAfter::new(signal.clone(), usize::MAX));
    let ctx = BuildContext::new(reporter.clone()).with_abort(signal);

    let err = build(memory_options("/p", project("/p")), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Cancelled));
    assert!(reporter.built().is_empty());
}
