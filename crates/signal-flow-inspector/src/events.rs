//! Trace event types.
//!
//! [`FlowEvent`] mirrors the engine's [`Tracer`](signal_flow::Tracer)
//! callbacks in a serializable, assertion-friendly form. Timestamps are
//! opaque engine handles and are deliberately not captured; traces record
//! *what* happened in *which order*, keyed by signal/event identity.

use serde::{Deserialize, Serialize};

/// An observed engine step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    /// A signal was created.
    SignalCreated { signal: u64, constant: bool },
    /// An event node was created.
    EventCreated { event: u64 },
    /// A result was written to a signal; `changed` is false when the
    /// equality filter suppressed it.
    Write { signal: u64, changed: bool },
    /// A reader was registered (initial eager run already done).
    ReaderRegistered,
    /// A reader was pushed onto the scheduler queue.
    ReaderEnqueued,
    /// A reader body re-executed.
    ReaderRun,
    /// A timestamp range was spliced out, firing `cleanups` cleanups.
    Spliced { cleanups: usize },
    /// A propagation round started.
    PropagateStart,
    /// A propagation round finished after `readers` reader runs.
    PropagateEnd { readers: usize },
    /// A memo table lookup completed.
    MemoLookup { hit: bool },
    /// An event occurrence was dispatched.
    EventSend { event: u64 },
    /// A self-referential enqueue was detected and dropped.
    CycleDetected,
    /// The engine was reset.
    Init,
}

/// An ordered trace of engine steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub events: Vec<FlowEvent>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FlowEvent) {
        self.events.push(event);
    }

    /// True if any event matches the predicate.
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&FlowEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }

    /// Number of reader runs in the trace.
    pub fn reader_runs(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, FlowEvent::ReaderRun))
            .count()
    }

    /// Writes recorded for `signal`, as their `changed` flags in order.
    pub fn writes_to(&self, signal: u64) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FlowEvent::Write {
                    signal: s,
                    changed,
                } if *s == signal => Some(*changed),
                _ => None,
            })
            .collect()
    }
}
