//! Event collector for testing.
//!
//! `EventCollector` accumulates events for later inspection and assertion.
//! It implements both [`EventSink`] (receive events) and
//! [`signal_flow::Tracer`] (plug straight into an engine via `set_tracer`).

use parking_lot::Mutex;

use signal_flow::{EventId, SignalId, Timestamp, Tracer};

use crate::events::{ExecutionTrace, FlowEvent};
use crate::sink::EventSink;

/// Accumulates [`FlowEvent`]s for assertions.
///
/// ```ignore
/// use std::rc::Rc;
/// use signal_flow::Engine;
/// use signal_flow_inspector::EventCollector;
///
/// let collector = Rc::new(EventCollector::new());
/// let mut en = Engine::new();
/// en.set_tracer(collector.clone());
///
/// // ... drive the engine ...
///
/// assert!(collector.trace().reader_runs() > 0);
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<FlowEvent>>,
}

impl EventCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collected events as an execution trace.
    pub fn trace(&self) -> ExecutionTrace {
        ExecutionTrace {
            events: self.events.lock().clone(),
        }
    }

    /// Collected events as a vector.
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().clone()
    }

    /// Drop all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Take the collected events, clearing the collector.
    pub fn take(&self) -> Vec<FlowEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for EventCollector {
    fn emit(&self, event: FlowEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for EventCollector {
    fn on_signal_created(&self, signal: SignalId, constant: bool) {
        self.emit(FlowEvent::SignalCreated {
            signal: signal.0,
            constant,
        });
    }

    fn on_event_created(&self, event: EventId) {
        self.emit(FlowEvent::EventCreated { event: event.0 });
    }

    fn on_write(&self, signal: SignalId, changed: bool) {
        self.emit(FlowEvent::Write {
            signal: signal.0,
            changed,
        });
    }

    fn on_reader_registered(&self, _start: Timestamp, _finish: Timestamp) {
        self.emit(FlowEvent::ReaderRegistered);
    }

    fn on_reader_enqueued(&self, _start: Timestamp) {
        self.emit(FlowEvent::ReaderEnqueued);
    }

    fn on_reader_run(&self, _start: Timestamp) {
        self.emit(FlowEvent::ReaderRun);
    }

    fn on_splice(&self, _lo: Timestamp, _hi: Timestamp, cleanups: usize) {
        self.emit(FlowEvent::Spliced { cleanups });
    }

    fn on_propagate_start(&self) {
        self.emit(FlowEvent::PropagateStart);
    }

    fn on_propagate_end(&self, readers: usize) {
        self.emit(FlowEvent::PropagateEnd { readers });
    }

    fn on_memo_lookup(&self, hit: bool) {
        self.emit(FlowEvent::MemoLookup { hit });
    }

    fn on_event_send(&self, event: EventId) {
        self.emit(FlowEvent::EventSend { event: event.0 });
    }

    fn on_cycle_detected(&self, _start: Timestamp) {
        self.emit(FlowEvent::CycleDetected);
    }

    fn on_init(&self) {
        self.emit(FlowEvent::Init);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_accumulates_and_clears() {
        let collector = EventCollector::new();
        assert!(collector.is_empty());
        collector.emit(FlowEvent::Init);
        collector.emit(FlowEvent::ReaderRun);
        assert_eq!(collector.len(), 2);
        assert_eq!(collector.take().len(), 2);
        assert!(collector.is_empty());
    }
}
