//! Event sink trait and implementations.

use crate::events::FlowEvent;

/// Receiver of flow events.
///
/// Implementations can collect events for testing (see
/// [`EventCollector`](crate::EventCollector)), print them, or forward them
/// elsewhere.
pub trait EventSink: 'static {
    /// Called for each observed event.
    fn emit(&self, event: FlowEvent);
}

/// Sink that discards all events.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: FlowEvent) {}
}

/// Sink forwarding each event to multiple child sinks.
pub struct MultiplexSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiplexSink {
    pub fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for MultiplexSink {
    fn emit(&self, event: FlowEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingSink {
        count: Rc<Cell<usize>>,
    }

    impl EventSink for CountingSink {
        fn emit(&self, _event: FlowEvent) {
            self.count.set(self.count.get() + 1);
        }
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        NullSink.emit(FlowEvent::Init);
    }

    #[test]
    fn test_multiplex_fans_out() {
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let multiplex = MultiplexSink::new(vec![
            Box::new(CountingSink {
                count: first.clone(),
            }),
            Box::new(CountingSink {
                count: second.clone(),
            }),
        ]);
        multiplex.emit(FlowEvent::Init);
        multiplex.emit(FlowEvent::ReaderRun);
        assert_eq!(first.get(), 2);
        assert_eq!(second.get(), 2);
    }
}
