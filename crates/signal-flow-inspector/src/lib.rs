//! Flow Inspector: tracing and observability for signal-flow.
//!
//! This crate turns the engine's [`Tracer`](signal_flow::Tracer) callbacks
//! into serializable [`FlowEvent`]s:
//!
//! - [`EventCollector`]: collects events for testing and assertion, and
//!   plugs directly into `Engine::set_tracer`.
//! - [`EventSink`]: the receiving interface, with [`NullSink`] and
//!   [`MultiplexSink`] implementations.
//!
//! # Quick start
//!
//! ```ignore
//! use std::rc::Rc;
//! use signal_flow::Engine;
//! use signal_flow_inspector::{EventCollector, FlowEvent};
//!
//! let collector = Rc::new(EventCollector::new());
//! let mut en = Engine::new();
//! en.set_tracer(collector.clone());
//!
//! let (a, wa) = en.changeable(1);
//! let b = en.lift(&a, |x| x + 1);
//! en.write(&wa, 2);
//! en.propagate();
//!
//! let trace = collector.trace();
//! assert_eq!(trace.reader_runs(), 1);
//! assert_eq!(trace.writes_to(b.id().0), vec![true, true]);
//! ```

mod collector;
mod events;
mod sink;

pub use collector::EventCollector;
pub use events::{ExecutionTrace, FlowEvent};
pub use sink::{EventSink, MultiplexSink, NullSink};
