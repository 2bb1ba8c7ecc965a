//! Tracer hook for observing engine execution.
//!
//! This module defines the [`Tracer`] trait and the zero-cost [`NoopTracer`].
//! A tracer sees every interesting step of change propagation: writes and
//! whether they passed the equality filter, reader scheduling and execution,
//! range splices, memo lookups, event dispatch, and cycle reports.
//!
//! All methods have default empty implementations, so an implementation only
//! overrides the events it cares about. Install one with
//! [`Engine::set_tracer`](crate::Engine::set_tracer); the
//! `signal-flow-inspector` crate provides a collector suitable for tests.
//!
//! The engine is single-threaded, so tracers need no `Send`/`Sync`; they are
//! shared by `Rc` and called with `&self`.

use crate::event::EventId;
use crate::signal::SignalId;
use tidemark::Timestamp;

/// Observer of engine execution.
pub trait Tracer: 'static {
    /// A signal was created (`constant` distinguishes constants from
    /// changeables).
    #[inline]
    fn on_signal_created(&self, _signal: SignalId, _constant: bool) {}

    /// An event node was created.
    #[inline]
    fn on_event_created(&self, _event: EventId) {}

    /// A result was written to a signal. `changed` is false when the
    /// equality filter suppressed the write.
    #[inline]
    fn on_write(&self, _signal: SignalId, _changed: bool) {}

    /// A reader was registered, spanning `[start, finish]`.
    #[inline]
    fn on_reader_registered(&self, _start: Timestamp, _finish: Timestamp) {}

    /// A reader was pushed onto the scheduler queue.
    #[inline]
    fn on_reader_enqueued(&self, _start: Timestamp) {}

    /// A reader body is about to re-execute.
    #[inline]
    fn on_reader_run(&self, _start: Timestamp) {}

    /// A timestamp range `(lo, hi]` was spliced out, firing `cleanups`
    /// cleanup actions.
    #[inline]
    fn on_splice(&self, _lo: Timestamp, _hi: Timestamp, _cleanups: usize) {}

    /// A propagation round started.
    #[inline]
    fn on_propagate_start(&self) {}

    /// A propagation round finished after running `readers` reader bodies.
    #[inline]
    fn on_propagate_end(&self, _readers: usize) {}

    /// A memo table lookup completed.
    #[inline]
    fn on_memo_lookup(&self, _hit: bool) {}

    /// An event occurrence was dispatched to its dependents.
    #[inline]
    fn on_event_send(&self, _event: EventId) {}

    /// A reader was re-enqueued at the current virtual time mid-propagation:
    /// a self-referential dependency. The enqueue is dropped.
    #[inline]
    fn on_cycle_detected(&self, _start: Timestamp) {}

    /// The engine was reset.
    #[inline]
    fn on_init(&self) {}
}

/// Tracer that discards all events; the default.
pub struct NoopTracer;

impl Tracer for NoopTracer {}
