//! The engine context and the propagation loop.
//!
//! Every process-wide resource — timeline, scheduler queue, event pump,
//! finish stack, fault handler, tracer, memo registry — lives in one
//! [`Engine`] value threaded through the API. The engine is strictly
//! single-threaded: state is `Rc`/`RefCell`-based and nothing is `Send`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tidemark::{Timeline, Timestamp};

use crate::fault::Fault;
use crate::memo::MemoClear;
use crate::outcome::FaultEqFn;
use crate::queue::ReaderQueue;
use crate::tracer::{NoopTracer, Tracer};

/// A cleanup action tied to a timestamp. Fired exactly once, when the
/// timestamp is spliced out or the engine is reset.
pub(crate) type Cleanup = Box<dyn FnOnce(&mut Engine)>;

type FaultHandler = Rc<RefCell<dyn FnMut(&mut Engine, Fault)>>;

/// The change-propagation engine.
///
/// Construct signals and events through it, mutate sources with
/// [`write`](Engine::write) / [`send`](Engine::send), and drive derived
/// state to a fixed point with [`propagate`](Engine::propagate) (event sends
/// propagate on their own).
pub struct Engine {
    pub(crate) timeline: Timeline<Cleanup>,
    pub(crate) queue: ReaderQueue,
    pub(crate) finish_stack: Vec<Timestamp>,
    pub(crate) pump: VecDeque<Box<dyn FnOnce(&mut Engine)>>,
    pub(crate) dispatching: bool,
    pub(crate) propagating: bool,
    pub(crate) tracer: Rc<dyn Tracer>,
    pub(crate) fault_eq: FaultEqFn,
    pub(crate) memos: Vec<Weak<dyn MemoClear>>,
    fault_handler: Option<FaultHandler>,
    next_id: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create a fresh engine.
    pub fn new() -> Self {
        Self {
            timeline: Timeline::new(),
            queue: ReaderQueue::new(),
            finish_stack: Vec::new(),
            pump: VecDeque::new(),
            dispatching: false,
            propagating: false,
            tracer: Rc::new(NoopTracer),
            fault_eq: Rc::new(|a: &Fault, b: &Fault| a.same(b)),
            memos: Vec::new(),
            fault_handler: None,
            next_id: 0,
        }
    }

    /// Reset all engine state: every pending cleanup fires in timestamp
    /// order, the queue and event pump drain, registered memo tables empty,
    /// and the timeline starts a fresh epoch (handles retained from before
    /// the reset read as spliced-out).
    pub fn init(&mut self) {
        let fired = self.timeline.reset();
        for f in fired {
            f(self);
        }
        self.queue.clear();
        self.pump.clear();
        self.finish_stack.clear();
        self.dispatching = false;
        self.propagating = false;
        for memo in std::mem::take(&mut self.memos) {
            if let Some(memo) = memo.upgrade() {
                memo.clear_all();
            }
        }
        self.tracer.on_init();
    }

    /// Drive the pending-reader queue to a fixed point.
    ///
    /// Readers run in increasing start-timestamp order; before each body the
    /// virtual clock moves to the reader's start, and after it the unused
    /// suffix of the reader's previous range is spliced out. The clock is
    /// restored afterwards.
    pub fn propagate(&mut self) {
        self.propagate_until(None);
    }

    pub(crate) fn propagate_until(&mut self, until: Option<Timestamp>) {
        let now_before = self.timeline.get_now();
        let was_propagating = self.propagating;
        self.propagating = true;
        self.tracer.on_propagate_start();
        let mut ran = 0usize;
        loop {
            let Some(start) = self.queue.peek_start() else {
                break;
            };
            if self.timeline.is_spliced_out(start) {
                if let Some(stale) = self.queue.pop(&self.timeline) {
                    stale.set_queued(false);
                }
                continue;
            }
            if let Some(bound) = until {
                if self.timeline.compare(start, bound) == std::cmp::Ordering::Greater {
                    break;
                }
            }
            let Some(reader) = self.queue.pop(&self.timeline) else {
                break;
            };
            reader.set_queued(false);
            ran += 1;
            self.finish_stack.push(reader.finish());
            self.timeline.set_now(reader.start());
            self.tracer.on_reader_run(reader.start());
            reader.run(self);
            self.finish_stack.pop();
            let lo = self.timeline.get_now();
            self.splice(lo, reader.finish());
        }
        self.timeline.set_now(now_before);
        self.propagating = was_propagating;
        self.tracer.on_propagate_end(ran);
    }

    /// Splice out `(lo, hi]` and run the cleanups attached there, in
    /// timestamp order.
    pub(crate) fn splice(&mut self, lo: Timestamp, hi: Timestamp) {
        let fired = self.timeline.splice_out(lo, hi);
        self.tracer.on_splice(lo, hi, fired.len());
        for f in fired {
            f(self);
        }
    }

    /// Install the handler for faults escaping notification callbacks.
    /// Without one, such a fault panics (the single-threaded analogue of
    /// re-raising).
    pub fn set_fault_handler(&mut self, handler: impl FnMut(&mut Engine, Fault) + 'static) {
        self.fault_handler = Some(Rc::new(RefCell::new(handler)));
    }

    /// Configure how two faults compare in the write-path equality filter.
    ///
    /// The default is identity (unset equals unset, user errors by
    /// reference), which conservatively re-propagates structurally equal but
    /// distinct errors; install a structural comparison here to suppress
    /// that.
    pub fn set_fault_eq(&mut self, eq: impl Fn(&Fault, &Fault) -> bool + 'static) {
        self.fault_eq = Rc::new(eq);
    }

    /// Install a [`Tracer`] observing engine execution.
    pub fn set_tracer(&mut self, tracer: Rc<dyn Tracer>) {
        self.tracer = tracer;
    }

    /// Route a fault to the installed handler.
    pub(crate) fn report_fault(&mut self, fault: Fault) {
        match &self.fault_handler {
            Some(handler) => {
                let handler = handler.clone();
                (&mut *handler.borrow_mut())(self, fault);
            }
            None => panic!("unhandled fault: {fault}"),
        }
    }

    pub(crate) fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
