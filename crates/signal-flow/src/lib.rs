//! Signal-Flow: a self-adjusting computation engine.
//!
//! Programs are dynamic graphs of *signals* (time-varying values) and
//! *readers* (computations observing them). When inputs change, the engine
//! incrementally re-executes only the affected readers, in dependency order,
//! reusing prior work through memoization.
//!
//! # Key pieces
//!
//! - **Virtual time**: every reader records the timestamp interval its
//!   execution spans on a [tidemark](tidemark::Timeline) timeline;
//!   discarding a stale run is a range splice that fires the cleanups
//!   registered inside it.
//! - **Scheduling**: pending readers re-execute in increasing start-time
//!   order, so upstream work is always current when a reader runs.
//! - **Combinators**: [`lift`](Engine::lift)-style derivations for plain
//!   functions, [`bind`](Engine::bind)-style for dynamic graph shape, with
//!   fallible (`try_*`) and fault-handling (`catch*`) variants.
//! - **Memoization**: [`Memo`] caches a sub-computation's result *and its
//!   timestamp range*; a hit re-splices the cached range instead of
//!   re-running the body.
//! - **Events**: push-style occurrences ([`Event`]) with `map`/`filter`/
//!   `merge`/`collect`, converted to and from signal state with
//!   [`hold`](Engine::hold) and [`changes`](Engine::changes).
//!
//! # Example
//!
//! ```ignore
//! use signal_flow::Engine;
//!
//! let mut en = Engine::new();
//! let (a, wa) = en.changeable(1);
//! let b = en.lift(&a, |x| x + 1);
//! let c = en.lift(&a, |x| x * 2);
//! let d = en.lift2(&b, &c, |x, y| x + y);
//! assert_eq!(d.read().unwrap(), 4);
//!
//! en.write(&wa, 10);
//! en.propagate();
//! assert_eq!(d.read().unwrap(), 31);
//! ```
//!
//! # Threading
//!
//! The engine is strictly single-threaded and cooperative: all operations
//! are synchronous, and external schedulers integrate by calling
//! [`write`](Engine::write) / [`send`](Engine::send) followed by
//! [`propagate`](Engine::propagate).

mod engine;
mod event;
mod fault;
mod memo;
mod outcome;
mod queue;
mod reader;
mod signal;
mod tracer;

pub use engine::Engine;
pub use event::{Event, EventId, EventSender};
pub use fault::Fault;
pub use memo::Memo;
pub use outcome::{eq, EqFn, FaultEqFn, Outcome};
pub use reader::Subscription;
pub use signal::{Signal, SignalId, SignalWriter};
pub use tracer::{NoopTracer, Tracer};

// Re-export the timestamp handle; it appears in the `Tracer` interface.
pub use tidemark::Timestamp;
