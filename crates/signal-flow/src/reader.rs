//! Readers, subscriptions, and the binding combinators.
//!
//! A reader is a computation re-executed whenever one of its input signals
//! changes. Registration ticks a `start` timestamp, runs the body once
//! eagerly (so nested writes, readers, and memo entries materialize inside
//! the range), ticks `finish`, and subscribes the reader to each input with
//! a cleanup on `start`.
//!
//! Ownership is arranged so discarding a timestamp range frees everything it
//! created: the start-cleanup owns the reader strongly, dependent-callback
//! entries hold only weak references, and per-run subscriptions (the mirror
//! installed by `connect`, `notify` inside a body) anchor their cleanup to a
//! freshly ticked timestamp so the next re-run splices them away.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tidemark::Timestamp;

use crate::engine::Engine;
use crate::fault::Fault;
use crate::outcome::{eq, EqFn, Outcome};
use crate::signal::{DepFn, Signal, SignalWriter};

pub(crate) struct ReaderInner {
    body: Box<dyn Fn(&mut Engine)>,
    start: Timestamp,
    finish: Timestamp,
    queued: Cell<bool>,
}

/// Shared handle to a registered reader.
#[derive(Clone)]
pub(crate) struct Reader(Rc<ReaderInner>);

impl Reader {
    pub(crate) fn start(&self) -> Timestamp {
        self.0.start
    }

    pub(crate) fn finish(&self) -> Timestamp {
        self.0.finish
    }

    pub(crate) fn is_queued(&self) -> bool {
        self.0.queued.get()
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.0.queued.set(queued);
    }

    pub(crate) fn run(&self, en: &mut Engine) {
        (self.0.body)(en);
    }

    fn downgrade(&self) -> Weak<ReaderInner> {
        Rc::downgrade(&self.0)
    }
}

/// Cancellation handle for a `notify` subscription.
///
/// Cancelling after the subscription was already discarded by a splice is a
/// no-op. Dropping the handle does not cancel.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce(&mut Engine)>>,
}

impl Subscription {
    pub(crate) fn with_cancel(f: impl FnOnce(&mut Engine) + 'static) -> Self {
        Self {
            cancel: Some(Box::new(f)),
        }
    }

    pub(crate) fn inert() -> Self {
        Self { cancel: None }
    }

    /// Remove the subscription.
    pub fn cancel(mut self, en: &mut Engine) {
        if let Some(f) = self.cancel.take() {
            f(en);
        }
    }
}

impl Engine {
    /// Register a reader: tick start, run the body once, tick finish.
    pub(crate) fn add_reader(&mut self, body: impl Fn(&mut Engine) + 'static) -> Reader {
        let start = self.timeline.tick();
        body(self);
        let finish = self.timeline.tick();
        let reader = Reader(Rc::new(ReaderInner {
            body: Box::new(body),
            start,
            finish,
            queued: Cell::new(false),
        }));
        self.tracer.on_reader_registered(start, finish);
        reader
    }

    /// Subscribe `reader` to re-run whenever `source` changes.
    ///
    /// The dependency entry holds the reader weakly; the cleanup on the
    /// reader's start removes the entry and owns the reader's only strong
    /// reference outside the queue, so splicing the start frees both.
    pub(crate) fn subscribe<T: Clone + 'static>(&mut self, reader: &Reader, source: &Signal<T>) {
        if source.is_constant() {
            return;
        }
        let weak = reader.downgrade();
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, _r: &Outcome<T>| {
            if let Some(inner) = weak.upgrade() {
                en.enqueue(Reader(inner));
            }
        }));
        let id = source.node.deps.borrow_mut().push_back(cb);
        let node = Rc::downgrade(&source.node);
        let keep = reader.clone();
        self.timeline.add_cleanup(
            reader.start(),
            Box::new(move |_en: &mut Engine| {
                let _keep = keep;
                if let Some(node) = node.upgrade() {
                    node.deps.borrow_mut().remove(id);
                }
            }),
        );
    }

    /// Install a dependent callback on `source`, anchored to a freshly
    /// ticked timestamp so a re-run of the enclosing reader drops it.
    pub(crate) fn attach_signal_dep<T: 'static>(
        &mut self,
        source: &Signal<T>,
        cb: DepFn<T>,
    ) -> Subscription {
        debug_assert!(!source.is_constant());
        let id = source.node.deps.borrow_mut().push_back(cb);
        let node = Rc::downgrade(&source.node);
        let anchor = self.timeline.tick();
        {
            let node = node.clone();
            self.timeline.add_cleanup(
                anchor,
                Box::new(move |_en: &mut Engine| {
                    if let Some(node) = node.upgrade() {
                        node.deps.borrow_mut().remove(id);
                    }
                }),
            );
        }
        Subscription::with_cancel(move |_en: &mut Engine| {
            if let Some(node) = node.upgrade() {
                node.deps.borrow_mut().remove(id);
            }
        })
    }

    /// Mirror `source` into `target`: write its current result and forward
    /// every subsequent one. Forwards bypass the equality filter — the
    /// source's own filter already guarded the notification.
    pub(crate) fn connect<T: Clone + 'static>(
        &mut self,
        target: &SignalWriter<T>,
        source: &Signal<T>,
    ) {
        if !source.is_constant() {
            let w = target.clone();
            let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
                en.write_result_no_eq(&w, r.clone());
            }));
            let _sub = self.attach_signal_dep(source, cb);
        }
        let current = source.read_result();
        self.write_result_no_eq(target, current);
    }

    /// Lift-family primitive: a reader over one input whose body computes an
    /// outcome and writes it through the target's equality filter.
    pub(crate) fn lift_outcome<T, U>(
        &mut self,
        t: &Signal<T>,
        eq: EqFn<U>,
        f: impl Fn(&Outcome<T>) -> Outcome<U> + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        if t.is_constant() {
            let out = f(&t.read_result());
            return self.constant_result(out);
        }
        let (u, wu) = self.changeable_with(Outcome::Fail(Fault::unset()), eq);
        let src = t.clone();
        let reader = self.add_reader(move |en| {
            let out = f(&src.read_result());
            en.write_result(&wu, out);
        });
        self.subscribe(&reader, t);
        u
    }

    /// Bind-family primitive: a reader over one input whose body produces a
    /// signal, mirrored into the target via [`connect`](Engine::connect).
    pub(crate) fn bind_outcome<T, U>(
        &mut self,
        t: &Signal<T>,
        f: impl Fn(&mut Engine, &Outcome<T>) -> Signal<U> + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        if t.is_constant() {
            return f(self, &t.read_result());
        }
        let (u, wu) = self.changeable_with(Outcome::Fail(Fault::unset()), eq::never());
        let src = t.clone();
        let reader = self.add_reader(move |en| {
            let inner = f(en, &src.read_result());
            en.connect(&wu, &inner);
        });
        self.subscribe(&reader, t);
        u
    }

    /// Derive a signal by applying `f` to the value of `t`. Faults pass
    /// through; the result filters propagation by structural equality.
    pub fn lift<T, U>(&mut self, t: &Signal<T>, f: impl Fn(&T) -> U + 'static) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + PartialEq + 'static,
    {
        self.lift_with(t, eq::structural(), f)
    }

    /// [`lift`](Engine::lift) with an explicit equality policy on the result.
    pub fn lift_with<T, U>(
        &mut self,
        t: &Signal<T>,
        eq: EqFn<U>,
        f: impl Fn(&T) -> U + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        self.lift_outcome(t, eq, move |r| match r {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Fail(e) => Outcome::Fail(e.clone()),
        })
    }

    /// Fallible [`lift`](Engine::lift): an `Err` from `f` is stored as a
    /// fault on the derived signal.
    pub fn try_lift<T, U>(
        &mut self,
        t: &Signal<T>,
        f: impl Fn(&T) -> Result<U, Fault> + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + PartialEq + 'static,
    {
        self.lift_outcome(t, eq::structural(), move |r| match r {
            Outcome::Value(v) => f(v).into(),
            Outcome::Fail(e) => Outcome::Fail(e.clone()),
        })
    }

    /// Mirror `t`, replacing faults with `handler`'s value.
    pub fn catch_lift<T>(
        &mut self,
        t: &Signal<T>,
        handler: impl Fn(&Fault) -> T + 'static,
    ) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        self.lift_outcome(t, eq::structural(), move |r| match r {
            Outcome::Value(v) => Outcome::Value(v.clone()),
            Outcome::Fail(e) => Outcome::Value(handler(e)),
        })
    }

    /// Monadic dependency on one signal: `f` picks the signal whose state
    /// the result follows. A fault on `t` short-circuits to a failed result.
    ///
    /// A constant `t` short-circuits: `f` is applied once and its signal is
    /// returned directly.
    pub fn bind<T, U>(
        &mut self,
        t: &Signal<T>,
        f: impl Fn(&mut Engine, &T) -> Signal<U> + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        self.bind_outcome(t, move |en, r| match r {
            Outcome::Value(v) => f(en, v),
            Outcome::Fail(e) => en.constant_fail(e.clone()),
        })
    }

    /// [`bind`](Engine::bind) with both continuations explicit: values route
    /// through `succ`, faults through `err`.
    pub fn try_bind<T, U>(
        &mut self,
        t: &Signal<T>,
        succ: impl Fn(&mut Engine, &T) -> Signal<U> + 'static,
        err: impl Fn(&mut Engine, &Fault) -> Signal<U> + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        self.bind_outcome(t, move |en, r| match r {
            Outcome::Value(v) => succ(en, v),
            Outcome::Fail(e) => err(en, e),
        })
    }

    /// Mirror `t`, routing faults through `handler`'s signal.
    pub fn catch<T>(
        &mut self,
        t: &Signal<T>,
        handler: impl Fn(&mut Engine, &Fault) -> Signal<T> + 'static,
    ) -> Signal<T>
    where
        T: Clone + 'static,
    {
        self.bind_outcome(t, move |en, r| match r {
            Outcome::Value(v) => en.constant(v.clone()),
            Outcome::Fail(e) => handler(en, e),
        })
    }

    /// Flatten a signal of signals: the result follows whichever inner
    /// signal is current.
    pub fn switch<T>(&mut self, t: &Signal<Signal<T>>) -> Signal<T>
    where
        T: Clone + 'static,
    {
        self.bind(t, |_, inner| inner.clone())
    }

    /// Two-input [`bind`](Engine::bind); fails fast on the first faulted
    /// input.
    pub fn bind2<A, B, U>(
        &mut self,
        a: &Signal<A>,
        b: &Signal<B>,
        f: impl Fn(&mut Engine, &A, &B) -> Signal<U> + 'static,
    ) -> Signal<U>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        U: Clone + 'static,
    {
        if a.is_constant() && b.is_constant() {
            return match (a.read_result(), b.read_result()) {
                (Outcome::Value(x), Outcome::Value(y)) => f(self, &x, &y),
                (Outcome::Fail(e), _) | (_, Outcome::Fail(e)) => self.constant_fail(e),
            };
        }
        let (u, wu) = self.changeable_with(Outcome::Fail(Fault::unset()), eq::never());
        let (sa, sb) = (a.clone(), b.clone());
        let reader = self.add_reader(move |en| {
            match (sa.read_result(), sb.read_result()) {
                (Outcome::Value(x), Outcome::Value(y)) => {
                    let inner = f(en, &x, &y);
                    en.connect(&wu, &inner);
                }
                (Outcome::Fail(e), _) | (_, Outcome::Fail(e)) => {
                    en.write_result_no_eq(&wu, Outcome::Fail(e));
                }
            }
        });
        self.subscribe(&reader, a);
        self.subscribe(&reader, b);
        u
    }

    /// Two-input [`lift`](Engine::lift).
    pub fn lift2<A, B, U>(
        &mut self,
        a: &Signal<A>,
        b: &Signal<B>,
        f: impl Fn(&A, &B) -> U + 'static,
    ) -> Signal<U>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        U: Clone + PartialEq + 'static,
    {
        self.lift2_with(a, b, eq::structural(), f)
    }

    /// [`lift2`](Engine::lift2) with an explicit equality policy.
    pub fn lift2_with<A, B, U>(
        &mut self,
        a: &Signal<A>,
        b: &Signal<B>,
        eq: EqFn<U>,
        f: impl Fn(&A, &B) -> U + 'static,
    ) -> Signal<U>
    where
        A: Clone + 'static,
        B: Clone + 'static,
        U: Clone + 'static,
    {
        fn combine<A, B, U>(
            ra: &Outcome<A>,
            rb: &Outcome<B>,
            f: &impl Fn(&A, &B) -> U,
        ) -> Outcome<U> {
            match (ra, rb) {
                (Outcome::Value(x), Outcome::Value(y)) => Outcome::Value(f(x, y)),
                (Outcome::Fail(e), _) | (_, Outcome::Fail(e)) => Outcome::Fail(e.clone()),
            }
        }
        if a.is_constant() && b.is_constant() {
            let out = combine(&a.read_result(), &b.read_result(), &f);
            return self.constant_result(out);
        }
        let (u, wu) = self.changeable_with(Outcome::Fail(Fault::unset()), eq);
        let (sa, sb) = (a.clone(), b.clone());
        let reader = self.add_reader(move |en| {
            let out = combine(&sa.read_result(), &sb.read_result(), &f);
            en.write_result(&wu, out);
        });
        self.subscribe(&reader, a);
        self.subscribe(&reader, b);
        u
    }

    /// N-ary [`bind`](Engine::bind) over same-typed inputs; fails fast on
    /// the first faulted input.
    pub fn bind_all<T, U>(
        &mut self,
        ts: &[Signal<T>],
        f: impl Fn(&mut Engine, &[T]) -> Signal<U> + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        if ts.iter().all(Signal::is_constant) {
            return match gather(ts) {
                Ok(values) => f(self, &values),
                Err(e) => self.constant_fail(e),
            };
        }
        let (u, wu) = self.changeable_with(Outcome::Fail(Fault::unset()), eq::never());
        let sources: Vec<Signal<T>> = ts.to_vec();
        let reader = self.add_reader(move |en| match gather(&sources) {
            Ok(values) => {
                let inner = f(en, &values);
                en.connect(&wu, &inner);
            }
            Err(e) => en.write_result_no_eq(&wu, Outcome::Fail(e)),
        });
        for t in ts {
            self.subscribe(&reader, t);
        }
        u
    }

    /// N-ary [`lift`](Engine::lift) over same-typed inputs.
    pub fn lift_all<T, U>(
        &mut self,
        ts: &[Signal<T>],
        f: impl Fn(&[T]) -> U + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + PartialEq + 'static,
    {
        self.lift_all_with(ts, eq::structural(), f)
    }

    /// [`lift_all`](Engine::lift_all) with an explicit equality policy.
    pub fn lift_all_with<T, U>(
        &mut self,
        ts: &[Signal<T>],
        eq: EqFn<U>,
        f: impl Fn(&[T]) -> U + 'static,
    ) -> Signal<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        if ts.iter().all(Signal::is_constant) {
            let out = match gather(ts) {
                Ok(values) => Outcome::Value(f(&values)),
                Err(e) => Outcome::Fail(e),
            };
            return self.constant_result(out);
        }
        let (u, wu) = self.changeable_with(Outcome::Fail(Fault::unset()), eq);
        let sources: Vec<Signal<T>> = ts.to_vec();
        let reader = self.add_reader(move |en| {
            let out = match gather(&sources) {
                Ok(values) => Outcome::Value(f(&values)),
                Err(e) => Outcome::Fail(e),
            };
            en.write_result(&wu, out);
        });
        for t in ts {
            self.subscribe(&reader, t);
        }
        u
    }

    /// Call `f` with every outcome stored to `t` from now on.
    ///
    /// Subscribing never delivers the current state and never ticks a
    /// visible timestamp interval; use
    /// [`notify_result_now`](Engine::notify_result_now) for an immediate
    /// delivery of the current outcome.
    pub fn notify_result<T: Clone + 'static>(
        &mut self,
        t: &Signal<T>,
        f: impl FnMut(&mut Engine, &Outcome<T>) + 'static,
    ) {
        let _ = self.notify_result_cancel(t, f);
    }

    /// [`notify_result`](Engine::notify_result) returning a cancellation
    /// handle.
    pub fn notify_result_cancel<T: Clone + 'static>(
        &mut self,
        t: &Signal<T>,
        mut f: impl FnMut(&mut Engine, &Outcome<T>) + 'static,
    ) -> Subscription {
        if t.is_constant() {
            return Subscription::inert();
        }
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
            f(en, r)
        }));
        self.attach_signal_dep(t, cb)
    }

    /// [`notify_result`](Engine::notify_result), delivering the current
    /// outcome immediately as well.
    pub fn notify_result_now<T: Clone + 'static>(
        &mut self,
        t: &Signal<T>,
        mut f: impl FnMut(&mut Engine, &Outcome<T>) + 'static,
    ) {
        let current = t.read_result();
        f(self, &current);
        let _ = self.notify_result_cancel(t, f);
    }

    /// Call `f` with every value stored to `t` from now on; faults are
    /// routed to the engine's fault handler.
    pub fn notify<T: Clone + 'static>(
        &mut self,
        t: &Signal<T>,
        f: impl FnMut(&mut Engine, &T) + 'static,
    ) {
        let _ = self.notify_cancel(t, f);
    }

    /// [`notify`](Engine::notify) returning a cancellation handle.
    pub fn notify_cancel<T: Clone + 'static>(
        &mut self,
        t: &Signal<T>,
        mut f: impl FnMut(&mut Engine, &T) + 'static,
    ) -> Subscription {
        self.notify_result_cancel(t, move |en, r| match r {
            Outcome::Value(v) => f(en, v),
            Outcome::Fail(e) => en.report_fault(e.clone()),
        })
    }

    /// [`notify`](Engine::notify), delivering the current value immediately
    /// as well.
    pub fn notify_now<T: Clone + 'static>(
        &mut self,
        t: &Signal<T>,
        mut f: impl FnMut(&mut Engine, &T) + 'static,
    ) {
        match t.read_result() {
            Outcome::Value(v) => f(self, &v),
            Outcome::Fail(e) => self.report_fault(e),
        }
        let _ = self.notify_cancel(t, f);
    }

    /// Register `f` to run when the current timestamp is spliced out (or the
    /// engine is reset). Inside a reader body this ties the resource to the
    /// current run.
    pub fn cleanup(&mut self, f: impl FnOnce(&mut Engine) + 'static) {
        let now = self.timeline.get_now();
        self.timeline.add_cleanup(now, Box::new(f));
    }
}

fn gather<T: Clone>(sources: &[Signal<T>]) -> Result<Vec<T>, Fault> {
    let mut values = Vec::with_capacity(sources.len());
    for s in sources {
        match s.read_result() {
            Outcome::Value(v) => values.push(v),
            Outcome::Fail(e) => return Err(e),
        }
    }
    Ok(values)
}
