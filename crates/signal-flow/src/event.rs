//! Push-style discrete events.
//!
//! Events carry no state: a send is dispatched synchronously to the current
//! dependents and is gone. Sends are buffered through a process-wide FIFO
//! drained by a single loop (nested sends from inside a handler enqueue and
//! return); each drained send is followed by a propagation round, so cell
//! state derived from events is at a fixed point between occurrences.
//!
//! Derived events (`map_event`, `filter_event`, `merge`, `collect`) forward
//! synchronously without re-entering the pump. The conversions to cells are
//! [`hold`](Engine::hold) (latest occurrence as state) and back via
//! [`changes`](Engine::changes) (state updates as occurrences).

use std::cell::RefCell;
use std::rc::Rc;

use tidemark::List;

use crate::engine::Engine;
use crate::fault::Fault;
use crate::outcome::{eq, EqFn, Outcome};
use crate::reader::Subscription;
use crate::signal::{DepFn, Signal};

/// Stable identifier of an event node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

pub(crate) struct EventNode<T> {
    id: EventId,
    deps: RefCell<List<DepFn<T>>>,
}

/// Observing handle to an event. [`Event::never`] is the event that never
/// occurs; combinators short-circuit over it.
pub struct Event<T> {
    node: Option<Rc<EventNode<T>>>,
}

/// Sending handle to an event.
pub struct EventSender<T> {
    node: Rc<EventNode<T>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Event<T> {
    /// The event that never occurs.
    pub fn never() -> Self {
        Self { node: None }
    }

    /// True for [`Event::never`].
    pub fn is_never(&self) -> bool {
        self.node.is_none()
    }

    /// This event's identifier (`None` for never).
    pub fn id(&self) -> Option<EventId> {
        self.node.as_ref().map(|n| n.id)
    }
}

impl Engine {
    /// Create an event and its sender.
    pub fn make_event<T: 'static>(&mut self) -> (Event<T>, EventSender<T>) {
        let node = Rc::new(EventNode {
            id: EventId(self.fresh_id()),
            deps: RefCell::new(List::new()),
        });
        self.tracer.on_event_created(node.id);
        (
            Event {
                node: Some(node.clone()),
            },
            EventSender { node },
        )
    }

    /// Send a value occurrence.
    pub fn send<T: Clone + 'static>(&mut self, sender: &EventSender<T>, value: T) {
        self.send_result(sender, Outcome::Value(value));
    }

    /// Send a fault occurrence.
    pub fn send_fault<T: Clone + 'static>(&mut self, sender: &EventSender<T>, fault: Fault) {
        self.send_result(sender, Outcome::Fail(fault));
    }

    /// Send an occurrence. The send is queued; unless a dispatch loop is
    /// already draining (a nested send), this call drains the queue, running
    /// a propagation round after each dispatched occurrence.
    pub fn send_result<T: Clone + 'static>(&mut self, sender: &EventSender<T>, result: Outcome<T>) {
        let node = sender.node.clone();
        self.pump
            .push_back(Box::new(move |en| en.dispatch_event(&node, &result)));
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(job) = self.pump.pop_front() {
            job(self);
            self.propagate();
        }
        self.dispatching = false;
    }

    /// Fire all current dependents of `node` synchronously, in subscription
    /// order.
    pub(crate) fn dispatch_event<T: Clone + 'static>(
        &mut self,
        node: &Rc<EventNode<T>>,
        result: &Outcome<T>,
    ) {
        self.tracer.on_event_send(node.id);
        let callbacks: Vec<DepFn<T>> =
            node.deps.borrow().iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            (&mut *cb.borrow_mut())(self, result);
        }
    }

    /// A fresh event node for a derived combinator, with direct access to
    /// the node for synchronous forwarding.
    fn make_derived<T: 'static>(&mut self) -> (Event<T>, Rc<EventNode<T>>) {
        let (out, sender) = self.make_event::<T>();
        (out, sender.node)
    }

    /// Install a dependent callback on an event node, anchored to a fresh
    /// tick like signal subscriptions.
    fn attach_event_dep<T: 'static>(
        &mut self,
        node: &Rc<EventNode<T>>,
        cb: DepFn<T>,
    ) -> Subscription {
        let id = node.deps.borrow_mut().push_back(cb);
        let weak = Rc::downgrade(node);
        let anchor = self.timeline.tick();
        {
            let weak = weak.clone();
            self.timeline.add_cleanup(
                anchor,
                Box::new(move |_en: &mut Engine| {
                    if let Some(node) = weak.upgrade() {
                        node.deps.borrow_mut().remove(id);
                    }
                }),
            );
        }
        Subscription::with_cancel(move |_en: &mut Engine| {
            if let Some(node) = weak.upgrade() {
                node.deps.borrow_mut().remove(id);
            }
        })
    }

    /// Call `f` with every value occurrence; fault occurrences route to the
    /// fault handler.
    pub fn notify_event<T: Clone + 'static>(
        &mut self,
        e: &Event<T>,
        f: impl FnMut(&mut Engine, &T) + 'static,
    ) {
        let _ = self.notify_event_cancel(e, f);
    }

    /// [`notify_event`](Engine::notify_event) returning a cancellation
    /// handle.
    pub fn notify_event_cancel<T: Clone + 'static>(
        &mut self,
        e: &Event<T>,
        mut f: impl FnMut(&mut Engine, &T) + 'static,
    ) -> Subscription {
        self.notify_event_result_cancel(e, move |en, r| match r {
            Outcome::Value(v) => f(en, v),
            Outcome::Fail(fault) => en.report_fault(fault.clone()),
        })
    }

    /// Call `f` with every occurrence, values and faults alike.
    pub fn notify_event_result<T: Clone + 'static>(
        &mut self,
        e: &Event<T>,
        f: impl FnMut(&mut Engine, &Outcome<T>) + 'static,
    ) {
        let _ = self.notify_event_result_cancel(e, f);
    }

    /// [`notify_event_result`](Engine::notify_event_result) returning a
    /// cancellation handle.
    pub fn notify_event_result_cancel<T: Clone + 'static>(
        &mut self,
        e: &Event<T>,
        mut f: impl FnMut(&mut Engine, &Outcome<T>) + 'static,
    ) -> Subscription {
        let Some(node) = &e.node else {
            return Subscription::inert();
        };
        let node = node.clone();
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
            f(en, r)
        }));
        self.attach_event_dep(&node, cb)
    }

    /// Forward every occurrence of every input.
    pub fn merge<T: Clone + 'static>(&mut self, es: &[Event<T>]) -> Event<T> {
        let sources: Vec<Rc<EventNode<T>>> =
            es.iter().filter_map(|e| e.node.clone()).collect();
        if sources.is_empty() {
            return Event::never();
        }
        let (out, out_node) = self.make_derived::<T>();
        for source in sources {
            let out_node = out_node.clone();
            let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
                en.dispatch_event(&out_node, r);
            }));
            self.attach_event_dep(&source, cb);
        }
        out
    }

    /// Forward `f` of every value occurrence; faults pass through.
    pub fn map_event<T, U>(
        &mut self,
        e: &Event<T>,
        f: impl Fn(&T) -> U + 'static,
    ) -> Event<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        self.try_map_event(e, move |v| Ok(f(v)))
    }

    /// Forward `f` of every value occurrence, turning an `Err` into a fault
    /// occurrence; incoming faults pass through.
    pub fn try_map_event<T, U>(
        &mut self,
        e: &Event<T>,
        f: impl Fn(&T) -> Result<U, Fault> + 'static,
    ) -> Event<U>
    where
        T: Clone + 'static,
        U: Clone + 'static,
    {
        let Some(source) = e.node.clone() else {
            return Event::never();
        };
        let (out, out_node) = self.make_derived::<U>();
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
            let mapped = match r {
                Outcome::Value(v) => f(v).into(),
                Outcome::Fail(fault) => Outcome::Fail(fault.clone()),
            };
            en.dispatch_event(&out_node, &mapped);
        }));
        self.attach_event_dep(&source, cb);
        out
    }

    /// Forward value occurrences satisfying `p`; faults pass through.
    pub fn filter_event<T: Clone + 'static>(
        &mut self,
        e: &Event<T>,
        p: impl Fn(&T) -> bool + 'static,
    ) -> Event<T> {
        let Some(source) = e.node.clone() else {
            return Event::never();
        };
        let (out, out_node) = self.make_derived::<T>();
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
            let forward = match r {
                Outcome::Value(v) => p(v),
                Outcome::Fail(_) => true,
            };
            if forward {
                en.dispatch_event(&out_node, r);
            }
        }));
        self.attach_event_dep(&source, cb);
        out
    }

    /// Fold occurrences, forwarding each new accumulator. Once the
    /// accumulator fails (an incoming fault), further inputs are dropped.
    pub fn collect<T, A>(
        &mut self,
        e: &Event<T>,
        init: A,
        f: impl Fn(&A, &T) -> A + 'static,
    ) -> Event<A>
    where
        T: Clone + 'static,
        A: Clone + 'static,
    {
        let Some(source) = e.node.clone() else {
            return Event::never();
        };
        let (out, out_node) = self.make_derived::<A>();
        let acc = RefCell::new(Outcome::Value(init));
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
            let next = match (&*acc.borrow(), r) {
                (Outcome::Fail(_), _) => None,
                (Outcome::Value(a), Outcome::Value(v)) => Some(Outcome::Value(f(a, v))),
                (Outcome::Value(_), Outcome::Fail(fault)) => Some(Outcome::Fail(fault.clone())),
            };
            if let Some(next) = next {
                *acc.borrow_mut() = next.clone();
                en.dispatch_event(&out_node, &next);
            }
        }));
        self.attach_event_dep(&source, cb);
        out
    }

    /// A signal that starts at `init` and follows the latest occurrence,
    /// with structural equality filtering.
    pub fn hold<T: Clone + PartialEq + 'static>(&mut self, init: T, e: &Event<T>) -> Signal<T> {
        self.hold_with(Outcome::Value(init), eq::structural(), e)
    }

    /// [`hold`](Engine::hold) with an explicit initial outcome and equality
    /// policy.
    pub fn hold_with<T: Clone + 'static>(
        &mut self,
        init: Outcome<T>,
        eq: EqFn<T>,
        e: &Event<T>,
    ) -> Signal<T> {
        let (sig, w) = self.changeable_with(init, eq);
        if let Some(source) = e.node.clone() {
            let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
                en.write_result(&w, r.clone());
            }));
            self.attach_event_dep(&source, cb);
        }
        sig
    }

    /// An event firing each outcome stored to `b` (after its equality
    /// filtering). Constants never change, so their changes are never.
    pub fn changes<T: Clone + 'static>(&mut self, b: &Signal<T>) -> Event<T> {
        if b.is_constant() {
            return Event::never();
        }
        let (out, sender) = self.make_event::<T>();
        let cb: DepFn<T> = Rc::new(RefCell::new(move |en: &mut Engine, r: &Outcome<T>| {
            en.send_result(&sender, r.clone());
        }));
        self.attach_signal_dep(b, cb);
        out
    }

    /// A unit event firing on each transition of `b` to `true`.
    pub fn when_true(&mut self, b: &Signal<bool>) -> Event<()> {
        let ch = self.changes(b);
        let trues = self.filter_event(&ch, |v| *v);
        self.map_event(&trues, |_| ())
    }

    /// A signal counting occurrences of `e`.
    pub fn count<T: Clone + 'static>(&mut self, e: &Event<T>) -> Signal<usize> {
        let counts = self.collect(e, 0usize, |n, _| n + 1);
        self.hold(0, &counts)
    }

    /// A held cell driven by its own sender: `state(v)` is
    /// `hold(v, make_event())` packaged together.
    pub fn state<T: Clone + PartialEq + 'static>(
        &mut self,
        init: T,
    ) -> (Signal<T>, EventSender<T>) {
        let (e, sender) = self.make_event();
        (self.hold(init, &e), sender)
    }
}
