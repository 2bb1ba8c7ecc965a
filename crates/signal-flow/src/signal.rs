//! Changeable and constant signals.
//!
//! A signal node holds its current [`Outcome`] and a list of dependent
//! callbacks. Nodes are reference-counted and single-threaded; the writer
//! and reader handles are two views of the same node. Constants carry no
//! writer and no dependents — they can never notify.

use std::cell::RefCell;
use std::rc::Rc;

use tidemark::List;

use crate::engine::Engine;
use crate::fault::Fault;
use crate::outcome::{eq, outcome_eq, EqFn, Outcome};

/// Stable identifier of a signal node, usable as a hash key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(pub u64);

/// A dependent callback: invoked with the newly stored outcome whenever the
/// node's state changes. Shared so the dependent list can be snapshotted
/// before dispatch (callbacks may subscribe or unsubscribe mid-dispatch).
pub(crate) type DepFn<T> = Rc<RefCell<dyn FnMut(&mut Engine, &Outcome<T>)>>;

pub(crate) struct SignalNode<T> {
    pub(crate) id: SignalId,
    pub(crate) constant: bool,
    pub(crate) eq: EqFn<T>,
    pub(crate) state: RefCell<Outcome<T>>,
    pub(crate) deps: RefCell<List<DepFn<T>>>,
}

/// Observing handle to a signal.
pub struct Signal<T> {
    pub(crate) node: Rc<SignalNode<T>>,
}

/// Writing handle to a changeable signal.
pub struct SignalWriter<T> {
    pub(crate) node: Rc<SignalNode<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Clone for SignalWriter<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Signal<T> {
    /// This signal's identifier.
    pub fn id(&self) -> SignalId {
        self.node.id
    }

    /// True if this signal can never change.
    pub fn is_constant(&self) -> bool {
        self.node.constant
    }
}

impl<T: Clone> Signal<T> {
    /// The current outcome.
    pub fn read_result(&self) -> Outcome<T> {
        self.node.state.borrow().clone()
    }

    /// The current value; a stored fault surfaces as the error.
    pub fn read(&self) -> Result<T, Fault> {
        self.read_result().into_result()
    }
}

impl<T> SignalWriter<T> {
    /// Identifier of the written signal.
    pub fn id(&self) -> SignalId {
        self.node.id
    }
}

impl Engine {
    /// Create a changeable signal with an initial value and structural
    /// equality filtering.
    pub fn changeable<T: Clone + PartialEq + 'static>(
        &mut self,
        init: T,
    ) -> (Signal<T>, SignalWriter<T>) {
        self.changeable_with(Outcome::Value(init), eq::structural())
    }

    /// Create a changeable signal with an explicit initial outcome and
    /// equality policy. `Outcome::Fail(Fault::unset())` makes an unwritten
    /// signal.
    pub fn changeable_with<T: Clone + 'static>(
        &mut self,
        init: Outcome<T>,
        eq: EqFn<T>,
    ) -> (Signal<T>, SignalWriter<T>) {
        let node = Rc::new(SignalNode {
            id: SignalId(self.fresh_id()),
            constant: false,
            eq,
            state: RefCell::new(init),
            deps: RefCell::new(List::new()),
        });
        self.tracer.on_signal_created(node.id, false);
        (
            Signal { node: node.clone() },
            SignalWriter { node },
        )
    }

    /// Create a constant signal.
    pub fn constant<T: 'static>(&mut self, value: T) -> Signal<T> {
        self.constant_result(Outcome::Value(value))
    }

    /// Create a constant failed signal.
    pub fn constant_fail<T: 'static>(&mut self, fault: Fault) -> Signal<T> {
        self.constant_result(Outcome::Fail(fault))
    }

    pub(crate) fn constant_result<T: 'static>(&mut self, result: Outcome<T>) -> Signal<T> {
        let node = Rc::new(SignalNode {
            id: SignalId(self.fresh_id()),
            constant: true,
            eq: Rc::new(|_, _| true),
            state: RefCell::new(result),
            deps: RefCell::new(List::new()),
        });
        self.tracer.on_signal_created(node.id, true);
        Signal { node }
    }

    /// Write a value.
    pub fn write<T: Clone + 'static>(&mut self, w: &SignalWriter<T>, value: T) {
        self.write_result(w, Outcome::Value(value));
    }

    /// Write a fault.
    pub fn write_fault<T: Clone + 'static>(&mut self, w: &SignalWriter<T>, fault: Fault) {
        self.write_result(w, Outcome::Fail(fault));
    }

    /// Reset the signal to the unwritten state.
    pub fn clear<T: Clone + 'static>(&mut self, w: &SignalWriter<T>) {
        self.write_result(w, Outcome::Fail(Fault::unset()));
    }

    /// Write an outcome. If it equals the current state — value equality per
    /// the signal's policy, fault equality per the engine's — nothing
    /// happens; otherwise the outcome is stored and every dependent callback
    /// fires, in subscription order.
    pub fn write_result<T: Clone + 'static>(&mut self, w: &SignalWriter<T>, result: Outcome<T>) {
        let changed = {
            let current = w.node.state.borrow();
            !outcome_eq(&current, &result, &w.node.eq, &self.fault_eq)
        };
        self.tracer.on_write(w.node.id, changed);
        if changed {
            self.dispatch_write(&w.node, result);
        }
    }

    /// Unconditional write: store and notify without the equality check.
    ///
    /// Used when the source signal's own filter already guarded the
    /// notification (mirroring in `connect`), so filtering again would drop
    /// legitimate updates of bind-produced signals.
    pub fn write_result_no_eq<T: Clone + 'static>(
        &mut self,
        w: &SignalWriter<T>,
        result: Outcome<T>,
    ) {
        self.tracer.on_write(w.node.id, true);
        self.dispatch_write(&w.node, result);
    }

    fn dispatch_write<T: Clone + 'static>(&mut self, node: &Rc<SignalNode<T>>, result: Outcome<T>) {
        *node.state.borrow_mut() = result.clone();
        let callbacks: Vec<DepFn<T>> = node.deps.borrow().iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            (&mut *cb.borrow_mut())(self, &result);
        }
    }
}
