//! Signal outcomes and equality policies.

use std::rc::Rc;

use crate::fault::Fault;

/// The stored state of a signal: either a value or a fault.
#[derive(Clone, Debug)]
pub enum Outcome<T> {
    /// A successfully computed value.
    Value(T),
    /// A failure (including "not yet written").
    Fail(Fault),
}

impl<T> Outcome<T> {
    /// True for `Value`.
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// True for `Fail`.
    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail(_))
    }

    /// Convert into a `Result`, surfacing the fault as the error.
    pub fn into_result(self) -> Result<T, Fault> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::Fail(e) => Err(e),
        }
    }

    /// Map the value, passing faults through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Fail(e) => Outcome::Fail(e),
        }
    }
}

impl<T> From<Result<T, Fault>> for Outcome<T> {
    fn from(r: Result<T, Fault>) -> Self {
        match r {
            Ok(v) => Outcome::Value(v),
            Err(e) => Outcome::Fail(e),
        }
    }
}

/// Value-equality policy attached to a changeable signal. Writes of an equal
/// value do not notify dependents.
pub type EqFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Equality policy used for fault-to-fault writes.
pub type FaultEqFn = Rc<dyn Fn(&Fault, &Fault) -> bool>;

/// Ready-made equality policies.
///
/// Bind-flavored combinators default to [`never`] (the produced structure
/// itself changes, so equal values are still worth propagating); lift-flavored
/// combinators default to [`structural`].
pub mod eq {
    use super::EqFn;
    use std::rc::Rc;

    /// `PartialEq` comparison.
    pub fn structural<T: PartialEq + 'static>() -> EqFn<T> {
        Rc::new(|a, b| a == b)
    }

    /// Always propagate.
    pub fn never<T: 'static>() -> EqFn<T> {
        Rc::new(|_, _| false)
    }

    /// Pointer equality on shared values; useful when values are large and
    /// re-derivation reuses the same allocation.
    pub fn by_rc<T: 'static>() -> EqFn<Rc<T>> {
        Rc::new(|a, b| Rc::ptr_eq(a, b))
    }
}

/// Outcome equality under the signal's value policy and the engine's fault
/// policy. A value never equals a fault.
pub(crate) fn outcome_eq<T>(
    a: &Outcome<T>,
    b: &Outcome<T>,
    value_eq: &EqFn<T>,
    fault_eq: &FaultEqFn,
) -> bool {
    match (a, b) {
        (Outcome::Value(x), Outcome::Value(y)) => value_eq(x, y),
        (Outcome::Fail(x), Outcome::Fail(y)) => fault_eq(x, y),
        _ => false,
    }
}
