//! Fault values.
//!
//! At the engine level, failures are first-class values, not control flow: a
//! failed computation stores [`Fault`] in its output signal and dependents
//! observe it like any other state.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

/// A failure value carried by a signal.
///
/// Faults are cheap to clone; user errors are reference-counted, and fault
/// identity ([`Fault::same`]) compares those references by pointer. Two
/// faults wrapping structurally equal but distinct errors are *not* the same
/// by default — install a custom comparison with
/// [`Engine::set_fault_eq`](crate::Engine::set_fault_eq) if equal errors
/// should suppress propagation.
#[derive(Clone, Debug)]
pub struct Fault {
    repr: Repr,
}

#[derive(Clone, Debug)]
enum Repr {
    /// No value has been written yet.
    Unset,
    /// A user error raised by a computation.
    User(Rc<dyn Error + 'static>),
}

impl Fault {
    /// The "no value written yet" fault. Freshly created changeables without
    /// an initial value, and cleared changeables, hold this.
    pub fn unset() -> Self {
        Self { repr: Repr::Unset }
    }

    /// Wrap a user error.
    pub fn new(err: impl Error + 'static) -> Self {
        Self {
            repr: Repr::User(Rc::new(err)),
        }
    }

    /// Convenience constructor for message-only faults.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// True if this is the unset fault.
    pub fn is_unset(&self) -> bool {
        matches!(self.repr, Repr::Unset)
    }

    /// Identity comparison: unset equals unset, user errors compare by
    /// reference.
    pub fn same(&self, other: &Fault) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Unset, Repr::Unset) => true,
            (Repr::User(a), Repr::User(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Borrow the wrapped user error, if any.
    pub fn user_error(&self) -> Option<&(dyn Error + 'static)> {
        match &self.repr {
            Repr::Unset => None,
            Repr::User(err) => Some(err.as_ref()),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Unset => write!(f, "no value written yet"),
            Repr::User(err) => write!(f, "{}", err),
        }
    }
}

impl Error for Fault {}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for MessageError {}
