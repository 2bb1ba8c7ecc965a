//! Derivation combinators: incremental recomputation, equality filtering,
//! constant short-circuits, and dynamic graph shape via bind.

use std::cell::Cell;
use std::rc::Rc;

use signal_flow::{eq, Engine, Signal};

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

#[test]
fn test_diamond_recomputation() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);

    let b_runs = counter();
    let c_runs = counter();
    let d_runs = counter();
    let b = {
        let n = b_runs.clone();
        en.lift(&a, move |x| {
            n.set(n.get() + 1);
            x + 1
        })
    };
    let c = {
        let n = c_runs.clone();
        en.lift(&a, move |x| {
            n.set(n.get() + 1);
            x * 2
        })
    };
    let d = {
        let n = d_runs.clone();
        en.lift2(&b, &c, move |x, y| {
            n.set(n.get() + 1);
            x + y
        })
    };

    assert_eq!(d.read().unwrap(), 4);
    assert_eq!((b_runs.get(), c_runs.get(), d_runs.get()), (1, 1, 1));

    en.write(&wa, 10);
    en.propagate();
    assert_eq!(b.read().unwrap(), 11);
    assert_eq!(c.read().unwrap(), 20);
    assert_eq!(d.read().unwrap(), 31);
    // Each leg re-ran exactly once; the apex was notified twice but ran once.
    assert_eq!((b_runs.get(), c_runs.get(), d_runs.get()), (2, 2, 2));
}

#[test]
fn test_derived_state_is_stale_until_propagate() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);
    let b = en.lift(&a, |x| x + 1);
    en.write(&wa, 10);
    assert_eq!(b.read().unwrap(), 2);
    en.propagate();
    assert_eq!(b.read().unwrap(), 11);
}

#[test]
fn test_equality_filter_suppresses_dependents() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(0);
    let count = counter();
    {
        let count = count.clone();
        en.notify(&a, move |_, _| count.set(count.get() + 1));
    }

    en.write(&wa, 0);
    en.propagate();
    assert_eq!(count.get(), 0);

    en.write(&wa, 1);
    en.propagate();
    assert_eq!(count.get(), 1);

    en.write(&wa, 1);
    en.propagate();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_custom_equality_policy() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);
    // Parity-equal values do not propagate.
    let parity = en.lift_with(&a, Rc::new(|x: &i32, y: &i32| x % 2 == y % 2), |x| *x);
    let count = counter();
    {
        let count = count.clone();
        en.notify(&parity, move |_, _| count.set(count.get() + 1));
    }
    en.write(&wa, 3);
    en.propagate();
    assert_eq!(count.get(), 0);
    en.write(&wa, 4);
    en.propagate();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_notify_now_delivers_current_state() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(5);
    let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        en.notify_now(&a, move |_, v| seen.borrow_mut().push(*v));
    }
    // Immediate delivery of the current value, then one per change.
    assert_eq!(*seen.borrow(), vec![5]);
    en.write(&wa, 6);
    en.propagate();
    assert_eq!(*seen.borrow(), vec![5, 6]);
}

#[test]
fn test_dynamic_structure_via_bind() {
    let mut en = Engine::new();
    let (sw, wsw) = en.changeable(true);
    let (x, wx) = en.changeable(1);
    let (y, wy) = en.changeable(100);
    let out = {
        let (x, y) = (x.clone(), y.clone());
        en.bind(&sw, move |_, b| if *b { x.clone() } else { y.clone() })
    };
    assert_eq!(out.read().unwrap(), 1);

    en.write(&wsw, false);
    en.propagate();
    assert_eq!(out.read().unwrap(), 100);

    // The old branch is disconnected: writes to it no longer reach out.
    en.write(&wx, 2);
    en.propagate();
    assert_eq!(out.read().unwrap(), 100);

    en.write(&wy, 200);
    en.propagate();
    assert_eq!(out.read().unwrap(), 200);
}

#[test]
fn test_bind_follows_inner_updates() {
    let mut en = Engine::new();
    let (sel, _wsel) = en.changeable(0u8);
    let (inner, winner) = en.changeable(5);
    let out = {
        let inner = inner.clone();
        en.bind(&sel, move |_, _| inner.clone())
    };
    assert_eq!(out.read().unwrap(), 5);
    en.write(&winner, 6);
    en.propagate();
    assert_eq!(out.read().unwrap(), 6);
}

#[test]
fn test_lift_of_constant_is_constant() {
    let mut en = Engine::new();
    let c = en.constant(5);
    let d = en.lift(&c, |x| x + 1);
    assert!(d.is_constant());
    assert_eq!(d.read().unwrap(), 6);
}

#[test]
fn test_lift_identity_mirrors_input() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(3);
    let b = en.lift(&a, |x| *x);
    assert_eq!(b.read().unwrap(), a.read().unwrap());
    en.write(&wa, 9);
    en.propagate();
    assert_eq!(b.read().unwrap(), a.read().unwrap());
}

#[test]
fn test_bind_of_constant_short_circuits() {
    let mut en = Engine::new();
    let c = en.constant(2);
    let (inner, winner) = en.changeable(10);
    let out = {
        let inner = inner.clone();
        en.bind(&c, move |_, _| inner.clone())
    };
    // No reader was installed; out IS the inner signal.
    assert_eq!(out.id(), inner.id());
    en.write(&winner, 11);
    en.propagate();
    assert_eq!(out.read().unwrap(), 11);
}

#[test]
fn test_switch_flattens() {
    let mut en = Engine::new();
    let (x, wx) = en.changeable(1);
    let (y, _wy) = en.changeable(10);
    let (sel, wsel) = en.changeable_with(
        signal_flow::Outcome::Value(x.clone()),
        eq::never::<Signal<i32>>(),
    );
    let out = en.switch(&sel);
    assert_eq!(out.read().unwrap(), 1);

    en.write(&wsel, y.clone());
    en.propagate();
    assert_eq!(out.read().unwrap(), 10);

    // The abandoned inner signal is disconnected.
    en.write(&wx, 2);
    en.propagate();
    assert_eq!(out.read().unwrap(), 10);
}

#[test]
fn test_bind_all_over_mixed_inputs() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);
    let (b, _wb) = en.changeable(2);
    let c = en.constant(3);
    let sum = en.lift_all(&[a.clone(), b.clone(), c.clone()], |vs| vs.iter().sum::<i32>());
    assert_eq!(sum.read().unwrap(), 6);
    en.write(&wa, 10);
    en.propagate();
    assert_eq!(sum.read().unwrap(), 15);
}

#[test]
fn test_lift_all_of_constants_is_constant() {
    let mut en = Engine::new();
    let xs = [en.constant(1), en.constant(2), en.constant(3)];
    let sum = en.lift_all(&xs, |vs| vs.iter().sum::<i32>());
    assert!(sum.is_constant());
    assert_eq!(sum.read().unwrap(), 6);
}

#[test]
fn test_bind_all_picks_signal() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(0usize);
    let (b, _) = en.changeable(7usize);
    let targets = [en.constant(100usize), en.constant(200usize)];
    let out = {
        let targets = targets.clone();
        en.bind_all(&[a.clone(), b.clone()], move |_, vs| {
            targets[vs[0] % 2].clone()
        })
    };
    assert_eq!(out.read().unwrap(), 100);
    en.write(&wa, 1);
    en.propagate();
    assert_eq!(out.read().unwrap(), 200);
}

#[test]
fn test_deep_chain_updates() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(0);
    let mut cur = en.lift(&a, |x| x + 1);
    for _ in 0..49 {
        cur = en.lift(&cur, |x| x + 1);
    }
    assert_eq!(cur.read().unwrap(), 50);
    en.write(&wa, 100);
    en.propagate();
    assert_eq!(cur.read().unwrap(), 150);
}

#[test]
fn test_clear_propagates_unset_downstream() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);
    let b = en.lift(&a, |x| x + 1);
    en.clear(&wa);
    en.propagate();
    assert!(b.read().unwrap_err().is_unset());
}

#[test]
fn test_init_discards_pending_work() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);
    let b = en.lift(&a, |x| x + 1);
    en.write(&wa, 5);
    en.init();
    en.propagate();
    // The stale handle keeps its last state; nothing runs after a reset.
    assert_eq!(b.read().unwrap(), 2);

    // The engine is fully usable afterwards.
    let (c, wc) = en.changeable(1);
    let d = en.lift(&c, |x| x * 3);
    en.write(&wc, 4);
    en.propagate();
    assert_eq!(d.read().unwrap(), 12);
}
