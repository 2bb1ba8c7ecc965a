//! Memoization: cached sub-ranges are re-spliced instead of re-run, their
//! nested structure stays live, and stale entries evict themselves.

use std::cell::Cell;
use std::rc::Rc;

use signal_flow::{Engine, Memo, Signal};

#[test]
fn test_memo_skips_unaffected_subcomputation() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(1);
    let (b, wb) = en.changeable(10);
    let memo: Memo<i32, i32> = en.memo();
    let runs = Rc::new(Cell::new(0));

    let out = {
        let memo = memo.clone();
        let runs = runs.clone();
        en.bind2(&a, &b, move |en, av, bv| {
            let runs = runs.clone();
            let doubled = memo.call(en, *bv, move |_, k| {
                runs.set(runs.get() + 1);
                k * 2
            });
            en.constant(av + doubled)
        })
    };

    // Construction runs outside any propagation frame: a plain call.
    assert_eq!(out.read().unwrap(), 21);
    assert_eq!(runs.get(), 1);

    // First re-run misses and caches the sub-range.
    en.write(&wa, 2);
    en.propagate();
    assert_eq!(out.read().unwrap(), 22);
    assert_eq!(runs.get(), 2);
    assert_eq!(memo.len(), 1);

    // Sibling input changed, memo key did not: the body is not re-executed.
    en.write(&wa, 3);
    en.propagate();
    assert_eq!(out.read().unwrap(), 23);
    assert_eq!(runs.get(), 2);

    en.write(&wa, 4);
    en.propagate();
    assert_eq!(out.read().unwrap(), 24);
    assert_eq!(runs.get(), 2);

    // Key changed: miss, and the old entry evicts itself.
    en.write(&wb, 7);
    en.propagate();
    assert_eq!(out.read().unwrap(), 18);
    assert_eq!(runs.get(), 3);
    assert_eq!(memo.len(), 1);
}

#[test]
fn test_memo_hit_preserves_cleanups_and_nested_structure() {
    let mut en = Engine::new();
    let (trigger, wtrigger) = en.changeable(0);
    let (x, wx) = en.changeable(1);
    let memo: Memo<u8, Signal<i32>> = en.memo();
    let cleaned = Rc::new(Cell::new(0));

    let out = {
        let memo = memo.clone();
        let x = x.clone();
        let cleaned = cleaned.clone();
        en.bind(&trigger, move |en, _| {
            let x = x.clone();
            let cleaned = cleaned.clone();
            memo.call(en, 0u8, move |en, _| {
                let doubled = en.lift(&x, |v| v * 2);
                en.cleanup(move |_| cleaned.set(cleaned.get() + 1));
                doubled
            })
        })
    };
    assert_eq!(out.read().unwrap(), 2);

    // First re-run rebuilds and caches; the construction-time inner range
    // (including its cleanup) is discarded.
    en.write(&wtrigger, 1);
    en.propagate();
    assert_eq!(out.read().unwrap(), 2);
    assert_eq!(cleaned.get(), 1);

    // Re-run with a hit: the cached range is reused, its cleanup not refired.
    en.write(&wtrigger, 2);
    en.propagate();
    assert_eq!(cleaned.get(), 1);

    // The nested reader inside the cached range is still wired up.
    en.write(&wx, 5);
    en.propagate();
    assert_eq!(out.read().unwrap(), 10);
    assert_eq!(cleaned.get(), 1);
}

#[test]
fn test_memo_distinct_keys_cache_independently() {
    let mut en = Engine::new();
    let (sel, wsel) = en.changeable(0i32);
    let memo: Memo<i32, i32> = en.memo();
    let runs = Rc::new(Cell::new(0));

    let out = {
        let memo = memo.clone();
        let runs = runs.clone();
        en.bind(&sel, move |en, k| {
            let runs = runs.clone();
            let v = memo.call(en, *k, move |_, k| {
                runs.set(runs.get() + 1);
                k * 100
            });
            en.constant(v)
        })
    };
    assert_eq!(out.read().unwrap(), 0);
    assert_eq!(runs.get(), 1);

    en.write(&wsel, 1);
    en.propagate();
    assert_eq!(out.read().unwrap(), 100);
    assert_eq!(runs.get(), 2);

    // Flipping back re-runs: the construction-time key-0 call was a plain
    // call (nothing cached), and the key-1 entry is evicted by this run's
    // splice.
    en.write(&wsel, 0);
    en.propagate();
    assert_eq!(out.read().unwrap(), 0);
    assert_eq!(runs.get(), 3);
    assert_eq!(memo.len(), 1);
}

#[test]
fn test_memo_inactive_outside_reader() {
    let mut en = Engine::new();
    let memo: Memo<i32, i32> = en.memo();
    let runs = Rc::new(Cell::new(0));
    for _ in 0..3 {
        let runs = runs.clone();
        let v = memo.call(&mut en, 5, move |_, k| {
            runs.set(runs.get() + 1);
            k + 1
        });
        assert_eq!(v, 6);
    }
    assert_eq!(runs.get(), 3);
    assert!(memo.is_empty());
}

#[test]
fn test_init_empties_memo_tables() {
    let mut en = Engine::new();
    let (a, wa) = en.changeable(0);
    let memo: Memo<i32, i32> = en.memo();
    let out = {
        let memo = memo.clone();
        en.bind(&a, move |en, v| {
            let cached = memo.call(en, *v, |_, k| k + 1);
            en.constant(cached)
        })
    };
    en.write(&wa, 1);
    en.propagate();
    assert_eq!(out.read().unwrap(), 2);
    assert_eq!(memo.len(), 1);
    en.init();
    assert!(memo.is_empty());
}
