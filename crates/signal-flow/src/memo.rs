//! Memoization of reader sub-computations.
//!
//! A [`Memo`] table caches the result *and the timestamp range* of a
//! sub-computation, keyed by user data. On a hit during a re-run, the cached
//! range is re-spliced into the current execution: the gap up to it is
//! discarded, pending readers scheduled inside the range are replayed, and
//! the clock jumps to its finish — so nested readers, subscriptions, and
//! cleanups created by the original run stay valid without re-executing the
//! body.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;

use tidemark::Timestamp;

use crate::engine::Engine;

/// Type-erased clearing hook; the engine keeps weak references to every
/// table so [`Engine::init`] can empty them.
pub(crate) trait MemoClear {
    fn clear_all(&self);
}

struct Entry<V> {
    result: V,
    start: Timestamp,
    finish: Timestamp,
}

struct Inner<K, V> {
    entries: RefCell<AHashMap<K, Vec<Entry<V>>>>,
}

impl<K: 'static, V: 'static> MemoClear for Inner<K, V> {
    fn clear_all(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// A keyed cache of reader sub-ranges.
///
/// Cheap to clone; clones share the table.
pub struct Memo<K, V> {
    inner: Rc<Inner<K, V>>,
}

impl<K, V> Clone for Memo<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Engine {
    /// Create a memo table registered with this engine (so
    /// [`init`](Engine::init) clears it).
    pub fn memo<K, V>(&mut self) -> Memo<K, V>
    where
        K: Hash + Eq + Clone + 'static,
        V: Clone + 'static,
    {
        self.memo_with_capacity(0)
    }

    /// [`memo`](Engine::memo) with a pre-sized table.
    pub fn memo_with_capacity<K, V>(&mut self, capacity: usize) -> Memo<K, V>
    where
        K: Hash + Eq + Clone + 'static,
        V: Clone + 'static,
    {
        let inner = Rc::new(Inner {
            entries: RefCell::new(AHashMap::with_capacity(capacity)),
        });
        let inner_dyn: Rc<dyn MemoClear> = inner.clone();
        let registration: std::rc::Weak<dyn MemoClear> = Rc::downgrade(&inner_dyn);
        self.memos.push(registration);
        Memo { inner }
    }
}

impl<K, V> Memo<K, V>
where
    K: Hash + Eq + Clone + 'static,
    V: Clone + 'static,
{
    /// Compute `f(key)` with memoization.
    ///
    /// Outside a reader this is a plain call. Inside one, a cached entry is
    /// reusable when its range lies strictly ahead of the clock and strictly
    /// inside the executing reader's remaining interval; reuse discards the
    /// gap before the entry, replays pending readers scheduled inside it,
    /// and resumes after its finish. A miss evaluates `f` inside a fresh
    /// `[start, finish]` range and records it; the entry evicts itself when
    /// its finish is spliced out.
    pub fn call(
        &self,
        en: &mut Engine,
        key: K,
        f: impl FnOnce(&mut Engine, &K) -> V,
    ) -> V {
        let Some(&enclosing) = en.finish_stack.last() else {
            return f(en, &key);
        };
        let now = en.timeline.get_now();
        let hit = {
            let entries = self.inner.entries.borrow();
            entries.get(&key).and_then(|candidates| {
                candidates.iter().find_map(|e| {
                    let after_now =
                        en.timeline.compare(e.start, now) == std::cmp::Ordering::Greater;
                    let inside = en.timeline.compare(e.finish, enclosing)
                        == std::cmp::Ordering::Less;
                    (after_now && inside).then(|| (e.result.clone(), e.start, e.finish))
                })
            })
        };
        en.tracer.on_memo_lookup(hit.is_some());
        match hit {
            Some((result, start, finish)) => {
                en.splice(now, start);
                en.propagate_until(Some(finish));
                en.timeline.set_now(finish);
                result
            }
            None => {
                let start = en.timeline.tick();
                let result = f(en, &key);
                let finish = en.timeline.tick();
                self.inner
                    .entries
                    .borrow_mut()
                    .entry(key.clone())
                    .or_default()
                    .push(Entry {
                        result: result.clone(),
                        start,
                        finish,
                    });
                let weak = Rc::downgrade(&self.inner);
                en.timeline.add_cleanup(
                    finish,
                    Box::new(move |_en: &mut Engine| {
                        if let Some(inner) = weak.upgrade() {
                            let mut entries = inner.entries.borrow_mut();
                            if let Some(candidates) = entries.get_mut(&key) {
                                candidates
                                    .retain(|e| !(e.start == start && e.finish == finish));
                                if candidates.is_empty() {
                                    entries.remove(&key);
                                }
                            }
                        }
                    }),
                );
                result
            }
        }
    }

    /// Number of cached entries (diagnostics and tests).
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().values().map(Vec::len).sum()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_direct_call_outside_reader() {
        let mut en = Engine::new();
        let memo: Memo<i32, i32> = en.memo();
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let out = memo.call(&mut en, 7, |_, k| {
            r.set(r.get() + 1);
            k * 2
        });
        assert_eq!(out, 14);
        assert_eq!(runs.get(), 1);
        // Outside a reader, nothing is cached.
        assert!(memo.is_empty());
    }

    #[test]
    fn test_init_clears_registered_tables() {
        let mut en = Engine::new();
        let memo: Memo<i32, i32> = en.memo();
        // Force an entry by calling inside a synthetic reader frame.
        let fake_finish = {
            en.timeline.tick();
            en.timeline.tick()
        };
        en.finish_stack.push(fake_finish);
        let _ = memo.call(&mut en, 1, |_, k| *k);
        en.finish_stack.pop();
        assert_eq!(memo.len(), 1);
        en.init();
        assert!(memo.is_empty());
    }
}
