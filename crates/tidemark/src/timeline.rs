//! Order-maintenance timeline.
//!
//! A [`Timeline`] is a total order over timestamps supporting online
//! insertion: `tick` inserts a new timestamp immediately after the virtual
//! "now" in O(1) amortized, and `compare` answers in O(1). Ordering is kept
//! with u64 list-labels: an insertion takes the midpoint of its neighbors'
//! labels, and when a gap runs out the smallest enclosing power-of-two label
//! window at density below 1/4 is relabeled evenly (the classic list-labeling
//! scheme).
//!
//! Splicing out a range `(lo, hi]` marks its timestamps invalid and hands the
//! attached cleanups back to the caller in timestamp order. Spliced
//! timestamps are marked, never unlinked: they keep their place in the total
//! order, so comparisons involving dead timestamps stay meaningful and new
//! insertions simply squeeze in before them.
//!
//! Each timestamp can carry cleanup payloads of type `C`; the timeline never
//! runs them itself (callers typically need mutable access to their own
//! engine state while running a cleanup), it only drains them in order.

const NIL: u32 = u32::MAX;

/// Label distance used when appending at the end of the timeline.
const APPEND_GAP: u64 = 1 << 32;

/// Opaque handle to a point on a [`Timeline`].
///
/// Handles are tied to the timeline epoch they were created in; after
/// [`Timeline::reset`], old handles report as spliced-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    epoch: u32,
    index: u32,
}

struct Slot<C> {
    label: u64,
    prev: u32,
    next: u32,
    spliced: bool,
    cleanups: Vec<C>,
}

impl<C> Slot<C> {
    fn root() -> Self {
        Self {
            label: APPEND_GAP,
            prev: NIL,
            next: NIL,
            spliced: false,
            cleanups: Vec::new(),
        }
    }
}

/// The virtual-time total order.
pub struct Timeline<C> {
    slots: Vec<Slot<C>>,
    head: u32,
    now: u32,
    epoch: u32,
    live: usize,
}

impl<C> Default for Timeline<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Timeline<C> {
    /// Create a timeline holding a single root timestamp, which is "now".
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::root()],
            head: 0,
            now: 0,
            epoch: 0,
            live: 1,
        }
    }

    /// The current virtual time.
    pub fn get_now(&self) -> Timestamp {
        self.stamp(self.now)
    }

    /// Move the virtual clock to `t`.
    pub fn set_now(&mut self, t: Timestamp) {
        debug_assert_eq!(t.epoch, self.epoch, "timestamp from a previous epoch");
        self.now = t.index;
    }

    /// Insert a new timestamp immediately after "now" and make it "now".
    pub fn tick(&mut self) -> Timestamp {
        let index = self.insert_after(self.now);
        self.now = index;
        self.stamp(index)
    }

    /// Total-order comparison of two live-epoch timestamps.
    pub fn compare(&self, a: Timestamp, b: Timestamp) -> std::cmp::Ordering {
        debug_assert_eq!(a.epoch, self.epoch, "timestamp from a previous epoch");
        debug_assert_eq!(b.epoch, self.epoch, "timestamp from a previous epoch");
        if a.index == b.index {
            return std::cmp::Ordering::Equal;
        }
        self.slots[a.index as usize]
            .label
            .cmp(&self.slots[b.index as usize].label)
    }

    /// True if `t` has been invalidated (or belongs to a previous epoch).
    pub fn is_spliced_out(&self, t: Timestamp) -> bool {
        t.epoch != self.epoch || self.slots[t.index as usize].spliced
    }

    /// Attach a cleanup to `t`, to be handed back when `t` is spliced out or
    /// the timeline is reset. Cleanups on one timestamp drain FIFO.
    pub fn add_cleanup(&mut self, t: Timestamp, cleanup: C) {
        debug_assert_eq!(t.epoch, self.epoch, "timestamp from a previous epoch");
        debug_assert!(
            !self.slots[t.index as usize].spliced,
            "cleanup attached to a spliced-out timestamp"
        );
        self.slots[t.index as usize].cleanups.push(cleanup);
    }

    /// Mark every timestamp in `(lo, hi]` invalid and return the cleanups
    /// attached there, in timestamp order.
    ///
    /// `lo` itself is untouched (it is reused as the next run's starting
    /// point). Timestamps already spliced are skipped, so each cleanup is
    /// returned exactly once across repeated splices of overlapping ranges.
    pub fn splice_out(&mut self, lo: Timestamp, hi: Timestamp) -> Vec<C> {
        debug_assert_eq!(lo.epoch, self.epoch, "timestamp from a previous epoch");
        debug_assert_eq!(hi.epoch, self.epoch, "timestamp from a previous epoch");
        let mut fired = Vec::new();
        if lo.index == hi.index {
            return fired;
        }
        let hi_label = self.slots[hi.index as usize].label;
        debug_assert!(
            self.slots[lo.index as usize].label < hi_label,
            "splice_out bounds out of order"
        );
        let mut spliced = 0;
        let mut cur = self.slots[lo.index as usize].next;
        while cur != NIL {
            let slot = &mut self.slots[cur as usize];
            if slot.label > hi_label {
                break;
            }
            if !slot.spliced {
                slot.spliced = true;
                spliced += 1;
                fired.append(&mut slot.cleanups);
            }
            cur = slot.next;
        }
        self.live -= spliced;
        fired
    }

    /// Discard every timestamp and start a fresh epoch with a single root
    /// "now". Returns all pending cleanups in timestamp order.
    pub fn reset(&mut self) -> Vec<C> {
        let mut fired = Vec::new();
        let mut cur = self.head;
        while cur != NIL {
            let slot = &mut self.slots[cur as usize];
            fired.append(&mut slot.cleanups);
            cur = slot.next;
        }
        self.slots.clear();
        self.slots.push(Slot::root());
        self.head = 0;
        self.now = 0;
        self.epoch = self.epoch.wrapping_add(1);
        self.live = 1;
        fired
    }

    /// Number of timestamps not yet spliced out (diagnostics and tests).
    pub fn live_len(&self) -> usize {
        self.live
    }

    fn stamp(&self, index: u32) -> Timestamp {
        Timestamp {
            epoch: self.epoch,
            index,
        }
    }

    fn insert_after(&mut self, at: u32) -> u32 {
        loop {
            let next = self.slots[at as usize].next;
            let at_label = self.slots[at as usize].label;
            let label = if next == NIL {
                match at_label.checked_add(APPEND_GAP) {
                    Some(label) => Some(label),
                    None if u64::MAX - at_label >= 2 => Some(at_label + (u64::MAX - at_label) / 2),
                    None => None,
                }
            } else {
                let next_label = self.slots[next as usize].label;
                if next_label - at_label >= 2 {
                    Some(at_label + (next_label - at_label) / 2)
                } else {
                    None
                }
            };
            match label {
                Some(label) => {
                    let index = self.slots.len() as u32;
                    self.slots.push(Slot {
                        label,
                        prev: at,
                        next,
                        spliced: false,
                        cleanups: Vec::new(),
                    });
                    self.slots[at as usize].next = index;
                    if next != NIL {
                        self.slots[next as usize].prev = index;
                    }
                    self.live += 1;
                    return index;
                }
                None if next == NIL => self.renumber(),
                None => self.relabel_around(at),
            }
        }
    }

    /// Relabel the smallest power-of-two label window around `at` whose
    /// density is below 1/4, spreading its nodes evenly. Guarantees the gap
    /// after `at` is at least 2 afterwards.
    fn relabel_around(&mut self, at: u32) {
        let at_label = self.slots[at as usize].label;
        for level in 2..64u32 {
            let size: u128 = 1 << level;
            let win_start = at_label & !((size - 1) as u64);
            let win_end = win_start as u128 + size;

            // Leftmost chain node inside the window.
            let mut first = at;
            while self.slots[first as usize].prev != NIL {
                let prev = self.slots[first as usize].prev;
                if self.slots[prev as usize].label < win_start {
                    break;
                }
                first = prev;
            }
            // Count window occupancy.
            let mut count: u128 = 0;
            let mut cur = first;
            while cur != NIL && (self.slots[cur as usize].label as u128) < win_end {
                count += 1;
                cur = self.slots[cur as usize].next;
            }
            if count * 4 <= size {
                let gap = (size / count) as u64;
                let mut label = win_start + gap / 2;
                let mut cur = first;
                while cur != NIL && count > 0 {
                    self.slots[cur as usize].label = label;
                    label = label.wrapping_add(gap);
                    count -= 1;
                    cur = self.slots[cur as usize].next;
                }
                return;
            }
        }
        self.renumber();
    }

    /// Even full renumbering; the escape hatch when no window is sparse
    /// enough (requires on the order of 2^61 timestamps, so in practice this
    /// only fires in adversarial tests).
    fn renumber(&mut self) {
        let mut n: u64 = 0;
        let mut cur = self.head;
        while cur != NIL {
            n += 1;
            cur = self.slots[cur as usize].next;
        }
        let gap = u64::MAX / (n + 1);
        let mut label = gap;
        cur = self.head;
        while cur != NIL {
            self.slots[cur as usize].label = label;
            label += gap;
            cur = self.slots[cur as usize].next;
        }
    }
}
