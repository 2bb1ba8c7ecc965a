//! Tidemark: order-maintenance primitives for virtual-time engines.
//!
//! This crate provides the two low-level structures a change-propagation
//! engine is built on:
//!
//! - [`Timeline`]: a totally ordered set of [`Timestamp`]s with O(1)
//!   amortized insert-after, O(1) compare, range invalidation ("splice-out")
//!   with attached cleanups, and a movable virtual "now".
//! - [`List`]: a slab-backed doubly-linked list with generation-tagged
//!   handles, used for dependent-callback lists where removal must be O(1)
//!   and stale handles must be harmless.
//!
//! Tidemark is deliberately policy-free: it never runs cleanups (it drains
//! them to the caller in order) and knows nothing about cells, readers, or
//! scheduling.

mod list;
mod timeline;

pub use list::{Iter, List, NodeId};
pub use timeline::{Timeline, Timestamp};
