//! Priority-ordered ring of nodes anchored by a sentinel.
//!
//! # Layout
//!
//! ```text
//!   head end                                       pull end
//!  Sentinel -> [7] -> [5] -> [5] -> [-1] -> [-1] -> Sentinel
//!   (first)   newest ............................ oldest (last)
//! ```
//!
//! Nodes live in a [`Slab`]; links are slot indices, never pointers. The
//! sentinel owns no slot: its `next` is `first` (the head end) and its `prev`
//! is `last` (the pull end). An empty ring has both pointing at the sentinel.
//!
//! Walking from the pull end toward the head yields the pull order: every
//! negative-priority node in arrival order, then non-negative nodes by
//! ascending priority with ties in arrival order.
//!
//! The ring is not synchronized; [`crate::PriorityBuffer`] only touches it
//! while holding its lock.

pub(crate) mod slab;

use crate::error::{BufferError, InvalidOperation};
use crate::priority::Priority;
use crate::trace::error;

pub use slab::{Link, SlabIndex};
use slab::{Node, Slab};

/// Bounded doubly linked ring over slab slots.
pub struct Ring<T> {
    slab: Slab<T>,
    /// Sentinel `next`: node at the head end.
    first: Link<T>,
    /// Sentinel `prev`: node at the pull end.
    last: Link<T>,
}

impl<T> Ring<T> {
    /// Creates an empty ring holding at most `capacity` nodes.
    #[must_use]
    pub const fn with_capacity(capacity: u32) -> Self {
        Self {
            slab: Slab::with_capacity(capacity),
            first: Link::Sentinel,
            last: Link::Sentinel,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.slab.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last == Link::Sentinel
    }

    /// Position at the head end (least urgent).
    #[must_use]
    pub const fn head(&self) -> Link<T> {
        self.first
    }

    /// Position pulled next.
    #[must_use]
    pub const fn pull_end(&self) -> Link<T> {
        self.last
    }

    /// Link toward the pull end from `at`.
    #[must_use]
    pub fn next(&self, at: Link<T>) -> Option<Link<T>> {
        match at {
            Link::Sentinel => Some(self.first),
            Link::Node(idx) => self.slab.get(idx).map(|n| n.next),
        }
    }

    /// Link toward the head end from `at`.
    #[must_use]
    pub fn prev(&self, at: Link<T>) -> Option<Link<T>> {
        match at {
            Link::Sentinel => Some(self.last),
            Link::Node(idx) => self.slab.get(idx).map(|n| n.prev),
        }
    }

    fn set_next(&mut self, at: Link<T>, to: Link<T>) {
        match at {
            Link::Sentinel => self.first = to,
            Link::Node(idx) => {
                if let Some(node) = self.slab.get_mut(idx) {
                    node.next = to;
                }
            }
        }
    }

    fn set_prev(&mut self, at: Link<T>, to: Link<T>) {
        match at {
            Link::Sentinel => self.last = to,
            Link::Node(idx) => {
                if let Some(node) = self.slab.get_mut(idx) {
                    node.prev = to;
                }
            }
        }
    }

    /// Where a newcomer of `priority` belongs: just before (headward of) the
    /// first node it must be pulled after, or the sentinel if none.
    #[must_use]
    pub fn insertion_point(&self, priority: Priority) -> Link<T> {
        let mut cursor = self.first;
        while let Link::Node(idx) = cursor {
            let Some(node) = self.slab.get(idx) else {
                break;
            };
            if priority.yields_to(node.priority) {
                break;
            }
            cursor = node.next;
        }
        cursor
    }

    /// Links a new node immediately headward of `at`.
    ///
    /// Inserting before the sentinel appends at the pull end. Hands the
    /// payload back when the ring is full or `at` is a vacant slot.
    pub fn insert_before(
        &mut self,
        at: Link<T>,
        payload: T,
        priority: Priority,
    ) -> Result<SlabIndex<T>, T> {
        let Some(prev) = self.prev(at) else {
            return Err(payload);
        };
        let idx = self
            .slab
            .alloc(Node {
                payload,
                priority,
                next: at,
                prev,
            })
            .map_err(|node| node.payload)?;
        self.set_next(prev, Link::Node(idx));
        self.set_prev(at, Link::Node(idx));
        Ok(idx)
    }

    /// Inserts `payload` at the position its priority dictates.
    pub fn insert(&mut self, payload: T, priority: Priority) -> Result<SlabIndex<T>, T> {
        let at = self.insertion_point(priority);
        self.insert_before(at, payload, priority)
    }

    /// Unlinks the node at `at`, returning its payload and priority.
    ///
    /// # Errors
    ///
    /// Refuses the sentinel and vacant slots with
    /// [`BufferError::InvalidOperation`]; the ring is left untouched.
    pub fn remove(&mut self, at: Link<T>) -> Result<(T, Priority), BufferError> {
        let Link::Node(idx) = at else {
            error!("refusing to remove the sentinel from the ring");
            return Err(InvalidOperation::RemoveSentinel.into());
        };
        let Some(node) = self.slab.free(idx) else {
            error!(slot = u32::from(idx), "refusing to remove a vacant slot");
            return Err(InvalidOperation::VacantSlot(idx.into()).into());
        };
        self.set_next(node.prev, node.next);
        self.set_prev(node.next, node.prev);
        Ok((node.payload, node.priority))
    }

    /// Removes the node at the pull end.
    pub fn pop(&mut self) -> Result<(T, Priority), BufferError> {
        self.remove(self.last)
    }

    /// Removes every node, pull end first, and resets to empty.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.slab.occupied());
        while let Link::Node(_) = self.last {
            match self.pop() {
                Ok((payload, _)) => out.push(payload),
                Err(_) => break,
            }
        }
        self.slab.clear();
        self.first = Link::Sentinel;
        self.last = Link::Sentinel;
        out
    }

    /// Counts nodes by walking from the head end to the sentinel.
    ///
    /// The walk is bounded by the slot count, so a corrupted cycle that
    /// misses the sentinel still terminates.
    #[must_use]
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Iterates head end to pull end.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            cursor: self.first,
            remaining: self.capacity() as usize,
        }
    }
}

/// A node as seen while walking the ring.
pub struct NodeRef<'a, T> {
    pub index: SlabIndex<T>,
    pub priority: Priority,
    pub next: Link<T>,
    pub prev: Link<T>,
    pub payload: &'a T,
}

/// Head-to-pull-end iterator over a [`Ring`].
pub struct Iter<'a, T> {
    ring: &'a Ring<T>,
    cursor: Link<T>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = NodeRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let Link::Node(idx) = self.cursor else {
            return None;
        };
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let node = self.ring.slab.get(idx)?;
        self.cursor = node.next;
        Some(NodeRef {
            index: idx,
            priority: node.priority,
            next: node.next,
            prev: node.prev,
            payload: &node.payload,
        })
    }
}
