//! Bounded slab with an intrusive free list, backing the ring's nodes.

use core::fmt;
use core::marker::PhantomData;

use crate::priority::Priority;

/// Newtype for slab indices to prevent cross-slab misuse.
// Manual impls: derive would bound T, but PhantomData is just a marker.
pub struct SlabIndex<T>(u32, PhantomData<T>);

impl<T> Copy for SlabIndex<T> {}

impl<T> Clone for SlabIndex<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for SlabIndex<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for SlabIndex<T> {}

impl<T> fmt::Debug for SlabIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SlabIndex").field(&self.0).finish()
    }
}

impl<T> From<u32> for SlabIndex<T> {
    #[inline]
    fn from(idx: u32) -> Self {
        Self(idx, PhantomData)
    }
}

impl<T> From<SlabIndex<T>> for u32 {
    #[inline]
    fn from(idx: SlabIndex<T>) -> Self {
        idx.0
    }
}

impl<T> From<SlabIndex<T>> for usize {
    #[inline]
    fn from(idx: SlabIndex<T>) -> Self {
        idx.0 as Self
    }
}

/// A position in the ring: either a node slot or the sentinel.
///
/// The sentinel has no slot of its own; its `next`/`prev` links live on the
/// ring as the head/pull-end index pair.
pub enum Link<T> {
    Sentinel,
    Node(SlabIndex<T>),
}

impl<T> Copy for Link<T> {}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Link<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Sentinel, Self::Sentinel) => true,
            (Self::Node(a), Self::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> Eq for Link<T> {}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentinel => f.write_str("Sentinel"),
            Self::Node(idx) => f.debug_tuple("Node").field(&idx.0).finish(),
        }
    }
}

/// `S` for the sentinel, the slot number otherwise.
impl<T> fmt::Display for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentinel => f.write_str("S"),
            Self::Node(idx) => write!(f, "{}", idx.0),
        }
    }
}

impl<T> Link<T> {
    /// Slot number, or `None` for the sentinel.
    #[must_use]
    pub fn slot(self) -> Option<u32> {
        match self {
            Self::Sentinel => None,
            Self::Node(idx) => Some(idx.into()),
        }
    }
}

/// Ring node stored in the slab.
pub struct Node<T> {
    pub payload: T,
    pub priority: Priority,
    /// Neighbour toward the pull end.
    pub next: Link<T>,
    /// Neighbour toward the head end.
    pub prev: Link<T>,
}

/// Slot in the slab.
pub enum Entry<T> {
    Occupied(Node<T>),
    /// Free slot with link to next free.
    Free { next: Option<SlabIndex<T>> },
}

/// Fixed-capacity slab with intrusive free list.
///
/// Slots are materialised lazily up to `capacity`, then recycled through
/// the free list, so a large capacity costs nothing until it is used.
pub struct Slab<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<SlabIndex<T>>,
    capacity: u32,
    occupied: usize,
}

impl<T> Slab<T> {
    #[must_use]
    pub const fn with_capacity(capacity: u32) -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            capacity,
            occupied: 0,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn occupied(&self) -> usize {
        self.occupied
    }

    /// Stores `node`, returning its index, or hands it back when full.
    pub fn alloc(&mut self, node: Node<T>) -> Result<SlabIndex<T>, Node<T>> {
        let idx = if let Some(head) = self.free_head {
            let next_free = match &self.entries[usize::from(head)] {
                Entry::Free { next } => *next,
                Entry::Occupied(_) => unreachable!("free_head must point to free slot"),
            };
            self.free_head = next_free;
            self.entries[usize::from(head)] = Entry::Occupied(node);
            head
        } else {
            let Ok(raw) = u32::try_from(self.entries.len()) else {
                return Err(node);
            };
            if raw >= self.capacity {
                return Err(node);
            }
            self.entries.push(Entry::Occupied(node));
            SlabIndex::from(raw)
        };
        self.occupied += 1;
        Ok(idx)
    }

    /// Frees a slot, returning the node it held.
    pub fn free(&mut self, idx: SlabIndex<T>) -> Option<Node<T>> {
        let entry = self.entries.get_mut(usize::from(idx))?;
        if matches!(entry, Entry::Free { .. }) {
            return None;
        }
        let old = core::mem::replace(
            entry,
            Entry::Free {
                next: self.free_head,
            },
        );
        self.free_head = Some(idx);
        self.occupied -= 1;
        match old {
            Entry::Occupied(node) => Some(node),
            Entry::Free { .. } => None,
        }
    }

    /// Gets immutable ref to node by index if occupied.
    #[must_use]
    pub fn get(&self, idx: SlabIndex<T>) -> Option<&Node<T>> {
        match self.entries.get(usize::from(idx))? {
            Entry::Occupied(n) => Some(n),
            Entry::Free { .. } => None,
        }
    }

    /// Gets mutable ref to node by index if occupied.
    pub fn get_mut(&mut self, idx: SlabIndex<T>) -> Option<&mut Node<T>> {
        match self.entries.get_mut(usize::from(idx))? {
            Entry::Occupied(n) => Some(n),
            Entry::Free { .. } => None,
        }
    }

    /// Drops every slot; payloads still stored are dropped with them.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_head = None;
        self.occupied = 0;
    }
}
