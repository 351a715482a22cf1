//! Bounded, thread-safe, priority-ordered blocking buffer.
//!
//! # Overview
//!
//! - One [`Mutex`] guards the [`Ring`] and the occupancy counter.
//! - `room_available` is signaled by pull/flush/close, `item_available` by
//!   push/close.
//! - Every wait re-checks its predicate after waking: wakeups may be
//!   spurious, and another waiter may have consumed the slot or item first.
//! - Every exit path releases the lock through the guard's `Drop`.
//!
//! # Ordering
//!
//! Negative priorities are pulled first, in arrival order. Non-negative
//! priorities follow, lowest number first, FIFO among equal priorities.
//!
//! # Example
//!
//! ```
//! use pribuf::{PriorityBuffer, Wait};
//!
//! let buffer = PriorityBuffer::init(3)?;
//! buffer.push('A', 5, Wait::BLOCKING)?;
//! buffer.push('B', 5, Wait::BLOCKING)?;
//! buffer.push('C', -1, Wait::BLOCKING)?;
//!
//! assert_eq!(buffer.try_pull()?, 'C');
//! assert_eq!(buffer.close()?, vec!['A', 'B']);
//! # Ok::<(), pribuf::BufferError>(())
//! ```
//!
//! Payloads move in and out; sharing a buffer across threads requires
//! `T: Send`:
//!
//! ```compile_fail
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use pribuf::PriorityBuffer;
//!
//! let buffer = Arc::new(PriorityBuffer::<Rc<u32>>::init(4).unwrap());
//! let remote = Arc::clone(&buffer);
//! // Error: Rc<u32> is not Send, so neither is the buffer handle.
//! std::thread::spawn(move || remote.try_pull());
//! ```

mod config;
mod wait;

use std::fmt;
use std::io::{self, Write};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};

use minstant::Instant;
use serde::Serialize;

use crate::error::{BufferError, InvalidOperation, PushError};
use crate::priority::Priority;
use crate::ring::Ring;
use crate::trace::{debug, error, info, trace, warn};

pub use config::{BufferConfig, BufferStats, DEFAULT_CAPACITY, Fill};
pub use wait::{Timeout, Wait};

/// State guarded by the buffer lock.
struct State<T> {
    ring: Ring<T>,
    /// Incrementally maintained; `occupancy_recount` audits it.
    occupancy: usize,
    closed: bool,
    stats: BufferStats,
}

impl<T> State<T> {
    fn record_push(&mut self) {
        self.occupancy += 1;
        self.stats.pushed += 1;
        self.stats.high_water = self.stats.high_water.max(self.occupancy);
    }
}

/// Bounded priority buffer shared between producer and consumer threads.
///
/// Typically wrapped in an [`Arc`](std::sync::Arc) and cloned into each
/// thread. Dropping the buffer drops any payloads still queued; call
/// [`close`](Self::close) to get them back instead.
pub struct PriorityBuffer<T> {
    state: Mutex<State<T>>,
    room_available: Condvar,
    item_available: Condvar,
    capacity: usize,
}

impl<T> PriorityBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` payloads.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidCapacity`] if `capacity` is zero or exceeds
    /// `u32::MAX`.
    pub fn init(capacity: usize) -> Result<Self, BufferError> {
        Self::with_config(BufferConfig::try_from(capacity)?)
    }

    /// Creates an empty buffer from `config`.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidCapacity`] if the capacity exceeds `u32::MAX`.
    pub fn with_config(config: BufferConfig) -> Result<Self, BufferError> {
        let slots = config.slot_capacity()?;
        info!(capacity = slots, "priority buffer created");
        Ok(Self {
            state: Mutex::new(State {
                ring: Ring::with_capacity(slots),
                occupancy: 0,
                closed: false,
                stats: BufferStats::default(),
            }),
            room_available: Condvar::new(),
            item_available: Condvar::new(),
            capacity: config.capacity.get(),
        })
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Acquires the lock per `wait` and rejects closed buffers.
    fn acquire(&self, wait: Wait) -> Result<MutexGuard<'_, State<T>>, BufferError> {
        let guard = match wait {
            Wait::NonBlocking => match self.state.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return Err(BufferError::WouldBlock),
                Err(TryLockError::Poisoned(_)) => {
                    error!("buffer lock poisoned");
                    return Err(BufferError::LockFailure);
                }
            },
            Wait::Blocking(_) => self.state.lock().map_err(|_| {
                error!("buffer lock poisoned");
                BufferError::LockFailure
            })?,
        };
        if guard.closed {
            return Err(InvalidOperation::Closed.into());
        }
        Ok(guard)
    }

    /// Waits on `cond` while `blocked` holds, re-checking after every wake.
    ///
    /// Non-blocking calls fail with `WouldBlock` instead of waiting. A close
    /// observed after waking fails with `InvalidOperation`.
    fn wait_while<'a>(
        &self,
        cond: &Condvar,
        mut guard: MutexGuard<'a, State<T>>,
        wait: Wait,
        deadline: Option<Instant>,
        blocked: impl Fn(&State<T>) -> bool,
    ) -> Result<MutexGuard<'a, State<T>>, BufferError> {
        loop {
            if guard.closed {
                return Err(InvalidOperation::Closed.into());
            }
            if !blocked(&*guard) {
                return Ok(guard);
            }
            if !wait.is_blocking() {
                return Err(BufferError::WouldBlock);
            }
            guard = match deadline {
                None => cond.wait(guard).map_err(|_| {
                    error!("condition wait failed on poisoned lock");
                    BufferError::WaitFailure
                })?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(BufferError::TimedOut);
                    }
                    let remaining = deadline.duration_since(now);
                    let (guard, _) = cond.wait_timeout(guard, remaining).map_err(|_| {
                        error!("condition wait failed on poisoned lock");
                        BufferError::WaitFailure
                    })?;
                    guard
                }
            };
            trace!(occupancy = guard.occupancy, "woke, re-checking predicate");
        }
    }

    /// Pushes `item` with `priority`.
    ///
    /// With a blocking `wait`, suspends while the buffer is full; the
    /// capacity check is repeated after every wake.
    ///
    /// # Errors
    ///
    /// The payload comes back inside [`PushError`] with:
    /// - `WouldBlock` if non-blocking and the buffer is full or the lock is held
    /// - `TimedOut` if a bounded wait expired
    /// - `InvalidOperation` if the buffer is (or gets) closed
    /// - `LockFailure` / `WaitFailure` on a poisoned lock
    pub fn push(
        &self,
        item: T,
        priority: impl Into<Priority>,
        wait: impl Into<Wait>,
    ) -> Result<(), PushError<T>> {
        let priority = priority.into();
        let wait = wait.into();
        let deadline = wait.deadline();

        let guard = match self.acquire(wait) {
            Ok(guard) => guard,
            Err(e) => return Err(PushError::new(e, item)),
        };
        let capacity = self.capacity;
        let mut state = match self.wait_while(&self.room_available, guard, wait, deadline, |s| {
            s.occupancy >= capacity
        }) {
            Ok(state) => state,
            Err(e) => return Err(PushError::new(e, item)),
        };

        if let Err(item) = state.ring.insert(item, priority) {
            error!(
                occupancy = state.occupancy,
                "ring refused insert below capacity; counter out of sync"
            );
            return Err(PushError::new(BufferError::WouldBlock, item));
        }
        state.record_push();
        trace!(priority = priority.get(), occupancy = state.occupancy, "pushed");

        self.item_available.notify_one();
        Ok(())
    }

    /// Non-blocking push.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn try_push(&self, item: T, priority: impl Into<Priority>) -> Result<(), PushError<T>> {
        self.push(item, priority, Wait::NonBlocking)
    }

    /// Blocking push that gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn push_timeout(
        &self,
        item: T,
        priority: impl Into<Priority>,
        timeout: impl Into<Timeout>,
    ) -> Result<(), PushError<T>> {
        self.push(item, priority, Wait::Blocking(timeout.into()))
    }

    /// Removes and returns the payload at the pull end.
    ///
    /// With a blocking `wait`, suspends while the buffer is empty; the
    /// emptiness check is repeated after every wake.
    ///
    /// # Errors
    ///
    /// - `WouldBlock` if non-blocking and the buffer is empty or the lock is held
    /// - `TimedOut` if a bounded wait expired
    /// - `InvalidOperation` if the buffer is (or gets) closed
    /// - `LockFailure` / `WaitFailure` on a poisoned lock
    pub fn pull(&self, wait: impl Into<Wait>) -> Result<T, BufferError> {
        let wait = wait.into();
        let deadline = wait.deadline();

        let guard = self.acquire(wait)?;
        let mut state =
            self.wait_while(&self.item_available, guard, wait, deadline, |s| s.occupancy == 0)?;

        let (item, _) = state.ring.pop().inspect_err(|_| {
            error!(
                occupancy = state.occupancy,
                "ring empty while counter is positive; counter out of sync"
            );
        })?;
        state.occupancy -= 1;
        state.stats.pulled += 1;
        trace!(occupancy = state.occupancy, "pulled");

        self.room_available.notify_one();
        Ok(item)
    }

    /// Non-blocking pull.
    ///
    /// # Errors
    ///
    /// See [`pull`](Self::pull); `WouldBlock` means empty (or contended).
    pub fn try_pull(&self) -> Result<T, BufferError> {
        self.pull(Wait::NonBlocking)
    }

    /// Blocking pull that gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`pull`](Self::pull).
    pub fn pull_timeout(&self, timeout: impl Into<Timeout>) -> Result<T, BufferError> {
        self.pull(Wait::Blocking(timeout.into()))
    }

    /// Atomically drains every payload, in the order pulls would return them.
    ///
    /// The lock is taken once; concurrent pushes land either entirely before
    /// or entirely after the drain. `wait` only governs lock acquisition, and
    /// a bounded timeout is treated as blocking.
    ///
    /// # Errors
    ///
    /// - `WouldBlock` if non-blocking and the lock is held
    /// - `InvalidOperation` if the buffer is closed
    /// - `LockFailure` on a poisoned lock
    pub fn flush(&self, wait: impl Into<Wait>) -> Result<Vec<T>, BufferError> {
        let mut state = self.acquire(wait.into())?;
        let items = Self::drain(&mut state);
        debug!(drained = items.len(), "flushed");

        self.room_available.notify_all();
        Ok(items)
    }

    fn drain(state: &mut State<T>) -> Vec<T> {
        let items = state.ring.drain();
        if items.len() != state.occupancy {
            warn!(
                drained = items.len(),
                occupancy = state.occupancy,
                "drain count differs from occupancy counter"
            );
        }
        state.occupancy = 0;
        state.stats.flushed += items.len() as u64;
        items
    }

    /// Drains the buffer and invalidates it.
    ///
    /// Threads blocked in push or pull wake up and fail with
    /// `InvalidOperation`; so does every later call.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if already closed
    /// - `LockFailure` on a poisoned lock
    pub fn close(&self) -> Result<Vec<T>, BufferError> {
        let mut state = self.acquire(Wait::BLOCKING)?;
        let items = Self::drain(&mut state);
        state.closed = true;
        info!(remaining = items.len(), "priority buffer closed");
        drop(state);

        self.room_available.notify_all();
        self.item_available.notify_all();
        Ok(items)
    }

    /// Recomputes occupancy by walking the ring.
    ///
    /// O(n) audit; the hot paths use the incremental counter. A mismatch is
    /// logged and the counter is resynchronized to the walk.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the buffer is closed
    /// - `LockFailure` on a poisoned lock
    pub fn occupancy_recount(&self) -> Result<usize, BufferError> {
        let mut state = self.acquire(Wait::BLOCKING)?;
        let counted = state.ring.count();
        if counted != state.occupancy {
            warn!(
                counted,
                occupancy = state.occupancy,
                "occupancy counter out of sync, resynchronizing"
            );
            state.occupancy = counted;
        }
        Ok(counted)
    }

    /// Incremental occupancy.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inspect(|s| s.occupancy)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    #[must_use]
    pub fn fill(&self) -> Fill {
        Fill::classify(self.len(), self.capacity)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inspect(|s| s.closed)
    }

    #[must_use]
    pub fn stats(&self) -> BufferStats {
        self.inspect(|s| s.stats)
    }

    /// Node listing from head end to pull end.
    ///
    /// Taken under the lock but stale as soon as it returns; for diagnostics
    /// only.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NodeView> {
        self.inspect(|s| {
            s.ring
                .iter()
                .enumerate()
                .map(|(position, node)| NodeView {
                    position,
                    slot: node.index.into(),
                    priority: node.priority,
                    next: node.next.slot(),
                    prev: node.prev.slot(),
                })
                .collect()
        })
    }

    /// Writes the [`snapshot`](Self::snapshot) listing to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    pub fn write_listing(&self, out: &mut impl Write) -> io::Result<()> {
        for view in self.snapshot() {
            writeln!(out, "{view}")?;
        }
        Ok(())
    }

    /// Prints the node listing to standard output.
    ///
    /// Best-effort: the lock is released before printing, so the output
    /// may already be stale.
    pub fn debug_print(&self) {
        // Advisory output; a failed write to stdout is dropped.
        let _ = self.write_listing(&mut io::stdout().lock());
    }

    /// Read-only access that tolerates a poisoned lock.
    fn inspect<R>(&self, f: impl FnOnce(&State<T>) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*state)
    }
}

impl<T> fmt::Debug for PriorityBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityBuffer")
            .field("capacity", &self.capacity)
            .field("occupancy", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// One node in a [`PriorityBuffer::snapshot`], head end first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeView {
    /// Distance from the head end.
    pub position: usize,
    /// Slab slot holding the node.
    pub slot: u32,
    pub priority: Priority,
    /// Slot toward the pull end; `None` is the sentinel.
    pub next: Option<u32>,
    /// Slot toward the head end; `None` is the sentinel.
    pub prev: Option<u32>,
}

impl fmt::Display for NodeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = |l: Option<u32>| l.map_or_else(|| "S".to_owned(), |s| s.to_string());
        write!(
            f,
            " Node {}:  Slot={}  Priority={}  Next={}  Prev={}",
            self.position,
            self.slot,
            self.priority,
            link(self.next),
            link(self.prev)
        )
    }
}
