//! Error types for buffer operations.

use core::fmt;

use thiserror::Error;

/// Operations the buffer refuses without touching its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidOperation {
    /// The buffer has been closed; the handle is no longer usable.
    #[error("buffer is closed")]
    Closed,
    /// The sentinel anchors the ring and never carries a payload.
    #[error("sentinel position cannot be removed")]
    RemoveSentinel,
    /// A link pointed at a slot that holds no node.
    #[error("slot {0} holds no node")]
    VacantSlot(u32),
}

/// Errors returned by [`PriorityBuffer`](crate::PriorityBuffer) operations.
///
/// None of these are fatal: the buffer stays consistent and the caller
/// decides whether to retry or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Capacity must be positive and fit the slot index range.
    #[error("invalid capacity {0}: must be between 1 and {max}", max = u32::MAX)]
    InvalidCapacity(usize),
    /// Non-blocking call found the buffer full (push), empty (pull), or the
    /// lock held by another thread.
    #[error("operation would block")]
    WouldBlock,
    /// A bounded wait expired before the buffer had room or an item.
    #[error("timed out waiting on the buffer")]
    TimedOut,
    /// Refused operation; the buffer is unchanged.
    #[error("invalid operation: {0}")]
    InvalidOperation(#[from] InvalidOperation),
    /// The lock is poisoned: a thread panicked while holding it.
    #[error("failed to acquire buffer lock")]
    LockFailure,
    /// Waiting on a condition failed; treated as a failed attempt.
    #[error("failed waiting on buffer condition")]
    WaitFailure,
}

impl BufferError {
    /// True for the recoverable "full"/"empty"/"contended" outcome.
    #[must_use]
    pub const fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    #[must_use]
    pub const fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::InvalidOperation(InvalidOperation::Closed))
    }
}

/// A rejected push: the error plus the payload, handed back to the caller.
#[derive(Error)]
#[error("push rejected: {error}")]
pub struct PushError<T> {
    error: BufferError,
    item: T,
}

impl<T> PushError<T> {
    pub(crate) const fn new(error: BufferError, item: T) -> Self {
        Self { error, item }
    }

    #[must_use]
    pub const fn error(&self) -> BufferError {
        self.error
    }

    /// Recovers the payload that was not queued.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.item
    }

    #[must_use]
    pub fn into_parts(self) -> (BufferError, T) {
        (self.error, self.item)
    }
}

// Payloads are opaque: Debug must not require `T: Debug`.
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> From<PushError<T>> for BufferError {
    fn from(err: PushError<T>) -> Self {
        err.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(BufferError::WouldBlock.is_would_block());
        assert!(BufferError::TimedOut.is_timed_out());
        assert!(BufferError::from(InvalidOperation::Closed).is_closed());
        assert!(BufferError::from(InvalidOperation::RemoveSentinel).is_invalid_operation());
        assert!(!BufferError::from(InvalidOperation::RemoveSentinel).is_closed());
        assert!(!BufferError::LockFailure.is_would_block());
    }

    #[test]
    fn test_push_error_returns_item() {
        struct Opaque(u8);

        let err = PushError::new(BufferError::WouldBlock, Opaque(9));
        assert_eq!(err.error(), BufferError::WouldBlock);
        assert_eq!(format!("{err:?}"), "PushError { error: WouldBlock, .. }");
        assert_eq!(err.to_string(), "push rejected: operation would block");
        assert_eq!(err.into_inner().0, 9);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            BufferError::InvalidCapacity(0).to_string(),
            format!("invalid capacity 0: must be between 1 and {}", u32::MAX)
        );
        assert_eq!(
            BufferError::from(InvalidOperation::Closed).to_string(),
            "invalid operation: buffer is closed"
        );
    }
}
