//! How a buffer operation behaves when it cannot proceed immediately.

use std::time::Duration;

use minstant::Instant;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Blocking mode of a push, pull or flush.
///
/// `From<bool>` maps `true` to an unbounded blocking wait and `false` to a
/// single non-blocking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Try the lock once and fail fast with `WouldBlock`.
    NonBlocking,
    /// Wait for the lock, then on the condition until it holds or the
    /// timeout expires.
    Blocking(Timeout),
}

impl Wait {
    pub const BLOCKING: Self = Self::Blocking(Timeout::Infinite);

    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Blocking(_))
    }

    /// Absolute deadline, if the wait is bounded.
    ///
    /// A duration too large to add to the clock is an unbounded wait.
    pub(crate) fn deadline(self) -> Option<Instant> {
        match self {
            Self::NonBlocking | Self::Blocking(Timeout::Infinite) => None,
            Self::Blocking(Timeout::Duration(d)) => Instant::now().checked_add(d),
        }
    }
}

impl From<bool> for Wait {
    fn from(blocking: bool) -> Self {
        if blocking {
            Self::BLOCKING
        } else {
            Self::NonBlocking
        }
    }
}

impl From<Timeout> for Wait {
    fn from(timeout: Timeout) -> Self {
        Self::Blocking(timeout)
    }
}

impl From<Duration> for Wait {
    fn from(d: Duration) -> Self {
        Self::Blocking(Timeout::Duration(d))
    }
}
