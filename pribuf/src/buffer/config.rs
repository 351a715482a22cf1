//! Buffer configuration and reporting types.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::BufferError;

/// Capacity used by [`BufferConfig::default`].
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(64).unwrap();

/// Configuration for a [`PriorityBuffer`](crate::PriorityBuffer).
///
/// Deserializable so it can sit inside an application's own config file:
///
/// ```
/// let cfg: pribuf::BufferConfig = serde_json::from_str(r#"{ "capacity": 50 }"#).unwrap();
/// assert_eq!(cfg.capacity.get(), 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum number of queued payloads; fixed for the buffer's lifetime.
    pub capacity: NonZeroUsize,
}

impl BufferConfig {
    #[must_use]
    pub const fn new(capacity: NonZeroUsize) -> Self {
        Self { capacity }
    }

    /// Checks the capacity against the slot index range.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidCapacity`] if it exceeds `u32::MAX`.
    pub fn slot_capacity(&self) -> Result<u32, BufferError> {
        u32::try_from(self.capacity.get()).map_err(|_| BufferError::InvalidCapacity(self.capacity.get()))
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TryFrom<usize> for BufferConfig {
    type Error = BufferError;

    fn try_from(capacity: usize) -> Result<Self, Self::Error> {
        let capacity = NonZeroUsize::new(capacity).ok_or(BufferError::InvalidCapacity(capacity))?;
        let cfg = Self::new(capacity);
        cfg.slot_capacity()?;
        Ok(cfg)
    }
}

/// Occupancy-derived state; only decides whether push or pull must wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Empty,
    Partial,
    Full,
}

impl Fill {
    pub(crate) const fn classify(occupancy: usize, capacity: usize) -> Self {
        if occupancy == 0 {
            Self::Empty
        } else if occupancy >= capacity {
            Self::Full
        } else {
            Self::Partial
        }
    }
}

/// Counters maintained under the buffer lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats {
    /// Successful pushes.
    pub pushed: u64,
    /// Successful single pulls.
    pub pulled: u64,
    /// Payloads removed by flush or close.
    pub flushed: u64,
    /// Highest occupancy observed.
    pub high_water: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_capacity() {
        assert_eq!(BufferConfig::try_from(0), Err(BufferError::InvalidCapacity(0)));
        assert_eq!(BufferConfig::try_from(3).map(|c| c.capacity.get()), Ok(3));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_capacity_beyond_slot_range() {
        let too_big = u32::MAX as usize + 1;
        assert_eq!(BufferConfig::try_from(too_big), Err(BufferError::InvalidCapacity(too_big)));
    }

    #[test]
    fn test_fill_classification() {
        assert_eq!(Fill::classify(0, 3), Fill::Empty);
        assert_eq!(Fill::classify(1, 3), Fill::Partial);
        assert_eq!(Fill::classify(3, 3), Fill::Full);
    }

    #[test]
    fn test_config_roundtrip_json() {
        let cfg = BufferConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(json, r#"{"capacity":64}"#);

        let err = serde_json::from_str::<BufferConfig>(r#"{"capacity":0}"#);
        assert!(err.is_err(), "zero capacity must not deserialize");
    }
}
