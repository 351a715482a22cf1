//! Priority attached to every queued payload.
//!
//! Lower numbers are pulled sooner. Any negative value is maximal urgency:
//! negative entries are pulled before all non-negative ones and, among
//! themselves, strictly in arrival order (their magnitude is not compared).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Integer urgency ranking of a queued payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Canonical maximal-urgency priority.
    pub const URGENT: Self = Self(-1);
    /// Most urgent of the ordered (non-negative) class.
    pub const HIGHEST: Self = Self(0);
    /// Pulled after everything else; useful for shutdown markers.
    pub const BACKGROUND: Self = Self(i32::MAX);

    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Negative priorities jump the ordered class and keep arrival order.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        self.0 < 0
    }

    /// Whether a newcomer with priority `self` must be pulled after an
    /// already queued entry with priority `queued`.
    ///
    /// Ties go behind the queued entry, which keeps equal priorities FIFO.
    #[must_use]
    pub const fn yields_to(self, queued: Self) -> bool {
        match (self.is_urgent(), queued.is_urgent()) {
            (true, true) => true,
            (true, false) => false,
            (false, true) => true,
            (false, false) => queued.0 <= self.0,
        }
    }
}

impl From<i32> for Priority {
    #[inline]
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<Priority> for i32 {
    #[inline]
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgent_class() {
        assert!(Priority::URGENT.is_urgent());
        assert!(Priority::new(-20).is_urgent());
        assert!(!Priority::HIGHEST.is_urgent());
        assert!(!Priority::BACKGROUND.is_urgent());
    }

    #[test]
    fn test_yields_to() {
        let urgent = Priority::URGENT;
        let two = Priority::new(2);
        let five = Priority::new(5);

        // Urgent entries keep arrival order regardless of magnitude.
        assert!(Priority::new(-20).yields_to(Priority::new(-1)));
        assert!(urgent.yields_to(Priority::new(-20)));
        assert!(!urgent.yields_to(five));

        assert!(five.yields_to(urgent));
        assert!(five.yields_to(two));
        assert!(five.yields_to(five));
        assert!(!two.yields_to(five));
    }

    #[test]
    fn test_conversions() {
        let p: Priority = 7.into();
        assert_eq!(p.get(), 7);
        assert_eq!(i32::from(p), 7);
        assert_eq!(p.to_string(), "7");
    }
}
