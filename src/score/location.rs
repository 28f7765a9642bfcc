//! Score locations: a bar and a (possibly fractional) 1-based beat.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing beats computed from floating-point time.
pub const BEAT_EPSILON: f64 = 1e-9;

/// A `(bar, beat)` address in a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub bar: u32,
    pub beat: f64,
}

impl Location {
    /// The first beat of the first bar, position zero.
    pub const START: Location = Location { bar: 1, beat: 1.0 };

    pub fn new(bar: u32, beat: f64) -> Self {
        Self { bar, beat }
    }

    /// Whether both locations address the same point, within [`BEAT_EPSILON`].
    pub fn same_as(&self, other: &Location) -> bool {
        self.bar == other.bar && (self.beat - other.beat).abs() < BEAT_EPSILON
    }

    /// Strictly before `other`, ignoring sub-epsilon beat differences.
    pub fn before(&self, other: &Location) -> bool {
        match self.bar.cmp(&other.bar) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => other.beat - self.beat >= BEAT_EPSILON,
        }
    }

    /// Whole beat containing this location.
    pub fn floor(&self) -> Location {
        Location::new(self.bar, self.beat.floor())
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.bar.cmp(&other.bar) {
            Ordering::Equal => self.beat.partial_cmp(&other.beat),
            ord => Some(ord),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.bar, self.beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicographic_order() {
        assert!(Location::new(1, 4.5) < Location::new(2, 1.0));
        assert!(Location::new(2, 1.5) > Location::new(2, 1.0));
        assert!(Location::START <= Location::new(1, 1.0));
    }

    #[test]
    fn epsilon_comparisons() {
        let a = Location::new(3, 2.0);
        let b = Location::new(3, 2.0 + 1e-12);
        assert!(a.same_as(&b));
        assert!(!a.before(&b));
        assert!(a.before(&Location::new(3, 2.5)));
        assert!(a.before(&Location::new(4, 1.0)));
    }

    #[test]
    fn floor_and_display() {
        let loc = Location::new(7, 3.25);
        assert_eq!(loc.floor(), Location::new(7, 3.0));
        assert_eq!(loc.to_string(), "7|3.25");
    }
}
