//! Machine calendars: time windows during which a machine is unavailable.
//!
//! # Time Model
//! Times are abstract non-negative integers relative to the scheduling
//! epoch (t=0), the same unit as operation durations.

use serde::{Deserialize, Serialize};

use crate::error::{JobShopError, Result};
use crate::validation::ValidationErrorKind;

/// A time interval [start, end).
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    /// Interval start (inclusive).
    pub start: u64,
    /// Interval end (exclusive).
    pub end: u64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Creates a window from a start time and a length.
    pub fn from_duration(start: u64, duration: u64) -> Self {
        Self::new(start, start.saturating_add(duration))
    }

    #[inline]
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether a timestamp falls within this window.
    #[inline]
    pub fn contains(&self, time: u64) -> bool {
        time >= self.start && time < self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether an operation running over `[start, start + duration)` is
    /// interrupted: it starts inside the window or the window begins
    /// while it runs.
    pub fn interrupts(&self, start: u64, duration: u64) -> bool {
        self.contains(start) || (start < self.start && self.start < start.saturating_add(duration))
    }

    /// Checks that the window does not end before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidShape,
                format!("Time window [{}, {}) ends before it starts", self.start, self.end),
            ));
        }
        Ok(())
    }
}

/// Blocked periods (breakdowns, maintenance) of one machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Calendar {
    /// Periods when the machine is unavailable.
    pub blocked_periods: Vec<TimeWindow>,
}

impl Calendar {
    /// Creates a calendar without blocked periods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blocked period.
    ///
    /// # Errors
    /// `InvalidShape` if `end < start`.
    pub fn with_blocked(mut self, start: u64, end: u64) -> Result<Self> {
        let window = TimeWindow::new(start, end);
        window.validate()?;
        self.blocked_periods.push(window);
        Ok(self)
    }

    /// Checks every blocked period; see [`TimeWindow::validate`].
    pub fn validate(&self) -> Result<()> {
        self.blocked_periods.iter().try_for_each(TimeWindow::validate)
    }

    /// Whether a timestamp is outside every blocked period.
    pub fn is_working_time(&self, time: u64) -> bool {
        !self.blocked_periods.iter().any(|w| w.contains(time))
    }

    /// Earliest start at or after `from` such that an operation of
    /// `duration` is not interrupted by any blocked period.
    ///
    /// The start is pushed past every interrupting window until none
    /// interrupts, so windows may be given in any order. Only windows
    /// ending after the current start can move it, so the start strictly
    /// increases and the loop terminates even for malformed windows.
    pub fn earliest_uninterrupted_start(&self, from: u64, duration: u64) -> u64 {
        let mut start = from;
        while let Some(window) = self
            .blocked_periods
            .iter()
            .find(|w| w.end > start && w.interrupts(start, duration))
        {
            start = window.end;
        }
        start
    }

    /// Total blocked time within [start, end).
    pub fn blocked_time_in_range(&self, start: u64, end: u64) -> u64 {
        let range = TimeWindow::new(start, end);
        self.blocked_periods
            .iter()
            .filter_map(|bp| overlap_duration(&range, bp))
            .sum()
    }
}

/// Computes overlap duration between two time windows.
fn overlap_duration(a: &TimeWindow, b: &TimeWindow) -> Option<u64> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (end > start).then(|| end - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window() {
        let w = TimeWindow::new(100, 200);
        assert_eq!(w.duration(), 100);
        assert!(w.contains(100));
        assert!(w.contains(199));
        assert!(!w.contains(200)); // exclusive end
        assert!(!w.contains(50));
        assert_eq!(TimeWindow::from_duration(5, 3), TimeWindow::new(5, 8));
    }

    #[test]
    fn test_time_window_overlap() {
        let a = TimeWindow::new(0, 100);
        let b = TimeWindow::new(50, 150);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = TimeWindow::new(100, 200); // touching but not overlapping
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_interrupts() {
        let w = TimeWindow::new(5, 8);
        assert!(w.interrupts(6, 1)); // starts inside
        assert!(w.interrupts(3, 4)); // runs into it
        assert!(!w.interrupts(2, 3)); // ends exactly at start
        assert!(!w.interrupts(8, 10));
    }

    #[test]
    fn test_earliest_uninterrupted_start() {
        let cal = Calendar::new().with_blocked(5, 8).unwrap();
        assert_eq!(cal.earliest_uninterrupted_start(0, 5), 0);
        assert_eq!(cal.earliest_uninterrupted_start(0, 6), 8);
        assert_eq!(cal.earliest_uninterrupted_start(6, 1), 8);
    }

    #[test]
    fn test_chained_windows_out_of_order() {
        // Pushing past [4, 10) runs into [12, 15), which is listed first.
        let cal = Calendar::new()
            .with_blocked(12, 15)
            .and_then(|c| c.with_blocked(4, 10))
            .unwrap();
        assert_eq!(cal.earliest_uninterrupted_start(3, 3), 15);
        assert!(cal.is_working_time(15));
        assert!(!cal.is_working_time(13));
    }

    #[test]
    fn test_reversed_window_rejected() {
        let err = Calendar::new().with_blocked(5, 3).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidShape));
        assert!(Calendar::new().with_blocked(4, 4).is_ok());
    }

    #[test]
    fn test_reversed_window_does_not_stall() {
        // Built directly, bypassing validation.
        let cal = Calendar {
            blocked_periods: vec![TimeWindow::new(5, 3), TimeWindow::new(6, 9)],
        };
        assert!(cal.validate().is_err());
        assert_eq!(cal.earliest_uninterrupted_start(0, 10), 9);
        assert_eq!(cal.earliest_uninterrupted_start(5, 1), 5);
    }

    #[test]
    fn test_blocked_time_in_range() {
        let cal = Calendar::new()
            .with_blocked(20, 30)
            .and_then(|c| c.with_blocked(40, 60))
            .unwrap();
        assert_eq!(cal.blocked_time_in_range(0, 50), 20);
        assert_eq!(cal.blocked_time_in_range(60, 80), 0);
    }
}
