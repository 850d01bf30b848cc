//! Host scheduling facility.
//!
//! The host grants work slices; each slice carries an [`IdleDeadline`] that the
//! scheduler queries once after every unit of work. Suspension is simply
//! returning from [`Reconciler::pump`](crate::Reconciler::pump); resumption is the
//! host granting another slice.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Remaining budget of one granted slice.
pub trait IdleDeadline {
    /// Time left before control must be handed back to the host.
    fn time_remaining(&self) -> Duration;
}

impl<D: IdleDeadline + ?Sized> IdleDeadline for &D {
    fn time_remaining(&self) -> Duration {
        (**self).time_remaining()
    }
}

/// Source of work slices.
pub trait HostScheduler {
    /// Deadline type of granted slices.
    type Deadline: IdleDeadline;

    /// Grant the next slice, or `None` once the host stops granting slices.
    fn request_work_slice(&mut self) -> Option<Self::Deadline>;
}

/// Deadline that never runs out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl IdleDeadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Deadline counted in units of work rather than time.
///
/// Each query of [`IdleDeadline::time_remaining`] consumes one unit; the
/// scheduler queries once per processed fiber, so `UnitDeadline::new(n)`
/// grants exactly `n` units.
#[derive(Debug)]
pub struct UnitDeadline {
    remaining: Cell<usize>,
}

impl UnitDeadline {
    /// Grant `units` units of work.
    pub fn new(units: usize) -> Self {
        Self {
            remaining: Cell::new(units),
        }
    }

    /// Units not yet consumed.
    pub fn remaining(&self) -> usize {
        self.remaining.get()
    }
}

impl IdleDeadline for UnitDeadline {
    fn time_remaining(&self) -> Duration {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        if left == 0 {
            Duration::ZERO
        } else {
            Duration::MAX
        }
    }
}

/// Wall-clock deadline.
///
/// A budget too large to be represented as an `Instant` never runs out.
#[derive(Debug, Clone, Copy)]
pub struct InstantDeadline {
    end: Option<Instant>,
}

impl InstantDeadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            end: Instant::now().checked_add(budget),
        }
    }

    /// Deadline at `end`.
    pub fn at(end: Instant) -> Self {
        Self { end: Some(end) }
    }
}

impl IdleDeadline for InstantDeadline {
    fn time_remaining(&self) -> Duration {
        match self.end {
            Some(end) => end.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

/// Host that grants slices of a fixed number of units.
#[derive(Debug, Clone)]
pub struct FixedSliceHost {
    units_per_slice: usize,
    slices_left: Option<usize>,
    granted: usize,
}

impl FixedSliceHost {
    /// Grant unlimited slices of `units_per_slice` units each.
    pub fn new(units_per_slice: usize) -> Self {
        Self {
            units_per_slice,
            slices_left: None,
            granted: 0,
        }
    }

    /// Stop granting after `slices` slices.
    pub fn with_slice_limit(mut self, slices: usize) -> Self {
        self.slices_left = Some(slices);
        self
    }

    /// Slices granted so far.
    pub fn granted(&self) -> usize {
        self.granted
    }
}

impl HostScheduler for FixedSliceHost {
    type Deadline = UnitDeadline;

    fn request_work_slice(&mut self) -> Option<UnitDeadline> {
        if let Some(left) = self.slices_left.as_mut() {
            if *left == 0 {
                return None;
            }
            *left -= 1;
        }
        self.granted += 1;
        Some(UnitDeadline::new(self.units_per_slice))
    }
}

/// Host that grants wall-clock slices of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct TimedHost {
    slice: Duration,
}

impl TimedHost {
    /// Grant slices of `slice` each.
    pub fn new(slice: Duration) -> Self {
        Self { slice }
    }
}

impl HostScheduler for TimedHost {
    type Deadline = InstantDeadline;

    fn request_work_slice(&mut self) -> Option<InstantDeadline> {
        Some(InstantDeadline::after(self.slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_deadline_counts_queries() {
        let deadline = UnitDeadline::new(2);
        assert_eq!(deadline.time_remaining(), Duration::MAX);
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
        assert_eq!(deadline.remaining(), 0);
    }

    #[test]
    fn test_instant_deadline_expires() {
        let deadline = InstantDeadline::at(Instant::now());
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
        assert!(InstantDeadline::after(Duration::from_secs(60)).time_remaining() > Duration::ZERO);
    }

    #[test]
    fn test_instant_deadline_saturates_huge_budgets() {
        assert_eq!(
            InstantDeadline::after(Duration::MAX).time_remaining(),
            Duration::MAX
        );
        let mut host = TimedHost::new(Duration::MAX);
        let slice = host.request_work_slice().unwrap();
        assert!(slice.time_remaining() > Duration::from_secs(3600));
    }

    #[test]
    fn test_fixed_slice_host_limit() {
        let mut host = FixedSliceHost::new(1).with_slice_limit(2);
        assert!(host.request_work_slice().is_some());
        assert!(host.request_work_slice().is_some());
        assert!(host.request_work_slice().is_none());
        assert_eq!(host.granted(), 2);
    }
}
