//! In-flight asynchronous request budget.
//!
//! Firmware advertises how many asynchronous commands it accepts at once.
//! Every rate-set call takes a slot from [`AsyncBudget`]; the slot decides
//! whether the call may use asynchronous completion and gives its count back
//! when dropped, whatever path the call took.
//!
//! The counter is lock-free and advisory: a race that momentarily overshoots
//! the budget only turns extra callers into synchronous ones.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded counter of asynchronous requests in flight.
#[derive(Debug)]
pub struct AsyncBudget {
    /// Requests currently holding a slot.
    in_flight: AtomicUsize,
    /// Maximum concurrent asynchronous requests (0 = never asynchronous).
    max_async: usize,
}

impl AsyncBudget {
    /// Create a budget allowing `max_async` concurrent asynchronous requests.
    pub fn new(max_async: usize) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_async,
        }
    }

    /// Get the configured maximum.
    #[inline]
    pub fn max_async(&self) -> usize {
        self.max_async
    }

    /// Get current in-flight count.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Take a slot.
    ///
    /// With a zero budget nothing is counted and the slot is always
    /// synchronous. Otherwise the counter is incremented unconditionally and
    /// the slot is asynchronous iff the count before the increment was below
    /// the budget.
    pub fn acquire(&self) -> AsyncSlot<'_> {
        if self.max_async == 0 {
            return AsyncSlot {
                budget: None,
                is_async: false,
            };
        }

        let before = self.in_flight.fetch_add(1, Ordering::AcqRel);
        AsyncSlot {
            budget: Some(self),
            is_async: before < self.max_async,
        }
    }
}

/// Slot taken from an [`AsyncBudget`], released on drop.
#[derive(Debug)]
pub struct AsyncSlot<'a> {
    budget: Option<&'a AsyncBudget>,
    is_async: bool,
}

impl AsyncSlot<'_> {
    /// Whether this call may request asynchronous completion.
    #[inline]
    pub fn is_async(&self) -> bool {
        self.is_async
    }
}

impl Drop for AsyncSlot<'_> {
    fn drop(&mut self) {
        if let Some(budget) = self.budget {
            budget.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
