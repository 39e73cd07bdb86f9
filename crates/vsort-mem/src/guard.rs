//! MemoryBudget + RAII guard implementations.
//!
//! Operators acquire a guard before keeping a block alive. Dropping the guard
//! returns the bytes to the budget (panic-safe).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vsort_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};
use crate::tracking::PeakTracker;

/// Shared inner state for the budget.
#[derive(Debug)]
struct BudgetInner {
    capacity: usize,
    used: AtomicUsize,
    peak: PeakTracker,
}

impl BudgetInner {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
            peak: PeakTracker::new(),
        }
    }

    fn try_acquire(&self, bytes: usize) -> bool {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let next = cur.saturating_add(bytes);
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.peak.record_used(next);
                return true;
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Concrete MemoryBudget implementation.
#[derive(Debug, Clone)]
pub struct MemoryBudgetImpl {
    inner: Arc<BudgetInner>,
}

impl MemoryBudgetImpl {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(BudgetInner::new(capacity_bytes)),
        }
    }

    /// Highest usage observed since creation.
    pub fn peak_bytes(&self) -> usize {
        self.inner.peak.peak()
    }

    /// Like `try_acquire`, but reports why the request was refused.
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<BudgetGuardImpl> {
        self.try_acquire(bytes, tag)
            .ok_or_else(|| Error::BudgetExceeded {
                tag,
                requested: bytes,
                capacity: self.inner.capacity,
                used: self.inner.used.load(Ordering::Relaxed),
            })
    }
}

/// RAII guard that accounts for a number of bytes.
/// Dropping it returns bytes to the budget.
#[derive(Debug)]
pub struct BudgetGuardImpl {
    inner: Arc<BudgetInner>,
    bytes: usize,
    tag: &'static str,
}

impl Drop for BudgetGuardImpl {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.inner.release(self.bytes);
            // NOTE: do not log here to keep drop path fast.
            self.bytes = 0;
        }
    }
}

impl BudgetGuard for BudgetGuardImpl {
    fn bytes(&self) -> usize {
        self.bytes
    }
    fn tag(&self) -> &'static str {
        self.tag
    }
}

impl BudgetGuardImpl {
    /// Try to resize this guard to a new byte count.
    /// Shrinking always succeeds; growing fails if it would exceed capacity.
    pub fn try_resize(&mut self, new_bytes: usize) -> bool {
        if new_bytes <= self.bytes {
            self.inner.release(self.bytes - new_bytes);
            self.bytes = new_bytes;
            return true;
        }
        if self.inner.try_acquire(new_bytes - self.bytes) {
            self.bytes = new_bytes;
            true
        } else {
            false
        }
    }
}

impl MemoryBudget for MemoryBudgetImpl {
    type Guard = BudgetGuardImpl;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard> {
        if bytes > 0 && !self.inner.try_acquire(bytes) {
            return None;
        }
        Some(BudgetGuardImpl {
            inner: Arc::clone(&self.inner),
            bytes,
            tag,
        })
    }

    fn capacity_bytes(&self) -> usize {
        self.inner.capacity
    }

    fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_drop() {
        let budget = MemoryBudgetImpl::new(100);
        let g = budget.acquire(60, "test").unwrap();
        assert_eq!(budget.used_bytes(), 60);
        assert!(budget.acquire(50, "test").is_err());
        drop(g);
        assert_eq!(budget.used_bytes(), 0);
        assert_eq!(budget.peak_bytes(), 60);
    }

    #[test]
    fn exceeded_error_reports_usage() {
        let budget = MemoryBudgetImpl::new(10);
        let _g = budget.acquire(8, "a").unwrap();
        match budget.acquire(5, "b") {
            Err(Error::BudgetExceeded {
                tag,
                requested,
                capacity,
                used,
            }) => {
                assert_eq!((tag, requested, capacity, used), ("b", 5, 10, 8));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn resize_grows_and_shrinks() {
        let budget = MemoryBudgetImpl::new(100);
        let mut g = budget.acquire(10, "t").unwrap();
        assert!(g.try_resize(90));
        assert!(!g.try_resize(200));
        assert!(g.try_resize(5));
        assert_eq!(budget.used_bytes(), 5);
    }
}
