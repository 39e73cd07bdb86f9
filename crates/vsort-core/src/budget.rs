//! Abstract memory budget interfaces.
//!
//! The concrete implementation lives in `vsort-mem`. Only the traits live here
//! so operators can be written against the API without pulling in the
//! accounting logic.

/// A guard returned by a memory budget when bytes are acquired.
///
/// Must be RAII (releases on Drop) and `Send`.
pub trait BudgetGuard: Send {
    /// Number of bytes currently accounted for by this guard.
    fn bytes(&self) -> usize;
    /// Optional debug tag for tracing.
    fn tag(&self) -> &'static str {
        "guard"
    }
}

/// A handle representing a memory-cap enforcer.
///
/// Operators call `try_acquire` before keeping a block alive. If `None` is
/// returned the operator must give up with a resource-exhausted error; the
/// sort operator never spills.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    /// Attempt to acquire `bytes` from the live budget. Returns a guard on success.
    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    /// Total configured capacity (bytes).
    fn capacity_bytes(&self) -> usize;

    /// Approximate currently used bytes (advisory; not a correctness API).
    fn used_bytes(&self) -> usize;
}

// NOTE: Do *not* add default impls here that would silently "allow" allocations.
// The mem crate is the only place where guards should be constructed.
