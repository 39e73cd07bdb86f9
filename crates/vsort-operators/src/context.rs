//! Per-query execution context: configuration, memory budget and
//! cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vsort_core::config::SortConfig;
use vsort_mem::MemoryBudgetImpl;

use crate::traits::OpError;

/// Shared cancellation flag. Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with `OpError::Cancelled` if the query has been cancelled.
    pub fn check(&self, during: &str) -> Result<(), OpError> {
        if self.is_cancelled() {
            return Err(OpError::Cancelled(during.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExecContext {
    pub config: SortConfig,
    pub budget: MemoryBudgetImpl,
    pub cancel: CancellationToken,
}

impl ExecContext {
    /// Validate `config` and size a fresh budget from its memory cap.
    pub fn new(config: SortConfig) -> Result<Self, OpError> {
        config.validate()?;
        let budget = MemoryBudgetImpl::new(config.mem_cap_bytes);
        Ok(Self {
            config,
            budget,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
