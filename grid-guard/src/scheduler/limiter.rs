//! Bounded concurrency for cell and batch evaluations.

use crate::error::{GridError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits the number of evaluations running at once.
///
/// Wraps a `tokio::sync::Semaphore`, whose waiters are served in FIFO
/// order: when every slot is taken, later callers queue behind earlier ones
/// and none is dropped.
///
/// # Example
///
/// ```
/// use grid_guard::scheduler::ConcurrencyLimiter;
///
/// let limiter = ConcurrencyLimiter::new(3);
/// assert_eq!(limiter.limit(), 3);
/// assert_eq!(limiter.available(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter allowing `limit` concurrent evaluations.
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Acquires a slot, waiting in line if none is free.
    ///
    /// The slot is released when the permit is dropped. Fails with
    /// [`GridError::SchedulerClosed`] once the limiter has been closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GridError::SchedulerClosed)
    }

    /// Closes the limiter. Queued and future acquisitions fail; permits
    /// already handed out stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Returns the configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the number of slots in use.
    pub fn in_use(&self) -> usize {
        self.limit.saturating_sub(self.available())
    }
}
