//! Global admission control for upstream calls.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::FetchContext;
use crate::error::CancelReason;
use crate::telemetry;

/// Fixed pool of permits bounding concurrent upstream calls.
#[derive(Clone)]
pub struct Admission {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Admission {
    /// Create a pool with `capacity` permits.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit, giving up when `ctx` ends.
    ///
    /// A cancelled wait consumes nothing.
    pub async fn acquire(&self, ctx: &FetchContext) -> Result<Permit, CancelReason> {
        let permit = ctx
            .run(Arc::clone(&self.semaphore).acquire_owned())
            .await?
            // The semaphore is never closed; treat closure as shutdown.
            .map_err(|_| CancelReason::Cancelled)?;
        metrics::gauge!(telemetry::UPSTREAM_IN_FLIGHT).increment(1.0);
        Ok(Permit { _permit: permit })
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One upstream call's share of the pool, returned on drop.
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for Permit {
    fn drop(&mut self) {
        metrics::gauge!(telemetry::UPSTREAM_IN_FLIGHT).decrement(1.0);
    }
}
