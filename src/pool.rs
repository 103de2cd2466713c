//! Bounded, FIFO-fair slot pool.
//!
//! [`SlotPool`] caps how many browser pages may be open at once. Callers
//! `acquire()` a [`Lease`] and give it back by calling [`Lease::release`] or
//! simply dropping it, so every error and cancellation path returns its slot.
//!
//! Slots are permits of a tokio [`Semaphore`], which queues waiters in
//! arrival order: a released permit goes to the oldest waiter, and a
//! newcomer never overtakes someone already queued.

use crate::error::PoolError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A counting pool with FIFO hand-off to waiters.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    waiting: Arc<AtomicUsize>,
}

impl SlotPool {
    /// Create a pool with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroCapacity`] when `capacity` is 0, since such a
    /// pool could never grant a lease.
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            waiting: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait until a slot is free and take it.
    ///
    /// There is no built-in timeout; wrap the call in
    /// `tokio::time::timeout` if one is needed. Dropping the returned future
    /// while it waits is safe and never leaks a slot.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] once the pool has been closed.
    pub async fn acquire(&self) -> Result<Lease, PoolError> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            debug!(active = self.active(), capacity = self.capacity, "Slot acquired");
            return Ok(Lease { permit });
        }

        let _queued = WaitCount::enter(&self.waiting);
        debug!(waiting = self.waiting(), "Pool saturated; queued for a slot");
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        debug!(active = self.active(), "Slot acquired after waiting");
        Ok(Lease { permit })
    }

    /// Stop granting slots. Parked and future `acquire` calls fail with
    /// [`PoolError::Closed`]; leases already out stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently leased out, or already promised to a waiter.
    pub fn active(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Callers currently parked in `acquire`.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity)
            .field("active", &self.active())
            .field("waiting", &self.waiting())
            .finish()
    }
}

/// Counts a parked `acquire` for as long as its future lives.
struct WaitCount<'a>(&'a AtomicUsize);

impl<'a> WaitCount<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitCount<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Ownership of one pool slot. The slot returns to the pool exactly once.
#[derive(Debug)]
#[must_use = "dropping a lease immediately releases its slot"]
pub struct Lease {
    permit: OwnedSemaphorePermit,
}

impl Lease {
    /// Give the slot back.
    pub fn release(self) {
        drop(self.permit);
    }
}
