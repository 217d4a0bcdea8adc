//! Cancellation and in-flight work limits.

use crate::error::{CompilerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CompilerError::Cancelled);
        }
        Ok(())
    }
}

/// Counting semaphore capping concurrent container deconstructions.
#[derive(Debug)]
pub struct Limiter {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

/// Returns its slot to the [`Limiter`] when dropped.
#[derive(Debug)]
pub struct LimiterPermit<'a> {
    limiter: &'a Limiter,
}

impl Limiter {
    /// A limiter with `capacity` slots. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a slot is free.
    pub fn acquire(&self) -> LimiterPermit<'_> {
        let mut available = self.available.lock().unwrap_or_else(|e| e.into_inner());
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;
        LimiterPermit { limiter: self }
    }

    fn release(&self) {
        let mut available = self.available.lock().unwrap_or_else(|e| e.into_inner());
        *available += 1;
        self.released.notify_one();
    }
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
