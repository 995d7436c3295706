//! Elastic pool of fixed-capacity reusable buffers.
//!
//! Every buffer handed out by [`BufferPool::acquire`] has exactly the pool's
//! capacity. Buffers coming back through [`BufferPool::release`] are only
//! admitted when their capacity still matches; anything else is dropped, so
//! undersized or externally-sourced memory never circulates.
//!
//! The pool has no ceiling: it allocates on shortage and keeps whatever is
//! released. An optional idle limit and [`BufferPool::trim`] let callers
//! shed idle buffers.

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Pool statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers allocated because the pool was empty
    pub allocated: u64,
    /// Acquisitions served from the idle list
    pub reused: u64,
    /// Releases that were admitted back into the pool
    pub admitted: u64,
    /// Releases dropped because of a foreign capacity
    pub rejected: u64,
    /// Releases dropped because the idle limit was reached
    pub shed: u64,
}

/// Thread-safe elastic buffer pool
#[derive(Debug)]
pub struct BufferPool {
    capacity: usize,
    idle_limit: Option<usize>,
    free: SegQueue<Vec<u8>>,
    allocated: AtomicU64,
    reused: AtomicU64,
    admitted: AtomicU64,
    rejected: AtomicU64,
    shed: AtomicU64,
}

impl BufferPool {
    /// Create an empty pool handing out buffers of `capacity` bytes
    ///
    /// # Panics
    /// Panics if `capacity` is zero; such a pool would admit every empty
    /// `Vec` released to it.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer pool capacity must be greater than zero");
        Self {
            capacity,
            idle_limit: None,
            free: SegQueue::new(),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            shed: AtomicU64::new(0),
        }
    }

    /// Create a pool that keeps at most `limit` idle buffers
    ///
    /// Releases beyond the limit are dropped instead of pooled. The number
    /// of buffers checked out at once is still unbounded.
    pub fn with_idle_limit(capacity: usize, limit: usize) -> Self {
        Self {
            idle_limit: Some(limit),
            ..Self::new(capacity)
        }
    }

    /// Buffer capacity served by this pool
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take an exclusively-owned buffer of length and capacity `capacity()`
    ///
    /// Contents are unspecified: callers must overwrite every byte they
    /// later read.
    pub fn acquire(&self) -> Vec<u8> {
        if let Some(mut buf) = self.free.pop() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            // Released buffers may have been truncated by their last user.
            buf.resize(self.capacity, 0);
            return buf;
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        trace!("Buffer pool empty, allocating {} bytes", self.capacity);
        vec![0u8; self.capacity]
    }

    /// Return a buffer to the pool
    ///
    /// The buffer is admitted only if its capacity equals `capacity()`.
    /// Returns `true` when it was pooled, `false` when it was dropped.
    pub fn release(&self, buf: Vec<u8>) -> bool {
        if buf.capacity() != self.capacity {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            trace!(
                "Dropping foreign buffer (capacity {} != {})",
                buf.capacity(),
                self.capacity
            );
            return false;
        }

        if let Some(limit) = self.idle_limit {
            if self.free.len() >= limit {
                self.shed.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        self.free.push(buf);
        self.admitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Number of idle buffers currently pooled
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// Drop idle buffers until at most `keep` remain
    ///
    /// Returns the number of buffers released to the allocator.
    pub fn trim(&self, keep: usize) -> usize {
        let mut dropped = 0;
        while self.free.len() > keep {
            if self.free.pop().is_none() {
                break;
            }
            dropped += 1;
        }
        dropped
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            shed: self.shed.load(Ordering::Relaxed),
        }
    }
}
