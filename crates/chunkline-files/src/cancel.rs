//! Cooperative cancellation token.
//!
//! A token is a cloneable handle around a shared flag and a channel whose
//! only sender is dropped on [`CancellationToken::cancel`]. Once dropped,
//! every receive on [`CancellationToken::done`] completes immediately, so
//! the token can sit in a `crossbeam_channel::select!` next to a work queue.
//! An optional deadline is exposed the same way through
//! [`CancellationToken::deadline_channel`].

use crate::FileError;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    deadline: Option<Instant>,
}

/// Cloneable cancellation handle shared between a caller and workers
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a token that only fires on [`cancel`](Self::cancel)
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a token that also fires once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    /// Create a token that also fires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    fn build(deadline: Option<Instant>) -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                done: rx,
                deadline,
            }),
        }
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let sender = match self.inner.trigger.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Deadline attached to this token, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Error describing why the token fired, or `None` if it has not
    ///
    /// Explicit cancellation wins over an elapsed deadline.
    pub fn error(&self) -> Option<FileError> {
        if self.is_cancelled() {
            Some(FileError::Cancelled)
        } else if self.is_expired() {
            Some(FileError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Channel that becomes disconnected once the token is cancelled
    ///
    /// Nothing is ever sent on it; a receive returns `Err` after `cancel`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Channel that yields once the deadline passes (never without one)
    ///
    /// Each call creates a fresh timer channel; build it once per wait loop.
    pub fn deadline_channel(&self) -> Receiver<Instant> {
        match self.inner.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
