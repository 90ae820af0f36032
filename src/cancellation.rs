//! Cooperative cancellation for long refills.
//!
//! A distant seek can force the reader to decode and discard hundreds of
//! frames. A [`CancellationToken`] attached to the reader is checked once per
//! decoded frame; when it fires, the refill stops and returns
//! [`ScrubError::Cancelled`](crate::ScrubError::Cancelled) without touching
//! the cache.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a token can be cancelled from any thread
/// while a reader on another thread is decoding.
///
/// ```
/// use vidscrub::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
