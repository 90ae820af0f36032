//! Reader configuration.
//!
//! [`ReaderOptions`] is a builder for the knobs that bound the reader's
//! decode loops: how many transient decoder errors to tolerate, how far a
//! seek may land before its target, which frame rate to assume when the
//! container has none, and an optional cancellation token.
//!
//! # Example
//!
//! ```no_run
//! use vidscrub::{CancellationToken, ReaderOptions, VideoReader};
//!
//! let token = CancellationToken::new();
//! let options = ReaderOptions::new()
//!     .with_fallback_frames_per_second(25.0)
//!     .with_seek_discard_limit(600)
//!     .with_cancellation(token.clone());
//!
//! let reader = VideoReader::open_with_options("input.mp4", options)?;
//! # Ok::<(), vidscrub::ScrubError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::cancellation::CancellationToken;

/// Frame rate assumed when the container declares none.
pub const DEFAULT_FRAMES_PER_SECOND: f64 = 30.0;

/// Consecutive transient decoder failures tolerated before the stream is
/// treated as ended.
pub const DEFAULT_DECODE_RETRY_LIMIT: u32 = 10;

/// Frames a seek may decode and discard before giving up on the target.
pub const DEFAULT_SEEK_DISCARD_LIMIT: u64 = 1024;

/// Configuration for [`VideoReader`](crate::VideoReader) and
/// [`Decoder`](crate::Decoder).
#[derive(Clone)]
pub struct ReaderOptions {
    pub(crate) fallback_frames_per_second: f64,
    pub(crate) decode_retry_limit: u32,
    pub(crate) seek_discard_limit: u64,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for ReaderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReaderOptions")
            .field("fallback_frames_per_second", &self.fallback_frames_per_second)
            .field("decode_retry_limit", &self.decode_retry_limit)
            .field("seek_discard_limit", &self.seek_discard_limit)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderOptions {
    /// Defaults: 30 fps fallback, 10 decode retries, 1024 discarded frames
    /// per seek, no cancellation.
    pub fn new() -> Self {
        Self {
            fallback_frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            decode_retry_limit: DEFAULT_DECODE_RETRY_LIMIT,
            seek_discard_limit: DEFAULT_SEEK_DISCARD_LIMIT,
            cancellation: None,
        }
    }

    /// Frame rate to assume when the stream declares none. Non-positive or
    /// non-finite values are ignored.
    #[must_use]
    pub fn with_fallback_frames_per_second(mut self, frames_per_second: f64) -> Self {
        if frames_per_second.is_finite() && frames_per_second > 0.0 {
            self.fallback_frames_per_second = frames_per_second;
        }
        self
    }

    /// Consecutive transient decode failures tolerated before end of stream
    /// is assumed.
    #[must_use]
    pub fn with_decode_retry_limit(mut self, limit: u32) -> Self {
        self.decode_retry_limit = limit;
        self
    }

    /// Maximum frames decoded and discarded while walking from a keyframe to
    /// a seek target. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_seek_discard_limit(mut self, limit: u64) -> Self {
        self.seek_discard_limit = limit.max(1);
        self
    }

    /// Attach a cancellation token checked once per decoded frame.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Frame rate assumed when the container declares none.
    pub fn fallback_frames_per_second(&self) -> f64 {
        self.fallback_frames_per_second
    }

    /// Consecutive transient decode failures tolerated.
    pub fn decode_retry_limit(&self) -> u32 {
        self.decode_retry_limit
    }

    /// Maximum frames discarded per seek.
    pub fn seek_discard_limit(&self) -> u64 {
        self.seek_discard_limit
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ReaderOptions::new();
        assert_eq!(options.fallback_frames_per_second(), DEFAULT_FRAMES_PER_SECOND);
        assert_eq!(options.decode_retry_limit(), 10);
        assert_eq!(options.seek_discard_limit(), 1024);
        assert!(format!("{options:?}").contains("has_cancellation: false"));
    }

    #[test]
    fn ignores_invalid_fallback_rate() {
        let options = ReaderOptions::new()
            .with_fallback_frames_per_second(0.0)
            .with_fallback_frames_per_second(f64::INFINITY);
        assert_eq!(options.fallback_frames_per_second(), DEFAULT_FRAMES_PER_SECOND);

        let options = options.with_fallback_frames_per_second(24.0);
        assert_eq!(options.fallback_frames_per_second(), 24.0);
    }

    #[test]
    fn seek_discard_limit_clamps_zero() {
        assert_eq!(ReaderOptions::new().with_seek_discard_limit(0).seek_discard_limit(), 1);
    }

    #[test]
    fn cancellation_is_observed() {
        let token = CancellationToken::new();
        let options = ReaderOptions::new().with_cancellation(token.clone());
        assert!(!options.is_cancelled());
        token.cancel();
        assert!(options.is_cancelled());
    }
}
