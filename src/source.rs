//! The decoding seam between the reader and a concrete video backend.
//!
//! [`VideoReader`](crate::VideoReader) only needs three things from a
//! backend: stream metadata, the next frame in decode order, and a coarse
//! seek. [`Decoder`](crate::Decoder) provides them on top of FFmpeg; tests
//! provide them from memory.

use crate::{error::ScrubError, metadata::SourceInfo, pixel_buffer::PixelBuffer};

/// One frame produced by a [`FrameSource`].
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Presentation timestamp in stream time-base units, if the container
    /// carries one.
    pub pts: Option<i64>,
    /// Converted pixels.
    pub buffer: PixelBuffer,
}

/// A sequential video decoder with coarse seeking.
pub trait FrameSource {
    /// Stream metadata captured at open time.
    fn info(&self) -> &SourceInfo;

    /// Decode the next frame in presentation order.
    ///
    /// Returns `Ok(None)` at end of stream. Transient decoder failures are the
    /// implementation's business; they must be retried or turned into end of
    /// stream, never surfaced as errors.
    fn decode_next(&mut self) -> Result<Option<DecodedFrame>, ScrubError>;

    /// Reposition so the next decoded frame is at or before `timestamp`
    /// (stream time-base units, start offset included).
    ///
    /// Landing on an earlier keyframe is expected; the caller discards frames
    /// until it reaches the one it wanted. Any buffered decoder state must be
    /// dropped and a previous end of stream forgotten.
    fn seek_to(&mut self, timestamp: i64) -> Result<(), ScrubError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> &SourceInfo {
        (**self).info()
    }

    fn decode_next(&mut self) -> Result<Option<DecodedFrame>, ScrubError> {
        (**self).decode_next()
    }

    fn seek_to(&mut self, timestamp: i64) -> Result<(), ScrubError> {
        (**self).seek_to(timestamp)
    }
}
