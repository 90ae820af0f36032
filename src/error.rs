//! Error types for the `vidscrub` crate.
//!
//! This module defines [`ScrubError`], the unified error type returned by all
//! fallible operations in the crate. Open failures, seek failures, and range
//! violations each get their own variants so callers can tell a broken source
//! apart from a bad request.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `vidscrub` operations.
///
/// Transient decoder hiccups never appear here: the decoder retries them a
/// bounded number of times and then treats the stream as ended. End of stream
/// is not an error either; a short batch is simply cached as-is.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScrubError {
    /// The video source could not be opened.
    #[error("Failed to open video source at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoReader::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container does not hold a video stream.
    #[error("No video stream found in source")]
    NoVideoStream,

    /// No decoder is available for the stream's codec.
    #[error("Unsupported video codec: {0}")]
    UnsupportedCodec(String),

    /// The pixel-format conversion context could not be created.
    #[error("Failed to set up pixel-format conversion: {0}")]
    ConversionSetup(String),

    /// The source opened fine but not a single frame could be decoded.
    #[error("Video source contains no decodable frames")]
    EmptySource,

    /// The container refused to seek.
    #[error("Failed to seek to frame {frame_index} (timestamp {timestamp}): {reason}")]
    Seek {
        /// Frame the seek was aiming for.
        frame_index: u64,
        /// Target timestamp in stream time-base units.
        timestamp: i64,
        /// Underlying reason the seek failed.
        reason: String,
    },

    /// A seek landed, but decoding forward never reached the target frame
    /// within the configured discard limit.
    #[error("Seek to frame {frame_index} did not reach the target after discarding {discarded} frames")]
    SeekTargetNotReached {
        /// Frame the seek was aiming for.
        frame_index: u64,
        /// Number of frames decoded and thrown away before giving up.
        discarded: u64,
    },

    /// A video frame could not be decoded or converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The requested frame index is outside `[0, frame_count)`.
    #[error("Frame {frame_index} is out of range (video has {frame_count} frames)")]
    FrameOutOfRange {
        /// The frame index that was requested.
        frame_index: i64,
        /// The number of frames in the video.
        frame_count: u64,
    },

    /// Pixel data does not match the declared dimensions.
    #[error("Invalid pixel buffer: {0}")]
    InvalidPixelBuffer(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while saving a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The background decode worker has shut down.
    #[cfg(feature = "async")]
    #[error("Frame worker has stopped")]
    WorkerStopped,
}

impl ScrubError {
    /// Returns `true` for errors that can only occur while opening a source.
    ///
    /// A reader that failed with one of these was never constructed.
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            ScrubError::FileOpen { .. }
                | ScrubError::NoVideoStream
                | ScrubError::UnsupportedCodec(_)
                | ScrubError::ConversionSetup(_)
                | ScrubError::EmptySource
        )
    }
}

impl From<FfmpegError> for ScrubError {
    fn from(error: FfmpegError) -> Self {
        ScrubError::FfmpegError(error.to_string())
    }
}
