//! Video source metadata.
//!
//! [`SourceInfo`] is read once when a source is opened. The reader keeps its
//! own copy and corrects `frame_count` if decoding reaches the real end of the
//! stream somewhere other than where the container claimed.

use std::time::Duration;

use ffmpeg_next::Rational;

use crate::{timecode::Timecode, utilities};

/// Properties of the opened video stream.
///
/// # Example
///
/// ```no_run
/// use vidscrub::VideoReader;
///
/// let reader = VideoReader::open("input.mp4")?;
/// let info = reader.info();
/// println!("{}x{} @ {:.2} fps, {} frames", info.width, info.height,
///     info.frames_per_second, info.frame_count);
/// # Ok::<(), vidscrub::ScrubError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second. Falls back to the configured default when the
    /// container does not declare a rate.
    pub frames_per_second: f64,
    /// Number of frames in the stream.
    pub frame_count: u64,
    /// Stream time base (seconds per timestamp tick).
    pub time_base: Rational,
    /// Timestamp of the first frame, in time-base units.
    pub start_timestamp: i64,
    /// Stream duration.
    pub duration: Duration,
}

impl SourceInfo {
    /// Stream timestamp for the start of `frame_index`, including the stream
    /// start offset. This is the value handed to the container seek.
    pub fn frame_timestamp(&self, frame_index: u64) -> i64 {
        self.start_timestamp
            + utilities::frame_index_to_stream_timestamp(
                frame_index,
                self.frames_per_second,
                self.time_base,
            )
    }

    /// Approximate frame index of a decoded timestamp. Diagnostic only.
    pub fn timestamp_frame_index(&self, timestamp: i64) -> i64 {
        utilities::stream_timestamp_to_frame_index(
            timestamp - self.start_timestamp,
            self.time_base,
            self.frames_per_second,
        )
    }

    /// Wall-clock position of `frame_index`.
    pub fn timecode(&self, frame_index: u64) -> Timecode {
        Timecode::from_frame_index(frame_index, self.frames_per_second)
    }
}
