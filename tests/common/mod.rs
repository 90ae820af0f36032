//! In-memory frame source shared by the integration tests.
//!
//! Frames are 4x2 RGB24 images whose first eight bytes hold the frame index
//! (little endian), so every returned buffer says which frame it really is.
//! Timestamps use a 1/30 time base at 30 fps: frame `i` has pts
//! `start_timestamp + i`.

#![allow(dead_code)]

use std::time::Duration;

use vidscrub::{DecodedFrame, FrameSource, PixelBuffer, Rational, ScrubError, SourceInfo};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;
const STRIDE: usize = WIDTH as usize * 3;

pub struct SyntheticSource {
    info: SourceInfo,
    real_frame_count: u64,
    keyframe_interval: u64,
    failing_seeks: bool,
    position: u64,
}

impl SyntheticSource {
    /// `frame_count` frames, every frame a keyframe.
    pub fn new(frame_count: u64) -> Self {
        Self {
            info: SourceInfo {
                codec: "synthetic".to_string(),
                width: WIDTH,
                height: HEIGHT,
                frames_per_second: 30.0,
                frame_count,
                time_base: Rational::new(1, 30),
                start_timestamp: 0,
                duration: Duration::from_secs_f64(frame_count as f64 / 30.0),
            },
            real_frame_count: frame_count,
            keyframe_interval: 1,
            failing_seeks: false,
            position: 0,
        }
    }

    /// Seeks land on the closest multiple of `interval` at or before the
    /// target, like a codec with a fixed GOP.
    pub fn with_keyframe_interval(mut self, interval: u64) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }

    /// Advertise `advertised` frames while actually holding the real count.
    pub fn with_advertised_frame_count(mut self, advertised: u64) -> Self {
        self.info.frame_count = advertised;
        self
    }

    /// Offset every timestamp by `start`.
    pub fn with_start_timestamp(mut self, start: i64) -> Self {
        self.info.start_timestamp = start;
        self
    }

    /// Make every seek fail.
    pub fn with_failing_seeks(mut self) -> Self {
        self.failing_seeks = true;
        self
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn decode_next(&mut self) -> Result<Option<DecodedFrame>, ScrubError> {
        if self.position >= self.real_frame_count {
            return Ok(None);
        }
        let index = self.position;
        self.position += 1;
        Ok(Some(DecodedFrame {
            pts: Some(self.info.start_timestamp + index as i64),
            buffer: frame_for(index),
        }))
    }

    fn seek_to(&mut self, timestamp: i64) -> Result<(), ScrubError> {
        if self.failing_seeks {
            return Err(ScrubError::Seek {
                frame_index: 0,
                timestamp,
                reason: "seeking disabled".to_string(),
            });
        }
        // Seeking past the end lands on the last keyframe, as demuxers do.
        let target = ((timestamp - self.info.start_timestamp).max(0) as u64)
            .min(self.real_frame_count.saturating_sub(1));
        self.position = target / self.keyframe_interval * self.keyframe_interval;
        Ok(())
    }
}

/// A buffer tagged with `index`.
pub fn frame_for(index: u64) -> PixelBuffer {
    let mut pixels = vec![0_u8; STRIDE * HEIGHT as usize];
    pixels[..8].copy_from_slice(&index.to_le_bytes());
    PixelBuffer::new(WIDTH, HEIGHT, STRIDE, pixels).expect("valid synthetic frame")
}

/// The index a buffer produced by [`SyntheticSource`] was tagged with.
pub fn frame_number_of(buffer: &PixelBuffer) -> u64 {
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&buffer.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
