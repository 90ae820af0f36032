//! Playback position as hours, minutes, and seconds.

use std::fmt;

/// A whole-second playback position, `HH:MM:SS`.
///
/// Derived from `floor(frame_index / fps)`; sub-second precision is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timecode {
    /// Whole hours.
    pub hours: u64,
    /// Minutes within the hour, `0..60`.
    pub minutes: u8,
    /// Seconds within the minute, `0..60`.
    pub seconds: u8,
}

impl Timecode {
    /// Position of `frame_index` at `frames_per_second`. A non-positive rate
    /// yields zero.
    pub fn from_frame_index(frame_index: u64, frames_per_second: f64) -> Self {
        if frames_per_second <= 0.0 || !frames_per_second.is_finite() {
            return Self::default();
        }
        Self::from_seconds((frame_index as f64 / frames_per_second).floor() as u64)
    }

    /// Split a whole number of seconds.
    pub fn from_seconds(total_seconds: u64) -> Self {
        Self {
            hours: total_seconds / 3600,
            minutes: ((total_seconds / 60) % 60) as u8,
            seconds: (total_seconds % 60) as u8,
        }
    }

    /// Total whole seconds.
    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}
