//! Timestamp and frame-index conversion helpers.
//!
//! Frame indices are converted to stream timestamps for seeking, and decoded
//! timestamps back to indices to find where a seek actually landed. The
//! reverse mapping is approximate and may be off by one near frame
//! boundaries.

use ffmpeg_next::Rational;

/// Time base as a floating-point number of seconds per tick.
pub fn time_base_seconds(time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Convert a frame index to a timestamp in the stream's time base.
///
/// Computes `round(frame_index / frames_per_second / time_base)`. Does not
/// include the stream's start offset.
pub fn frame_index_to_stream_timestamp(
    frame_index: u64,
    frames_per_second: f64,
    time_base: Rational,
) -> i64 {
    let tick = time_base_seconds(time_base);
    if frames_per_second <= 0.0 || tick <= 0.0 {
        return 0;
    }
    (frame_index as f64 / frames_per_second / tick).round() as i64
}

/// Convert a stream timestamp (already relative to the stream start) to the
/// nearest frame index. May be negative for frames before the stream start.
pub fn stream_timestamp_to_frame_index(
    timestamp: i64,
    time_base: Rational,
    frames_per_second: f64,
) -> i64 {
    let seconds = timestamp as f64 * time_base_seconds(time_base);
    (seconds * frames_per_second).round() as i64
}

/// Frames per second from a rational rate, or `None` if the rate is unset.
pub fn rational_to_rate(rate: Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(rate.numerator() as f64 / rate.denominator() as f64)
}
