//! Random-access, bidirectional video frame reader.
//!
//! [`VideoReader`] serves frames by index from a two-array
//! [`FrameCache`](crate::FrameCache). Cache misses are refilled in batches of
//! [`CACHE_CAPACITY`] frames decoded from a [`FrameSource`]: forward batches
//! start at the requested frame, backward batches end at it. A refill seeks
//! only when its batch does not start where the decoder would naturally
//! continue, so playing forward never seeks and stepping backward seeks once
//! per batch.
//!
//! # Example
//!
//! ```no_run
//! use vidscrub::VideoReader;
//!
//! let mut reader = VideoReader::open("input.mp4")?;
//! println!("{} frames at {:.2} fps", reader.frame_count(), reader.fps());
//!
//! let frame = reader.get_frame(120)?;
//! println!("frame 120 is {}x{}", frame.width(), frame.height());
//!
//! // Step back a few frames; these come from a single backward batch.
//! for _ in 0..5 {
//!     reader.get_prev_frame()?;
//! }
//! assert_eq!(reader.current_frame_index(), 115);
//! # Ok::<(), vidscrub::ScrubError>(())
//! ```

use std::{ops::Range, path::Path};

use crate::{
    cancellation::CancellationToken,
    config::ReaderOptions,
    decoder::Decoder,
    error::ScrubError,
    frame_cache::{CACHE_CAPACITY, FrameCache, Role, ScanOrder},
    metadata::SourceInfo,
    pixel_buffer::PixelBuffer,
    source::FrameSource,
    timecode::Timecode,
};

/// Direction of travel that caused a cache refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward higher frame indices.
    Forward,
    /// Toward lower frame indices.
    Backward,
}

impl Direction {
    fn role(self) -> Role {
        match self {
            Direction::Forward => Role::Forward,
            Direction::Backward => Role::Backward,
        }
    }
}

/// Request and decode counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStatistics {
    /// Frame requests served (`get_frame`, `get_next_frame`, `get_prev_frame`).
    pub requests: u64,
    /// Requests that were not in the cache and triggered a refill.
    pub cache_misses: u64,
    /// Container seeks issued.
    pub seeks: u64,
    /// Frames produced by the decoder, kept or not.
    pub frames_decoded: u64,
    /// Frames decoded after a seek and thrown away before the target.
    pub frames_discarded: u64,
}

impl ReaderStatistics {
    /// Fraction of requests served from the cache.
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        1.0 - self.cache_misses as f64 / self.requests as f64
    }
}

struct ReaderState {
    current_frame_index: u64,
    /// Index the decoder will produce next without seeking, when known.
    next_decode_index: Option<u64>,
    /// Set once decoding ran past the advertised frame count without
    /// reaching the end, so more frames may follow.
    frame_count_is_lower_bound: bool,
    statistics: ReaderStatistics,
}

/// Where a refill seeks to.
struct SeekContext {
    target_frame_index: u64,
    target_timestamp: i64,
    direction: Direction,
}

struct Batch {
    frames: Vec<(u64, PixelBuffer)>,
    end_of_stream: bool,
    /// Approximate index of the last frame the decoder produced, kept or
    /// discarded.
    last_seen: Option<u64>,
}

/// Bidirectional, cached frame reader.
///
/// Returned frames borrow the reader and stay valid until the next call that
/// takes `&mut self`.
pub struct VideoReader<S: FrameSource = Decoder> {
    source: S,
    info: SourceInfo,
    cache: FrameCache,
    state: ReaderState,
    options: ReaderOptions,
}

impl VideoReader<Decoder> {
    /// Open a video file with default options and decode its first batch.
    ///
    /// # Errors
    ///
    /// Any open error from [`Decoder::open`], or [`ScrubError::EmptySource`]
    /// if not a single frame decodes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ScrubError> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    /// Open a video file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(
        path: P,
        options: ReaderOptions,
    ) -> Result<Self, ScrubError> {
        let decoder = Decoder::open(path, &options)?;
        Self::from_source(decoder, options)
    }
}

impl<S: FrameSource> VideoReader<S> {
    /// Build a reader over an already-open source positioned at its first
    /// frame, and eagerly decode frames `0..CACHE_CAPACITY`.
    ///
    /// # Errors
    ///
    /// [`ScrubError::EmptySource`] if the source produces no frames, or any
    /// error raised while decoding the first batch.
    pub fn from_source(source: S, options: ReaderOptions) -> Result<Self, ScrubError> {
        let info = source.info().clone();
        let mut reader = Self {
            source,
            info,
            cache: FrameCache::new(),
            state: ReaderState {
                current_frame_index: 0,
                next_decode_index: Some(0),
                frame_count_is_lower_bound: false,
                statistics: ReaderStatistics::default(),
            },
            options,
        };

        reader.read_video_frames(0, Direction::Forward)?;
        if !reader.cache.contains(0) {
            return Err(ScrubError::EmptySource);
        }
        Ok(reader)
    }

    /// Return frame `frame_index`, decoding it if needed.
    ///
    /// # Errors
    ///
    /// [`ScrubError::FrameOutOfRange`] if the index is negative or not below
    /// [`frame_count`](Self::frame_count), or any seek or decode error raised
    /// by a refill.
    pub fn get_frame(&mut self, frame_index: i64) -> Result<&PixelBuffer, ScrubError> {
        let index = self.validate_index(frame_index)?;
        self.state.statistics.requests += 1;

        let direction = if index > self.state.current_frame_index {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.ensure_cached(index, direction)?;
        self.state.current_frame_index = index;
        self.cached_frame(index, Role::Forward, ScanOrder::Ascending)
    }

    /// Advance one frame. Stays on the last frame at the end of the stream.
    pub fn get_next_frame(&mut self) -> Result<&PixelBuffer, ScrubError> {
        self.state.statistics.requests += 1;
        let next = self.state.current_frame_index + 1;
        let target = if self.state.frame_count_is_lower_bound {
            next
        } else {
            next.min(self.last_frame_index())
        };

        let index = match self.ensure_cached(target, Direction::Forward) {
            Ok(()) => target,
            // The refill hit the real end of the stream before `target` and
            // corrected the frame count. Stay on the last frame.
            Err(ScrubError::FrameOutOfRange { .. }) if self.info.frame_count > 0 => {
                let last = self.last_frame_index();
                log::debug!("Frame {target} does not exist, holding at last frame {last}");
                self.ensure_cached(last, Direction::Backward)?;
                last
            }
            Err(error) => return Err(error),
        };

        self.state.current_frame_index = index;
        self.cached_frame(index, Role::Forward, ScanOrder::Ascending)
    }

    /// Step back one frame. Stays on frame 0 at the start of the stream.
    pub fn get_prev_frame(&mut self) -> Result<&PixelBuffer, ScrubError> {
        self.state.statistics.requests += 1;
        let target = self
            .state
            .current_frame_index
            .saturating_sub(1)
            .min(self.last_frame_index());

        self.ensure_cached(target, Direction::Backward)?;
        self.state.current_frame_index = target;
        self.cached_frame(target, Role::Backward, ScanOrder::Descending)
    }

    /// Move by `offset` frames from the current one, clamped to the stream.
    pub fn jump_by(&mut self, offset: i64) -> Result<&PixelBuffer, ScrubError> {
        let last = self.last_frame_index() as i64;
        let target = (self.state.current_frame_index as i64)
            .saturating_add(offset)
            .clamp(0, last);
        self.get_frame(target)
    }

    /// Decode frame `frame_index` and save it as an image. The format is
    /// inferred from the extension.
    pub fn save_frame<P: AsRef<Path>>(
        &mut self,
        frame_index: i64,
        path: P,
    ) -> Result<(), ScrubError> {
        let path = path.as_ref();
        log::debug!("Saving frame {frame_index} to {}", path.display());
        self.get_frame(frame_index)?.save(path)
    }

    /// Number of frames. Corrected when decoding finds the real end.
    pub fn frame_count(&self) -> u64 {
        self.info.frame_count
    }

    /// Frames per second.
    pub fn fps(&self) -> f64 {
        self.info.frames_per_second
    }

    /// Index of the frame most recently returned.
    pub fn current_frame_index(&self) -> u64 {
        self.state.current_frame_index
    }

    /// Playback position of the current frame.
    pub fn current_timestamp(&self) -> Timecode {
        self.info.timecode(self.state.current_frame_index)
    }

    /// Stream metadata, with the corrected frame count.
    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// Request and decode counters.
    pub fn statistics(&self) -> ReaderStatistics {
        self.state.statistics
    }

    /// The frame cache.
    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Replace the cancellation token checked during refills.
    pub fn set_cancellation_token(&mut self, token: Option<CancellationToken>) {
        self.options.cancellation = token;
    }

    fn last_frame_index(&self) -> u64 {
        self.info.frame_count.saturating_sub(1)
    }

    fn validate_index(&self, frame_index: i64) -> Result<u64, ScrubError> {
        if frame_index < 0 || frame_index as u64 >= self.info.frame_count {
            return Err(ScrubError::FrameOutOfRange {
                frame_index,
                frame_count: self.info.frame_count,
            });
        }
        Ok(frame_index as u64)
    }

    fn cached_frame(
        &self,
        frame_index: u64,
        first: Role,
        order: ScanOrder,
    ) -> Result<&PixelBuffer, ScrubError> {
        self.cache
            .lookup_from(frame_index, first, order)
            .ok_or(ScrubError::FrameOutOfRange {
                frame_index: frame_index as i64,
                frame_count: self.info.frame_count,
            })
    }

    fn ensure_cached(&mut self, frame_index: u64, direction: Direction) -> Result<(), ScrubError> {
        if self.cache.contains(frame_index) {
            return Ok(());
        }

        self.state.statistics.cache_misses += 1;
        log::debug!("Cache miss for frame {frame_index} ({direction:?})");
        self.read_video_frames(frame_index, direction)?;

        if self.cache.contains(frame_index) {
            Ok(())
        } else {
            Err(ScrubError::FrameOutOfRange {
                frame_index: frame_index as i64,
                frame_count: self.info.frame_count,
            })
        }
    }

    /// Refill one cache array with the batch around `frame_index`.
    fn read_video_frames(&mut self, frame_index: u64, direction: Direction) -> Result<(), ScrubError> {
        // Keep the run the reader is standing in; overwrite the other one.
        let target = self
            .cache
            .locate(self.state.current_frame_index)
            .map(|id| id.other())
            .unwrap_or_else(|| self.cache.array_for(direction.role().opposite()));

        let batch_range = batch_bounds(
            frame_index,
            direction,
            self.cache.range(target.other()).map(|range| *range.start()..*range.end() + 1),
        );

        let seek = (self.state.next_decode_index != Some(batch_range.start)).then(|| SeekContext {
            target_frame_index: batch_range.start,
            target_timestamp: self.info.frame_timestamp(batch_range.start),
            direction,
        });

        // Unknown until this refill completes.
        self.state.next_decode_index = None;

        if let Some(seek) = &seek {
            log::debug!(
                "Seeking to frame {} (timestamp {}) for a {:?} refill",
                seek.target_frame_index,
                seek.target_timestamp,
                seek.direction
            );
            self.state.statistics.seeks += 1;
            self.source.seek_to(seek.target_timestamp).map_err(|error| match error {
                ScrubError::Seek { timestamp, reason, .. } => ScrubError::Seek {
                    frame_index: seek.target_frame_index,
                    timestamp,
                    reason,
                },
                other => other,
            })?;
        }

        let batch = self.decode_batch(batch_range.clone(), seek.as_ref())?;
        let wanted = batch_range.end - batch_range.start;
        let produced = batch.frames.len() as u64;

        if batch.end_of_stream {
            let observed_end = match batch.frames.last() {
                Some((last, _)) => last + 1,
                None => batch
                    .last_seen
                    .map_or(batch_range.start, |seen| (seen + 1).min(batch_range.start)),
            };
            if produced < wanted {
                log::debug!(
                    "End of stream after {produced} of {wanted} frames starting at {}",
                    batch_range.start
                );
            }
            if observed_end != self.info.frame_count {
                log::info!(
                    "Stream ends at frame {observed_end}, correcting frame count from {}",
                    self.info.frame_count
                );
                self.info.frame_count = observed_end;
            }
            self.state.frame_count_is_lower_bound = false;
        } else {
            let next = batch_range.start + produced;
            self.state.next_decode_index = Some(next);
            if next > self.info.frame_count {
                log::info!(
                    "Decoded past the advertised end, raising frame count from {} to {next}",
                    self.info.frame_count
                );
                self.info.frame_count = next;
                self.state.frame_count_is_lower_bound = true;
            }
        }

        if !batch.frames.is_empty() {
            let stored = self.cache.fill(target, batch.frames);
            self.cache.assign(target, direction.role());
            log::trace!(
                "Cached frames {}..{} in {target:?} as {:?}",
                batch_range.start,
                batch_range.start + stored as u64,
                direction.role()
            );
        }

        Ok(())
    }

    /// Decode frames for `range`, discarding pre-target frames after a seek.
    fn decode_batch(
        &mut self,
        range: Range<u64>,
        seek: Option<&SeekContext>,
    ) -> Result<Batch, ScrubError> {
        let wanted = (range.end - range.start) as usize;
        let mut frames = Vec::with_capacity(wanted);
        let mut discarded = 0_u64;
        let mut last_seen = None;

        while frames.len() < wanted {
            if self.options.is_cancelled() {
                log::debug!("Refill at frame {} cancelled", range.start);
                return Err(ScrubError::Cancelled);
            }

            let Some(decoded) = self.source.decode_next()? else {
                return Ok(Batch {
                    frames,
                    end_of_stream: true,
                    last_seen,
                });
            };
            self.state.statistics.frames_decoded += 1;

            if let (Some(seek), true) = (seek, frames.is_empty()) {
                let landed = decoded.pts.map(|pts| self.info.timestamp_frame_index(pts));
                match landed {
                    Some(landed) if landed < range.start as i64 => {
                        discarded += 1;
                        self.state.statistics.frames_discarded += 1;
                        last_seen = Some(landed.max(0) as u64);
                        if discarded > self.options.seek_discard_limit() {
                            return Err(ScrubError::SeekTargetNotReached {
                                frame_index: seek.target_frame_index,
                                discarded,
                            });
                        }
                        continue;
                    }
                    Some(landed) if landed > range.start as i64 => {
                        log::debug!(
                            "Seek to frame {} landed on frame {landed}, using it as the target",
                            range.start
                        );
                    }
                    _ => {}
                }
                if discarded > 0 {
                    log::trace!("Discarded {discarded} frames before frame {}", range.start);
                }
            }

            let index = range.start + frames.len() as u64;
            last_seen = Some(index);
            frames.push((index, decoded.buffer));
        }

        Ok(Batch {
            frames,
            end_of_stream: false,
            last_seen,
        })
    }
}

/// Frame range of a refill batch for `frame_index`, clipped so it never
/// overlaps `other`, the half-open range held by the array being kept.
fn batch_bounds(frame_index: u64, direction: Direction, other: Option<Range<u64>>) -> Range<u64> {
    let capacity = CACHE_CAPACITY as u64;
    let (mut start, mut end) = match direction {
        Direction::Forward => (frame_index, frame_index + capacity),
        Direction::Backward => {
            let start = frame_index.saturating_sub(capacity - 1);
            (start, start + capacity)
        }
    };

    if let Some(other) = other {
        if other.end <= frame_index {
            start = start.max(other.end);
        } else if other.start > frame_index {
            end = end.min(other.start);
        }
    }

    start..end
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ffmpeg_next::Rational;

    use super::*;
    use crate::source::DecodedFrame;

    /// Frames `0..len`, one byte per frame holding the index, no seeking
    /// imprecision.
    struct CountingSource {
        info: SourceInfo,
        len: u64,
        position: u64,
    }

    impl CountingSource {
        fn new(len: u64) -> Self {
            Self {
                info: SourceInfo {
                    codec: "test".to_string(),
                    width: 1,
                    height: 1,
                    frames_per_second: 10.0,
                    frame_count: len,
                    time_base: Rational::new(1, 10),
                    start_timestamp: 0,
                    duration: Duration::from_millis(len * 100),
                },
                len,
                position: 0,
            }
        }
    }

    impl FrameSource for CountingSource {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        fn decode_next(&mut self) -> Result<Option<DecodedFrame>, ScrubError> {
            if self.position >= self.len {
                return Ok(None);
            }
            let tag = self.position as u8;
            let frame = DecodedFrame {
                pts: Some(self.position as i64),
                buffer: PixelBuffer::new(1, 1, 3, vec![tag, tag, tag])?,
            };
            self.position += 1;
            Ok(Some(frame))
        }

        fn seek_to(&mut self, timestamp: i64) -> Result<(), ScrubError> {
            self.position = timestamp.max(0) as u64;
            Ok(())
        }
    }

    fn tag(buffer: &PixelBuffer) -> u8 {
        buffer.as_bytes()[0]
    }

    #[test]
    fn forward_bounds_start_at_index() {
        assert_eq!(batch_bounds(40, Direction::Forward, None), 40..56);
        assert_eq!(batch_bounds(40, Direction::Forward, Some(48..64)), 40..48);
    }

    #[test]
    fn backward_bounds_end_at_index() {
        assert_eq!(batch_bounds(40, Direction::Backward, None), 25..41);
        assert_eq!(batch_bounds(40, Direction::Backward, Some(41..57)), 25..41);
        assert_eq!(batch_bounds(40, Direction::Backward, Some(20..30)), 30..41);
    }

    #[test]
    fn backward_bounds_extend_forward_near_start() {
        assert_eq!(batch_bounds(5, Direction::Backward, None), 0..16);
        assert_eq!(batch_bounds(5, Direction::Backward, Some(10..26)), 0..10);
    }

    #[test]
    fn construction_caches_first_batch() {
        let reader = VideoReader::from_source(CountingSource::new(100), ReaderOptions::new())
            .unwrap();
        assert_eq!(reader.current_frame_index(), 0);
        assert_eq!(reader.cache().range_for(Role::Forward), Some(0..=15));
        assert_eq!(reader.statistics().seeks, 0);
    }

    #[test]
    fn empty_source_is_rejected() {
        let result = VideoReader::from_source(CountingSource::new(0), ReaderOptions::new());
        assert!(matches!(result, Err(ScrubError::EmptySource)));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let mut reader =
            VideoReader::from_source(CountingSource::new(20), ReaderOptions::new()).unwrap();
        assert!(matches!(
            reader.get_frame(-1),
            Err(ScrubError::FrameOutOfRange { frame_index: -1, frame_count: 20 })
        ));
        assert!(matches!(
            reader.get_frame(20),
            Err(ScrubError::FrameOutOfRange { frame_index: 20, .. })
        ));
        assert_eq!(tag(reader.get_frame(19).unwrap()), 19);
    }

    #[test]
    fn jump_by_clamps() {
        let mut reader =
            VideoReader::from_source(CountingSource::new(30), ReaderOptions::new()).unwrap();
        assert_eq!(tag(reader.jump_by(100).unwrap()), 29);
        assert_eq!(tag(reader.jump_by(-7).unwrap()), 22);
        assert_eq!(tag(reader.jump_by(-100).unwrap()), 0);
    }

    #[test]
    fn cancelled_refill_leaves_cache_untouched() {
        let token = CancellationToken::new();
        let options = ReaderOptions::new().with_cancellation(token.clone());
        let mut reader = VideoReader::from_source(CountingSource::new(100), options).unwrap();

        token.cancel();
        assert!(matches!(reader.get_frame(50), Err(ScrubError::Cancelled)));
        assert_eq!(reader.current_frame_index(), 0);
        assert_eq!(reader.cache().range_for(Role::Forward), Some(0..=15));

        reader.set_cancellation_token(None);
        assert_eq!(tag(reader.get_frame(50).unwrap()), 50);
        assert_eq!(reader.statistics().seeks, 2);
    }

    #[test]
    fn timestamp_follows_current_frame() {
        let mut reader =
            VideoReader::from_source(CountingSource::new(200), ReaderOptions::new()).unwrap();
        reader.get_frame(125).unwrap();
        assert_eq!(reader.current_timestamp().to_string(), "00:00:12");
    }
}
