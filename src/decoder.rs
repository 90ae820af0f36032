//! FFmpeg-backed [`FrameSource`].
//!
//! [`Decoder`] owns the demuxer, the video decoder, and a software scaler that
//! converts every decoded picture to packed RGB24 at the stream's native size.
//! It decodes strictly forward; seeking asks the demuxer for the nearest
//! keyframe at or before a timestamp and leaves the walk to the target to the
//! caller.

use std::{path::Path, time::Duration};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    config::ReaderOptions,
    error::ScrubError,
    metadata::SourceInfo,
    pixel_buffer::PixelBuffer,
    source::{DecodedFrame, FrameSource},
    utilities,
};

/// Sequential FFmpeg video decoder producing RGB24 [`PixelBuffer`]s.
///
/// Usually constructed indirectly through
/// [`VideoReader::open`](crate::VideoReader::open).
pub struct Decoder {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    info: SourceInfo,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    drained: bool,
    failures: FailureBudget,
}

/// Counts consecutive transient failures against a retry limit.
#[derive(Debug, Clone, Copy)]
struct FailureBudget {
    consecutive: u32,
    limit: u32,
}

impl FailureBudget {
    fn new(limit: u32) -> Self {
        Self {
            consecutive: 0,
            limit,
        }
    }

    /// Count one failure. Returns `true` once more than `limit` failures
    /// happened in a row.
    fn record(&mut self) -> bool {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive > self.limit
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

impl Decoder {
    /// Open `path` and prepare the best video stream for decoding.
    ///
    /// # Errors
    ///
    /// - [`ScrubError::FileOpen`] if the container cannot be opened.
    /// - [`ScrubError::NoVideoStream`] if it has no video stream.
    /// - [`ScrubError::UnsupportedCodec`] if no decoder exists for the codec.
    /// - [`ScrubError::ConversionSetup`] if the RGB converter cannot be built.
    pub fn open<P: AsRef<Path>>(path: P, options: &ReaderOptions) -> Result<Self, ScrubError> {
        let path = path.as_ref();

        ffmpeg_next::init().map_err(|error| ScrubError::FileOpen {
            path: path.to_path_buf(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input = ffmpeg_next::format::input(&path).map_err(|error| ScrubError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(ScrubError::NoVideoStream)?;
        let stream_index = stream.index();

        let codec_id = stream.parameters().id();
        let codec = ffmpeg_next::decoder::find(codec_id)
            .ok_or_else(|| ScrubError::UnsupportedCodec(format!("{codec_id:?}")))?;
        let codec_name = codec.name().to_string();

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| ScrubError::UnsupportedCodec(format!("{codec_name}: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| ScrubError::UnsupportedCodec(format!("{codec_name}: {error}")))?;

        let time_base = stream.time_base();
        let frames_per_second = utilities::rational_to_rate(stream.avg_frame_rate())
            .or_else(|| utilities::rational_to_rate(stream.rate()))
            .unwrap_or_else(|| {
                log::warn!(
                    "Stream declares no frame rate, assuming {} fps",
                    options.fallback_frames_per_second()
                );
                options.fallback_frames_per_second()
            });

        let start_timestamp = match stream.start_time() {
            ffmpeg_sys_next::AV_NOPTS_VALUE => 0,
            start => start,
        };

        let duration = if stream.duration() > 0 {
            Duration::from_secs_f64(
                stream.duration() as f64 * utilities::time_base_seconds(time_base),
            )
        } else if input.duration() > 0 {
            Duration::from_micros(input.duration() as u64)
        } else {
            Duration::ZERO
        };

        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            (duration.as_secs_f64() * frames_per_second).round() as u64
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = build_scaler(decoder.format(), width, height)?;

        log::info!(
            "Opened {}: {codec_name} {width}x{height} @ {frames_per_second:.3} fps, \
             {frame_count} frames, time base {time_base}",
            path.display()
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            info: SourceInfo {
                codec: codec_name,
                width,
                height,
                frames_per_second,
                frame_count,
                time_base,
                start_timestamp,
                duration,
            },
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
            drained: false,
            failures: FailureBudget::new(options.decode_retry_limit()),
        })
    }

    /// Convert the current `decoded_frame` to RGB24, rebuilding the scaler if
    /// the stream changed size or pixel format.
    fn convert_current_frame(&mut self) -> Result<PixelBuffer, ScrubError> {
        let format = self.decoded_frame.format();
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        let definition = self.scaler.input();
        if definition.format != format || definition.width != width || definition.height != height
        {
            log::info!(
                "Video input changed to {width}x{height} {format:?}, rebuilding converter"
            );
            self.scaler = build_scaler(format, width, height)?;
        }

        self.scaler
            .run(&self.decoded_frame, &mut self.rgb_frame)
            .map_err(|error| ScrubError::VideoDecodeError(format!("conversion failed: {error}")))?;

        PixelBuffer::from_video_frame(&self.rgb_frame)
    }

    /// Read one packet and hand it to the decoder if it belongs to our stream.
    fn feed_packet(&mut self) {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {
                if packet.stream() != self.stream_index {
                    return;
                }
                if let Err(error) = self.decoder.send_packet(&packet) {
                    self.record_failure("send packet", &error);
                }
            }
            Err(FfmpegError::Eof) => self.finish_input(),
            Err(error) => self.record_failure("read packet", &error),
        }
    }

    /// Signal end of input so the decoder flushes its delayed frames.
    fn finish_input(&mut self) {
        if let Err(error) = self.decoder.send_eof() {
            log::debug!("send_eof failed, treating stream as drained: {error}");
            self.drained = true;
        }
        self.eof_sent = true;
    }

    fn record_failure(&mut self, stage: &str, error: &FfmpegError) {
        let exhausted = self.failures.record();
        log::warn!(
            "Transient decode failure ({stage}, attempt {}/{}): {error}",
            self.failures.consecutive,
            self.failures.limit
        );
        if exhausted {
            log::warn!("Too many consecutive decode failures, treating as end of stream");
            self.drained = true;
        }
    }
}

impl FrameSource for Decoder {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn decode_next(&mut self) -> Result<Option<DecodedFrame>, ScrubError> {
        loop {
            if self.drained {
                return Ok(None);
            }

            match self.decoder.receive_frame(&mut self.decoded_frame) {
                Ok(()) => {
                    self.failures.reset();
                    let pts = self
                        .decoded_frame
                        .timestamp()
                        .or_else(|| self.decoded_frame.pts());
                    let buffer = self.convert_current_frame()?;
                    return Ok(Some(DecodedFrame { pts, buffer }));
                }
                Err(FfmpegError::Eof) => {
                    self.drained = true;
                    return Ok(None);
                }
                Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                    if self.eof_sent {
                        self.drained = true;
                        return Ok(None);
                    }
                    self.feed_packet();
                }
                Err(error) => {
                    self.record_failure("receive frame", &error);
                    if !self.eof_sent && !self.drained {
                        self.feed_packet();
                    }
                }
            }
        }
    }

    fn seek_to(&mut self, timestamp: i64) -> Result<(), ScrubError> {
        log::debug!("Seeking stream {} to timestamp {timestamp}", self.stream_index);

        // SAFETY: `self.input` owns a valid, open format context for the
        // lifetime of `self`, and `stream_index` was obtained from it. The
        // call only repositions the demuxer; no pointers escape.
        let result = unsafe {
            ffmpeg_sys_next::avformat_seek_file(
                self.input.as_mut_ptr(),
                self.stream_index as std::os::raw::c_int,
                i64::MIN,
                timestamp,
                timestamp,
                0,
            )
        };

        if result < 0 {
            let error = FfmpegError::from(result);
            return Err(ScrubError::Seek {
                frame_index: self.info.timestamp_frame_index(timestamp).max(0) as u64,
                timestamp,
                reason: error.to_string(),
            });
        }

        self.decoder.flush();
        self.eof_sent = false;
        self.drained = false;
        self.failures.reset();
        Ok(())
    }
}

fn build_scaler(format: Pixel, width: u32, height: u32) -> Result<ScalingContext, ScrubError> {
    ScalingContext::get(
        format,
        width,
        height,
        Pixel::RGB24,
        width,
        height,
        ScalingFlags::BILINEAR,
    )
    .map_err(|error| {
        ScrubError::ConversionSetup(format!("{format:?} {width}x{height} to RGB24: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::FailureBudget;

    #[test]
    fn budget_allows_limit_failures_in_a_row() {
        let mut budget = FailureBudget::new(3);
        assert!(!budget.record());
        assert!(!budget.record());
        assert!(!budget.record());
        assert!(budget.record());
    }

    #[test]
    fn success_resets_budget() {
        let mut budget = FailureBudget::new(2);
        budget.record();
        budget.record();
        budget.reset();
        assert!(!budget.record());
        assert!(!budget.record());
        assert!(budget.record());
    }

    #[test]
    fn zero_limit_gives_up_on_first_failure() {
        let mut budget = FailureBudget::new(0);
        assert!(budget.record());
    }
}
