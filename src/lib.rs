//! # vidscrub
//!
//! Random-access video frame reading for scrubbing UIs: step forward, step
//! backward, or jump anywhere, and get packed RGB24 pixels back without
//! re-decoding from the last keyframe on every request.
//!
//! `vidscrub` keeps two fixed-size runs of decoded frames, one ahead of the
//! playhead and one behind it, and refills whichever run the playhead just
//! left. Playing forward never seeks; stepping backward seeks once per run.
//! Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Read a Frame
//!
//! ```no_run
//! use vidscrub::VideoReader;
//!
//! let mut reader = VideoReader::open("input.mp4")?;
//! let frame = reader.get_frame(300)?;
//! frame.save("frame_300.png")?;
//! # Ok::<(), vidscrub::ScrubError>(())
//! ```
//!
//! ### Step Through Frames
//!
//! ```no_run
//! use vidscrub::VideoReader;
//!
//! let mut reader = VideoReader::open("input.mp4")?;
//! reader.get_frame(500)?;
//!
//! // Scrub backwards one frame at a time.
//! while reader.current_frame_index() > 400 {
//!     let frame = reader.get_prev_frame()?;
//!     let _ = frame.pixel(0, 0);
//! }
//! println!("at {} ({})", reader.current_frame_index(), reader.current_timestamp());
//! println!("{:?}", reader.statistics());
//! # Ok::<(), vidscrub::ScrubError>(())
//! ```
//!
//! ### Configure and Cancel
//!
//! ```no_run
//! use vidscrub::{CancellationToken, ReaderOptions, VideoReader};
//!
//! let token = CancellationToken::new();
//! let options = ReaderOptions::new()
//!     .with_seek_discard_limit(300)
//!     .with_cancellation(token.clone());
//! let mut reader = VideoReader::open_with_options("input.mp4", options)?;
//! # Ok::<(), vidscrub::ScrubError>(())
//! ```
//!
//! ## Features
//!
//! - **Bidirectional cache**: two 16-frame arrays with forward/backward roles
//! - **Minimal seeking**: sequential reads continue the decoder; seeks land on
//!   a keyframe and decode forward to the target
//! - **Self-correcting length**: the frame count is fixed up when decoding
//!   finds the real end of the stream
//! - **Pluggable decoding**: any [`FrameSource`] can feed a [`VideoReader`]
//! - **Cancellation**: long refills stop at the next decoded frame
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `FrameWorker`, a latest-request-wins background reader for Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cancellation;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod frame_cache;
pub mod metadata;
pub mod pixel_buffer;
pub mod reader;
pub mod source;
pub mod timecode;
pub mod utilities;
#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub mod worker;

pub use cancellation::CancellationToken;
pub use config::ReaderOptions;
pub use decoder::Decoder;
pub use error::ScrubError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use ffmpeg_next::Rational;
pub use frame_cache::{ArrayId, CACHE_CAPACITY, CacheSlot, FrameCache, Role, ScanOrder};
pub use metadata::SourceInfo;
pub use pixel_buffer::PixelBuffer;
pub use reader::{Direction, ReaderStatistics, VideoReader};
pub use source::{DecodedFrame, FrameSource};
pub use timecode::Timecode;
#[cfg(feature = "async")]
pub use worker::{FrameRequest, FrameResponse, FrameWorker};
