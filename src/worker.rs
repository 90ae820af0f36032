//! Background frame worker for async callers.
//!
//! A [`VideoReader`] is synchronous and may block for a long time on a
//! distant seek. [`FrameWorker`] moves the reader onto a Tokio blocking thread
//! and talks to it through channels:
//!
//! - requests go through a `watch` slot that holds only the latest request,
//!   so a burst of scrubbing collapses to the most recent position;
//! - issuing a request cancels the one in flight, which stops at the next
//!   decoded frame;
//! - responses come back over a bounded `mpsc` channel, and responses to
//!   superseded requests are dropped on receipt.
//!
//! Because superseded requests are dropped, relative requests do not add up;
//! see [`FrameRequest`].
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use vidscrub::{FrameRequest, FrameWorker, ReaderOptions, ScrubError};
//!
//! # async fn example() -> Result<(), ScrubError> {
//! let mut worker = FrameWorker::spawn("input.mp4", ReaderOptions::new()).await?;
//!
//! // Only the last of these is answered.
//! for index in [100, 250, 400] {
//!     worker.request(FrameRequest::Seek(index))?;
//! }
//!
//! if let Some(response) = worker.next().await {
//!     let frame = response.frame?;
//!     println!("frame {} is {}x{}", response.frame_index, frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::{
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll, ready},
};

use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_stream::Stream;

use crate::{
    cancellation::CancellationToken,
    config::ReaderOptions,
    error::ScrubError,
    metadata::SourceInfo,
    pixel_buffer::PixelBuffer,
    reader::VideoReader,
    source::FrameSource,
};

/// Responses buffered before the worker waits for the caller.
const RESPONSE_CHANNEL_CAPACITY: usize = 4;

/// A navigation request for a [`FrameWorker`].
///
/// Relative requests (`Next`, `Prev`, `Jump`) move from wherever the reader
/// stands when the worker picks them up. The request slot holds one request,
/// so relative requests issued faster than they are answered collapse like
/// any other: three quick `Next` calls may advance a single frame. Await each
/// response when every step must count, or send one `Jump` with the summed
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Go to an absolute frame index.
    Seek(i64),
    /// Advance one frame.
    Next,
    /// Step back one frame.
    Prev,
    /// Move by a relative offset, clamped to the stream.
    Jump(i64),
}

/// The answer to one [`FrameRequest`].
#[derive(Debug)]
pub struct FrameResponse {
    /// Generation returned by the [`FrameWorker::request`] call this answers.
    pub generation: u64,
    /// The reader's current frame after the request. Unchanged on error.
    pub frame_index: u64,
    /// An owned copy of the frame, or the error the request failed with.
    pub frame: Result<PixelBuffer, ScrubError>,
}

#[derive(Debug, Clone)]
struct Envelope {
    generation: u64,
    request: FrameRequest,
    token: CancellationToken,
}

/// Handle to a reader running on a background blocking thread.
///
/// Implements [`tokio_stream::Stream`], yielding only responses to the most
/// recent request. Dropping the worker cancels the in-flight request and
/// stops the thread.
pub struct FrameWorker {
    requests: watch::Sender<Option<Envelope>>,
    responses: mpsc::Receiver<FrameResponse>,
    in_flight: CancellationToken,
    generation: u64,
    info: SourceInfo,
    handle: JoinHandle<()>,
}

impl FrameWorker {
    /// Open `path` on a blocking thread and start serving requests.
    ///
    /// # Errors
    ///
    /// Any error from [`VideoReader::open_with_options`].
    pub async fn spawn<P: Into<PathBuf>>(
        path: P,
        options: ReaderOptions,
    ) -> Result<Self, ScrubError> {
        let path = path.into();
        Self::spawn_with(move || VideoReader::open_with_options(path, options)).await
    }

    /// Build a reader with `factory` on a blocking thread and start serving
    /// requests. The reader never leaves that thread.
    pub async fn spawn_with<S, F>(factory: F) -> Result<Self, ScrubError>
    where
        S: FrameSource + 'static,
        F: FnOnce() -> Result<VideoReader<S>, ScrubError> + Send + 'static,
    {
        let (request_sender, request_receiver) = watch::channel(None);
        let (response_sender, response_receiver) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        let (ready_sender, ready_receiver) = oneshot::channel();
        let runtime = Handle::current();

        let handle = tokio::task::spawn_blocking(move || {
            let reader = match factory() {
                Ok(reader) => reader,
                Err(error) => {
                    let _ = ready_sender.send(Err(error));
                    return;
                }
            };
            if ready_sender.send(Ok(reader.info().clone())).is_err() {
                return;
            }
            serve_requests(reader, &runtime, request_receiver, response_sender);
        });

        let info = ready_receiver
            .await
            .map_err(|_| ScrubError::WorkerStopped)??;

        Ok(Self {
            requests: request_sender,
            responses: response_receiver,
            in_flight: CancellationToken::new(),
            generation: 0,
            info,
            handle,
        })
    }

    /// Submit a request, superseding any request not yet answered.
    ///
    /// Returns the request's generation; only responses carrying it are
    /// delivered.
    ///
    /// # Errors
    ///
    /// [`ScrubError::WorkerStopped`] if the background thread has exited.
    pub fn request(&mut self, request: FrameRequest) -> Result<u64, ScrubError> {
        if self.handle.is_finished() {
            return Err(ScrubError::WorkerStopped);
        }

        self.in_flight.cancel();
        self.in_flight = CancellationToken::new();
        self.generation += 1;

        log::trace!("Frame request {request:?} (generation {})", self.generation);
        self.requests.send_replace(Some(Envelope {
            generation: self.generation,
            request,
            token: self.in_flight.clone(),
        }));
        Ok(self.generation)
    }

    /// Wait for the response to the latest request.
    ///
    /// Returns `None` once the worker has stopped.
    pub async fn recv(&mut self) -> Option<FrameResponse> {
        loop {
            let response = self.responses.recv().await?;
            if response.generation == self.generation {
                return Some(response);
            }
            log::trace!("Dropping stale response for generation {}", response.generation);
        }
    }

    /// Metadata of the source the worker was opened on.
    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// Generation of the most recent request.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Stream for FrameWorker {
    type Item = FrameResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.responses.poll_recv(cx)) {
                Some(response) if response.generation == self.generation => {
                    return Poll::Ready(Some(response));
                }
                Some(_) => continue,
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        // Dropping `requests` closes the watch channel, which ends the loop.
        self.in_flight.cancel();
    }
}

/// Worker loop. Runs on the blocking thread until the handle is dropped.
fn serve_requests<S: FrameSource>(
    mut reader: VideoReader<S>,
    runtime: &Handle,
    mut requests: watch::Receiver<Option<Envelope>>,
    responses: mpsc::Sender<FrameResponse>,
) {
    while runtime.block_on(requests.changed()).is_ok() {
        let Some(envelope) = requests.borrow_and_update().clone() else {
            continue;
        };
        if envelope.token.is_cancelled() {
            continue;
        }

        reader.set_cancellation_token(Some(envelope.token.clone()));
        let frame = apply_request(&mut reader, envelope.request);

        if matches!(frame, Err(ScrubError::Cancelled)) || envelope.token.is_cancelled() {
            log::debug!("Request generation {} superseded", envelope.generation);
            continue;
        }

        let response = FrameResponse {
            generation: envelope.generation,
            frame_index: reader.current_frame_index(),
            frame,
        };
        if responses.blocking_send(response).is_err() {
            break;
        }
    }
    log::debug!("Frame worker stopped");
}

fn apply_request<S: FrameSource>(
    reader: &mut VideoReader<S>,
    request: FrameRequest,
) -> Result<PixelBuffer, ScrubError> {
    let frame = match request {
        FrameRequest::Seek(frame_index) => reader.get_frame(frame_index)?,
        FrameRequest::Next => reader.get_next_frame()?,
        FrameRequest::Prev => reader.get_prev_frame()?,
        FrameRequest::Jump(offset) => reader.jump_by(offset)?,
    };
    Ok(frame.clone())
}
