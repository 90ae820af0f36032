//! Owned packed-RGB pixel data for one decoded frame.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
};

use ffmpeg_next::frame::Video as VideoFrame;
use image::RgbImage;

use crate::error::ScrubError;

/// Bytes per pixel of the packed RGB24 layout every buffer uses.
pub const BYTES_PER_PIXEL: usize = 3;

/// Decoded pixels of a single frame, packed RGB24.
///
/// Buffers are always owned: the decoder's internal frame is reused on the
/// next decode call, so pixels are copied out exactly once per decoded frame.
/// Each row occupies `row_stride_bytes`; only the first `width * 3` bytes of a
/// row are pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    row_stride_bytes: usize,
    pixels: Vec<u8>,
}

impl Debug for PixelBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("row_stride_bytes", &self.row_stride_bytes)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Wrap existing pixel data.
    ///
    /// # Errors
    ///
    /// Returns [`ScrubError::InvalidPixelBuffer`] if the stride is narrower
    /// than one row of pixels or the data length is not
    /// `row_stride_bytes * height`.
    pub fn new(
        width: u32,
        height: u32,
        row_stride_bytes: usize,
        pixels: Vec<u8>,
    ) -> Result<Self, ScrubError> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if row_stride_bytes < row_bytes {
            return Err(ScrubError::InvalidPixelBuffer(format!(
                "row stride {row_stride_bytes} is smaller than {row_bytes} bytes for width {width}"
            )));
        }
        let expected = row_stride_bytes * height as usize;
        if pixels.len() != expected {
            return Err(ScrubError::InvalidPixelBuffer(format!(
                "expected {expected} bytes for {height} rows of stride {row_stride_bytes}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            row_stride_bytes,
            pixels,
        })
    }

    /// Copy an RGB24 FFmpeg frame into a tightly packed buffer.
    ///
    /// FFmpeg pads rows for alignment, so the copy strips padding row by row
    /// unless the plane is already tight.
    pub(crate) fn from_video_frame(frame: &VideoFrame) -> Result<Self, ScrubError> {
        let width = frame.width();
        let height = frame.height();
        let stride = frame.stride(0);
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let data = frame.data(0);
        let rows = height as usize;

        if stride < row_bytes || data.len() < stride * rows.saturating_sub(1) + row_bytes {
            return Err(ScrubError::VideoDecodeError(format!(
                "converted frame plane is too small for {width}x{height} RGB24"
            )));
        }

        let pixels = if stride == row_bytes {
            data[..row_bytes * rows].to_vec()
        } else {
            let mut buffer = Vec::with_capacity(row_bytes * rows);
            for row in data.chunks(stride).take(rows) {
                buffer.extend_from_slice(&row[..row_bytes]);
            }
            buffer
        };

        Self::new(width, height, row_bytes, pixels)
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Distance in bytes between the starts of consecutive rows.
    pub fn row_stride_bytes(&self) -> usize {
        self.row_stride_bytes
    }

    /// Raw bytes, including any row padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Consume the buffer and return its bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// The pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.row_stride_bytes;
        self.pixels
            .get(start..start + self.width as usize * BYTES_PER_PIXEL)
    }

    /// The RGB triple at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width {
            return None;
        }
        let offset = x as usize * BYTES_PER_PIXEL;
        let row = self.row(y)?;
        Some([row[offset], row[offset + 1], row[offset + 2]])
    }

    /// Convert to an [`image::RgbImage`], dropping row padding.
    pub fn to_rgb_image(&self) -> Result<RgbImage, ScrubError> {
        let mut packed = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                packed.extend_from_slice(row);
            }
        }
        RgbImage::from_raw(self.width, self.height, packed).ok_or_else(|| {
            ScrubError::InvalidPixelBuffer("pixel data does not fill the image".to_string())
        })
    }

    /// Save the frame as an image. The format is inferred from the extension.
    ///
    /// # Errors
    ///
    /// Returns [`ScrubError::ImageError`] if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ScrubError> {
        self.to_rgb_image()?.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded_buffer() -> PixelBuffer {
        // 2x2 image, stride 8 (2 bytes of padding per row).
        let pixels = vec![
            1, 2, 3, 4, 5, 6, 0xEE, 0xEE, //
            7, 8, 9, 10, 11, 12, 0xEE, 0xEE,
        ];
        PixelBuffer::new(2, 2, 8, pixels).unwrap()
    }

    #[test]
    fn rejects_short_stride() {
        let result = PixelBuffer::new(4, 1, 11, vec![0; 11]);
        assert!(matches!(result, Err(ScrubError::InvalidPixelBuffer(_))));
    }

    #[test]
    fn rejects_wrong_length() {
        let result = PixelBuffer::new(2, 2, 6, vec![0; 11]);
        assert!(matches!(result, Err(ScrubError::InvalidPixelBuffer(_))));
    }

    #[test]
    fn rows_and_pixels_skip_padding() {
        let buffer = padded_buffer();
        assert_eq!(buffer.row(0), Some(&[1, 2, 3, 4, 5, 6][..]));
        assert_eq!(buffer.row(1), Some(&[7, 8, 9, 10, 11, 12][..]));
        assert_eq!(buffer.row(2), None);
        assert_eq!(buffer.pixel(1, 1), Some([10, 11, 12]));
        assert_eq!(buffer.pixel(2, 0), None);
    }

    #[test]
    fn rgb_image_is_tightly_packed() {
        let image = padded_buffer().to_rgb_image().unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.into_raw(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn debug_omits_pixel_bytes() {
        let debug = format!("{:?}", padded_buffer());
        assert!(debug.contains("bytes: 16"));
        assert!(!debug.contains("238"));
    }
}
