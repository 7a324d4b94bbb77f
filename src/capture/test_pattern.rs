//! Synthetic camera for running without hardware

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use tracing::{info, trace};

use crate::capture::encoder;
use crate::capture::frame::{Frame, FrameMetadata, PixelFormat, Timestamp};
use crate::capture::CaptureSource;
use crate::error::{CaptureError, TranscodeError};
use crate::CaptureConfig;

/// Generates a moving gradient in the configured pixel format.
///
/// MJPEG output is encoded per frame so the stream path sees real JPEGs.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: AtomicU64,
    epoch: Instant,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        info!("Test pattern source: {}x{} {:?}", width, height, format);
        Self {
            width,
            height,
            format,
            sequence: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.width, config.height, config.format)
    }

    fn render(&self, sequence: u64) -> Result<Bytes, TranscodeError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (sequence % 256) as usize;

        let gray = |x: usize, y: usize| {
            let ramp = x * 255 / w.max(1) + y * 255 / h.max(1);
            ((ramp / 2 + shift) % 256) as u8
        };

        let raw_format = match self.format {
            PixelFormat::Mjpeg => PixelFormat::Rgb24,
            other => other,
        };
        let stride = raw_format.min_stride(self.width).unwrap_or(0);
        let len = raw_format.frame_len(stride, self.height).unwrap_or(0);
        let mut data = Vec::with_capacity(len);

        match raw_format {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                for y in 0..h {
                    for x in 0..w {
                        let v = gray(x, y);
                        data.extend_from_slice(&[v, v.wrapping_add(85), v.wrapping_add(170)]);
                    }
                }
            }
            PixelFormat::Gray8 => {
                for y in 0..h {
                    for x in 0..w {
                        data.push(gray(x, y));
                    }
                }
            }
            PixelFormat::Yuyv4 => {
                // Odd widths still fill the last macropixel
                for y in 0..h {
                    for x in (0..stride / 2).step_by(2) {
                        data.extend_from_slice(&[gray(x, y), 128, gray(x + 1, y), 128]);
                    }
                }
            }
            PixelFormat::Nv12 => {
                for y in 0..h {
                    for x in 0..stride {
                        data.push(gray(x, y));
                    }
                }
                data.resize(len, 128);
            }
            PixelFormat::Mjpeg => unreachable!("mapped to Rgb24 above"),
        }
        data.resize(len, 0);

        if self.format.is_jpeg() {
            let raw = Frame {
                data: Bytes::from(data),
                meta: self.metadata(sequence, raw_format),
                timestamp: Timestamp::default(),
                captured_at: Instant::now(),
            };
            encoder::frame_to_jpeg(&raw, 90)
        } else {
            Ok(Bytes::from(data))
        }
    }

    fn metadata(&self, sequence: u64, format: PixelFormat) -> FrameMetadata {
        FrameMetadata {
            sequence,
            width: self.width,
            height: self.height,
            stride: format.min_stride(self.width).unwrap_or(0) as u32,
            format,
        }
    }
}

impl CaptureSource for TestPatternSource {
    fn acquire(&self) -> Result<Frame, CaptureError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let data = self
            .render(sequence)
            .map_err(|e| CaptureError::Device(std::io::Error::other(e)))?;

        Ok(Frame {
            data,
            meta: self.metadata(sequence, self.format),
            timestamp: Timestamp::from_duration(self.epoch.elapsed()),
            captured_at: Instant::now(),
        })
    }

    fn release(&self, frame: Frame) {
        trace!(sequence = frame.meta.sequence, "frame released");
    }
}
