use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// One capture result, owned by its capture source until released.
///
/// Deliberately not `Clone`: a frame is handed back to its source exactly once
/// through [`CaptureSource::release`](super::CaptureSource::release), which
/// takes it by value.
pub struct Frame {
    /// Pixel buffer - shared with the source's pool, never copied on the JPEG path
    pub data: Bytes,

    /// Frame metadata
    pub meta: FrameMetadata,

    /// Capture timestamp reported by the device
    pub timestamp: Timestamp,

    /// Host instant the frame was dequeued, for capture-to-send latency
    pub captured_at: Instant,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn format(&self) -> PixelFormat {
        self.meta.format
    }

    pub fn is_jpeg(&self) -> bool {
        self.meta.format.is_jpeg()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("meta", &self.meta)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per line of the first plane, padding included. Zero for JPEG.
    pub stride: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv4,
    Mjpeg,
    Nv12,
    Gray8,
}

impl PixelFormat {
    /// Whether buffers in this format are already JPEG-encoded.
    pub fn is_jpeg(self) -> bool {
        matches!(self, PixelFormat::Mjpeg)
    }

    /// Smallest bytes-per-line a `width` pixel row can occupy, `None` for
    /// compressed formats.
    ///
    /// YUYV packs two pixels per four bytes and NV12 shares its line pitch with
    /// the interleaved chroma plane, so both round odd widths up to even.
    pub fn min_stride(self, width: u32) -> Option<usize> {
        let w = width as usize;
        let even = w + (w & 1);
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(w * 3),
            PixelFormat::Yuyv4 => Some(even * 2),
            PixelFormat::Nv12 => Some(even),
            PixelFormat::Gray8 => Some(w),
            PixelFormat::Mjpeg => None,
        }
    }

    /// Buffer size of a raw frame with `stride` bytes per line.
    pub fn frame_len(self, stride: usize, height: u32) -> Option<usize> {
        let h = height as usize;
        match self {
            // Half-height chroma plane at the same pitch
            PixelFormat::Nv12 => Some(stride * h + stride * h.div_ceil(2)),
            PixelFormat::Mjpeg => None,
            _ => Some(stride * h),
        }
    }

    /// Buffer size of a tightly packed raw frame, `None` for compressed formats.
    pub fn raw_len(self, width: u32, height: u32) -> Option<usize> {
        self.frame_len(self.min_stride(width)?, height)
    }
}

/// Capture timestamp as seconds plus microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub micros: u32,
}

impl Timestamp {
    pub fn new(secs: i64, micros: u32) -> Self {
        Self {
            secs: secs + i64::from(micros / 1_000_000),
            micros: micros % 1_000_000,
        }
    }

    pub fn from_duration(d: Duration) -> Self {
        Self {
            secs: d.as_secs() as i64,
            micros: d.subsec_micros(),
        }
    }
}

/// Renders `<secs>.<micros>` with the microseconds zero-padded to six digits.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}
