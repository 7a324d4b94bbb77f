//! Capture source contract and the scope guards that enforce its
//! acquire/release pairing.

use std::ops::Deref;

use bytes::Bytes;

use super::encoder;
use super::frame::Frame;
use crate::error::{CaptureError, TranscodeError};

/// A shared pool of camera frame buffers.
///
/// Implementations arbitrate concurrent access themselves; handlers take no
/// lock around `acquire`/`release`.
pub trait CaptureSource: Send + Sync {
    /// Block until a frame is available, or fail fast if none can be had.
    fn acquire(&self) -> Result<Frame, CaptureError>;

    /// Hand a frame's buffer back to the pool.
    fn release(&self, frame: Frame);

    /// Encode a raw frame into a newly owned JPEG buffer.
    fn transcode_to_jpeg(&self, frame: &Frame, quality: u8) -> Result<Bytes, TranscodeError> {
        encoder::frame_to_jpeg(frame, quality)
    }

    /// Dispose of a buffer produced by [`transcode_to_jpeg`](Self::transcode_to_jpeg).
    fn free_jpeg(&self, jpeg: Bytes) {
        drop(jpeg);
    }
}

/// An acquired frame that is released back to its source when dropped.
pub struct FrameGuard<'a, S: CaptureSource + ?Sized> {
    source: &'a S,
    frame: Option<Frame>,
}

impl<'a, S: CaptureSource + ?Sized> FrameGuard<'a, S> {
    pub fn acquire(source: &'a S) -> Result<Self, CaptureError> {
        let frame = source.acquire()?;
        Ok(Self {
            source,
            frame: Some(frame),
        })
    }

    /// Release now instead of at end of scope.
    pub fn release(mut self) {
        if let Some(frame) = self.frame.take() {
            self.source.release(frame);
        }
    }
}

impl<S: CaptureSource + ?Sized> Deref for FrameGuard<'_, S> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        // Only `release` and `drop` take the frame, and both consume the guard.
        match &self.frame {
            Some(frame) => frame,
            None => unreachable!("frame guard used after release"),
        }
    }
}

impl<S: CaptureSource + ?Sized> Drop for FrameGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.source.release(frame);
        }
    }
}

/// A transcoded JPEG buffer that is freed through its source when dropped.
pub struct TranscodedJpeg<'a, S: CaptureSource + ?Sized> {
    source: &'a S,
    jpeg: Option<Bytes>,
}

impl<'a, S: CaptureSource + ?Sized> TranscodedJpeg<'a, S> {
    pub fn new(source: &'a S, jpeg: Bytes) -> Self {
        Self {
            source,
            jpeg: Some(jpeg),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match &self.jpeg {
            Some(jpeg) => jpeg,
            None => unreachable!("transcoded buffer used after free"),
        }
    }
}

impl<S: CaptureSource + ?Sized> Drop for TranscodedJpeg<'_, S> {
    fn drop(&mut self) {
        if let Some(jpeg) = self.jpeg.take() {
            self.source.free_jpeg(jpeg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingSource {
        acquired: AtomicUsize,
        released: AtomicUsize,
        freed: AtomicUsize,
    }

    impl CaptureSource for CountingSource {
        fn acquire(&self) -> Result<Frame, CaptureError> {
            let seq = self.acquired.fetch_add(1, Ordering::SeqCst) as u64;
            Ok(Frame {
                data: Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
                meta: FrameMetadata {
                    sequence: seq,
                    width: 1,
                    height: 1,
                    stride: 1,
                    format: PixelFormat::Mjpeg,
                },
                timestamp: Timestamp::default(),
                captured_at: Instant::now(),
            })
        }

        fn release(&self, _frame: Frame) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn free_jpeg(&self, _jpeg: Bytes) {
            self.freed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let source = CountingSource::default();
        {
            let guard = FrameGuard::acquire(&source).unwrap();
            assert_eq!(guard.len(), 4);
        }
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_release_happens_once() {
        let source = CountingSource::default();
        let guard = FrameGuard::acquire(&source).unwrap();
        guard.release();
        assert_eq!(source.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transcoded_buffer_freed_on_drop() {
        let source = CountingSource::default();
        let jpeg = TranscodedJpeg::new(&source, Bytes::from_static(b"jpeg"));
        assert_eq!(jpeg.bytes().len(), 4);
        drop(jpeg);
        assert_eq!(source.freed.load(Ordering::SeqCst), 1);
        assert_eq!(source.released.load(Ordering::SeqCst), 0);
    }
}
