//! V4L2 capture over memory-mapped driver buffers

use std::io;
use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;
use tracing::{info, instrument, trace};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::{
    capture::frame::{Frame, FrameMetadata, PixelFormat, Timestamp},
    capture::CaptureSource,
    error::CaptureError,
    CaptureConfig,
};

/// V4L2 camera shared by every request.
///
/// The mmap stream sits behind a mutex; concurrent `acquire` calls queue on it
/// in whatever order the lock grants.
pub struct V4l2Capture {
    device: Box<Device>,
    stream: Mutex<Option<Stream>>,
    config: CaptureConfig,
    /// Negotiated bytes per line
    stride: u32,
}

struct Stream {
    mmap: MmapStream<'static>,
    sequence: u64,
    meta: FrameMetadata,
}

fn fourcc(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
        PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
        PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        PixelFormat::Bgr24 => FourCC::new(b"BGR3"),
        PixelFormat::Nv12 => FourCC::new(b"NV12"),
        PixelFormat::Gray8 => FourCC::new(b"GREY"),
    }
}

/// Compressed formats carry no line pitch.
fn line_stride(format: PixelFormat, bytes_per_line: u32) -> u32 {
    if format.is_jpeg() {
        0
    } else {
        bytes_per_line
    }
}

impl V4l2Capture {
    /// Open the device and negotiate the configured format
    pub fn new(config: CaptureConfig) -> io::Result<Self> {
        info!("Initializing V4L2 capture: {:?}", config.device);

        let device = Device::with_path(&config.device.path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "device doesn't support video capture",
            ));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = fourcc(config.format);

        let actual = device.set_format(&fmt)?;
        if actual.fourcc != fmt.fourcc {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("device refused {} (offered {})", fmt.fourcc, actual.fourcc),
            ));
        }
        info!(
            "Negotiated {}x{} {} (stride {})",
            actual.width, actual.height, actual.fourcc, actual.stride
        );

        if config.fps > 0 {
            let params = device.set_params(&Parameters::with_fps(config.fps))?;
            info!("Frame interval: {:?}", params.interval);
        }

        let stride = line_stride(config.format, actual.stride);
        let mut config = config;
        config.width = actual.width;
        config.height = actual.height;

        Ok(Self {
            device: Box::new(device),
            stream: Mutex::new(None),
            config,
            stride,
        })
    }

    /// Start streaming with memory-mapped buffers
    pub fn start_stream(&self) -> io::Result<()> {
        let mmap =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.config.buffer_count)?;

        let meta = FrameMetadata {
            sequence: 0,
            width: self.config.width,
            height: self.config.height,
            stride: self.stride,
            format: self.config.format,
        };

        let mut guard = self
            .stream
            .lock()
            .map_err(|_| io::Error::other("capture lock poisoned"))?;
        *guard = Some(Stream {
            mmap,
            sequence: 0,
            meta,
        });

        info!(
            "Capture stream started with {} buffers",
            self.config.buffer_count
        );
        Ok(())
    }
}

impl CaptureSource for V4l2Capture {
    /// Dequeue the next filled buffer and copy it out of the driver's mapping
    #[instrument(skip(self))]
    fn acquire(&self) -> Result<Frame, CaptureError> {
        let mut guard = self.stream.lock().map_err(|_| CaptureError::Poisoned)?;
        let stream = guard.as_mut().ok_or(CaptureError::NotStarted)?;

        let (buf, meta) = stream.mmap.next()?;
        let captured_at = Instant::now();

        let used = (meta.bytesused as usize).min(buf.len());
        if used == 0 {
            return Err(CaptureError::NoFrame);
        }
        let data = Bytes::copy_from_slice(&buf[..used]);
        let timestamp = Timestamp::new(meta.timestamp.sec as i64, meta.timestamp.usec as u32);

        stream.sequence += 1;

        Ok(Frame {
            data,
            meta: FrameMetadata {
                sequence: stream.sequence,
                ..stream.meta
            },
            timestamp,
            captured_at,
        })
    }

    /// The driver buffer was requeued on dequeue; only the copy is dropped here
    fn release(&self, frame: Frame) {
        trace!(sequence = frame.meta.sequence, "frame released");
    }
}
