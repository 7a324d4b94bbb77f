use std::io;

use thiserror::Error;

use crate::capture::PixelFormat;

/// No frame could be obtained from the capture source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no frame buffer available")]
    NoFrame,

    #[error("no suitable capture device found")]
    NoDevice,

    #[error("capture stream not started")]
    NotStarted,

    #[error("device error: {0}")]
    Device(#[from] io::Error),

    #[error("capture source lock poisoned")]
    Poisoned,
}

/// Converting a raw frame into JPEG failed.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("unsupported pixel format for JPEG encoding: {0:?}")]
    Unsupported(PixelFormat),

    #[error("{format:?} frame of {width}x{height} needs {expected} bytes, got {actual}")]
    BufferSize {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{format:?} line of {width} pixels needs a stride of {min} bytes, got {stride}")]
    Stride {
        format: PixelFormat,
        width: u32,
        stride: usize,
        min: usize,
    },

    #[error("JPEG encoder failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// A response write was rejected, usually because the peer went away.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("client disconnected")]
    Disconnected,

    #[error("response already completed")]
    Completed,

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal failure of a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("camera capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("JPEG compression failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("part header exceeds {limit} bytes")]
    HeaderOverflow { limit: usize },

    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

/// Failure of a single still capture.
#[derive(Debug, Error)]
pub enum StillError {
    #[error("camera capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("invalid header value: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),

    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

/// Startup failures of the HTTP listener. Always fatal.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address {addr}: {source}")]
    Address {
        addr: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}
