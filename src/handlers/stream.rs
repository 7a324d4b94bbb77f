//! `GET /` - endless multipart/x-mixed-replace JPEG stream

use std::time::{Duration, Instant};

use axum::http::{header, HeaderName, HeaderValue};
use bytes::Bytes;
use tracing::{debug, error, info};

use super::part::{PartHeader, STREAM_BOUNDARY, STREAM_CONTENT_TYPE};
use crate::capture::{CaptureSource, FrameGuard, Timestamp, TranscodedJpeg};
use crate::error::StreamError;
use crate::http::ResponseWriter;
use crate::shutdown::ShutdownSignal;
use crate::StreamConfig;

/// Why a streaming session stopped.
#[derive(Debug)]
pub enum StreamEnd {
    /// A capture, transcode, header or write step failed.
    Failed(StreamError),
    /// The process is shutting down.
    Shutdown,
}

#[derive(Debug)]
pub struct StreamOutcome {
    pub frames: u64,
    pub end: StreamEnd,
}

enum StreamState {
    Serving,
    Terminated(StreamEnd),
}

/// The buffer one iteration sends, with exactly one way to dispose of it.
enum FramePayload<'a, S: CaptureSource + ?Sized> {
    /// A JPEG frame sent straight from the capture pool; released on drop.
    Original(FrameGuard<'a, S>),
    /// Encoder output for a raw frame; freed on drop.
    Transcoded(TranscodedJpeg<'a, S>),
}

impl<S: CaptureSource + ?Sized> FramePayload<'_, S> {
    fn bytes(&self) -> &Bytes {
        match self {
            FramePayload::Original(frame) => &frame.data,
            FramePayload::Transcoded(jpeg) => jpeg.bytes(),
        }
    }
}

/// Inter-frame timing for the per-frame log line.
struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    fn started_at(now: Instant) -> Self {
        Self { last: Some(now) }
    }

    /// Whole milliseconds since the previous lap.
    fn lap(&mut self, now: Instant) -> u64 {
        let elapsed = self
            .last
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last = Some(now);
        elapsed.as_millis() as u64
    }
}

fn fps(frame_ms: u64) -> f64 {
    if frame_ms == 0 {
        0.0
    } else {
        1000.0 / frame_ms as f64
    }
}

struct SentPart {
    len: usize,
    timestamp: Timestamp,
    /// From dequeue to the last byte of the part being handed off
    latency: Duration,
}

/// Serve JPEG parts until a step fails or shutdown is signalled.
///
/// Headers are set once up front. Each iteration acquires one frame, encodes
/// it if it is not already JPEG, and writes boundary, part header and payload
/// as three chunks. Exactly one buffer (the frame or the encoder output) is
/// disposed per iteration on every path.
pub fn serve_stream<S, W>(
    source: &S,
    response: &mut W,
    config: &StreamConfig,
    shutdown: &ShutdownSignal,
) -> StreamOutcome
where
    S: CaptureSource + ?Sized,
    W: ResponseWriter + ?Sized,
{
    response.set_content_type(STREAM_CONTENT_TYPE);
    response.set_header(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response.set_header(
        HeaderName::from_static("x-framerate"),
        HeaderValue::from(config.advertised_framerate),
    );

    let mut clock = FrameClock::started_at(Instant::now());
    let mut frames = 0u64;
    let mut state = StreamState::Serving;

    loop {
        state = match state {
            StreamState::Terminated(end) => return StreamOutcome { frames, end },
            StreamState::Serving if shutdown.is_triggered() => {
                StreamState::Terminated(StreamEnd::Shutdown)
            }
            StreamState::Serving => match send_part(source, response, config.jpeg_quality) {
                Ok(part) => {
                    frames += 1;
                    let frame_ms = clock.lap(Instant::now());
                    metrics::counter!("camstream_frames_sent_total").increment(1);
                    metrics::histogram!("camstream_frame_time_ms").record(frame_ms as f64);
                    metrics::histogram!("camstream_frame_latency_ms")
                        .record(part.latency.as_secs_f64() * 1000.0);
                    debug!(
                        timestamp = %part.timestamp,
                        latency_ms = part.latency.as_millis() as u64,
                        "MJPG: {}KB {}ms ({:.1}fps)",
                        part.len / 1024,
                        frame_ms,
                        fps(frame_ms)
                    );
                    StreamState::Serving
                }
                Err(e) => {
                    match &e {
                        StreamError::Write(_) => {
                            info!("Stream closed after {} frames: {}", frames, e)
                        }
                        _ => {
                            metrics::counter!("camstream_stream_aborts_total").increment(1);
                            error!("Stream aborted after {} frames: {}", frames, e)
                        }
                    }
                    StreamState::Terminated(StreamEnd::Failed(e))
                }
            },
        };
    }
}

fn send_part<S, W>(source: &S, response: &mut W, quality: u8) -> Result<SentPart, StreamError>
where
    S: CaptureSource + ?Sized,
    W: ResponseWriter + ?Sized,
{
    let frame = FrameGuard::acquire(source)?;
    let timestamp = frame.timestamp;
    let captured_at = frame.captured_at;

    let payload = if frame.is_jpeg() {
        FramePayload::Original(frame)
    } else {
        let jpeg = source.transcode_to_jpeg(&frame, quality);
        frame.release();
        FramePayload::Transcoded(TranscodedJpeg::new(source, jpeg?))
    };

    let data = payload.bytes();
    let header: PartHeader = PartHeader::render(data.len())?;

    response.send_chunk(Bytes::from_static(STREAM_BOUNDARY.as_bytes()))?;
    response.send_chunk(Bytes::copy_from_slice(header.as_bytes()))?;
    response.send_chunk(data.clone())?;

    Ok(SentPart {
        len: data.len(),
        timestamp,
        latency: captured_at.elapsed(),
    })
}
