#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use camstream::capture::{CaptureSource, Frame, FrameMetadata, PixelFormat, Timestamp};
use camstream::error::{CaptureError, TranscodeError, WriteError};
use camstream::http::ResponseWriter;
use camstream::shutdown::ShutdownSignal;

/// Everything a [`ScriptedSource`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire(u64),
    AcquireFailed,
    Release(u64),
    Transcode(u64),
    Free(usize),
}

pub enum Step {
    Frame {
        format: PixelFormat,
        len: usize,
        timestamp: Timestamp,
    },
    Fail,
}

pub fn jpeg(len: usize) -> Step {
    Step::Frame {
        format: PixelFormat::Mjpeg,
        len,
        timestamp: Timestamp::default(),
    }
}

pub fn jpeg_at(len: usize, timestamp: Timestamp) -> Step {
    Step::Frame {
        format: PixelFormat::Mjpeg,
        len,
        timestamp,
    }
}

pub fn raw(len: usize) -> Step {
    Step::Frame {
        format: PixelFormat::Yuyv4,
        len,
        timestamp: Timestamp::default(),
    }
}

/// Deterministic payload for frame `sequence`.
pub fn payload(sequence: u64, len: usize) -> Bytes {
    (0..len)
        .map(|i| (i as u64 + sequence * 7) as u8)
        .collect::<Vec<u8>>()
        .into()
}

/// Capture source that plays back a fixed list of steps and records every
/// call. Once the script runs out every acquisition fails.
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    events: Mutex<Vec<Event>>,
    sequence: Mutex<u64>,
    transcode_len: Option<usize>,
    shutdown_after: Option<(u64, ShutdownSignal)>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            events: Mutex::new(Vec::new()),
            sequence: Mutex::new(0),
            transcode_len: Some(50),
            shutdown_after: None,
        }
    }

    /// Transcoding raw frames yields `len` bytes.
    pub fn transcode_to(mut self, len: usize) -> Self {
        self.transcode_len = Some(len);
        self
    }

    pub fn failing_transcode(mut self) -> Self {
        self.transcode_len = None;
        self
    }

    /// Trigger `signal` once `frames` frames have been handed out.
    pub fn shutdown_after(mut self, frames: u64, signal: ShutdownSignal) -> Self {
        self.shutdown_after = Some((frames, signal));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl CaptureSource for ScriptedSource {
    fn acquire(&self) -> Result<Frame, CaptureError> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Fail);
        match step {
            Step::Fail => {
                self.record(Event::AcquireFailed);
                Err(CaptureError::NoFrame)
            }
            Step::Frame {
                format,
                len,
                timestamp,
            } => {
                let sequence = {
                    let mut seq = self.sequence.lock().unwrap();
                    *seq += 1;
                    *seq
                };
                self.record(Event::Acquire(sequence));
                if let Some((frames, signal)) = &self.shutdown_after {
                    if sequence >= *frames {
                        signal.trigger();
                    }
                }
                Ok(Frame {
                    data: payload(sequence, len),
                    meta: FrameMetadata {
                        sequence,
                        width: 0,
                        height: 0,
                        stride: 0,
                        format,
                    },
                    timestamp,
                    captured_at: Instant::now(),
                })
            }
        }
    }

    fn release(&self, frame: Frame) {
        self.record(Event::Release(frame.meta.sequence));
    }

    fn transcode_to_jpeg(&self, frame: &Frame, _quality: u8) -> Result<Bytes, TranscodeError> {
        self.record(Event::Transcode(frame.meta.sequence));
        match self.transcode_len {
            Some(len) => Ok(payload(frame.meta.sequence + 1000, len)),
            None => Err(TranscodeError::Unsupported(frame.meta.format)),
        }
    }

    fn free_jpeg(&self, jpeg: Bytes) {
        self.record(Event::Free(jpeg.len()));
    }
}

/// In-memory response that records every call and can fail a chosen write.
pub struct RecordingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub chunks: Vec<Bytes>,
    pub body: Option<Bytes>,
    writes: usize,
    fail_at: Option<usize>,
}

impl RecordingResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            chunks: Vec::new(),
            body: None,
            writes: 0,
            fail_at: None,
        }
    }

    /// Fail the `index`-th write (0-based, counting `send` and `send_chunk`).
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::new()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn write(&mut self) -> Result<(), WriteError> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_at == Some(index) {
            Err(WriteError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl ResponseWriter for RecordingResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    fn send(&mut self, body: Bytes) -> Result<(), WriteError> {
        self.write()?;
        self.body = Some(body);
        Ok(())
    }

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), WriteError> {
        self.write()?;
        self.chunks.push(chunk);
        Ok(())
    }
}

/// Split a recorded stream into `(header, payload)` parts, asserting the
/// boundary / header / payload chunk layout.
pub fn parts(chunks: &[Bytes]) -> Vec<(String, Bytes)> {
    assert_eq!(chunks.len() % 3, 0, "incomplete part in {} chunks", chunks.len());
    chunks
        .chunks(3)
        .map(|part| {
            assert_eq!(&part[0][..], camstream::handlers::STREAM_BOUNDARY.as_bytes());
            let header = String::from_utf8(part[1].to_vec()).unwrap();
            (header, part[2].clone())
        })
        .collect()
}

/// `Content-Length` announced by a part header.
pub fn announced_length(header: &str) -> usize {
    header
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .and_then(|v| v.trim().parse().ok())
        .unwrap()
}
