//! `GET /jpg` - a single still capture

use std::time::Instant;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use tracing::{error, info, warn};

use crate::capture::{CaptureSource, FrameGuard};
use crate::error::StillError;
use crate::http::ResponseWriter;

/// Capture one frame and send it as the whole response body.
///
/// Only frames the camera already delivers as JPEG get a body; raw frames are
/// not encoded here and produce a 200 with no payload. Returns the number of
/// body bytes sent.
pub fn capture_still<S, W>(source: &S, response: &mut W) -> Result<usize, StillError>
where
    S: CaptureSource + ?Sized,
    W: ResponseWriter + ?Sized,
{
    let started = Instant::now();

    let frame = match FrameGuard::acquire(source) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Camera capture failed: {}", e);
            metrics::counter!("camstream_capture_failures_total").increment(1);
            response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            if let Err(write_err) = response.send(Bytes::new()) {
                warn!("Failed to send capture error response: {}", write_err);
            }
            return Err(e.into());
        }
    };

    response.set_content_type("image/jpeg");
    response.set_header(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline; filename=capture.jpg"),
    );
    response.set_header(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response.set_header(
        HeaderName::from_static("x-timestamp"),
        HeaderValue::from_str(&frame.timestamp.to_string())?,
    );

    let (sent, result) = if frame.is_jpeg() {
        (frame.len(), response.send(frame.data.clone()))
    } else {
        warn!(
            "Frame format {:?} is not JPEG, responding without a body",
            frame.format()
        );
        (0, Ok(()))
    };
    frame.release();

    info!("JPG: {}B {}ms", sent, started.elapsed().as_millis());
    result?;

    metrics::counter!("camstream_stills_sent_total").increment(1);
    Ok(sent)
}
