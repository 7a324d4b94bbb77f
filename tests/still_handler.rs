mod common;

use axum::http::StatusCode;
use camstream::capture::Timestamp;
use camstream::error::{CaptureError, StillError, WriteError};
use camstream::handlers::capture_still;
use common::{jpeg, jpeg_at, payload, raw, Event, RecordingResponse, ScriptedSource};

#[test]
fn test_jpeg_frame_is_sent_whole() {
    let source = ScriptedSource::new(vec![jpeg_at(100, Timestamp::new(10, 500_000))]);
    let mut response = RecordingResponse::new();

    let sent = capture_still(&source, &mut response).unwrap();

    assert_eq!(sent, 100);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/jpeg"));
    assert_eq!(
        response.header("content-disposition"),
        Some("inline; filename=capture.jpg")
    );
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert_eq!(response.header("x-timestamp"), Some("10.500000"));
    assert_eq!(response.body, Some(payload(1, 100)));
    assert!(response.chunks.is_empty());
    assert_eq!(source.events(), vec![Event::Acquire(1), Event::Release(1)]);
}

#[test]
fn test_raw_frame_gets_no_body() {
    let source = ScriptedSource::new(vec![raw(640)]);
    let mut response = RecordingResponse::new();

    let sent = capture_still(&source, &mut response).unwrap();

    assert_eq!(sent, 0);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, None);
    assert!(response.chunks.is_empty());
    // No encoding on this route
    assert_eq!(source.events(), vec![Event::Acquire(1), Event::Release(1)]);
}

#[test]
fn test_capture_failure_is_server_error_without_release() {
    let source = ScriptedSource::new(vec![]);
    let mut response = RecordingResponse::new();

    let err = capture_still(&source, &mut response).unwrap_err();

    assert!(matches!(err, StillError::Capture(CaptureError::NoFrame)));
    assert!(response.status.is_server_error());
    assert_eq!(response.body.as_deref(), Some(&b""[..]));
    assert_eq!(response.header("x-timestamp"), None);
    assert_eq!(source.events(), vec![Event::AcquireFailed]);
}

#[test]
fn test_write_failure_still_releases_frame() {
    let source = ScriptedSource::new(vec![jpeg(32)]);
    let mut response = RecordingResponse::failing_at(0);

    let err = capture_still(&source, &mut response).unwrap_err();

    assert!(matches!(err, StillError::Write(WriteError::Disconnected)));
    assert_eq!(source.events(), vec![Event::Acquire(1), Event::Release(1)]);
}

#[test]
fn test_each_request_takes_one_frame() {
    let source = ScriptedSource::new(vec![jpeg(3), jpeg(4)]);

    for expected in [3, 4] {
        let mut response = RecordingResponse::new();
        assert_eq!(capture_still(&source, &mut response).unwrap(), expected);
    }
    assert_eq!(source.count(|e| matches!(e, Event::Release(_))), 2);
}
