//! Response-writing contract the frame handlers are written against.

pub mod channel;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;

use crate::error::WriteError;

pub use channel::{channel_response, ChannelResponse, PendingResponse};

/// A single HTTP response being produced by a blocking handler.
///
/// Status and headers may be changed until the first body write commits them.
pub trait ResponseWriter {
    fn set_status(&mut self, status: StatusCode);

    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    fn set_content_type(&mut self, value: &'static str) {
        self.set_header(header::CONTENT_TYPE, HeaderValue::from_static(value));
    }

    /// Send the complete body in one call and finish the response.
    fn send(&mut self, body: Bytes) -> Result<(), WriteError>;

    /// Append one chunk of a body whose length is not known up front.
    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), WriteError>;
}
