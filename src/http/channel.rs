//! Bridges a blocking handler to an axum response.
//!
//! The handler runs on the blocking pool and writes into a [`ChannelResponse`];
//! the async route awaits the [`PendingResponse`] for the committed status and
//! headers, then streams the body chunks as they arrive. Chunk channels hold a
//! single chunk, so a slow client blocks the handler's next write, and a client
//! that has gone away makes it fail.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use flume::{Receiver, Sender};
use tokio_stream::StreamExt;
use tracing::warn;

use super::ResponseWriter;
use crate::error::WriteError;

struct Head {
    status: StatusCode,
    headers: HeaderMap,
}

/// Writer half, owned by the blocking handler.
///
/// Dropping it commits the head if nothing was written and ends the body, so
/// the body only completes once the handler has returned.
pub struct ChannelResponse {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<Sender<Head>>,
    body_tx: Sender<Bytes>,
    complete: bool,
}

/// Reader half, awaited by the async route.
pub struct PendingResponse {
    head_rx: Receiver<Head>,
    body_rx: Receiver<Bytes>,
}

pub fn channel_response() -> (ChannelResponse, PendingResponse) {
    let (head_tx, head_rx) = flume::bounded(1);
    let (body_tx, body_rx) = flume::bounded(1);

    (
        ChannelResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx,
            complete: false,
        },
        PendingResponse { head_rx, body_rx },
    )
}

impl ChannelResponse {
    fn committed(&self) -> bool {
        self.head_tx.is_none()
    }

    fn commit(&mut self) -> Result<(), WriteError> {
        if let Some(tx) = self.head_tx.take() {
            let head = Head {
                status: self.status,
                headers: std::mem::take(&mut self.headers),
            };
            tx.send(head).map_err(|_| WriteError::Disconnected)?;
        }
        Ok(())
    }
}

impl ResponseWriter for ChannelResponse {
    fn set_status(&mut self, status: StatusCode) {
        if self.committed() {
            warn!("status {} set after response was committed", status);
            return;
        }
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.committed() {
            warn!("header {} set after response was committed", name);
            return;
        }
        self.headers.insert(name, value);
    }

    fn send(&mut self, body: Bytes) -> Result<(), WriteError> {
        if self.complete {
            return Err(WriteError::Completed);
        }
        self.complete = true;
        if !self.committed() {
            self.headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        self.commit()?;
        if !body.is_empty() {
            self.body_tx
                .send(body)
                .map_err(|_| WriteError::Disconnected)?;
        }
        Ok(())
    }

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), WriteError> {
        if self.complete {
            return Err(WriteError::Completed);
        }
        self.commit()?;
        self.body_tx
            .send(chunk)
            .map_err(|_| WriteError::Disconnected)
    }
}

impl Drop for ChannelResponse {
    fn drop(&mut self) {
        let _ = self.commit();
    }
}

impl PendingResponse {
    /// Wait for the handler to commit its head and build the streaming response.
    ///
    /// A handler that exits without committing (it panicked) yields a 500.
    pub async fn into_response(self) -> Response {
        let head = match self.head_rx.recv_async().await {
            Ok(head) => head,
            Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };

        let chunks = self.body_rx.into_stream().map(Ok::<_, Infallible>);
        let mut response = Response::new(Body::from_stream(chunks));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}
