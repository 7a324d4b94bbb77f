//! Multipart framing for the MJPEG stream

use std::io::{Cursor, Write};

use crate::error::StreamError;

macro_rules! part_boundary {
    () => {
        "123456789000000000000987654321"
    };
}

/// Token shared by the stream content type and every part delimiter.
pub const PART_BOUNDARY: &str = part_boundary!();

pub const STREAM_CONTENT_TYPE: &str =
    concat!("multipart/x-mixed-replace; boundary=", part_boundary!());

/// Delimiter written before every part.
pub const STREAM_BOUNDARY: &str = concat!("\r\n--", part_boundary!(), "\r\n");

/// Size of the buffer part headers are rendered into.
pub const PART_HEADER_CAPACITY: usize = 128;

/// A part header rendered into a fixed-size buffer.
///
/// Rendering never truncates: a header that does not fit in `N` bytes is
/// reported as [`StreamError::HeaderOverflow`].
pub struct PartHeader<const N: usize = PART_HEADER_CAPACITY> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> PartHeader<N> {
    pub fn render(content_length: usize) -> Result<Self, StreamError> {
        let mut buf = [0u8; N];
        let mut cursor = Cursor::new(&mut buf[..]);

        write!(
            cursor,
            "Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            content_length
        )
        .map_err(|_| StreamError::HeaderOverflow { limit: N })?;

        let len = cursor.position() as usize;
        Ok(Self { buf, len })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}
