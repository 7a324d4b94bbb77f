//! Raw frame to JPEG conversion

use std::borrow::Cow;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use super::frame::{Frame, PixelFormat};
use crate::error::TranscodeError;

/// Encode `frame` as a baseline JPEG at `quality` (1-100).
///
/// JPEG frames are passed through untouched; the result then shares the
/// frame's buffer. Raw frames are read line by line at `meta.stride`, so
/// drivers that pad their lines encode correctly.
pub fn frame_to_jpeg(frame: &Frame, quality: u8) -> Result<Bytes, TranscodeError> {
    let format = frame.meta.format;
    let (width, height) = (frame.meta.width, frame.meta.height);

    let Some(min_stride) = format.min_stride(width) else {
        return Ok(frame.data.clone());
    };
    // Lines are walked in stride steps, so even an empty line needs one byte
    let min_stride = min_stride.max(1);
    let stride = frame.meta.stride as usize;
    if stride < min_stride {
        return Err(TranscodeError::Stride {
            format,
            width,
            stride,
            min: min_stride,
        });
    }

    let expected = format.frame_len(stride, height).unwrap_or(0);
    if frame.data.len() < expected {
        return Err(TranscodeError::BufferSize {
            format,
            width,
            height,
            expected,
            actual: frame.data.len(),
        });
    }
    let data = &frame.data[..expected];
    let (w, h) = (width as usize, height as usize);

    let mut out = Vec::with_capacity(expected / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));

    match format {
        PixelFormat::Rgb24 => {
            let rgb = packed_lines(data, stride, w * 3, h);
            encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?
        }
        PixelFormat::Gray8 => {
            let luma = packed_lines(data, stride, w, h);
            encoder.encode(&luma, width, height, ExtendedColorType::L8)?
        }
        PixelFormat::Bgr24 => {
            let rgb = bgr_to_rgb(&packed_lines(data, stride, w * 3, h));
            encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?
        }
        PixelFormat::Yuyv4 => {
            let rgb = yuyv_to_rgb(data, stride, w, h);
            encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?
        }
        PixelFormat::Nv12 => {
            let rgb = nv12_to_rgb(data, stride, w, h);
            encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?
        }
        PixelFormat::Mjpeg => return Err(TranscodeError::Unsupported(format)),
    }
    drop(encoder);

    Ok(Bytes::from(out))
}

/// The first `line_len` bytes of each of `height` lines, without padding.
fn packed_lines(data: &[u8], stride: usize, line_len: usize, height: usize) -> Cow<'_, [u8]> {
    if stride == line_len {
        return Cow::Borrowed(&data[..line_len * height]);
    }
    let mut packed = Vec::with_capacity(line_len * height);
    for line in data.chunks(stride).take(height) {
        packed.extend_from_slice(&line[..line_len]);
    }
    Cow::Owned(packed)
}

fn bgr_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len());
    for px in data.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}

/// BT.601 limited-range YUV to RGB, integer arithmetic.
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    [
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    ]
}

fn yuyv_to_rgb(data: &[u8], stride: usize, width: usize, height: usize) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width * height * 3);
    for line in data.chunks(stride).take(height) {
        // Y0 U Y1 V covers two pixels; an odd width drops the last Y1
        for (i, px) in line.chunks_exact(4).take(width.div_ceil(2)).enumerate() {
            let (y0, u, y1, v) = (px[0], px[1], px[2], px[3]);
            rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
            if 2 * i + 1 < width {
                rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
            }
        }
    }
    rgb
}

fn nv12_to_rgb(data: &[u8], stride: usize, width: usize, height: usize) -> Vec<u8> {
    let (luma, chroma) = data.split_at(stride * height);
    let mut rgb = Vec::with_capacity(width * height * 3);

    for row in 0..height {
        let y_line = row * stride;
        let uv_line = (row / 2) * stride;
        for col in 0..width {
            let y = luma[y_line + col];
            let uv = uv_line + (col & !1);
            let (u, v) = (chroma[uv], chroma[uv + 1]);
            rgb.extend_from_slice(&yuv_to_rgb(y, u, v));
        }
    }
    rgb
}
