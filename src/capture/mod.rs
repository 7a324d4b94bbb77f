pub mod encoder;
pub mod frame;
pub mod source;
pub mod test_pattern;
pub mod v4l2;

pub use frame::{Frame, FrameMetadata, PixelFormat, Timestamp};
pub use source::{CaptureSource, FrameGuard, TranscodedJpeg};
pub use test_pattern::TestPatternSource;
pub use v4l2::V4l2Capture;
