pub mod part;
pub mod still;
pub mod stream;

pub use part::{PartHeader, PART_BOUNDARY, STREAM_BOUNDARY, STREAM_CONTENT_TYPE};
pub use still::capture_still;
pub use stream::{serve_stream, StreamEnd, StreamOutcome};
