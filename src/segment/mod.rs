#[allow(clippy::module_inception)]
mod segment;

pub use segment::{Claim, Segment, SegmentStats};
