//! Transcript segmentation for map-reduce analysis.
//!
//! Long transcripts do not fit a single model call; they are cut into ordered,
//! bounded segments that are summarized one by one.

mod segmenter;

pub use segmenter::split_transcript;
