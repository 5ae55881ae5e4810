//! Numeric core: typed arrays, distance functions and video frames

/// Runtime-typed N-dimensional arrays.
pub mod array;
/// Distances between vectors and histograms.
pub mod distance;
/// Video frame I/O through ffmpeg.
#[cfg(feature = "video")]
pub mod video;
