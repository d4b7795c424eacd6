//! Sublinear-memory frequency and weight summaries.
//!
//! Three table shapes over the same `depth × width` geometry
//! (`width = 2^log2_width`, rows indexed by independent hashes):
//!
//! - [`CountMinSketch`] — unsigned counters, row-minimum estimate.
//! - [`CountSketch`] — signed f32 cells with per-key Rademacher signs,
//!   median-of-rows estimate.
//! - [`PairedCountMin`] — two half-width Count-Min tables tracking
//!   per-class counts; queries return a smoothed likelihood ratio.
//!
//! Tables are flat contiguous buffers with arithmetic row offsets.

mod count_min;
mod count_sketch;
mod paired;

pub use count_min::CountMinSketch;
pub use count_sketch::CountSketch;
pub use paired::PairedCountMin;

pub(crate) use count_sketch::sign_of;

/// Largest supported `log2_width`. Capped so the hash high bit is never
/// part of a bucket index and stays available as a sign bit.
pub const MAX_LOG2_WIDTH: u32 = 30;
