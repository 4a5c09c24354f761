//! FFmpeg-backed probing and trimming.
//!
//! Everything here blocks; callers run it on the blocking pool.

pub mod probe;
pub mod trim;

pub use probe::{VideoInfo, probe};
pub use trim::{Codecs, RangeError, TrimRange, trim, trimmed_filename};

pub(crate) const MICROS_PER_SEC: f64 = 1_000_000.0;
