//! Performance profiling utilities
//!
//! Only active when the `perf_stats` feature is enabled.

pub use wayfarer_macros::profile;
