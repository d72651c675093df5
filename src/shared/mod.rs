//! Shared utilities used across the SpeedScale backend.
//!
//! Small helpers for target normalization, payload size labels and
//! phase-by-phase request timing.

pub mod size;
pub mod target;
pub mod timing;

pub use size::{content_length, size_label};
pub use target::normalize_target;
pub use timing::DetailedTiming;
