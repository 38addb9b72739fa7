//! Televid Cue Model
//!
//! Defines the core data contracts for caption rendering:
//! - **Cues:** Timed text units with a start, end, text, and style reference
//! - **Styles:** Named bundles of rendering parameters (font, size, colors, anchor)
//! - **Geometry:** Pixel rectangles used for layout and collision checks
//! - **Front ends:** SubRip, WebVTT, and JSON cue sources
//!
//! Cue times are `std::time::Duration` offsets from the start of the video.
//! Tracks are always sorted by start time, ties keeping input order.

pub mod cue;
pub mod geometry;
pub mod json;
pub mod srt;
pub mod style;
pub mod timestamp;
pub mod vtt;

pub use cue::*;
pub use geometry::*;
pub use style::*;
