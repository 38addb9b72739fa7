//! Televid Common Utilities
//!
//! Shared infrastructure for all televid crates:
//! - Error kinds and result aliases
//! - Job identifiers, deadlines, and timestamp helpers
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
