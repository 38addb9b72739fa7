//! Televid Font Resolver
//!
//! Maps style names to concrete, loadable font files and exposes text
//! metrics for layout. Lookups are pure: fonts are read from local asset
//! paths only, parsed once, and shared read-only between jobs.

pub mod metrics;
pub mod resolver;

pub use metrics::*;
pub use resolver::*;
