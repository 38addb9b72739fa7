//! Job timing utilities.
//!
//! Every render job is anchored to a [`JobClock`] taken when the job is
//! created. This module provides:
//! - Unique job identifiers (used to namespace temporary files)
//! - Elapsed-time measurement for logs and reports
//! - Wall-clock deadlines for external engine invocations

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a job identifier unique within this host.
///
/// Format: `<utc timestamp>-<pid>-<counter>`, safe to embed in file names.
pub fn new_job_id() -> String {
    let seq = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-{}-{seq}",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
        std::process::id()
    )
}

/// A clock anchored to the moment a job started.
#[derive(Debug, Clone)]
pub struct JobClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl JobClock {
    /// Create a new job clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time elapsed since the job started.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at job start.
    pub fn started_at(&self) -> &str {
        &self.epoch_wall
    }
}

/// A point in monotonic time after which an operation must stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
        }
    }

    /// Time left before expiry (zero once expired).
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Convert fractional seconds to a duration, rejecting negative, non-finite,
/// or out-of-range input.
pub fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = JobClock::start();
        assert!(clock.elapsed() < Duration::from_secs(1));
        assert!(!clock.started_at().is_empty());
    }

    #[test]
    fn test_job_ids_are_unique_and_path_safe() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == 'T' || c == 'Z'));
    }

    #[test]
    fn test_deadline_expiry() {
        let expired = Deadline::after(Duration::ZERO);
        assert!(expired.is_expired());
        assert_eq!(expired.remaining(), Duration::ZERO);

        let later = Deadline::after(Duration::from_secs(60));
        assert!(!later.is_expired());
        assert!(later.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn test_secs_conversion() {
        assert_eq!(secs_to_duration(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(secs_to_duration(-1.0), None);
        assert_eq!(secs_to_duration(f64::NAN), None);
        assert_eq!(secs_to_duration(1e20), None);
        assert_eq!(secs_to_duration(f64::INFINITY), None);
    }
}
