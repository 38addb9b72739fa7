//! Error types shared across televid crates.
//!
//! Every variant is scoped to a single render job; none of them is fatal to
//! the process, so a caller running several jobs can keep going after one
//! fails.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for televid operations.
#[derive(Debug, thiserror::Error)]
pub enum TelevidError {
    #[error("Malformed cue #{index}: {reason}")]
    MalformedCue {
        /// Zero-based position of the cue in its source.
        index: usize,
        /// 1-based source line, when the front end knows it.
        line: Option<usize>,
        reason: String,
    },

    #[error("Unknown style: {name}")]
    UnknownStyle { name: String },

    #[error("Font asset '{font}' unavailable at {path}: {reason}")]
    FontAssetMissing {
        font: String,
        path: PathBuf,
        reason: String,
    },

    #[error(
        "Cues #{first} and #{second} overlap on frames {from}..={to} and their text regions collide"
    )]
    OverlapConflict {
        first: usize,
        second: usize,
        from: u64,
        to: u64,
    },

    #[error("Input video {path} is not usable: {reason}")]
    InputVideoInvalid { path: PathBuf, reason: String },

    #[error("Transcode timed out after {:.1}s: {}", .timeout.as_secs_f64(), tail(.diagnostics))]
    TranscodeTimeout {
        timeout: Duration,
        diagnostics: String,
    },

    #[error("Transcode failed ({status}): {}", tail(.diagnostics))]
    TranscodeFailed { status: String, diagnostics: String },

    #[error("Transcode reported success but {path} is missing or empty: {}", tail(.diagnostics))]
    TranscodeOutputMissing { path: PathBuf, diagnostics: String },

    #[error("Output exceeded the {limit} byte limit ({actual} bytes written)")]
    OutputTooLarge { limit: u64, actual: u64 },

    #[error("Render cancelled: {}", tail(.diagnostics))]
    Cancelled { diagnostics: String },

    #[error("Media engine '{program}' is not available: {reason}")]
    EngineUnavailable { program: String, reason: String },

    #[error("Job {job_id} failed during {stage}: {source}")]
    JobFailed {
        job_id: String,
        stage: JobStage,
        #[source]
        source: Box<TelevidError>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TelevidError.
pub type TelevidResult<T> = Result<T, TelevidError>;

/// Pipeline stage a job was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Validate,
    ParseCues,
    BuildSpec,
    Transcode,
    Finalize,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Validate => "validate",
            JobStage::ParseCues => "parse_cues",
            JobStage::BuildSpec => "build_spec",
            JobStage::Transcode => "transcode",
            JobStage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest engine diagnostic tail carried in a Display message.
const DIAGNOSTIC_TAIL_CHARS: usize = 1000;

fn tail(diagnostics: &str) -> &str {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        return "<no diagnostics>";
    }
    let char_count = trimmed.chars().count();
    if char_count <= DIAGNOSTIC_TAIL_CHARS {
        return trimmed;
    }
    let skip = char_count - DIAGNOSTIC_TAIL_CHARS;
    let offset = trimmed
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &trimmed[offset..]
}

impl TelevidError {
    pub fn malformed_cue(index: usize, line: Option<usize>, reason: impl Into<String>) -> Self {
        Self::MalformedCue {
            index,
            line,
            reason: reason.into(),
        }
    }

    pub fn unknown_style(name: impl Into<String>) -> Self {
        Self::UnknownStyle { name: name.into() }
    }

    pub fn input_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InputVideoInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap this error with the job and stage it escaped from.
    ///
    /// Already-wrapped errors are returned unchanged so a job reports exactly
    /// one stage.
    pub fn at_stage(self, job_id: impl Into<String>, stage: JobStage) -> Self {
        match self {
            wrapped @ TelevidError::JobFailed { .. } => wrapped,
            other => TelevidError::JobFailed {
                job_id: job_id.into(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `JobFailed`.
    pub fn root(&self) -> &TelevidError {
        match self {
            TelevidError::JobFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable snake_case name used in logs and batch reports.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            TelevidError::MalformedCue { .. } => "malformed_cue",
            TelevidError::UnknownStyle { .. } => "unknown_style",
            TelevidError::FontAssetMissing { .. } => "font_asset_missing",
            TelevidError::OverlapConflict { .. } => "overlap_conflict",
            TelevidError::InputVideoInvalid { .. } => "input_video_invalid",
            TelevidError::TranscodeTimeout { .. } => "transcode_timeout",
            TelevidError::TranscodeFailed { .. } => "transcode_failed",
            TelevidError::TranscodeOutputMissing { .. } => "transcode_output_missing",
            TelevidError::OutputTooLarge { .. } => "output_too_large",
            TelevidError::Cancelled { .. } => "cancelled",
            TelevidError::EngineUnavailable { .. } => "engine_unavailable",
            TelevidError::JobFailed { .. } => "job_failed",
            TelevidError::Config { .. } => "config",
            TelevidError::FileNotFound { .. } => "file_not_found",
            TelevidError::Io(_) => "io",
            TelevidError::Json(_) => "json",
            TelevidError::Other(_) => "other",
        }
    }

    /// Whether a bounded retry of the transcode could plausibly succeed.
    ///
    /// Only engine failures that point at resource exhaustion qualify.
    pub fn is_transient(&self) -> bool {
        match self.root() {
            TelevidError::TranscodeFailed { diagnostics, .. } => {
                let lower = diagnostics.to_ascii_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }

    /// Captured engine stderr, when the error carries it.
    pub fn diagnostics(&self) -> Option<&str> {
        match self.root() {
            TelevidError::TranscodeTimeout { diagnostics, .. }
            | TelevidError::TranscodeFailed { diagnostics, .. }
            | TelevidError::TranscodeOutputMissing { diagnostics, .. }
            | TelevidError::Cancelled { diagnostics } => Some(diagnostics),
            _ => None,
        }
    }
}

const TRANSIENT_MARKERS: &[&str] = &[
    "cannot allocate memory",
    "resource temporarily unavailable",
    "too many open files",
    "out of memory",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_is_idempotent() {
        let err = TelevidError::unknown_style("title")
            .at_stage("job-1", JobStage::BuildSpec)
            .at_stage("job-1", JobStage::Transcode);

        match &err {
            TelevidError::JobFailed { stage, .. } => assert_eq!(*stage, JobStage::BuildSpec),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.kind(), "unknown_style");
        assert!(err.to_string().contains("build_spec"));
    }

    #[test]
    fn test_transient_detection() {
        let oom = TelevidError::TranscodeFailed {
            status: "exit status: 1".to_string(),
            diagnostics: "[libx264] malloc: Cannot allocate memory".to_string(),
        };
        let bad_filter = TelevidError::TranscodeFailed {
            status: "exit status: 1".to_string(),
            diagnostics: "No such filter: 'drawtxt'".to_string(),
        };
        assert!(oom.is_transient());
        assert!(!bad_filter.is_transient());
        assert!(!TelevidError::unknown_style("x").is_transient());
    }

    #[test]
    fn test_diagnostics_tail_is_bounded() {
        let long = "x".repeat(5000) + "the real error";
        let err = TelevidError::TranscodeFailed {
            status: "exit status: 1".to_string(),
            diagnostics: long,
        };
        let message = err.to_string();
        assert!(message.ends_with("the real error"));
        assert!(message.len() < 1100);
        assert_eq!(err.diagnostics().map(str::len), Some(5014));
    }

    #[test]
    fn test_empty_diagnostics_placeholder() {
        let err = TelevidError::Cancelled {
            diagnostics: "  ".to_string(),
        };
        assert_eq!(err.to_string(), "Render cancelled: <no diagnostics>");
    }
}
