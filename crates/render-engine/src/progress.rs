//! Render progress reporting.
//!
//! The engine is launched with `-progress pipe:1`, which prints blocks of
//! `key=value` lines terminated by `progress=continue` or `progress=end`.

use std::sync::Arc;

use serde::Serialize;

/// Progress callback for a render job. Shared so retries and worker threads
/// can report through the same sink.
pub type ProgressCallback = Arc<dyn Fn(RenderProgress) + Send + Sync>;

/// Render progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames encoded so far.
    pub frames_rendered: u64,

    /// Total frames to encode (0 when unknown).
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: RenderStage,
}

/// Stages of a render job as seen by progress listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    Preparing,
    Transcoding,
    Finalizing,
    Complete,
    Failed,
}

impl RenderProgress {
    pub fn stage_only(stage: RenderStage, total_frames: u64) -> Self {
        let done = stage == RenderStage::Complete;
        Self {
            progress: if done { 1.0 } else { 0.0 },
            frames_rendered: if done { total_frames } else { 0 },
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Accumulated state from the engine's progress stream.
#[derive(Debug, Default, Clone)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub frame: Option<u64>,
    pub complete: bool,
}

impl ProgressState {
    /// Feed one `key=value` pair.
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, ffmpeg reports microseconds here.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse::<u64>() {
                    self.frame = Some(frame);
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

/// Turn the latest progress state into a report.
///
/// Frame counts from the engine are preferred; otherwise progress is derived
/// from encoded media time against the expected duration.
pub fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> RenderProgress {
    let progress = match (state.frame, total_frames) {
        (Some(frame), total) if total > 0 => (frame as f64 / total as f64).clamp(0.0, 1.0),
        _ if expected_duration_secs > 0.0 => {
            (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };

    let frames_rendered = state
        .frame
        .unwrap_or_else(|| (progress * total_frames as f64).round() as u64);
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    RenderProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            RenderStage::Finalizing
        } else {
            RenderStage::Transcoding
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_from_frames() {
        let mut state = ProgressState::default();
        state.update("frame", "60");
        state.update("out_time_us", "2500000");
        state.update("progress", "continue");

        let report = progress_report(&state, 240, 10.0, 5.0);
        assert!((report.progress - 0.25).abs() < 1e-9);
        assert_eq!(report.frames_rendered, 60);
        assert!((report.eta_secs - 15.0).abs() < 1e-9);
        assert_eq!(report.stage, RenderStage::Transcoding);
    }

    #[test]
    fn test_progress_from_time_when_frames_unknown() {
        let mut state = ProgressState::default();
        state.update("out_time_ms", "5000000");
        let report = progress_report(&state, 0, 10.0, 1.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_progress_end() {
        let mut state = ProgressState::default();
        state.update("progress", "end");
        state.update("bogus", "value");
        let report = progress_report(&state, 240, 10.0, 3.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, RenderStage::Finalizing);
    }

    #[test]
    fn test_stage_only_reports() {
        let done = RenderProgress::stage_only(RenderStage::Complete, 240);
        assert_eq!(done.frames_rendered, 240);
        assert_eq!(done.progress, 1.0);
        let start = RenderProgress::stage_only(RenderStage::Preparing, 240);
        assert_eq!(start.frames_rendered, 0);
    }
}
