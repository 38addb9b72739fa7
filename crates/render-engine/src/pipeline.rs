//! Pipeline controller: one render job from validation to published output.
//!
//! ```text
//! validate ─▶ parse cues ─▶ build spec ─▶ transcode ─▶ publish ─▶ thumbnail
//!    │            │             │             │           │
//!    └────────────┴─────────────┴─────────────┴───────────┴──▶ cleanup
//! ```
//!
//! Input, cue and style problems surface before any engine process starts.
//! The engine writes into a per-job workspace; the final path only ever
//! receives a complete file, and the workspace is removed on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use televid_common::clock::{new_job_id, JobClock};
use televid_common::config::AppConfig;
use televid_common::error::{JobStage, TelevidError, TelevidResult};
use televid_cue_model::style::StyleSheet;
use televid_cue_model::{load_cues, parse_document, CueDocument, CueFormat, CueTrack, ParseOptions};
use televid_font_resolver::{Layered, StyleResolve};

use crate::compositor::{build_compositor_spec, CompositorSpec};
use crate::orchestrator::{
    CancelHandle, TranscodeBackend, TranscodeIo, TranscodeLimits, TranscodeOutcome,
    TranscodeRequest,
};
use crate::probe::{MediaProbe, VideoInfo};
use crate::progress::{ProgressCallback, RenderProgress, RenderStage};

/// Where a job's cues come from.
#[derive(Debug, Clone)]
pub enum CueSource {
    /// A cue file; the format defaults to the file extension.
    File {
        path: PathBuf,
        format: Option<CueFormat>,
    },
    /// Cue source text already in memory.
    Text { content: String, format: CueFormat },
    /// An already parsed track.
    Track(CueTrack),
}

impl CueSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        CueSource::File {
            path: path.into(),
            format: None,
        }
    }
}

/// Bounded retry for transient engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first (0 = never retry).
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << retry.min(10))
    }
}

/// A single caption burn-in request.
#[derive(Clone)]
pub struct RenderJob {
    pub job_id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub cues: CueSource,
    pub limits: TranscodeLimits,
    /// Write a still of the output's midpoint here after publishing.
    pub thumbnail: Option<PathBuf>,
    pub cancel: CancelHandle,
    pub retry: RetryPolicy,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("job_id", &self.job_id)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("cues", &self.cues)
            .field("limits", &self.limits)
            .field("thumbnail", &self.thumbnail)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RenderJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, cues: CueSource) -> Self {
        Self {
            job_id: new_job_id(),
            input: input.into(),
            output: output.into(),
            cues,
            limits: TranscodeLimits::default(),
            thumbnail: None,
            cancel: CancelHandle::new(),
            retry: RetryPolicy::none(),
            progress: None,
        }
    }

    pub fn with_limits(mut self, limits: TranscodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_thumbnail(mut self, path: impl Into<PathBuf>) -> Self {
        self.thumbnail = Some(path.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Apply the render limits and retry policy from configuration.
    pub fn with_config_defaults(mut self, config: &AppConfig) -> Self {
        self.limits = TranscodeLimits {
            timeout: Duration::from_secs(config.render.timeout_secs.max(1)),
            max_output_bytes: (config.render.max_output_bytes > 0)
                .then_some(config.render.max_output_bytes),
        };
        self.retry = RetryPolicy {
            max_retries: config.render.max_retries,
            backoff: Duration::from_millis(config.render.retry_backoff_ms),
        };
        self
    }
}

/// Summary of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub job_id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub output_bytes: u64,
    pub cues: usize,
    pub drawn_runs: usize,
    /// Source indices of cues that start after the last frame.
    pub out_of_range: Vec<usize>,
    pub frame_count: Option<u64>,
    pub attempts: u32,
    pub started_at: String,
    pub elapsed_secs: f64,
    pub thumbnail: Option<PathBuf>,
}

/// Settings shared by every job a controller runs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent directory of per-job workspaces.
    pub work_dir: PathBuf,
    pub parse: ParseOptions,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut parse = ParseOptions::default();
        parse.require_text = config.render.require_text;
        Self {
            work_dir: config.work_dir.clone(),
            parse,
        }
    }
}

/// Runs render jobs. Safe to share between threads; each job gets its own
/// workspace and engine process.
pub struct PipelineController {
    resolver: Arc<dyn StyleResolve>,
    probe: Arc<dyn MediaProbe>,
    backend: Arc<dyn TranscodeBackend>,
    settings: PipelineSettings,
}

/// Everything known about a job once its cues are laid out.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub video: VideoInfo,
    pub cues: usize,
    pub spec: CompositorSpec,
}

impl PipelineController {
    pub fn new(
        resolver: Arc<dyn StyleResolve>,
        probe: Arc<dyn MediaProbe>,
        backend: Arc<dyn TranscodeBackend>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            resolver,
            probe,
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run `job` to completion.
    ///
    /// Every error is a `JobFailed` naming the stage it escaped from.
    pub fn render(&self, job: RenderJob) -> TelevidResult<RenderReport> {
        let clock = JobClock::start();
        let workspace = self.settings.work_dir.join(&job.job_id);
        tracing::info!(
            job_id = %job.job_id,
            input = %job.input.display(),
            output = %job.output.display(),
            backend = self.backend.name(),
            "Starting render job"
        );
        report(&job, RenderProgress::stage_only(RenderStage::Preparing, 0));

        let result = self.execute(&job, &workspace, &clock);
        cleanup_workspace(&workspace);

        match &result {
            Ok(summary) => {
                tracing::info!(
                    job_id = %job.job_id,
                    output = %summary.output.display(),
                    bytes = summary.output_bytes,
                    attempts = summary.attempts,
                    elapsed_secs = summary.elapsed_secs,
                    "Render job finished"
                );
            }
            Err(err) => {
                tracing::error!(
                    job_id = %job.job_id,
                    kind = err.kind(),
                    error = %err,
                    "Render job failed"
                );
                report(&job, RenderProgress::stage_only(RenderStage::Failed, 0));
            }
        }
        result
    }

    /// Validate inputs, parse cues and build the compositor spec without
    /// starting the engine.
    pub fn plan(&self, job: &RenderJob) -> TelevidResult<RenderPlan> {
        let id = job.job_id.as_str();
        self.validate_paths(job)
            .map_err(|e| e.at_stage(id, JobStage::Validate))?;

        let document = self
            .load_document(&job.cues)
            .map_err(|e| e.at_stage(id, JobStage::ParseCues))?;
        let overlay = document.styles.unwrap_or_else(StyleSheet::empty);
        let resolver = Layered::new(self.resolver.as_ref(), &overlay);

        // Every referenced style must resolve before anything is spawned.
        for name in document.track.style_names() {
            resolver
                .resolve(name)
                .map_err(|e| e.at_stage(id, JobStage::BuildSpec))?;
        }

        let video = self
            .probe
            .probe(&job.input)
            .map_err(|e| e.at_stage(id, JobStage::Validate))?;

        let spec = build_compositor_spec(&document.track, &video.geometry(), &resolver)
            .map_err(|e| e.at_stage(id, JobStage::BuildSpec))?;

        Ok(RenderPlan {
            video,
            cues: document.track.len(),
            spec,
        })
    }

    fn execute(
        &self,
        job: &RenderJob,
        workspace: &Path,
        clock: &JobClock,
    ) -> TelevidResult<RenderReport> {
        let id = job.job_id.as_str();
        let plan = self.plan(job)?;
        for skipped in &plan.spec.out_of_range {
            tracing::warn!(
                job_id = id,
                cue = skipped.cue_index,
                first_frame = skipped.first_frame,
                "Cue lies beyond the end of the video"
            );
        }

        let extension = job
            .output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let request = TranscodeRequest {
            io: TranscodeIo {
                input: job.input.clone(),
                output: workspace.join(format!("{id}.partial.{extension}")),
                workspace: workspace.to_path_buf(),
            },
            limits: job.limits,
            cancel: job.cancel.clone(),
            progress: job.progress.clone(),
        };
        std::fs::create_dir_all(workspace)
            .map_err(|e| TelevidError::Io(e).at_stage(id, JobStage::Transcode))?;

        let drawn_runs = plan.spec.drawn_runs();
        let out_of_range = plan.spec.out_of_range.iter().map(|c| c.cue_index).collect();
        let frame_count = plan.spec.video.frame_count;
        let (outcome, attempts) = self
            .transcode_with_retry(plan.spec, &request, job.retry)
            .map_err(|e| e.at_stage(id, JobStage::Transcode))?;

        report(job, RenderProgress::stage_only(RenderStage::Finalizing, 0));
        publish(&outcome.output, &job.output, id)
            .map_err(|e| TelevidError::Io(e).at_stage(id, JobStage::Finalize))?;

        let thumbnail = job.thumbnail.as_ref().and_then(|dest| {
            match self
                .probe
                .extract_frame(&job.output, plan.video.midpoint(), dest)
            {
                Ok(()) => Some(dest.clone()),
                Err(err) => {
                    tracing::warn!(job_id = id, error = %err, "Thumbnail extraction failed");
                    None
                }
            }
        });

        Ok(RenderReport {
            job_id: job.job_id.clone(),
            input: job.input.clone(),
            output: job.output.clone(),
            output_bytes: outcome.output_bytes,
            cues: plan.cues,
            drawn_runs,
            out_of_range,
            frame_count,
            attempts,
            started_at: clock.started_at().to_string(),
            elapsed_secs: clock.elapsed_secs(),
            thumbnail,
        })
    }

    fn validate_paths(&self, job: &RenderJob) -> TelevidResult<()> {
        if job.cancel.is_cancelled() {
            return Err(TelevidError::Cancelled {
                diagnostics: "cancelled before validation".to_string(),
            });
        }
        if !job.input.is_file() {
            return Err(TelevidError::FileNotFound {
                path: job.input.clone(),
            });
        }
        if job.output.extension().is_none() {
            return Err(TelevidError::config(format!(
                "output path {} needs a file extension to pick a container",
                job.output.display()
            )));
        }
        if job.output.exists() && same_file(&job.input, &job.output) {
            return Err(TelevidError::config("output path must differ from the input"));
        }
        if let CueSource::File { path, .. } = &job.cues {
            if !path.is_file() {
                return Err(TelevidError::FileNotFound { path: path.clone() });
            }
        }
        Ok(())
    }

    fn load_document(&self, source: &CueSource) -> TelevidResult<CueDocument> {
        match source {
            CueSource::File { path, format } => load_cues(path, *format, &self.settings.parse),
            CueSource::Text { content, format } => {
                parse_document(content, *format, &self.settings.parse)
            }
            CueSource::Track(track) => Ok(CueDocument {
                track: track.clone(),
                styles: None,
            }),
        }
    }

    fn transcode_with_retry(
        &self,
        spec: CompositorSpec,
        request: &TranscodeRequest,
        policy: RetryPolicy,
    ) -> TelevidResult<(TranscodeOutcome, u32)> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let retries_left = attempt <= policy.max_retries;
            let this_spec = if retries_left {
                spec.clone()
            } else {
                return self
                    .backend
                    .transcode(spec, request)
                    .map(|outcome| (outcome, attempt));
            };

            match self.backend.transcode(this_spec, request) {
                Ok(outcome) => return Ok((outcome, attempt)),
                Err(err) if err.is_transient() && !request.cancel.is_cancelled() => {
                    let delay = policy.delay_for(attempt - 1);
                    tracing::warn!(
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient engine failure; retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn report(job: &RenderJob, progress: RenderProgress) {
    if let Some(cb) = &job.progress {
        cb(progress);
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Move the finished file into place.
///
/// A plain rename is atomic; when the workspace sits on another filesystem
/// the file is copied next to the destination first and renamed from there.
/// Missing parent directories of `dest` are created here, once the output
/// exists, so failed jobs leave nothing behind.
pub fn publish(partial: &Path, dest: &Path, job_id: &str) -> std::io::Result<()> {
    if !partial.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("partial output {} is missing", partial.display()),
        ));
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(partial, dest) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            let file_name = dest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            let staging = dest.with_file_name(format!(".{file_name}.{job_id}.tmp"));

            let copied =
                std::fs::copy(partial, &staging).and_then(|_| std::fs::rename(&staging, dest));
            if let Err(err) = copied {
                let _ = std::fs::remove_file(&staging);
                return Err(err);
            }
            let _ = std::fs::remove_file(partial);
            tracing::debug!(
                error = %rename_err,
                dest = %dest.display(),
                "Published output by copy after rename failed"
            );
            Ok(())
        }
    }
}

fn cleanup_workspace(workspace: &Path) {
    match std::fs::remove_dir_all(workspace) {
        Ok(()) => tracing::debug!(path = %workspace.display(), "Removed job workspace"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %workspace.display(),
            error = %e,
            "Failed to remove job workspace"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::default().max_retries, 0);
    }

    #[test]
    fn test_job_config_defaults() {
        let mut config = AppConfig::default();
        config.render.max_output_bytes = 0;
        config.render.max_retries = 2;
        let job = RenderJob::new("in.mp4", "out.mp4", CueSource::file("c.srt"))
            .with_config_defaults(&config);
        assert_eq!(job.limits.timeout, Duration::from_secs(300));
        assert_eq!(job.limits.max_output_bytes, None);
        assert_eq!(job.retry.max_retries, 2);
    }

    #[test]
    fn test_publish_moves_file() {
        let dir = std::env::temp_dir().join(format!("televid_publish_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let partial = dir.join("job.partial.mp4");
        let dest = dir.join("nested").join("final.mp4");
        std::fs::write(&partial, b"video").unwrap();

        publish(&partial, &dest, "job").unwrap();
        assert!(!partial.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_publish_missing_partial_fails() {
        let dir = std::env::temp_dir()
            .join(format!("televid_publish_missing_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let err = publish(&dir.join("nope.mp4"), &dir.join("out").join("final.mp4"), "job");
        assert!(err.is_err());
        assert!(!dir.join("out").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
