use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use televid_common::config::EncoderSettings;
use televid_common::error::{JobStage, TelevidError, TelevidResult};
use televid_cue_model::style::StyleSheet;
use televid_cue_model::CueFormat;
use televid_font_resolver::ApproximateResolver;
use televid_render_engine::compositor::CompositorSpec;
use televid_render_engine::orchestrator::{TranscodeOutcome, TranscodeRequest};
use televid_render_engine::{
    CancelHandle, CueSource, EngineCommand, FrameRate, MediaProbe, PipelineController,
    PipelineSettings, RenderJob, RenderProgress, RenderStage, RetryPolicy, TranscodeBackend,
    TranscodeLimits, TranscodeOrchestrator, VideoInfo,
};

const CUES: &str = "1\n00:00:02,000 --> 00:00:04,000\nHELLO\n";

struct FixedProbe {
    calls: AtomicUsize,
}

impl FixedProbe {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl MediaProbe for FixedProbe {
    fn probe(&self, _path: &Path) -> TelevidResult<VideoInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(VideoInfo {
            width: 320,
            height: 240,
            frame_rate: FrameRate::from_fps(24).unwrap(),
            duration: Some(Duration::from_secs(10)),
            frame_count: Some(240),
            format_name: "mov,mp4,m4a".to_string(),
            video_codec: "h264".to_string(),
            has_audio: false,
        })
    }

    fn extract_frame(&self, _video: &Path, _at: Duration, dest: &Path) -> TelevidResult<()> {
        std::fs::write(dest, b"png")?;
        Ok(())
    }
}

/// Fails with a transient engine error a fixed number of times.
struct FlakyBackend {
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl TranscodeBackend for FlakyBackend {
    fn transcode(
        &self,
        _spec: CompositorSpec,
        request: &TranscodeRequest,
    ) -> TelevidResult<TranscodeOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TelevidError::TranscodeFailed {
                status: "exit status: 1".to_string(),
                diagnostics: "Cannot allocate memory".to_string(),
            });
        }
        std::fs::write(&request.io.output, b"video")?;
        Ok(TranscodeOutcome {
            output: request.io.output.clone(),
            output_bytes: 5,
            elapsed: Duration::from_millis(1),
            diagnostics: String::new(),
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

struct Fixture {
    dir: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "televid_pipeline_{}_{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("input.mp4"), b"fake video").unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn work_dir(&self) -> PathBuf {
        self.dir.join("work")
    }

    fn controller(
        &self,
        probe: Arc<FixedProbe>,
        backend: Arc<dyn TranscodeBackend>,
    ) -> PipelineController {
        PipelineController::new(
            Arc::new(ApproximateResolver::new(StyleSheet::builtin())),
            probe,
            backend,
            PipelineSettings {
                work_dir: self.work_dir(),
                parse: Default::default(),
            },
        )
    }

    fn job(&self, cues: &str) -> RenderJob {
        RenderJob::new(
            self.path("input.mp4"),
            self.path("out/captioned.mp4"),
            CueSource::Text {
                content: cues.to_string(),
                format: CueFormat::Srt,
            },
        )
    }

    fn workspace_is_empty(&self) -> bool {
        match std::fs::read_dir(self.work_dir()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// An ffmpeg stand-in: `sh -c script`, with the output path in `$out`.
#[cfg(unix)]
fn script_backend(script: &str) -> Arc<dyn TranscodeBackend> {
    let engine = EngineCommand::new("sh").with_leading_args([
        "-c".to_string(),
        format!("for a; do out=$a; done; {script}"),
        "engine".to_string(),
    ]);
    Arc::new(
        TranscodeOrchestrator::new(engine, EncoderSettings::default())
            .with_terminate_grace(Duration::from_millis(200)),
    )
}

fn stage_of(err: &TelevidError) -> Option<JobStage> {
    match err {
        TelevidError::JobFailed { stage, .. } => Some(*stage),
        _ => None,
    }
}

#[cfg(unix)]
#[test]
fn test_render_publishes_output_and_cleans_workspace() {
    let fx = Fixture::new("ok");
    let probe = Arc::new(FixedProbe::new());
    let controller = fx.controller(probe.clone(), script_backend("echo video > \"$out\""));

    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();
    let job = fx
        .job(CUES)
        .with_thumbnail(fx.path("thumb.png"))
        .with_progress(Arc::new(move |p: RenderProgress| {
            sink.lock().unwrap().push(p.stage);
        }));
    let job_id = job.job_id.clone();

    let report = controller.render(job).unwrap();
    assert_eq!(report.job_id, job_id);
    assert_eq!(report.output, fx.path("out/captioned.mp4"));
    assert_eq!(report.output_bytes, 6);
    assert_eq!(report.cues, 1);
    assert_eq!(report.drawn_runs, 1);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.frame_count, Some(240));
    assert_eq!(report.thumbnail, Some(fx.path("thumb.png")));
    assert_eq!(std::fs::read(fx.path("out/captioned.mp4")).unwrap(), b"video\n");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert!(fx.workspace_is_empty());

    let stages = stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&RenderStage::Preparing));
    assert!(stages.contains(&RenderStage::Finalizing));
    assert!(!stages.contains(&RenderStage::Failed));
}

#[cfg(unix)]
#[test]
fn test_unknown_style_fails_before_engine_starts() {
    let fx = Fixture::new("unknown_style");
    let probe = Arc::new(FixedProbe::new());
    let marker = fx.path("engine_ran");
    let controller = fx.controller(
        probe.clone(),
        script_backend(&format!("touch '{}'; echo video > \"$out\"", marker.display())),
    );

    let json = r#"[{"start": 1.0, "end": 2.0, "text": "hi", "style": "karaoke"}]"#;
    let job = RenderJob::new(
        fx.path("input.mp4"),
        fx.path("out.mp4"),
        CueSource::Text {
            content: json.to_string(),
            format: CueFormat::Json,
        },
    );
    let err = controller.render(job).unwrap_err();

    assert_eq!(stage_of(&err), Some(JobStage::BuildSpec));
    assert!(matches!(err.root(), TelevidError::UnknownStyle { name } if name == "karaoke"));
    assert!(!marker.exists());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    assert!(!fx.path("out.mp4").exists());
    assert!(fx.workspace_is_empty());
}

#[cfg(unix)]
#[test]
fn test_timeout_leaves_no_output() {
    let fx = Fixture::new("timeout");
    let controller = fx.controller(
        Arc::new(FixedProbe::new()),
        script_backend("echo partial > \"$out\"; sleep 30"),
    );
    let job = fx.job(CUES).with_limits(TranscodeLimits {
        timeout: Duration::from_millis(500),
        max_output_bytes: None,
    });

    let started = std::time::Instant::now();
    let err = controller.render(job).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(stage_of(&err), Some(JobStage::Transcode));
    assert_eq!(err.root().kind(), "transcode_timeout");
    assert!(!fx.path("out/captioned.mp4").exists());
    assert!(!fx.path("out").exists());
    assert!(fx.workspace_is_empty());
}

#[test]
fn test_malformed_cue_reports_parse_stage() {
    let fx = Fixture::new("malformed");
    let backend = Arc::new(FlakyBackend {
        failures: AtomicUsize::new(0),
        attempts: AtomicUsize::new(0),
    });
    let controller = fx.controller(Arc::new(FixedProbe::new()), backend.clone());

    let err = controller
        .render(fx.job("1\n00:00:04,000 --> 00:00:02,000\nbackwards\n"))
        .unwrap_err();
    assert_eq!(stage_of(&err), Some(JobStage::ParseCues));
    assert!(matches!(err.root(), TelevidError::MalformedCue { .. }));
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 0);
    // The output's parent directory is only created when publishing.
    assert!(!fx.path("out").exists());
}

#[test]
fn test_missing_input_reports_validate_stage() {
    let fx = Fixture::new("missing_input");
    let controller = fx.controller(
        Arc::new(FixedProbe::new()),
        Arc::new(FlakyBackend {
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }),
    );
    let job = RenderJob::new(
        fx.path("nope.mp4"),
        fx.path("out.mp4"),
        CueSource::file(fx.path("cues.srt")),
    );
    let err = controller.render(job).unwrap_err();
    assert_eq!(stage_of(&err), Some(JobStage::Validate));
    assert!(matches!(err.root(), TelevidError::FileNotFound { .. }));
}

#[test]
fn test_oversized_inline_style_rejected_without_panic() {
    let fx = Fixture::new("oversized_style");
    let probe = Arc::new(FixedProbe::new());
    let controller = fx.controller(
        probe.clone(),
        Arc::new(FlakyBackend {
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }),
    );
    let json = r#"{
        "styles": [{"name": "big", "stroke_width": 4294967295}],
        "cues": [{"start": 1, "end": 2, "text": "x", "style": "big"}]
    }"#;
    let job = RenderJob::new(
        fx.path("input.mp4"),
        fx.path("out/captioned.mp4"),
        CueSource::Text {
            content: json.to_string(),
            format: CueFormat::Json,
        },
    );

    let err = controller.render(job).unwrap_err();
    assert_eq!(stage_of(&err), Some(JobStage::ParseCues));
    assert_eq!(err.root().kind(), "config");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_overlapping_cues_rejected() {
    let fx = Fixture::new("overlap");
    let controller = fx.controller(
        Arc::new(FixedProbe::new()),
        Arc::new(FlakyBackend {
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }),
    );
    let cues = "1\n00:00:01,000 --> 00:00:03,000\nfirst\n\n2\n00:00:02,000 --> 00:00:04,000\nsecond\n";
    let err = controller.render(fx.job(cues)).unwrap_err();
    assert_eq!(stage_of(&err), Some(JobStage::BuildSpec));
    assert!(matches!(err.root(), TelevidError::OverlapConflict { .. }));
    assert!(!fx.path("out/captioned.mp4").exists());
}

#[test]
fn test_transient_failure_is_retried() {
    let fx = Fixture::new("retry");
    let backend = Arc::new(FlakyBackend {
        failures: AtomicUsize::new(1),
        attempts: AtomicUsize::new(0),
    });
    let controller = fx.controller(Arc::new(FixedProbe::new()), backend.clone());
    let job = fx.job(CUES).with_retry(RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_millis(10),
    });

    let report = controller.render(job).unwrap();
    assert_eq!(report.attempts, 2);
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 2);
    assert!(fx.path("out/captioned.mp4").is_file());
}

#[test]
fn test_transient_failure_without_retries_fails() {
    let fx = Fixture::new("no_retry");
    let backend = Arc::new(FlakyBackend {
        failures: AtomicUsize::new(1),
        attempts: AtomicUsize::new(0),
    });
    let controller = fx.controller(Arc::new(FixedProbe::new()), backend.clone());

    let err = controller.render(fx.job(CUES)).unwrap_err();
    assert_eq!(stage_of(&err), Some(JobStage::Transcode));
    assert!(err.is_transient());
    assert_eq!(backend.attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancelled_job_never_probes() {
    let fx = Fixture::new("cancelled");
    let probe = Arc::new(FixedProbe::new());
    let controller = fx.controller(
        probe.clone(),
        Arc::new(FlakyBackend {
            failures: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }),
    );
    let cancel = CancelHandle::new();
    cancel.cancel();
    let job = fx.job(CUES).with_cancel(cancel);

    let err = controller.render(job).unwrap_err();
    assert_eq!(err.root().kind(), "cancelled");
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

/// Burns a caption into a synthetic clip with the real engine.
#[test]
#[ignore = "requires ffmpeg, ffprobe and a TrueType font"]
fn test_real_ffmpeg_burn_in() {
    use televid_common::config::AppConfig;
    use televid_font_resolver::FontResolver;
    use televid_render_engine::FfprobeProbe;

    let fx = Fixture::new("real");
    let config = AppConfig::default();
    let input = fx.path("input.mp4");
    let status = std::process::Command::new(&config.engine.ffmpeg)
        .args(["-v", "error", "-y", "-f", "lavfi", "-i"])
        .arg("testsrc=size=320x240:rate=24:duration=3")
        .args(["-pix_fmt", "yuv420p"])
        .arg(&input)
        .status()
        .unwrap();
    assert!(status.success());

    let controller = PipelineController::new(
        Arc::new(FontResolver::new(config.resolved_fonts(), StyleSheet::builtin())),
        Arc::new(FfprobeProbe::from_config(&config)),
        Arc::new(TranscodeOrchestrator::from_config(&config)),
        PipelineSettings {
            work_dir: fx.work_dir(),
            parse: Default::default(),
        },
    );
    let report = controller
        .render(fx.job("1\n00:00:01,000 --> 00:00:02,000\nHELLO\n"))
        .unwrap();
    assert!(report.output_bytes > 0);
    assert!(fx.workspace_is_empty());
}
