//! Transcode orchestration: runs the external engine for one compositor spec.
//!
//! ```text
//! Pending ──spawn──▶ Running ──exit 0 + output──▶ Succeeded
//!                       │──exit ≠ 0──────────────▶ Failed
//!                       │──deadline──────────────▶ TimedOut
//!                       └──cancel / size cap─────▶ Cancelled / Failed
//! ```
//!
//! The calling thread supervises the child; stdout (progress) and stderr
//! (diagnostics) are drained on helper threads so the engine never blocks on
//! a full pipe. Every failure removes the partial output before returning.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use televid_common::clock::Deadline;
use televid_common::config::{AppConfig, EncoderSettings};
use televid_common::error::{TelevidError, TelevidResult};

use crate::compositor::CompositorSpec;
use crate::filter::{
    build_filter_graph, build_transcode_args, materialize_text_files, prepare_filter_graph,
};
use crate::progress::{
    progress_report, ProgressCallback, ProgressState, RenderProgress, RenderStage,
};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const STALL_WARNING: Duration = Duration::from_secs(10);

/// Program plus fixed leading arguments used to launch an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl EngineCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// A command in its own process group, so the whole engine tree can be
    /// signalled at once.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    pub fn is_available(&self) -> bool {
        command_exists(&self.program)
    }
}

/// Whether `binary` can be launched: an existing path, or a name on PATH.
pub fn command_exists(binary: &str) -> bool {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v '{binary}' >/dev/null 2>&1"))
        .stdin(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Cooperative cancellation flag shared between a job and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Resource limits for one transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeLimits {
    /// Wall-clock limit for the engine process.
    pub timeout: Duration,
    /// Largest partial output accepted while the engine runs.
    pub max_output_bytes: Option<u64>,
}

impl Default for TranscodeLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_output_bytes: None,
        }
    }
}

/// Paths used by one transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeIo {
    pub input: PathBuf,
    /// Partial output written by the engine (inside the workspace).
    pub output: PathBuf,
    /// Job workspace for caption text files and graph scripts.
    pub workspace: PathBuf,
}

/// Everything a backend needs besides the `CompositorSpec` itself.
#[derive(Clone)]
pub struct TranscodeRequest {
    pub io: TranscodeIo,
    pub limits: TranscodeLimits,
    pub cancel: CancelHandle,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for TranscodeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeRequest")
            .field("io", &self.io)
            .field("limits", &self.limits)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Lifecycle of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeState {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TranscodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            TranscodeState::Pending => "pending",
            TranscodeState::Running => "running",
            TranscodeState::Succeeded => "succeeded",
            TranscodeState::Failed => "failed",
            TranscodeState::TimedOut => "timed_out",
            TranscodeState::Cancelled => "cancelled",
        }
    }
}

/// Result of a successful transcode.
#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    pub output: PathBuf,
    pub output_bytes: u64,
    pub elapsed: Duration,
    /// Engine stderr, usually empty at `-loglevel error`.
    pub diagnostics: String,
}

/// Trait for transcode backends.
pub trait TranscodeBackend: Send + Sync {
    /// Render `spec` into `request.io.output`.
    fn transcode(
        &self,
        spec: CompositorSpec,
        request: &TranscodeRequest,
    ) -> TelevidResult<TranscodeOutcome>;

    /// Check if this backend can run on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Runs ffmpeg as a supervised subprocess.
#[derive(Debug, Clone)]
pub struct TranscodeOrchestrator {
    engine: EngineCommand,
    encoder: EncoderSettings,
    terminate_grace: Duration,
}

enum Stop {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    TooLarge { limit: u64, actual: u64 },
    WaitFailed(std::io::Error),
}

impl TranscodeOrchestrator {
    pub fn new(engine: EngineCommand, encoder: EncoderSettings) -> Self {
        Self {
            engine,
            encoder,
            terminate_grace: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            EngineCommand::new(&config.engine.ffmpeg),
            config.render.encoder.clone(),
        )
        .with_terminate_grace(
            televid_common::clock::secs_to_duration(config.engine.terminate_grace_secs)
                .unwrap_or(Duration::from_secs(2)),
        )
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn engine(&self) -> &EngineCommand {
        &self.engine
    }

    /// Run one transcode. On any error the partial output is removed.
    pub fn run(
        &self,
        spec: CompositorSpec,
        request: &TranscodeRequest,
    ) -> TelevidResult<TranscodeOutcome> {
        let result = self.run_inner(spec, request);
        if result.is_err() {
            remove_partial(&request.io.output);
        }
        result
    }

    fn run_inner(
        &self,
        spec: CompositorSpec,
        request: &TranscodeRequest,
    ) -> TelevidResult<TranscodeOutcome> {
        let io = &request.io;
        let started = Instant::now();
        let mut state = TranscodeState::Pending;

        if request.cancel.is_cancelled() {
            return Err(TelevidError::Cancelled {
                diagnostics: "cancelled before the engine was started".to_string(),
            });
        }

        let text_files = materialize_text_files(&spec, &io.workspace.join("text"))?;
        let graph = prepare_filter_graph(build_filter_graph(&spec, &text_files), &io.workspace)?;
        if let Some(parent) = io.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let args = build_transcode_args(&io.input, &io.output, &graph, &self.encoder);

        let total_frames = spec.video.frame_count.unwrap_or(0);
        let expected_duration_secs = if total_frames > 0 {
            spec.video.frame_rate.frame_time(total_frames).as_secs_f64()
        } else {
            0.0
        };
        drop(spec);

        tracing::debug!(program = %self.engine.program, args = ?args, "Running engine");
        let mut child = self
            .engine
            .command()
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.engine.program, e))?;

        state = transition(state, TranscodeState::Running);
        tracing::info!(
            pid = child.id(),
            args_len = args.len(),
            total_frames,
            drawn_runs = text_files.len(),
            "Engine process started"
        );

        let stderr_task = spawn_stderr_reader(&mut child);
        let progress_task = spawn_progress_reader(
            &mut child,
            request.progress.clone(),
            total_frames,
            expected_duration_secs,
        );

        let deadline = Deadline::after(request.limits.timeout);
        let stop = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Stop::Exited(status),
                Ok(None) => {}
                Err(e) => break Stop::WaitFailed(e),
            }
            if request.cancel.is_cancelled() {
                break Stop::Cancelled;
            }
            if deadline.is_expired() {
                break Stop::TimedOut;
            }
            if let Some(limit) = request.limits.max_output_bytes {
                let actual = file_len(&io.output);
                if actual > limit {
                    break Stop::TooLarge { limit, actual };
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !matches!(stop, Stop::Exited(_)) {
            terminate(&mut child, self.terminate_grace);
        }

        let diagnostics = stderr_task
            .and_then(|task| task.join().ok())
            .unwrap_or_else(|| "<failed to join stderr reader>".to_string());
        if let Some(task) = progress_task {
            let _ = task.join();
        }

        let elapsed = started.elapsed();
        let result = match stop {
            Stop::Exited(status) if status.success() => {
                let output_bytes = file_len(&io.output);
                if output_bytes == 0 {
                    state = transition(state, TranscodeState::Failed);
                    Err(TelevidError::TranscodeOutputMissing {
                        path: io.output.clone(),
                        diagnostics,
                    })
                } else {
                    state = transition(state, TranscodeState::Succeeded);
                    if let Some(cb) = &request.progress {
                        cb(RenderProgress::stage_only(RenderStage::Complete, total_frames));
                    }
                    Ok(TranscodeOutcome {
                        output: io.output.clone(),
                        output_bytes,
                        elapsed,
                        diagnostics,
                    })
                }
            }
            Stop::Exited(status) => {
                state = transition(state, TranscodeState::Failed);
                Err(TelevidError::TranscodeFailed {
                    status: status.to_string(),
                    diagnostics,
                })
            }
            Stop::TimedOut => {
                state = transition(state, TranscodeState::TimedOut);
                Err(TelevidError::TranscodeTimeout {
                    timeout: request.limits.timeout,
                    diagnostics,
                })
            }
            Stop::Cancelled => {
                state = transition(state, TranscodeState::Cancelled);
                Err(TelevidError::Cancelled { diagnostics })
            }
            Stop::TooLarge { limit, actual } => {
                state = transition(state, TranscodeState::Failed);
                Err(TelevidError::OutputTooLarge { limit, actual })
            }
            Stop::WaitFailed(e) => {
                state = transition(state, TranscodeState::Failed);
                Err(TelevidError::Io(e))
            }
        };

        tracing::info!(
            state = state.as_str(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Engine process finished"
        );
        result
    }
}

impl TranscodeBackend for TranscodeOrchestrator {
    fn transcode(
        &self,
        spec: CompositorSpec,
        request: &TranscodeRequest,
    ) -> TelevidResult<TranscodeOutcome> {
        self.run(spec, request)
    }

    fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    fn name(&self) -> &str {
        &self.engine.program
    }
}

fn transition(from: TranscodeState, to: TranscodeState) -> TranscodeState {
    tracing::debug!(from = from.as_str(), to = to.as_str(), "Transcode state change");
    to
}

fn spawn_error(program: &str, err: std::io::Error) -> TelevidError {
    if err.kind() == std::io::ErrorKind::NotFound {
        TelevidError::EngineUnavailable {
            program: program.to_string(),
            reason: err.to_string(),
        }
    } else {
        TelevidError::Io(std::io::Error::new(
            err.kind(),
            format!("Failed to start {program}: {err}"),
        ))
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output")
        }
    }
}

/// Drain stderr to a string on a helper thread.
fn spawn_stderr_reader(child: &mut Child) -> Option<JoinHandle<String>> {
    let stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("{output}\n<failed to read engine stderr: {err}>"),
        }
    }))
}

/// Parse `-progress pipe:1` output on a helper thread.
fn spawn_progress_reader(
    child: &mut Child,
    progress: Option<ProgressCallback>,
    total_frames: u64,
    expected_duration_secs: f64,
) -> Option<JoinHandle<ProgressState>> {
    let stdout = child.stdout.take()?;
    Some(std::thread::spawn(move || {
        let start = Instant::now();
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut latest = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = Instant::now();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest.out_time_secs;
                last_progress_wall = Instant::now();
            }
            if let Some(cb) = &progress {
                cb(progress_report(
                    &latest,
                    total_frames,
                    expected_duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed() >= STALL_WARNING {
                tracing::warn!(
                    out_time_secs = latest.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No engine progress advancement for 10s"
                );
                last_progress_wall = Instant::now();
            }
        }
        latest
    }))
}

/// SIGTERM the engine's process group, wait up to `grace`, then kill.
fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        // SAFETY: plain signal delivery to the group this child leads.
        unsafe {
            libc::kill(-pgid, libc::SIGTERM);
        }
        tracing::debug!(pid = pgid, grace_secs = grace.as_secs_f64(), "Sent SIGTERM to engine");

        let deadline = Deadline::after(grace);
        while !deadline.is_expired() {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(_) => break,
            }
        }
        // SAFETY: as above; ESRCH once the group is gone is harmless.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    let _ = child.kill();
    let _ = child.wait();
}

/// Captured output of a bounded helper invocation (probe, thumbnail).
#[derive(Debug)]
pub(crate) struct CapturedRun {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `engine` with `args` to completion, killing it after `timeout`.
pub(crate) fn run_captured(
    engine: &EngineCommand,
    args: &[String],
    timeout: Duration,
) -> TelevidResult<CapturedRun> {
    let mut child = engine
        .command()
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(&engine.program, e))?;

    let stderr_task = spawn_stderr_reader(&mut child);
    let stdout_task = child.stdout.take().map(|stdout| {
        std::thread::spawn(move || {
            let mut out = String::new();
            let _ = BufReader::new(stdout).read_to_string(&mut out);
            out
        })
    });

    let deadline = Deadline::after(timeout);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if deadline.is_expired() {
            terminate(&mut child, Duration::ZERO);
            break None;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stderr = stderr_task
        .and_then(|t| t.join().ok())
        .unwrap_or_default();
    let stdout = stdout_task.and_then(|t| t.join().ok()).unwrap_or_default();

    match status {
        Some(status) => Ok(CapturedRun {
            status,
            stdout,
            stderr,
        }),
        None => Err(TelevidError::TranscodeTimeout {
            timeout,
            diagnostics: stderr,
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compositor::{CompositorSpec, FrameRate, VideoGeometry};
    use std::sync::Mutex;
    use televid_cue_model::geometry::FrameSize;

    fn workspace(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "televid_orch_{}_{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn empty_spec() -> CompositorSpec {
        CompositorSpec {
            video: VideoGeometry {
                size: FrameSize::new(320, 240),
                frame_rate: FrameRate::from_fps(24).unwrap(),
                frame_count: Some(48),
            },
            instructions: Vec::new(),
            out_of_range: Vec::new(),
        }
    }

    /// An engine that runs `script` with the engine arguments as `$@`; the
    /// output path is the last argument.
    fn script_engine(script: &str) -> TranscodeOrchestrator {
        let engine = EngineCommand::new("sh").with_leading_args([
            "-c".to_string(),
            format!("for a; do out=$a; done; {script}"),
            "engine".to_string(),
        ]);
        TranscodeOrchestrator::new(engine, EncoderSettings::default())
            .with_terminate_grace(Duration::from_millis(200))
    }

    fn request(dir: &Path, timeout: Duration) -> TranscodeRequest {
        TranscodeRequest {
            io: TranscodeIo {
                input: dir.join("input.mp4"),
                output: dir.join("job.partial.mp4"),
                workspace: dir.to_path_buf(),
            },
            limits: TranscodeLimits {
                timeout,
                max_output_bytes: None,
            },
            cancel: CancelHandle::new(),
            progress: None,
        }
    }

    #[test]
    fn test_success_with_progress() {
        let dir = workspace("ok");
        let orch = script_engine(
            "printf 'frame=24\\nout_time_us=1000000\\nprogress=continue\\nframe=48\\nprogress=end\\n'; echo video > \"$out\"",
        );
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let mut req = request(&dir, Duration::from_secs(10));
        req.progress = Some(Arc::new(move |p: RenderProgress| {
            sink.lock().unwrap().push(p);
        }));

        let outcome = orch.run(empty_spec(), &req).unwrap();
        assert_eq!(outcome.output, dir.join("job.partial.mp4"));
        assert_eq!(outcome.output_bytes, 6);

        let reports = reports.lock().unwrap();
        assert!(reports.iter().any(|r| r.frames_rendered == 24));
        assert_eq!(reports.last().map(|r| r.stage), Some(RenderStage::Complete));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_nonzero_exit_carries_stderr() {
        let dir = workspace("fail");
        let orch = script_engine("echo partial > \"$out\"; echo 'No such filter: drawtxt' >&2; exit 3");
        let err = orch
            .run(empty_spec(), &request(&dir, Duration::from_secs(10)))
            .unwrap_err();
        match &err {
            TelevidError::TranscodeFailed { diagnostics, .. } => {
                assert!(diagnostics.contains("No such filter"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dir.join("job.partial.mp4").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_timeout_terminates_and_removes_output() {
        let dir = workspace("timeout");
        let orch = script_engine("echo partial > \"$out\"; sleep 30");
        let started = Instant::now();
        let err = orch
            .run(empty_spec(), &request(&dir, Duration::from_millis(300)))
            .unwrap_err();

        assert!(matches!(err, TelevidError::TranscodeTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!dir.join("job.partial.mp4").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_success_without_output_is_missing() {
        let dir = workspace("missing");
        let orch = script_engine("exit 0");
        let err = orch
            .run(empty_spec(), &request(&dir, Duration::from_secs(10)))
            .unwrap_err();
        assert!(matches!(err, TelevidError::TranscodeOutputMissing { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cancel_stops_engine() {
        let dir = workspace("cancel");
        let orch = script_engine("echo partial > \"$out\"; sleep 30");
        let req = request(&dir, Duration::from_secs(30));
        let cancel = req.cancel.clone();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            cancel.cancel();
        });

        let err = orch.run(empty_spec(), &req).unwrap_err();
        trigger.join().unwrap();
        assert_eq!(err.kind(), "cancelled");
        assert!(!dir.join("job.partial.mp4").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_output_size_cap() {
        let dir = workspace("size");
        let orch = script_engine("head -c 4096 /dev/zero > \"$out\"; sleep 30");
        let mut req = request(&dir, Duration::from_secs(30));
        req.limits.max_output_bytes = Some(1024);

        let err = orch.run(empty_spec(), &req).unwrap_err();
        match err {
            TelevidError::OutputTooLarge { limit, actual } => {
                assert_eq!(limit, 1024);
                assert!(actual > 1024);
            }
            other => panic!("unexpected {other:?}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_engine_is_unavailable() {
        let dir = workspace("noengine");
        let orch = TranscodeOrchestrator::new(
            EngineCommand::new("televid-no-such-engine"),
            EncoderSettings::default(),
        );
        assert!(!orch.is_available());
        let err = orch
            .run(empty_spec(), &request(&dir, Duration::from_secs(1)))
            .unwrap_err();
        assert_eq!(err.kind(), "engine_unavailable");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_run_captured_timeout() {
        let engine = EngineCommand::new("sh");
        let err = run_captured(
            &engine,
            &["-c".to_string(), "sleep 30".to_string()],
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, TelevidError::TranscodeTimeout { .. }));

        let ok = run_captured(
            &engine,
            &["-c".to_string(), "echo hi; echo err >&2".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(ok.status.success());
        assert_eq!(ok.stdout.trim(), "hi");
        assert_eq!(ok.stderr.trim(), "err");
    }
}
