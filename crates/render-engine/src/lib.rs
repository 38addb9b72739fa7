//! Televid Render Engine
//!
//! Burns timed captions into a video by driving ffmpeg as a supervised
//! subprocess.
//!
//! # Pipeline Architecture
//!
//! ```text
//! cues.srt ──── parse ──┐
//!                       ├── Compositor spec (frame ranges, glyph runs, bboxes)
//! styles ── resolve ────┘         │
//!                                 ├── drawtext filter graph
//! input.mp4 ── probe ─────────────┘         │
//!                                           ▼
//!                                 ffmpeg (own process group)
//!                                           │
//!                                           ▼
//!                              workspace/<job>.partial.mp4
//!                                           │ rename
//!                                           ▼
//!                                       output.mp4
//! ```

pub mod compositor;
pub mod filter;
pub mod orchestrator;
pub mod pipeline;
pub mod probe;
pub mod progress;

pub use compositor::{build_compositor_spec, CompositorSpec, DrawInstruction, FrameRate};
pub use orchestrator::{
    command_exists, CancelHandle, EngineCommand, TranscodeBackend, TranscodeLimits,
    TranscodeOrchestrator,
};
pub use pipeline::{
    CueSource, PipelineController, PipelineSettings, RenderJob, RenderPlan, RenderReport,
    RetryPolicy,
};
pub use probe::{FfprobeProbe, MediaProbe, VideoInfo};
pub use progress::{ProgressCallback, RenderProgress, RenderStage};
