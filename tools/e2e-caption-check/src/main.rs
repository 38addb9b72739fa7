//! End-to-end caption check for televid
//!
//! Burns a single caption into a synthetic clip with the real engine and
//! verifies, frame by frame, that exactly the frames the cue covers changed:
//! - Lossless `testsrc` input, so untouched frames decode bit-identical
//! - One cue rendered through the full pipeline (probe, spec, ffmpeg, publish)
//! - Source and output decoded to PNG and diffed with the `image` crate

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use televid_common::config::{AudioMode, EncoderSettings};
use televid_cue_model::style::StyleSheet;
use televid_font_resolver::FontResolver;
use televid_render_engine::{
    CueSource, EngineCommand, FfprobeProbe, PipelineController, PipelineSettings, RenderJob,
    TranscodeLimits, TranscodeOrchestrator,
};
use tracing_subscriber::EnvFilter;

mod synthetic;
mod verify;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Output directory for test artifacts
    #[arg(short, long, default_value = "caption_check_output")]
    output_dir: PathBuf,

    /// TrueType font used for the caption
    #[arg(long)]
    font: PathBuf,

    /// Caption text
    #[arg(long, default_value = "HELLO")]
    text: String,

    /// Clip width
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Clip height
    #[arg(long, default_value_t = 240)]
    height: u32,

    /// Clip frame rate
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Clip length in seconds
    #[arg(long, default_value_t = 10)]
    duration: u32,

    /// Caption start in whole seconds
    #[arg(long, default_value_t = 2)]
    start: u32,

    /// Caption end in whole seconds
    #[arg(long, default_value_t = 4)]
    end: u32,

    /// ffmpeg program
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    /// ffprobe program
    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,televid_render_engine=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    if args.end <= args.start || args.end > args.duration {
        anyhow::bail!("caption must satisfy start < end <= duration");
    }

    if args.output_dir.exists() {
        std::fs::remove_dir_all(&args.output_dir)?;
    }
    std::fs::create_dir_all(&args.output_dir)?;

    tracing::info!("Starting caption check");
    tracing::info!(
        "Clip: {}x{} @ {}fps, {}s",
        args.width,
        args.height,
        args.fps,
        args.duration
    );

    // 1. Synthetic inputs
    let clip = synthetic::ClipSpec {
        width: args.width,
        height: args.height,
        fps: args.fps,
        duration_secs: args.duration,
    };
    let input = args.output_dir.join("source.mp4");
    let cues = args.output_dir.join("cues.srt");
    synthetic::create_test_clip(&args.ffmpeg, &clip, &input)?;
    synthetic::create_cue_file(&args.text, args.start, args.end, &cues)?;

    // 2. Render through the full pipeline
    let output = args.output_dir.join("captioned.mp4");
    render(&args, &input, &cues, &output)?;

    // 3. Decode both and compare
    let source_frames =
        synthetic::extract_frames(&args.ffmpeg, &input, &args.output_dir.join("frames_source"))?;
    let output_frames =
        synthetic::extract_frames(&args.ffmpeg, &output, &args.output_dir.join("frames_output"))?;
    if source_frames.len() as u64 != clip.frame_count() {
        tracing::warn!(
            "Decoded {} source frames, expected {}",
            source_frames.len(),
            clip.frame_count()
        );
    }
    let changed = verify::changed_frames(
        &source_frames,
        &output_frames,
        verify::DiffThresholds::default(),
    )?;

    let first = args.start as u64 * args.fps as u64;
    let last = args.end as u64 * args.fps as u64;
    let report = verify::evaluate(changed, source_frames.len(), first, last);
    verify::write_report(&args.output_dir.join("test_report.json"), &report)?;

    if report.overall_status != verify::TestStatus::Pass {
        anyhow::bail!(
            "caption frames wrong: unexpected {:?}, missing {:?}",
            report.unexpected,
            report.missing
        );
    }
    tracing::info!(
        "Caption check passed: frames {}..={} changed, {} frames compared",
        first,
        last,
        report.frames_compared
    );
    Ok(())
}

fn render(
    args: &Args,
    input: &std::path::Path,
    cues: &std::path::Path,
    output: &std::path::Path,
) -> Result<()> {
    tracing::info!("Rendering caption...");

    let encoder = EncoderSettings {
        video_codec: "libx264".to_string(),
        preset: "ultrafast".to_string(),
        crf: 0,
        pix_fmt: "yuv444p".to_string(),
        audio: AudioMode::None,
    };
    let fonts = BTreeMap::from([("default".to_string(), args.font.clone())]);

    let controller = PipelineController::new(
        Arc::new(FontResolver::new(fonts, StyleSheet::builtin())),
        Arc::new(FfprobeProbe::new(
            EngineCommand::new(&args.ffprobe),
            EngineCommand::new(&args.ffmpeg),
            Duration::from_secs(30),
        )),
        Arc::new(TranscodeOrchestrator::new(
            EngineCommand::new(&args.ffmpeg),
            encoder,
        )),
        PipelineSettings {
            work_dir: args.output_dir.join("work"),
            parse: Default::default(),
        },
    );

    let job = RenderJob::new(input, output, CueSource::file(cues)).with_limits(TranscodeLimits {
        timeout: Duration::from_secs(120),
        max_output_bytes: None,
    });
    let report = controller
        .render(job)
        .context("Caption render failed")?;
    tracing::info!(
        "Rendered {} ({} bytes, {} runs)",
        report.output.display(),
        report.output_bytes,
        report.drawn_runs
    );
    Ok(())
}
