//! Validate a cue file: parse, resolve styles, and lay out every cue.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use televid_common::config::AppConfig;
use televid_cue_model::geometry::FrameSize;
use televid_cue_model::srt::write_srt;
use televid_cue_model::style::StyleSheet;
use televid_cue_model::vtt::write_vtt;
use televid_cue_model::{load_cues, CueFormat, CueTrack};
use televid_font_resolver::{ApproximateResolver, FontResolver, Layered, StyleResolve};
use televid_render_engine::compositor::{build_compositor_spec, CompositorSpec, VideoGeometry};
use televid_render_engine::{FfprobeProbe, FrameRate, MediaProbe, PipelineSettings};

use super::{load_styles, print_json};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Cue file to check
    cues: PathBuf,

    /// Cue format, when the extension does not tell
    #[arg(long)]
    format: Option<CueFormat>,

    /// Extra style sheet layered over the configured styles
    #[arg(long)]
    styles: Option<PathBuf>,

    /// Take frame size, rate, and length from this video
    #[arg(long)]
    video: Option<PathBuf>,

    /// Frame size when no video is given
    #[arg(long, default_value = "1920x1080", value_parser = parse_size)]
    size: FrameSize,

    /// Frame rate when no video is given (e.g. 24, 29.97, 30000/1001)
    #[arg(long, default_value = "24")]
    fps: FrameRate,

    /// Measure text with the configured font files instead of estimates
    #[arg(long)]
    fonts: bool,

    /// Write the sorted, cleaned cues here (.srt or .vtt)
    #[arg(long)]
    normalize: Option<PathBuf>,

    /// Print the compositor spec as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    cues: usize,
    styles: Vec<&'a str>,
    spec: &'a CompositorSpec,
}

fn parse_size(value: &str) -> Result<FrameSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = w.trim().parse().map_err(|_| format!("bad width '{w}'"))?;
    let height: u32 = h.trim().parse().map_err(|_| format!("bad height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("frame size must be non-zero".to_string());
    }
    Ok(FrameSize::new(width, height))
}

fn write_normalized(track: &CueTrack, dest: &Path) -> anyhow::Result<()> {
    let body = match CueFormat::from_path(dest) {
        Some(CueFormat::Srt) => write_srt(track),
        Some(CueFormat::WebVtt) => write_vtt(track),
        _ => anyhow::bail!(
            "cannot normalize into {}: use a .srt or .vtt path",
            dest.display()
        ),
    };
    std::fs::write(dest, body).with_context(|| format!("Failed to write {}", dest.display()))
}

pub fn run(config: &AppConfig, args: ValidateArgs) -> anyhow::Result<()> {
    let base_styles = load_styles(config, args.styles.as_deref())?;
    let parse = PipelineSettings::from_config(config).parse;
    let document = load_cues(&args.cues, args.format, &parse)
        .with_context(|| format!("Invalid cue file {}", args.cues.display()))?;

    let geometry = match &args.video {
        Some(video) => FfprobeProbe::from_config(config).probe(video)?.geometry(),
        None => VideoGeometry {
            size: args.size,
            frame_rate: args.fps,
            frame_count: None,
        },
    };

    let base: Box<dyn StyleResolve> = if args.fonts {
        Box::new(FontResolver::new(config.resolved_fonts(), base_styles))
    } else {
        Box::new(ApproximateResolver::new(base_styles))
    };
    let overlay = document.styles.clone().unwrap_or_else(StyleSheet::empty);
    let resolver = Layered::new(base.as_ref(), &overlay);
    let spec = build_compositor_spec(&document.track, &geometry, &resolver)?;

    if let Some(dest) = &args.normalize {
        write_normalized(&document.track, dest)?;
    }

    let styles = document.track.style_names();
    if args.json {
        return print_json(&ValidationReport {
            cues: document.track.len(),
            styles,
            spec: &spec,
        });
    }

    println!("Validating cues at: {}", args.cues.display());
    println!("  Format: {}", document.track.format());
    println!("  Cues: {}", document.track.len());
    println!("  Styles: {}", styles.join(", "));
    println!(
        "  Frame: {}x{} @ {} fps",
        geometry.size.width, geometry.size.height, geometry.frame_rate
    );
    for instr in &spec.instructions {
        println!(
            "  #{:<4} frames {:>6}..={:<6} {} line(s), box {:?}",
            instr.cue_index,
            instr.frames.first,
            instr.frames.last,
            instr.runs.len(),
            instr.bbox
        );
    }
    if !spec.out_of_range.is_empty() {
        println!("\nCues starting after the last frame:");
        for cue in &spec.out_of_range {
            println!("  - #{} (frame {})", cue.cue_index, cue.first_frame);
        }
    }
    if let Some(dest) = &args.normalize {
        println!("\nNormalized cues written to {}", dest.display());
    }
    println!("\nCues are valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1280x720").unwrap(), FrameSize::new(1280, 720));
        assert_eq!(parse_size("640X360").unwrap(), FrameSize::new(640, 360));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn test_normalize_rejects_json_target() {
        let track = televid_cue_model::parse_cues(
            "1\n00:00:01,000 --> 00:00:02,000\nhi\n",
            CueFormat::Srt,
            &Default::default(),
        )
        .unwrap();
        let dest = std::env::temp_dir().join("televid_normalize_target.json");
        assert!(write_normalized(&track, &dest).is_err());
        assert!(!dest.exists());
    }
}
