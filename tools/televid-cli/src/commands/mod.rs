pub mod batch;
pub mod check;
pub mod init;
pub mod probe;
pub mod render;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use televid_common::config::AppConfig;
use televid_cue_model::style::StyleSheet;
use televid_font_resolver::FontResolver;
use televid_render_engine::{
    FfprobeProbe, PipelineController, PipelineSettings, ProgressCallback, RenderProgress,
    RenderStage, TranscodeOrchestrator,
};

/// Built-in styles, overlaid by the configured sheet, then by `extra`.
pub fn load_styles(config: &AppConfig, extra: Option<&Path>) -> anyhow::Result<StyleSheet> {
    let mut sheet = StyleSheet::builtin();
    for path in config.style_sheet.as_deref().into_iter().chain(extra) {
        let loaded = StyleSheet::load(path)
            .with_context(|| format!("Failed to load style sheet {}", path.display()))?;
        sheet.merge(loaded);
    }
    Ok(sheet)
}

/// Controller wired to the real font files, ffprobe, and ffmpeg.
pub fn build_controller(config: &AppConfig, styles: StyleSheet) -> PipelineController {
    PipelineController::new(
        Arc::new(FontResolver::new(config.resolved_fonts(), styles)),
        Arc::new(FfprobeProbe::from_config(config)),
        Arc::new(TranscodeOrchestrator::from_config(config)),
        PipelineSettings::from_config(config),
    )
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Single-line progress display on stderr.
pub fn console_progress() -> ProgressCallback {
    Arc::new(|p: RenderProgress| match p.stage {
        RenderStage::Transcoding => eprint!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        ),
        RenderStage::Complete => eprintln!("\r  Progress: 100.0%{}", " ".repeat(40)),
        _ => {}
    })
}
