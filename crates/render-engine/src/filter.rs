//! Engine argument construction.
//!
//! Turns a [`CompositorSpec`] into the ffmpeg argument list. Caption text is
//! never embedded in the graph: each glyph run is written to its own text
//! file and referenced with `textfile=` and `expansion=none`, so only paths,
//! numbers and colors pass through the escaping below.
//!
//! Cues with a blurred shadow get their own branch of the graph:
//!
//! ```text
//! [in]split[tvN][svN]
//! [svN]format=yuva420p,lutyuv=a=0,drawtext(shadow)...,boxblur[shN]
//! [tvN][shN]overlay[ovN]      -> text drawtext filters continue from [ovN]
//! ```

use std::path::{Path, PathBuf};

use televid_common::config::{AudioMode, EncoderSettings};
use televid_common::error::{TelevidError, TelevidResult};
use televid_cue_model::geometry::FrameSize;
use televid_cue_model::style::{Color, Shadow};

use crate::compositor::{CompositorSpec, DrawInstruction, GlyphRun};

/// Graphs longer than this are passed through a script file instead of argv.
pub const GRAPH_INLINE_LIMIT: usize = 32 * 1024;

/// Escape a value for use inside a filter option list (`key=value:key=value`).
pub fn escape_option_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

/// Escape a filter's argument string for the filter-graph level.
pub fn escape_graph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `0xRRGGBB@alpha` as understood by drawtext.
pub fn ffmpeg_color(color: Color) -> String {
    format!(
        "0x{:02X}{:02X}{:02X}@{:.3}",
        color.r,
        color.g,
        color.b,
        color.opacity()
    )
}

/// Text files for every drawable glyph run, indexed `[instruction][run]`.
#[derive(Debug, Clone, Default)]
pub struct TextFiles {
    files: Vec<Vec<Option<PathBuf>>>,
}

impl TextFiles {
    pub fn get(&self, instruction: usize, run: usize) -> Option<&Path> {
        self.files
            .get(instruction)
            .and_then(|runs| runs.get(run))
            .and_then(|p| p.as_deref())
    }

    pub fn len(&self) -> usize {
        self.files.iter().flatten().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write each non-empty glyph run's text to `dir`.
pub fn materialize_text_files(spec: &CompositorSpec, dir: &Path) -> TelevidResult<TextFiles> {
    std::fs::create_dir_all(dir)?;
    let mut files = Vec::with_capacity(spec.instructions.len());

    for instruction in &spec.instructions {
        let mut runs = Vec::with_capacity(instruction.runs.len());
        for (line, run) in instruction.runs.iter().enumerate() {
            if run.text.is_empty() {
                runs.push(None);
                continue;
            }
            let path = dir.join(format!("cue{}_line{line}.txt", instruction.cue_index));
            std::fs::write(&path, run.text.as_bytes()).map_err(|e| {
                TelevidError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write caption text {}: {e}", path.display()),
                ))
            })?;
            runs.push(Some(path));
        }
        files.push(runs);
    }

    Ok(TextFiles { files })
}

/// One `drawtext` filter for a glyph run, escaped for the graph level.
///
/// Hard shadows are drawn by drawtext itself; blurred shadows are left to
/// [`shadow_drawtext_filter`] on a separate layer.
pub fn drawtext_filter(instruction: &DrawInstruction, run: &GlyphRun, text_file: &Path) -> String {
    let style = &instruction.style;
    let mut options = base_options(instruction, text_file);
    options.push(("fontcolor", ffmpeg_color(style.fill)));
    options.push(("x", run.x.to_string()));
    options.push(("y", run.y.to_string()));

    if style.stroke_width > 0 {
        options.push(("borderw", style.stroke_width.to_string()));
        options.push(("bordercolor", ffmpeg_color(style.stroke)));
    }
    if let Some(shadow) = style.shadow.filter(|s| s.blur == 0) {
        options.push(("shadowcolor", ffmpeg_color(shadow.color)));
        options.push(("shadowx", shadow.offset_x.to_string()));
        options.push(("shadowy", shadow.offset_y.to_string()));
    }
    finish_filter("drawtext", instruction, options)
}

/// The shadow copy of a glyph run: outlined text in the shadow color,
/// shifted by the shadow offset.
pub fn shadow_drawtext_filter(
    instruction: &DrawInstruction,
    run: &GlyphRun,
    text_file: &Path,
    shadow: Shadow,
) -> String {
    let style = &instruction.style;
    let mut options = base_options(instruction, text_file);
    options.push(("fontcolor", ffmpeg_color(shadow.color)));
    options.push(("x", run.x.saturating_add(shadow.offset_x).to_string()));
    options.push(("y", run.y.saturating_add(shadow.offset_y).to_string()));
    if style.stroke_width > 0 {
        options.push(("borderw", style.stroke_width.to_string()));
        options.push(("bordercolor", ffmpeg_color(shadow.color)));
    }
    finish_filter("drawtext", instruction, options)
}

fn base_options(instruction: &DrawInstruction, text_file: &Path) -> Vec<(&'static str, String)> {
    vec![
        ("fontfile", instruction.font_path.display().to_string()),
        ("textfile", text_file.display().to_string()),
        ("expansion", "none".to_string()),
        ("fontsize", instruction.style.size.to_string()),
    ]
}

/// Append fade alpha and frame gating, then escape.
fn finish_filter(
    name: &str,
    instruction: &DrawInstruction,
    mut options: Vec<(&'static str, String)>,
) -> String {
    if name == "drawtext" {
        if let Some(alpha) = fade_expression(instruction) {
            options.push(("alpha", alpha));
        }
    }
    options.push(("enable", enable_expression(instruction)));

    let args = options
        .iter()
        .map(|(key, value)| format!("{key}={}", escape_option_value(value)))
        .collect::<Vec<_>>()
        .join(":");

    format!("{name}={}", escape_graph(&args))
}

fn enable_expression(instruction: &DrawInstruction) -> String {
    format!(
        "between(n,{},{})",
        instruction.frames.first, instruction.frames.last
    )
}

/// Blur radius boxblur accepts for this frame size. Chroma planes of
/// `yuva420p` are half size and the radius must stay within half of them.
pub fn blur_radius(blur: u32, frame: FrameSize) -> u32 {
    let limit = (frame.width.min(frame.height) / 4).max(1);
    blur.clamp(1, limit)
}

/// Graph statements that paint the blurred shadow of instruction `index`
/// under the stream labelled `input`; the result is labelled `ov{index}`.
fn soft_shadow_statements(
    index: usize,
    input: &str,
    instruction: &DrawInstruction,
    runs: &[(&GlyphRun, &Path)],
    shadow: Shadow,
    radius: u32,
) -> Vec<String> {
    let mut layer = vec!["format=yuva420p".to_string(), "lutyuv=a=0".to_string()];
    layer.extend(
        runs.iter()
            .map(|(run, file)| shadow_drawtext_filter(instruction, run, file, shadow)),
    );
    layer.push(finish_filter(
        "boxblur",
        instruction,
        vec![
            ("luma_radius", radius.to_string()),
            ("luma_power", "2".to_string()),
        ],
    ));

    vec![
        format!("[{input}]split[tv{index}][sv{index}]"),
        format!("[sv{index}]{}[sh{index}]", layer.join(",")),
        format!(
            "[tv{index}][sh{index}]{}[ov{index}]",
            finish_filter("overlay", instruction, Vec::new())
        ),
    ]
}

/// Alpha ramp for styles with fade-in or fade-out.
fn fade_expression(instruction: &DrawInstruction) -> Option<String> {
    let fade_in = instruction.style.fade_in_ms as f64 / 1000.0;
    let fade_out = instruction.style.fade_out_ms as f64 / 1000.0;
    if fade_in <= 0.0 && fade_out <= 0.0 {
        return None;
    }

    let start = instruction.start.as_secs_f64();
    let end = instruction.end.as_secs_f64();
    let tail = if fade_out > 0.0 {
        format!(
            "if(gt(t,{fo_start:.6}),({end:.6}-t)/{fade_out:.6},1)",
            fo_start = end - fade_out
        )
    } else {
        "1".to_string()
    };
    let expr = if fade_in > 0.0 {
        format!(
            "if(lt(t,{fi_end:.6}),(t-{start:.6})/{fade_in:.6},{tail})",
            fi_end = start + fade_in
        )
    } else {
        tail
    };
    Some(format!("clip({expr},0,1)"))
}

/// The complete video filter graph: `[0:v]` in, `[vout]` out.
pub fn build_filter_graph(spec: &CompositorSpec, text_files: &TextFiles) -> String {
    let mut statements: Vec<String> = Vec::new();
    let mut input = "0:v".to_string();
    let mut chain: Vec<String> = Vec::new();

    for (i, instruction) in spec.instructions.iter().enumerate() {
        let runs: Vec<(&GlyphRun, &Path)> = instruction
            .runs
            .iter()
            .enumerate()
            .filter_map(|(r, run)| text_files.get(i, r).map(|file| (run, file)))
            .collect();
        if runs.is_empty() {
            continue;
        }

        if let (Some(shadow), Some(blur)) = (instruction.style.shadow, instruction.shadow_blur()) {
            if !chain.is_empty() {
                let label = format!("v{i}");
                statements.push(format!("[{input}]{}[{label}]", chain.join(",")));
                chain.clear();
                input = label;
            }
            let radius = blur_radius(blur, spec.video.size);
            statements.extend(soft_shadow_statements(
                i,
                &input,
                instruction,
                &runs,
                shadow,
                radius,
            ));
            input = format!("ov{i}");
        }

        chain.extend(
            runs.iter()
                .map(|(run, file)| drawtext_filter(instruction, run, file)),
        );
    }

    let tail = if chain.is_empty() {
        "null".to_string()
    } else {
        chain.join(",")
    };
    statements.push(format!("[{input}]{tail}[vout]"));
    statements.join(";")
}

/// How the filter graph reaches the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterGraphArg {
    Inline(String),
    Script(PathBuf),
}

/// Pass small graphs inline; write large ones to `dir/filter_graph.txt`.
pub fn prepare_filter_graph(graph: String, dir: &Path) -> TelevidResult<FilterGraphArg> {
    if graph.len() <= GRAPH_INLINE_LIMIT {
        return Ok(FilterGraphArg::Inline(graph));
    }
    let path = dir.join("filter_graph.txt");
    std::fs::write(&path, graph.as_bytes())?;
    tracing::debug!(
        path = %path.display(),
        bytes = graph.len(),
        "Filter graph written to script file"
    );
    Ok(FilterGraphArg::Script(path))
}

/// Encoder arguments for the configured codecs.
pub fn codec_args(encoder: &EncoderSettings, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-c:v".to_string(),
        encoder.video_codec.clone(),
        "-preset".to_string(),
        encoder.preset.clone(),
        "-crf".to_string(),
        encoder.crf.to_string(),
        "-pix_fmt".to_string(),
        encoder.pix_fmt.clone(),
    ];

    match &encoder.audio {
        AudioMode::Copy => args.extend(["-c:a".to_string(), "copy".to_string()]),
        AudioMode::Encode {
            codec,
            bitrate_kbps,
        } => args.extend([
            "-c:a".to_string(),
            codec.clone(),
            "-b:a".to_string(),
            format!("{}k", (*bitrate_kbps).max(32)),
        ]),
        AudioMode::None => args.push("-an".to_string()),
    }

    let mp4_family = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "mp4" | "mov" | "m4v"))
        .unwrap_or(false);
    if mp4_family {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    args
}

/// Full engine argument list for one transcode.
pub fn build_transcode_args(
    input: &Path,
    output: &Path,
    graph: &FilterGraphArg,
    encoder: &EncoderSettings,
) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-nostdin",
        "-y",
        "-loglevel",
        "error",
        "-progress",
        "pipe:1",
        "-nostats",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(input.display().to_string());

    match graph {
        FilterGraphArg::Inline(graph) => {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }
        FilterGraphArg::Script(path) => {
            args.push("-filter_complex_script".to_string());
            args.push(path.display().to_string());
        }
    }

    args.push("-map".to_string());
    args.push("[vout]".to_string());
    if encoder.audio != AudioMode::None {
        args.push("-map".to_string());
        args.push("0:a?".to_string());
    }

    args.extend(codec_args(encoder, output));
    args.push(output.display().to_string());
    args
}
