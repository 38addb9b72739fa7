//! Compositor spec: the frame-exact drawing plan for a render job.
//!
//! Every cue becomes one [`DrawInstruction`] holding an inclusive frame
//! range and one absolutely positioned [`GlyphRun`] per rendered line.
//! Building a `CompositorSpec` is pure apart from font lookups through the resolver.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use televid_common::error::{TelevidError, TelevidResult};
use televid_cue_model::geometry::{FrameSize, Rect};
use televid_cue_model::style::{HorizontalAlign, StyleDefinition, VerticalAlign};
use televid_cue_model::CueTrack;
use televid_font_resolver::{ResolvedStyle, StyleResolve, TextMeasure};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Exact rational frame rate, e.g. `30000/1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> TelevidResult<Self> {
        if num == 0 || den == 0 {
            return Err(TelevidError::config(format!(
                "invalid frame rate {num}/{den}"
            )));
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Whole frames per second.
    pub fn from_fps(fps: u32) -> TelevidResult<Self> {
        Self::new(fps, 1)
    }

    pub fn num(&self) -> u32 {
        self.num
    }

    pub fn den(&self) -> u32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Frame on screen at `time`: `floor(time * fps)`. `None` when the
    /// frame number does not fit in a `u64`.
    pub fn floor_frame(&self, time: Duration) -> Option<u64> {
        let scaled = time.as_nanos() * self.num as u128;
        u64::try_from(scaled / (self.den as u128 * NANOS_PER_SEC)).ok()
    }

    /// `ceil(time * fps)`, `None` on overflow.
    pub fn ceil_frame(&self, time: Duration) -> Option<u64> {
        let scaled = time.as_nanos() * self.num as u128;
        let divisor = self.den as u128 * NANOS_PER_SEC;
        u64::try_from(scaled.div_ceil(divisor)).ok()
    }

    /// Presentation time of the start of `frame`.
    pub fn frame_time(&self, frame: u64) -> Duration {
        let nanos = frame as u128 * self.den as u128 * NANOS_PER_SEC / self.num as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for FrameRate {
    type Err = String;

    /// Accepts `num/den`, whole numbers, and decimals such as `29.97`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || format!("invalid frame rate '{s}'");
        if let Some((num, den)) = s.split_once('/') {
            let num = num.trim().parse::<u32>().map_err(|_| invalid())?;
            let den = den.trim().parse::<u32>().map_err(|_| invalid())?;
            return FrameRate::new(num, den).map_err(|e| e.to_string());
        }
        if let Ok(whole) = s.parse::<u32>() {
            return FrameRate::from_fps(whole).map_err(|e| e.to_string());
        }
        let value = s.parse::<f64>().map_err(|_| invalid())?;
        if !(value.is_finite() && value > 0.0) {
            return Err(invalid());
        }
        let num = (value * 1000.0).round();
        if num > u32::MAX as f64 {
            return Err(invalid());
        }
        FrameRate::new(num as u32, 1000).map_err(|e| e.to_string())
    }
}

/// Geometry of the source video the captions are burned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoGeometry {
    pub size: FrameSize,
    pub frame_rate: FrameRate,
    /// Total frame count, when the probe could determine it.
    pub frame_count: Option<u64>,
}

/// Inclusive range of frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameRange {
    pub first: u64,
    pub last: u64,
}

impl FrameRange {
    pub fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    pub fn len(&self) -> u64 {
        self.last.saturating_sub(self.first) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.first && frame <= self.last
    }

    /// Frames shared by both ranges.
    pub fn intersection(&self, other: &FrameRange) -> Option<FrameRange> {
        let first = self.first.max(other.first);
        let last = self.last.min(other.last);
        (first <= last).then_some(FrameRange { first, last })
    }
}

/// One rendered line of a cue at an absolute position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlyphRun {
    pub text: String,
    /// Top-left corner of the line box in frame pixels.
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl GlyphRun {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Drawing plan for one cue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawInstruction {
    /// Source index of the cue.
    pub cue_index: usize,
    pub frames: FrameRange,
    pub start: Duration,
    pub end: Duration,
    pub runs: Vec<GlyphRun>,
    /// Pixels the cue can touch, including outline and shadow.
    pub bbox: Rect,
    pub font_path: PathBuf,
    pub style: StyleDefinition,
}

impl DrawInstruction {
    /// Whether everything the cue draws stays inside the frame.
    pub fn fits(&self, frame: FrameSize) -> bool {
        frame.bounds().contains_rect(&self.bbox)
    }

    /// Blur radius of the style's shadow, when it has a soft one.
    pub fn shadow_blur(&self) -> Option<u32> {
        self.style.shadow.map(|s| s.blur).filter(|b| *b > 0)
    }
}

/// A cue that starts after the last frame of the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutOfRangeCue {
    pub cue_index: usize,
    pub first_frame: u64,
}

/// Immutable drawing plan for a whole job, consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositorSpec {
    pub video: VideoGeometry,
    pub instructions: Vec<DrawInstruction>,
    pub out_of_range: Vec<OutOfRangeCue>,
}

impl CompositorSpec {
    /// Number of glyph runs that will produce drawing operations.
    pub fn drawn_runs(&self) -> usize {
        self.instructions
            .iter()
            .flat_map(|i| i.runs.iter())
            .filter(|r| !r.text.is_empty())
            .count()
    }
}

/// Build the compositor spec for `track` on a video with `video` geometry.
///
/// Fails with `OverlapConflict` when two cues share frames and their text
/// regions collide. Cues that share frames but draw in disjoint regions are
/// fine, and cues that merely touch in time hand the boundary frame to the
/// later cue.
pub fn build_compositor_spec(
    track: &CueTrack,
    video: &VideoGeometry,
    resolver: &dyn StyleResolve,
) -> TelevidResult<CompositorSpec> {
    let mut resolved: BTreeMap<&str, ResolvedStyle> = BTreeMap::new();
    let mut instructions: Vec<DrawInstruction> = Vec::with_capacity(track.len());
    let mut out_of_range = Vec::new();

    for cue in track {
        if !resolved.contains_key(cue.style.as_str()) {
            resolved.insert(&cue.style, resolver.resolve(&cue.style)?);
        }
        let style = match resolved.get(cue.style.as_str()) {
            Some(style) => style,
            None => return Err(TelevidError::unknown_style(&cue.style)),
        };

        let (Some(first), Some(mut last)) = (
            video.frame_rate.floor_frame(cue.start),
            video.frame_rate.ceil_frame(cue.end),
        ) else {
            return Err(TelevidError::malformed_cue(
                cue.index,
                None,
                format!("cue time is beyond the last addressable frame at {}", video.frame_rate),
            ));
        };
        if let Some(count) = video.frame_count {
            if first >= count {
                tracing::warn!(
                    cue = cue.index,
                    first_frame = first,
                    frame_count = count,
                    "Cue starts after the last video frame; it will not be drawn"
                );
                out_of_range.push(OutOfRangeCue {
                    cue_index: cue.index,
                    first_frame: first,
                });
                continue;
            }
            last = last.min(count - 1);
        }
        let frames = FrameRange::new(first, last);

        let runs = layout_runs(&cue.text, &style.style, style.metrics.as_ref(), video.size);
        let bbox = bounding_box(&runs, &style.style);

        for earlier in instructions.iter_mut() {
            let Some(shared) = earlier.frames.intersection(&frames) else {
                continue;
            };
            if !earlier.bbox.intersects(&bbox) {
                continue;
            }
            // Cues that only touch in time share the boundary frame after
            // rounding; the earlier cue hands that frame over.
            let touching = earlier.end <= cue.start && earlier.frames.first < frames.first;
            if touching {
                earlier.frames.last = frames.first - 1;
                continue;
            }
            return Err(TelevidError::OverlapConflict {
                first: earlier.cue_index,
                second: cue.index,
                from: shared.first,
                to: shared.last,
            });
        }

        let instruction = DrawInstruction {
            cue_index: cue.index,
            frames,
            start: cue.start,
            end: cue.end,
            runs,
            bbox,
            font_path: style.font_path.clone(),
            style: style.style.clone(),
        };
        if !bbox.is_empty() && !instruction.fits(video.size) {
            tracing::warn!(
                cue = cue.index,
                x = bbox.x,
                y = bbox.y,
                w = bbox.w,
                h = bbox.h,
                "Caption extends past the frame edge and will be clipped"
            );
        }
        instructions.push(instruction);
    }

    tracing::debug!(
        instructions = instructions.len(),
        out_of_range = out_of_range.len(),
        width = video.size.width,
        height = video.size.height,
        fps = %video.frame_rate,
        "Built compositor spec"
    );

    Ok(CompositorSpec {
        video: *video,
        instructions,
        out_of_range,
    })
}

/// Wrap and position the lines of `text`.
pub fn layout_runs(
    text: &str,
    style: &StyleDefinition,
    metrics: &dyn TextMeasure,
    frame: FrameSize,
) -> Vec<GlyphRun> {
    let usable = frame.width.saturating_sub(style.margin_x.saturating_mul(2));
    let max_px = (usable as f64 * style.max_width_ratio).floor() as u32;

    let lines: Vec<String> = text
        .lines()
        .flat_map(|line| wrap_chars(line, style.wrap_chars))
        .flat_map(|line| wrap_pixels(&line, metrics, style.size, max_px))
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let line_height = metrics.line_height(style.size);
    let step = line_height as i64 + style.line_spacing as i64;
    let block_height = step * lines.len() as i64 - style.line_spacing as i64;

    let frame_w = frame.width as i64;
    let frame_h = frame.height as i64;
    let top = match style.anchor.vertical() {
        VerticalAlign::Top => style.margin_y as i64,
        VerticalAlign::Middle => (frame_h - block_height) / 2,
        VerticalAlign::Bottom => frame_h - style.margin_y as i64 - block_height,
    };

    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let width = metrics.line_width(&line, style.size);
            let x = match style.anchor.horizontal() {
                HorizontalAlign::Left => style.margin_x as i64,
                HorizontalAlign::Center => (frame_w - width as i64) / 2,
                HorizontalAlign::Right => frame_w - style.margin_x as i64 - width as i64,
            };
            GlyphRun {
                text: line,
                x: clamp_i32(x),
                y: clamp_i32(top + step * i as i64),
                width,
                height: line_height,
            }
        })
        .collect()
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Union of the line boxes grown by the outline, then by the shadow's offset
/// and blur.
pub fn bounding_box(runs: &[GlyphRun], style: &StyleDefinition) -> Rect {
    let text = runs
        .iter()
        .filter(|r| !r.text.is_empty())
        .fold(Rect::new(0, 0, 0, 0), |acc, r| acc.union(&r.rect()));
    if text.is_empty() {
        return text;
    }

    let sw = style.stroke_width;
    let outlined = text.expand(sw, sw, sw, sw);
    match style.shadow {
        Some(shadow) => {
            let (left, top, right, bottom) = shadow.reach();
            outlined.expand(left, top, right, bottom)
        }
        None => outlined,
    }
}

/// Greedy word wrap at `max_chars`; words longer than the limit are split.
pub fn wrap_chars(line: &str, max_chars: Option<usize>) -> Vec<String> {
    let Some(max) = max_chars.filter(|m| *m > 0) else {
        return vec![line.trim().to_string()];
    };

    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max);
            out.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        if current.is_empty() {
            current = word.iter().collect();
            current_len = word.len();
        } else if current_len + 1 + word.len() <= max {
            current.push(' ');
            current.extend(word.iter());
            current_len += 1 + word.len();
        } else {
            out.push(std::mem::replace(&mut current, word.iter().collect()));
            current_len = word.len();
        }
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

/// Greedy word wrap at `max_px` using real text widths. Single words wider
/// than the limit stay on their own line.
fn wrap_pixels(line: &str, metrics: &dyn TextMeasure, size: u32, max_px: u32) -> Vec<String> {
    if max_px == 0 || metrics.line_width(line, size) <= max_px {
        return vec![line.to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
            continue;
        }
        let candidate = format!("{current} {word}");
        if metrics.line_width(&candidate, size) <= max_px {
            current = candidate;
        } else {
            out.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
