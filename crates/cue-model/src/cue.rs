//! Timed text cues and cue tracks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use televid_common::error::{TelevidError, TelevidResult};

use crate::style::{StyleSheet, DEFAULT_STYLE};
use crate::{json, srt, vtt};

/// One timed text unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Zero-based position in the source document.
    pub index: usize,

    /// Offset from the start of the video at which the text appears.
    pub start: Duration,

    /// Offset at which the text disappears. Always greater than `start`.
    pub end: Duration,

    /// Text to render. Lines are separated by `\n`.
    pub text: String,

    /// Name of the style to render with.
    pub style: String,
}

impl Cue {
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Text split into display lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

/// A cue as read by a front end, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCue {
    pub index: usize,
    /// 1-based source line where the cue begins, if known.
    pub line: Option<usize>,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
    pub style: Option<String>,
}

/// Supported cue source grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueFormat {
    Srt,
    WebVtt,
    Json,
}

impl CueFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(CueFormat::Srt),
            "vtt" | "webvtt" => Some(CueFormat::WebVtt),
            "json" => Some(CueFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CueFormat::Srt => "srt",
            CueFormat::WebVtt => "vtt",
            CueFormat::Json => "json",
        }
    }
}

impl fmt::Display for CueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CueFormat::Srt => "srt",
            CueFormat::WebVtt => "webvtt",
            CueFormat::Json => "json",
        })
    }
}

impl FromStr for CueFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim())
            .ok_or_else(|| format!("unknown cue format '{s}' (expected srt, vtt or json)"))
    }
}

/// Options applied while turning raw cues into a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Style assigned to cues that do not name one.
    pub default_style: String,

    /// Reject cues whose text is empty after cleanup.
    pub require_text: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_style: DEFAULT_STYLE.to_string(),
            require_text: true,
        }
    }
}

impl ParseOptions {
    pub fn with_default_style(mut self, style: impl Into<String>) -> Self {
        self.default_style = style.into();
        self
    }

    pub fn allow_empty_text(mut self) -> Self {
        self.require_text = false;
        self
    }
}

/// An ordered sequence of validated cues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueTrack {
    cues: Vec<Cue>,
    format: CueFormat,
}

impl CueTrack {
    /// Validate raw cues and sort them by start time.
    ///
    /// The sort is stable, so cues sharing a start keep their input order.
    pub fn from_raw(
        raw: Vec<RawCue>,
        format: CueFormat,
        options: &ParseOptions,
    ) -> TelevidResult<Self> {
        let mut cues = Vec::with_capacity(raw.len());
        for raw_cue in raw {
            if raw_cue.end <= raw_cue.start {
                return Err(TelevidError::malformed_cue(
                    raw_cue.index,
                    raw_cue.line,
                    format!(
                        "end {:.3}s is not after start {:.3}s",
                        raw_cue.end.as_secs_f64(),
                        raw_cue.start.as_secs_f64()
                    ),
                ));
            }
            if options.require_text && raw_cue.text.trim().is_empty() {
                return Err(TelevidError::malformed_cue(
                    raw_cue.index,
                    raw_cue.line,
                    "cue text is empty",
                ));
            }
            let style = match raw_cue.style {
                Some(name) if !name.trim().is_empty() => name.trim().to_string(),
                _ => options.default_style.clone(),
            };
            cues.push(Cue {
                index: raw_cue.index,
                start: raw_cue.start,
                end: raw_cue.end,
                text: raw_cue.text,
                style,
            });
        }

        cues.sort_by_key(|c| c.start);
        Ok(Self { cues, format })
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn format(&self) -> CueFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    /// End of the last cue to disappear.
    pub fn last_end(&self) -> Option<Duration> {
        self.cues.iter().map(|c| c.end).max()
    }

    /// Distinct style names referenced by the track, in first-use order.
    pub fn style_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for cue in &self.cues {
            if !names.contains(&cue.style.as_str()) {
                names.push(&cue.style);
            }
        }
        names
    }
}

impl<'a> IntoIterator for &'a CueTrack {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

/// A parsed cue source: the track plus any styles the source declared.
#[derive(Debug, Clone)]
pub struct CueDocument {
    pub track: CueTrack,
    pub styles: Option<StyleSheet>,
}

/// Parse cue source text into a validated, sorted track.
pub fn parse_cues(
    input: &str,
    format: CueFormat,
    options: &ParseOptions,
) -> TelevidResult<CueTrack> {
    parse_document(input, format, options).map(|doc| doc.track)
}

/// Parse cue source text, keeping embedded style declarations.
pub fn parse_document(
    input: &str,
    format: CueFormat,
    options: &ParseOptions,
) -> TelevidResult<CueDocument> {
    let (raw, styles) = match format {
        CueFormat::Srt => (srt::parse_srt(input)?, None),
        CueFormat::WebVtt => (vtt::parse_vtt(input)?, None),
        CueFormat::Json => json::parse_json(input)?,
    };
    let track = CueTrack::from_raw(raw, format, options)?;
    tracing::debug!(format = %format, cues = track.len(), "Parsed cue source");
    Ok(CueDocument { track, styles })
}

/// Read and parse a cue file. The format is taken from `format` or, when
/// absent, from the file extension.
pub fn load_cues(
    path: &Path,
    format: Option<CueFormat>,
    options: &ParseOptions,
) -> TelevidResult<CueDocument> {
    let format = match format.or_else(|| CueFormat::from_path(path)) {
        Some(f) => f,
        None => {
            return Err(TelevidError::config(format!(
                "cannot detect cue format of {} (use .srt, .vtt or .json)",
                path.display()
            )))
        }
    };
    if !path.exists() {
        return Err(TelevidError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_document(&content, format, options)
}

/// Remove inline markup the renderer does not interpret.
///
/// Strips `<i>`-style tags and `{\an8}`-style override blocks, normalizes
/// line endings and trims each line. A `<` or `{` with no closing bracket is
/// kept as text.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(['<', '{']) {
        out.push_str(&rest[..pos]);
        let open = &rest[pos..];
        let (close_char, is_tag) = if open.starts_with('<') {
            ('>', true)
        } else {
            ('}', open.starts_with("{\\"))
        };
        match open.find(close_char) {
            Some(end) if is_tag && !open[..end].contains('\n') => {
                rest = &open[end + 1..];
            }
            _ => {
                out.push_str(&open[..1]);
                rest = &open[1..];
            }
        }
    }
    out.push_str(rest);

    out.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
