//! Caption styles.
//!
//! A [`StyleDefinition`] is a named bundle of rendering parameters. Cues refer
//! to styles by name; a [`StyleSheet`] holds the known definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use televid_common::error::{TelevidError, TelevidResult};

/// Name of the style used when a cue does not name one.
pub const DEFAULT_STYLE: &str = "default";

/// Font asset id used by the built-in styles.
pub const DEFAULT_FONT: &str = "default";

/// Upper bound for every pixel quantity in a style (size, outline, margins,
/// spacing, shadow offset).
pub const MAX_STYLE_PIXELS: u32 = 8192;

/// Upper bound for a shadow's blur radius.
pub const MAX_SHADOW_BLUR: u32 = 256;

/// An sRGB color with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Alpha as a `[0.0, 1.0]` fraction.
    pub fn opacity(&self) -> f64 {
        self.a as f64 / 255.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02X}{:02X}{:02X}{:02X}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "white" => return Ok(Color::WHITE),
            "black" => return Ok(Color::BLACK),
            "yellow" => return Ok(Color::rgb(255, 255, 0)),
            "red" => return Ok(Color::rgb(255, 0, 0)),
            "transparent" => return Ok(Color::rgba(0, 0, 0, 0)),
            _ => {}
        }

        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .ok_or_else(|| format!("unknown color '{s}' (use #RRGGBB or #RRGGBBAA)"))?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("invalid hex color '{s}'"));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        match hex.len() {
            6 => Ok(Color::rgb(
                channel(0).map_err(|e| e.to_string())?,
                channel(2).map_err(|e| e.to_string())?,
                channel(4).map_err(|e| e.to_string())?,
            )),
            8 => Ok(Color::rgba(
                channel(0).map_err(|e| e.to_string())?,
                channel(2).map_err(|e| e.to_string())?,
                channel(4).map_err(|e| e.to_string())?,
                channel(6).map_err(|e| e.to_string())?,
            )),
            _ => Err(format!("hex color '{s}' must have 6 or 8 digits")),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Where a caption block sits on the frame (numpad layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Horizontal placement component of an [`Anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

/// Vertical placement component of an [`Anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

impl Anchor {
    pub fn horizontal(self) -> HorizontalAlign {
        match self {
            Anchor::TopLeft | Anchor::MiddleLeft | Anchor::BottomLeft => HorizontalAlign::Left,
            Anchor::TopCenter | Anchor::Center | Anchor::BottomCenter => HorizontalAlign::Center,
            Anchor::TopRight | Anchor::MiddleRight | Anchor::BottomRight => HorizontalAlign::Right,
        }
    }

    pub fn vertical(self) -> VerticalAlign {
        match self {
            Anchor::TopLeft | Anchor::TopCenter | Anchor::TopRight => VerticalAlign::Top,
            Anchor::MiddleLeft | Anchor::Center | Anchor::MiddleRight => VerticalAlign::Middle,
            Anchor::BottomLeft | Anchor::BottomCenter | Anchor::BottomRight => {
                VerticalAlign::Bottom
            }
        }
    }
}

/// Drop shadow drawn under the text.
///
/// With `blur == 0` the shadow is a hard copy of the glyphs. A positive blur
/// renders the outlined text on its own layer and box-blurs it, giving a
/// soft glow when the offset is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shadow {
    pub color: Color,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
    /// Blur radius in pixels.
    #[serde(default)]
    pub blur: u32,
}

impl Shadow {
    /// Soft shadow: a blurred, unshifted copy of the outlined text.
    pub fn soft(color: Color, blur: u32) -> Self {
        Self {
            color,
            offset_x: 0,
            offset_y: 0,
            blur,
        }
    }

    /// How far the shadow reaches past the text on each side, as
    /// `(left, top, right, bottom)`.
    pub fn reach(&self) -> (u32, u32, u32, u32) {
        let dx = self.offset_x.unsigned_abs();
        let dy = self.offset_y.unsigned_abs();
        let grow = |toward: bool, d: u32| {
            if toward {
                d.saturating_add(self.blur)
            } else {
                self.blur
            }
        };
        (
            grow(self.offset_x < 0, dx),
            grow(self.offset_y < 0, dy),
            grow(self.offset_x > 0, dx),
            grow(self.offset_y > 0, dy),
        )
    }
}

/// Named bundle of rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDefinition {
    /// Style name cues refer to.
    pub name: String,

    /// Font asset identifier, mapped to a file by the font resolver.
    #[serde(default = "default_font")]
    pub font: String,

    /// Font size in pixels.
    #[serde(default = "default_size")]
    pub size: u32,

    /// Text fill color.
    #[serde(default = "default_fill")]
    pub fill: Color,

    /// Outline color.
    #[serde(default = "default_stroke")]
    pub stroke: Color,

    /// Outline width in pixels (0 = no outline).
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    /// Screen anchor of the text block.
    #[serde(default = "default_anchor")]
    pub anchor: Anchor,

    /// Horizontal distance from the anchored edge.
    #[serde(default = "default_margin_x")]
    pub margin_x: u32,

    /// Vertical distance from the anchored edge.
    #[serde(default = "default_margin_y")]
    pub margin_y: u32,

    /// Extra pixels between lines.
    #[serde(default = "default_line_spacing")]
    pub line_spacing: u32,

    /// Optional drop shadow.
    #[serde(default)]
    pub shadow: Option<Shadow>,

    /// Fade-in duration at cue start.
    #[serde(default)]
    pub fade_in_ms: u32,

    /// Fade-out duration at cue end.
    #[serde(default)]
    pub fade_out_ms: u32,

    /// Wrap lines longer than this many characters.
    #[serde(default = "default_wrap_chars")]
    pub wrap_chars: Option<usize>,

    /// Wrap lines wider than this fraction of the usable frame width.
    #[serde(default = "default_max_width_ratio")]
    pub max_width_ratio: f64,
}

fn default_font() -> String {
    DEFAULT_FONT.to_string()
}
fn default_size() -> u32 {
    40
}
fn default_fill() -> Color {
    Color::WHITE
}
fn default_stroke() -> Color {
    Color::BLACK
}
fn default_stroke_width() -> u32 {
    2
}
fn default_anchor() -> Anchor {
    Anchor::Center
}
fn default_margin_x() -> u32 {
    40
}
fn default_margin_y() -> u32 {
    37
}
fn default_line_spacing() -> u32 {
    5
}
fn default_wrap_chars() -> Option<usize> {
    Some(30)
}
fn default_max_width_ratio() -> f64 {
    1.0
}

impl StyleDefinition {
    /// A style with the built-in defaults and the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            font: default_font(),
            size: default_size(),
            fill: default_fill(),
            stroke: default_stroke(),
            stroke_width: default_stroke_width(),
            anchor: default_anchor(),
            margin_x: default_margin_x(),
            margin_y: default_margin_y(),
            line_spacing: default_line_spacing(),
            shadow: Some(Shadow {
                color: Color::rgba(0, 0, 0, 160),
                offset_x: 2,
                offset_y: 2,
                blur: 0,
            }),
            fade_in_ms: 0,
            fade_out_ms: 0,
            wrap_chars: default_wrap_chars(),
            max_width_ratio: default_max_width_ratio(),
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    /// Reject definitions that cannot be laid out.
    pub fn validate(&self) -> TelevidResult<()> {
        if self.name.trim().is_empty() {
            return Err(TelevidError::config("style name must not be empty"));
        }
        if self.font.trim().is_empty() {
            return Err(TelevidError::config(format!(
                "style '{}' has an empty font id",
                self.name
            )));
        }
        if self.size == 0 {
            return Err(TelevidError::config(format!(
                "style '{}' has zero font size",
                self.name
            )));
        }
        let pixels = [
            ("size", self.size),
            ("stroke_width", self.stroke_width),
            ("margin_x", self.margin_x),
            ("margin_y", self.margin_y),
            ("line_spacing", self.line_spacing),
        ];
        for (field, value) in pixels {
            if value > MAX_STYLE_PIXELS {
                return Err(TelevidError::config(format!(
                    "style '{}' {field} {value} exceeds {MAX_STYLE_PIXELS} px",
                    self.name
                )));
            }
        }
        if let Some(shadow) = &self.shadow {
            let offset = shadow.offset_x.unsigned_abs().max(shadow.offset_y.unsigned_abs());
            if offset > MAX_STYLE_PIXELS {
                return Err(TelevidError::config(format!(
                    "style '{}' shadow offset exceeds {MAX_STYLE_PIXELS} px",
                    self.name
                )));
            }
            if shadow.blur > MAX_SHADOW_BLUR {
                return Err(TelevidError::config(format!(
                    "style '{}' shadow blur exceeds {MAX_SHADOW_BLUR} px",
                    self.name
                )));
            }
        }
        if !(self.max_width_ratio > 0.0 && self.max_width_ratio <= 1.0) {
            return Err(TelevidError::config(format!(
                "style '{}' max_width_ratio must be in (0, 1]",
                self.name
            )));
        }
        if self.wrap_chars == Some(0) {
            return Err(TelevidError::config(format!(
                "style '{}' wrap_chars must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// The set of styles known to a render.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    styles: BTreeMap<String, StyleDefinition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StyleSheetFile {
    Bare(Vec<StyleDefinition>),
    Wrapped { styles: Vec<StyleDefinition> },
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StyleSheet {
    /// Sheet with no styles at all.
    pub fn empty() -> Self {
        Self {
            styles: BTreeMap::new(),
        }
    }

    /// Built-in styles: `default` (centered) plus `top` and `bottom` variants.
    pub fn builtin() -> Self {
        let mut sheet = Self::empty();
        sheet.insert(StyleDefinition::named(DEFAULT_STYLE));
        sheet.insert(StyleDefinition::named("top").with_anchor(Anchor::TopCenter));
        sheet.insert(StyleDefinition::named("bottom").with_anchor(Anchor::BottomCenter));
        sheet
    }

    /// Parse a JSON sheet: either an array of styles or `{ "styles": [...] }`.
    pub fn from_json(json: &str) -> TelevidResult<Self> {
        let file: StyleSheetFile = serde_json::from_str(json)?;
        let list = match file {
            StyleSheetFile::Bare(list) => list,
            StyleSheetFile::Wrapped { styles } => styles,
        };
        let mut sheet = Self::empty();
        for style in list {
            style.validate()?;
            sheet.insert(style);
        }
        Ok(sheet)
    }

    /// Load a JSON sheet from disk.
    pub fn load(path: &Path) -> TelevidResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TelevidError::config(format!("Failed to read style sheet {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Insert or replace a style by name.
    pub fn insert(&mut self, style: StyleDefinition) -> Option<StyleDefinition> {
        self.styles.insert(style.name.clone(), style)
    }

    /// Overlay `other` on top of this sheet; same-named styles are replaced.
    pub fn merge(&mut self, other: StyleSheet) {
        for (_, style) in other.styles {
            self.insert(style);
        }
    }

    pub fn get(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDefinition> {
        self.styles.values()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}
