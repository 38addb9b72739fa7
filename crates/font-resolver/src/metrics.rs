//! Text measurement.

use rusttype::{Font, Scale};

/// Pixel metrics for a single line of text at a given size.
pub trait TextMeasure: Send + Sync + std::fmt::Debug {
    /// Advance width of `text` in pixels, including kerning.
    fn line_width(&self, text: &str, size: u32) -> u32;

    /// Height of a line box (ascent plus descent).
    fn line_height(&self, size: u32) -> u32;
}

/// Metrics backed by a parsed TrueType/OpenType font.
#[derive(Clone)]
pub struct FontMetrics {
    font: Font<'static>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl FontMetrics {
    /// Parse font bytes. Returns `None` when the data is not a usable font.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let font = Font::try_from_vec(bytes)?;
        if font.glyph_count() == 0 {
            return None;
        }
        Some(Self { font })
    }
}

impl TextMeasure for FontMetrics {
    fn line_width(&self, text: &str, size: u32) -> u32 {
        let scale = Scale::uniform(size as f32);
        let mut width = 0.0f32;
        let mut previous = None;
        for ch in text.chars() {
            let glyph = self.font.glyph(ch).scaled(scale);
            let id = glyph.id();
            if let Some(prev) = previous {
                width += self.font.pair_kerning(scale, prev, id);
            }
            width += glyph.h_metrics().advance_width;
            previous = Some(id);
        }
        width.max(0.0).ceil() as u32
    }

    fn line_height(&self, size: u32) -> u32 {
        let v = self.font.v_metrics(Scale::uniform(size as f32));
        (v.ascent - v.descent).max(0.0).ceil() as u32
    }
}

/// Fixed-advance approximation: every character is `advance_ratio * size`
/// wide and lines are `size` tall.
///
/// Used where layout must be deterministic without a font file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMetrics {
    pub advance_ratio: f32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self { advance_ratio: 0.5 }
    }
}

impl TextMeasure for MonospaceMetrics {
    fn line_width(&self, text: &str, size: u32) -> u32 {
        let advance = self.advance_ratio * size as f32;
        (advance * text.chars().count() as f32).ceil() as u32
    }

    fn line_height(&self, size: u32) -> u32 {
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace_metrics() {
        let m = MonospaceMetrics::default();
        assert_eq!(m.line_width("HELLO", 40), 100);
        assert_eq!(m.line_width("", 40), 0);
        assert_eq!(m.line_height(40), 40);
    }

    #[test]
    fn test_garbage_bytes_are_not_a_font() {
        assert!(FontMetrics::from_bytes(b"definitely not a font".to_vec()).is_none());
        assert!(FontMetrics::from_bytes(Vec::new()).is_none());
    }
}
