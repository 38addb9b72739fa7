//! Style name → font asset resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use televid_common::error::{TelevidError, TelevidResult};
use televid_cue_model::style::{StyleDefinition, StyleSheet};

use crate::metrics::{FontMetrics, MonospaceMetrics, TextMeasure};

/// A style bound to a loadable font file.
#[derive(Debug, Clone)]
pub struct ResolvedStyle {
    pub style: StyleDefinition,
    /// Font asset identifier the style referenced.
    pub font_id: String,
    /// Verified path of the font file.
    pub font_path: PathBuf,
    /// Metrics for the loaded font.
    pub metrics: Arc<dyn TextMeasure>,
}

/// Anything that can turn a style name into a [`ResolvedStyle`].
pub trait StyleResolve: Send + Sync {
    /// Look up a style definition by name.
    fn style(&self, name: &str) -> Option<&StyleDefinition>;

    /// Bind a definition to its font asset.
    fn bind(&self, style: &StyleDefinition) -> TelevidResult<ResolvedStyle>;

    fn resolve(&self, style_name: &str) -> TelevidResult<ResolvedStyle> {
        let style = self
            .style(style_name)
            .ok_or_else(|| TelevidError::unknown_style(style_name))?;
        self.bind(style)
    }
}

/// A resolver whose style lookups check `overlay` before the base resolver.
///
/// Fonts are still bound (and cached) by the base.
pub struct Layered<'a> {
    base: &'a dyn StyleResolve,
    overlay: &'a StyleSheet,
}

impl<'a> Layered<'a> {
    pub fn new(base: &'a dyn StyleResolve, overlay: &'a StyleSheet) -> Self {
        Self { base, overlay }
    }
}

impl StyleResolve for Layered<'_> {
    fn style(&self, name: &str) -> Option<&StyleDefinition> {
        self.overlay.get(name).or_else(|| self.base.style(name))
    }

    fn bind(&self, style: &StyleDefinition) -> TelevidResult<ResolvedStyle> {
        self.base.bind(style)
    }
}

/// Resolves styles without reading any font file.
///
/// Layout uses [`MonospaceMetrics`] and the font path is the bare font id, so
/// the result is only fit for dry-run validation.
#[derive(Debug, Clone)]
pub struct ApproximateResolver {
    styles: StyleSheet,
    metrics: MonospaceMetrics,
}

impl ApproximateResolver {
    pub fn new(styles: StyleSheet) -> Self {
        Self {
            styles,
            metrics: MonospaceMetrics::default(),
        }
    }
}

impl StyleResolve for ApproximateResolver {
    fn style(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(name)
    }

    fn bind(&self, style: &StyleDefinition) -> TelevidResult<ResolvedStyle> {
        Ok(ResolvedStyle {
            style: style.clone(),
            font_id: style.font.clone(),
            font_path: PathBuf::from(&style.font),
            metrics: Arc::new(self.metrics),
        })
    }
}

#[derive(Debug)]
struct FontSlot {
    path: PathBuf,
    loaded: OnceLock<Arc<FontMetrics>>,
}

/// Resolves styles against a font asset map.
///
/// Each font file is parsed on first use and kept for the resolver's
/// lifetime; a resolver can be shared across threads by reference.
#[derive(Debug)]
pub struct FontResolver {
    fonts: BTreeMap<String, FontSlot>,
    styles: StyleSheet,
}

impl FontResolver {
    pub fn new(font_assets: BTreeMap<String, PathBuf>, styles: StyleSheet) -> Self {
        let fonts = font_assets
            .into_iter()
            .map(|(id, path)| {
                (
                    id,
                    FontSlot {
                        path,
                        loaded: OnceLock::new(),
                    },
                )
            })
            .collect();
        Self { fonts, styles }
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    /// Path registered for a font id, whether or not it loads.
    pub fn font_path(&self, font_id: &str) -> Option<&Path> {
        self.fonts.get(font_id).map(|slot| slot.path.as_path())
    }

    /// Load (or fetch from cache) the font registered under `font_id`.
    pub fn load_font(&self, font_id: &str) -> TelevidResult<Arc<FontMetrics>> {
        let slot = self
            .fonts
            .get(font_id)
            .ok_or_else(|| TelevidError::FontAssetMissing {
                font: font_id.to_string(),
                path: PathBuf::new(),
                reason: "no font asset registered under this id".to_string(),
            })?;

        if let Some(font) = slot.loaded.get() {
            return Ok(font.clone());
        }

        let missing = |reason: String| TelevidError::FontAssetMissing {
            font: font_id.to_string(),
            path: slot.path.clone(),
            reason,
        };

        if !slot.path.is_file() {
            return Err(missing("file does not exist".to_string()));
        }
        let bytes = std::fs::read(&slot.path).map_err(|e| missing(e.to_string()))?;
        let size = bytes.len();
        let metrics = FontMetrics::from_bytes(bytes)
            .ok_or_else(|| missing("file is not a loadable TrueType/OpenType font".to_string()))?;

        // A concurrent loader may have won the race; either copy is fine.
        let _ = slot.loaded.set(Arc::new(metrics));
        tracing::debug!(font = font_id, path = %slot.path.display(), bytes = size, "Loaded font");

        slot.loaded
            .get()
            .cloned()
            .ok_or_else(|| missing("font cache was not populated".to_string()))
    }

    /// Resolve every style in the sheet, returning the first failure.
    pub fn verify_all(&self) -> TelevidResult<Vec<ResolvedStyle>> {
        self.styles
            .names()
            .map(|name| self.resolve(name))
            .collect()
    }
}

impl StyleResolve for FontResolver {
    fn style(&self, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(name)
    }

    fn bind(&self, style: &StyleDefinition) -> TelevidResult<ResolvedStyle> {
        let metrics = self.load_font(&style.font)?;
        let font_path = self
            .font_path(&style.font)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(ResolvedStyle {
            style: style.clone(),
            font_id: style.font.clone(),
            font_path,
            metrics,
        })
    }
}
