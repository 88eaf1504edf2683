//! Keys and values stored by the [`CacheManager`](crate::CacheManager).

use std::fmt;
use std::sync::Arc;

use crate::object::{CanvasId, ObjectKind, Renderer, Size};
use crate::painter::TextureHandle;

/// Text style flags that affect measured size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub symbol: bool,
}

/// Everything that determines the measured size of a run of text.
///
/// The font size is kept as raw bits so the key can be hashed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontMetricKey {
    pub text: String,
    size_bits: u32,
    pub style: TextStyle,
    /// Name of the font resource, empty for the theme font.
    pub source: String,
}

impl FontMetricKey {
    pub fn new(text: impl Into<String>, size: f32, style: TextStyle, source: Option<&str>) -> Self {
        FontMetricKey {
            text: text.into(),
            size_bits: size.to_bits(),
            style,
            source: source.unwrap_or_default().to_owned(),
        }
    }

    pub fn font_size(&self) -> f32 {
        f32::from_bits(self.size_bits)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontMetric {
    pub size: Size,
    pub baseline: f32,
}

/// A rasterised icon at one output size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SvgKey {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl SvgKey {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        SvgKey {
            name: name.into(),
            width,
            height,
        }
    }
}

/// RGBA8 pixels, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SvgRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

/// "This object is currently mounted under this canvas."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasEntry {
    pub canvas: CanvasId,
    pub kind: ObjectKind,
}

/// The renderer owned by the cache for one widget.
pub struct RendererEntry {
    pub renderer: Box<dyn Renderer>,
}

impl fmt::Debug for RendererEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererEntry").finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureEntry {
    pub handle: TextureHandle,
}

/// Per-widget theme override, dropped together with the widget's renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThemeOverride {
    pub theme: String,
}

impl ThemeOverride {
    pub fn new(theme: impl Into<String>) -> Self {
        ThemeOverride {
            theme: theme.into(),
        }
    }
}
