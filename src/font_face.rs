use std::collections::HashMap;

use serde::Deserialize;

use crate::error::FontDataError;
use crate::text::TextId;
use crate::texture::TextureHandle;

/// Requested face: family plus CSS-style weight, style and stretch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontDescriptor {
    pub family: String,
    pub weight: fontdb::Weight,
    pub style: fontdb::Style,
    pub stretch: fontdb::Stretch,
}

impl FontDescriptor {
    /// Regular face of `family`.
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            weight: fontdb::Weight::NORMAL,
            style: fontdb::Style::Normal,
            stretch: fontdb::Stretch::Normal,
        }
    }
}

/// Atlas placement and metrics of one glyph, in atlas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdfGlyph {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_advance: f32,
}

impl SdfGlyph {
    /// Glyphs without area (spaces) advance the cursor but emit no quad.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Metrics table of an SDF font atlas.
///
/// All values are in the pixel space of the atlas, whose reference font size
/// is [`SdfFontData::size`]. Layout happens in that space and the shader
/// scales to the requested font size.
#[derive(Clone, Debug, PartialEq)]
pub struct SdfFontData {
    /// Font size the atlas was generated at.
    pub size: f32,
    pub line_height: f32,
    pub base: f32,
    pub scale_w: f32,
    pub scale_h: f32,
    pub distance_range: f32,
    /// Tallest glyph extent below a line top.
    pub max_char_height: f32,
    glyphs: HashMap<u32, SdfGlyph, fxhash::FxBuildHasher>,
    kernings: HashMap<(u32, u32), f32, fxhash::FxBuildHasher>,
}

// msdf-bmfont JSON layout
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFontData {
    info: RawInfo,
    common: RawCommon,
    distance_field: RawDistanceField,
    chars: Vec<RawChar>,
    #[serde(default)]
    kernings: Vec<RawKerning>,
}

#[derive(Deserialize)]
struct RawInfo {
    size: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommon {
    line_height: f32,
    base: f32,
    scale_w: f32,
    scale_h: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDistanceField {
    distance_range: f32,
}

#[derive(Deserialize)]
struct RawChar {
    id: u32,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    xoffset: f32,
    yoffset: f32,
    xadvance: f32,
}

#[derive(Deserialize)]
struct RawKerning {
    first: u32,
    second: u32,
    amount: f32,
}

impl SdfFontData {
    /// Parses an msdf-bmfont JSON metrics file.
    pub fn from_json(json: &str) -> Result<Self, FontDataError> {
        let raw: RawFontData = serde_json::from_str(json)?;
        if raw.chars.is_empty() {
            return Err(FontDataError::EmptyCharset);
        }

        let mut data = Self::empty(
            raw.info.size,
            raw.common.line_height,
            raw.common.base,
            raw.common.scale_w,
            raw.common.scale_h,
            raw.distance_field.distance_range,
        );
        for c in raw.chars {
            data.insert_glyph(
                c.id,
                SdfGlyph {
                    x: c.x,
                    y: c.y,
                    width: c.width,
                    height: c.height,
                    x_offset: c.xoffset,
                    y_offset: c.yoffset,
                    x_advance: c.xadvance,
                },
            );
        }
        for k in raw.kernings {
            data.kernings.insert((k.first, k.second), k.amount);
        }
        Ok(data)
    }

    /// Builds a metrics table for `charset` from an outline font.
    ///
    /// Glyphs are placed on a square grid with `distance_range / 2` padding
    /// around each cell. Only the metrics are produced; generating the
    /// distance field texture is left to the atlas tooling.
    pub fn from_font(
        font: &fontdue::Font,
        size: f32,
        distance_range: f32,
        charset: &str,
    ) -> Result<Self, FontDataError> {
        let line_metrics = font
            .horizontal_line_metrics(size)
            .ok_or(FontDataError::MissingLineMetrics)?;
        let chars: Vec<char> = charset.chars().collect();
        if chars.is_empty() {
            return Err(FontDataError::EmptyCharset);
        }

        let pad = (distance_range / 2.0).ceil();
        let metrics: Vec<fontdue::Metrics> = chars.iter().map(|&c| font.metrics(c, size)).collect();
        let cell = metrics
            .iter()
            .map(|m| m.width.max(m.height) as f32)
            .fold(0.0f32, f32::max)
            + pad * 2.0;
        let cols = (chars.len() as f32).sqrt().ceil() as usize;
        let rows = chars.len().div_ceil(cols);

        let mut data = Self::empty(
            size,
            line_metrics.new_line_size,
            line_metrics.ascent,
            cols as f32 * cell,
            rows as f32 * cell,
            distance_range,
        );

        for (i, (&c, m)) in chars.iter().zip(&metrics).enumerate() {
            let has_area = m.width > 0 && m.height > 0;
            let (width, height) = if has_area {
                (m.width as f32 + pad * 2.0, m.height as f32 + pad * 2.0)
            } else {
                (0.0, 0.0)
            };
            data.insert_glyph(
                c as u32,
                SdfGlyph {
                    x: (i % cols) as f32 * cell,
                    y: (i / cols) as f32 * cell,
                    width,
                    height,
                    x_offset: m.xmin as f32 - pad,
                    y_offset: line_metrics.ascent - (m.ymin as f32 + m.height as f32) - pad,
                    x_advance: m.advance_width,
                },
            );
        }

        for &left in &chars {
            for &right in &chars {
                if let Some(kern) = font.horizontal_kern(left, right, size)
                    && kern != 0.0
                {
                    data.kernings.insert((left as u32, right as u32), kern);
                }
            }
        }

        Ok(data)
    }

    /// Fixed-advance metrics table for `charset`.
    ///
    /// Every glyph is `advance` wide and `size` tall with no offsets; spaces
    /// have no area. Handy for headless tooling and tests.
    pub fn monospace(size: f32, advance: f32, charset: &str) -> Self {
        let chars: Vec<char> = charset.chars().collect();
        let cols = (chars.len().max(1) as f32).sqrt().ceil() as usize;
        let rows = chars.len().max(1).div_ceil(cols);
        let mut data = Self::empty(
            size,
            size,
            size,
            cols as f32 * advance,
            rows as f32 * size,
            4.0,
        );
        for (i, &c) in chars.iter().enumerate() {
            let (width, height) = if c.is_whitespace() {
                (0.0, 0.0)
            } else {
                (advance, size)
            };
            data.insert_glyph(
                c as u32,
                SdfGlyph {
                    x: (i % cols) as f32 * advance,
                    y: (i / cols) as f32 * size,
                    width,
                    height,
                    x_offset: 0.0,
                    y_offset: 0.0,
                    x_advance: advance,
                },
            );
        }
        data
    }

    fn empty(
        size: f32,
        line_height: f32,
        base: f32,
        scale_w: f32,
        scale_h: f32,
        distance_range: f32,
    ) -> Self {
        Self {
            size,
            line_height,
            base,
            scale_w,
            scale_h,
            distance_range,
            max_char_height: 0.0,
            glyphs: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            kernings: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }

    fn insert_glyph(&mut self, codepoint: u32, glyph: SdfGlyph) {
        self.max_char_height = self.max_char_height.max(glyph.y_offset + glyph.height);
        self.glyphs.insert(codepoint, glyph);
    }

    pub fn glyph(&self, ch: char) -> Option<&SdfGlyph> {
        self.glyphs.get(&(ch as u32))
    }

    /// Kerning adjustment between two consecutive characters.
    pub fn kerning(&self, left: char, right: char) -> f32 {
        self.kernings
            .get(&(left as u32, right as u32))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_kerning(&mut self, left: char, right: char, amount: f32) {
        self.kernings.insert((left as u32, right as u32), amount);
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }
}

/// Load state of a registered face.
#[derive(Clone, Debug, PartialEq)]
pub enum FontFaceState {
    Loading,
    Loaded,
    Failed(String),
}

/// A registered SDF face: metrics, atlas texture and the text elements
/// waiting for it to finish loading.
pub struct SdfFontFace {
    descriptor: FontDescriptor,
    state: FontFaceState,
    data: Option<SdfFontData>,
    atlas: TextureHandle,
    waiters: Vec<TextId>,
}

impl SdfFontFace {
    pub fn new(descriptor: FontDescriptor, atlas: TextureHandle) -> Self {
        Self {
            descriptor,
            state: FontFaceState::Loading,
            data: None,
            atlas,
            waiters: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &FontDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> &FontFaceState {
        &self.state
    }

    pub fn loaded(&self) -> bool {
        self.state == FontFaceState::Loaded
    }

    pub fn data(&self) -> Option<&SdfFontData> {
        self.data.as_ref()
    }

    pub fn atlas(&self) -> &TextureHandle {
        &self.atlas
    }

    /// Registers a one-shot interest in the face finishing its load.
    pub fn once_loaded(&mut self, text: TextId) {
        if !self.waiters.contains(&text) {
            self.waiters.push(text);
        }
    }

    /// Stores the metrics and hands back everyone that was waiting.
    pub fn set_loaded(&mut self, data: SdfFontData) -> Vec<TextId> {
        self.data = Some(data);
        self.state = FontFaceState::Loaded;
        std::mem::take(&mut self.waiters)
    }

    pub fn set_failed(&mut self, reason: impl Into<String>) -> Vec<TextId> {
        self.state = FontFaceState::Failed(reason.into());
        std::mem::take(&mut self.waiters)
    }
}
