use crate::bounds::Bound;
use crate::font_face::FontDescriptor;

/// Horizontal justification applied to each emitted line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical placement of glyphs inside each line box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Which element dimensions constrain the text.
///
/// - `None`: width and height grow with the text, no wrapping.
/// - `Width`: text wraps at `width`, height grows.
/// - `Both`: text wraps at `width` and is cut (or scrolled) at `height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Contain {
    #[default]
    None,
    Width,
    Both,
}

/// Policy for words that do not fit on a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WordBreak {
    /// Wrap before the word; a word wider than the line overflows it.
    #[default]
    Normal,
    /// Like `Normal`, but a word that starts its line and still does not fit
    /// is split at the first character that crosses the edge.
    BreakWord,
    /// Split at whichever character crosses the edge.
    BreakAll,
}

/// All properties of a text element that influence layout or rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct TextProps {
    pub text: String,
    pub font_family: String,
    pub font_weight: fontdb::Weight,
    pub font_style: fontdb::Style,
    pub font_stretch: fontdb::Stretch,
    /// Font size in screen pixels.
    pub font_size: f32,
    /// `0xRRGGBBAA`, not premultiplied.
    pub color: u32,
    /// Screen-space position of the element.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub contain: Contain,
    pub scrollable: bool,
    /// Only honored when `contain == Both && scrollable`.
    pub scroll_y: f32,
    pub offset_y: f32,
    pub letter_spacing: f32,
    /// `None` uses the font's own line height.
    pub line_height: Option<f32>,
    /// Zero means unlimited.
    pub max_lines: u32,
    pub text_align: TextAlign,
    pub vertical_align: VerticalAlign,
    pub overflow_suffix: String,
    pub word_break: WordBreak,
    /// Accumulated ancestor clip rect in screen space.
    pub clip: Option<Bound>,
}

impl Default for TextProps {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "sans-serif".into(),
            font_weight: fontdb::Weight::NORMAL,
            font_style: fontdb::Style::Normal,
            font_stretch: fontdb::Stretch::Normal,
            font_size: 16.0,
            color: 0xFFFF_FFFF,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            contain: Contain::None,
            scrollable: false,
            scroll_y: 0.0,
            offset_y: 0.0,
            letter_spacing: 0.0,
            line_height: None,
            max_lines: 0,
            text_align: TextAlign::Left,
            vertical_align: VerticalAlign::Top,
            overflow_suffix: "...".into(),
            word_break: WordBreak::Normal,
            clip: None,
        }
    }
}

impl TextProps {
    /// Face request derived from the font properties.
    pub fn font_descriptor(&self) -> FontDescriptor {
        FontDescriptor {
            family: self.font_family.clone(),
            weight: self.font_weight,
            style: self.font_style,
            stretch: self.font_stretch,
        }
    }

    /// Scroll offset that actually applies given the contain mode.
    pub fn effective_scroll_y(&self) -> f32 {
        if self.contain == Contain::Both && self.scrollable {
            self.scroll_y
        } else {
            0.0
        }
    }

    /// Element rectangle; unconstrained axes extend to infinity.
    pub fn element_rect(&self) -> Bound {
        let x2 = if self.contain != Contain::None {
            self.x + self.width
        } else {
            f32::INFINITY
        };
        let y2 = if self.contain == Contain::Both {
            self.y + self.height
        } else {
            f32::INFINITY
        };
        crate::bounds::bound(self.x, self.y, x2, y2)
    }
}

/// A single settable property together with its new value.
#[derive(Clone, Debug, PartialEq)]
pub enum TextProp {
    Text(String),
    FontFamily(String),
    FontWeight(fontdb::Weight),
    FontStyle(fontdb::Style),
    FontStretch(fontdb::Stretch),
    FontSize(f32),
    Color(u32),
    X(f32),
    Y(f32),
    Width(f32),
    Height(f32),
    Contain(Contain),
    Scrollable(bool),
    ScrollY(f32),
    OffsetY(f32),
    LetterSpacing(f32),
    LineHeight(Option<f32>),
    MaxLines(u32),
    TextAlign(TextAlign),
    VerticalAlign(VerticalAlign),
    OverflowSuffix(String),
    WordBreak(WordBreak),
    Clip(Option<Bound>),
}

/// What the renderer must do after a property actually changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheAction {
    /// The font face must be resolved again, then as `InvalidateLayout`.
    ResolveFont,
    /// Line cache, render window and element bounds are stale.
    InvalidateLayout,
    /// Only the visible element bounds are stale.
    InvalidateBounds,
    /// Caches stay; re-check the render window.
    Schedule,
    /// Affects drawing only; nothing to update.
    RenderOnly,
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    replace_by(slot, value, |a, b| a == b)
}

fn replace_by<T>(slot: &mut T, value: T, same: impl Fn(&T, &T) -> bool) -> bool {
    if same(slot, &value) {
        return false;
    }
    *slot = value;
    true
}

// bitwise, so that setting NaN again is not a change
fn replace_f32(slot: &mut f32, value: f32) -> bool {
    replace_by(slot, value, |a, b| a.to_bits() == b.to_bits())
}

fn replace_opt_f32(slot: &mut Option<f32>, value: Option<f32>) -> bool {
    replace_by(slot, value, |a, b| a.map(f32::to_bits) == b.map(f32::to_bits))
}

fn bound_bits(b: &Bound) -> [u32; 4] {
    [b.min.x, b.min.y, b.max.x, b.max.y].map(f32::to_bits)
}

fn replace_clip(slot: &mut Option<Bound>, value: Option<Bound>) -> bool {
    replace_by(slot, value, |a, b| a.as_ref().map(bound_bits) == b.as_ref().map(bound_bits))
}

impl TextProps {
    /// Applies `prop` and reports the required cache action.
    ///
    /// Returns `None` when the value is unchanged; callers must then do
    /// nothing at all, not even schedule an update.
    pub fn apply(&mut self, prop: TextProp) -> Option<CacheAction> {
        use CacheAction::*;

        let (changed, action) = match prop {
            TextProp::Text(v) => (replace(&mut self.text, v), InvalidateLayout),
            TextProp::FontFamily(v) => (replace(&mut self.font_family, v), ResolveFont),
            TextProp::FontWeight(v) => (replace(&mut self.font_weight, v), ResolveFont),
            TextProp::FontStyle(v) => (replace(&mut self.font_style, v), ResolveFont),
            TextProp::FontStretch(v) => (replace(&mut self.font_stretch, v), ResolveFont),
            TextProp::FontSize(v) => (replace_f32(&mut self.font_size, v), InvalidateLayout),
            TextProp::Color(v) => (replace(&mut self.color, v), RenderOnly),
            TextProp::X(v) => (replace_f32(&mut self.x, v), InvalidateBounds),
            TextProp::Y(v) => (replace_f32(&mut self.y, v), InvalidateBounds),
            TextProp::Width(v) => {
                let action = if self.contain != Contain::None {
                    InvalidateLayout
                } else {
                    InvalidateBounds
                };
                (replace_f32(&mut self.width, v), action)
            }
            TextProp::Height(v) => {
                let action = if self.contain == Contain::Both {
                    InvalidateLayout
                } else {
                    InvalidateBounds
                };
                (replace_f32(&mut self.height, v), action)
            }
            TextProp::Contain(v) => (replace(&mut self.contain, v), InvalidateLayout),
            TextProp::Scrollable(v) => (replace(&mut self.scrollable, v), InvalidateLayout),
            TextProp::ScrollY(v) => (replace_f32(&mut self.scroll_y, v), Schedule),
            TextProp::OffsetY(v) => (replace_f32(&mut self.offset_y, v), InvalidateLayout),
            TextProp::LetterSpacing(v) => {
                (replace_f32(&mut self.letter_spacing, v), InvalidateLayout)
            }
            TextProp::LineHeight(v) => {
                (replace_opt_f32(&mut self.line_height, v), InvalidateLayout)
            }
            TextProp::MaxLines(v) => (replace(&mut self.max_lines, v), InvalidateLayout),
            TextProp::TextAlign(v) => (replace(&mut self.text_align, v), InvalidateLayout),
            TextProp::VerticalAlign(v) => (replace(&mut self.vertical_align, v), InvalidateLayout),
            TextProp::OverflowSuffix(v) => {
                (replace(&mut self.overflow_suffix, v), InvalidateLayout)
            }
            TextProp::WordBreak(v) => (replace(&mut self.word_break, v), InvalidateLayout),
            TextProp::Clip(v) => (replace_clip(&mut self.clip, v), InvalidateBounds),
        };

        changed.then_some(action)
    }
}
