use crate::bounds::Bound;
use crate::error::LayoutError;
use crate::font_face::{SdfFontData, SdfGlyph};
use crate::text::line_cache::{LineCache, LineCacheEntry, StartConditions};
use crate::text::props::{Contain, TextAlign, WordBreak};

/// One glyph quad: 4 vertices (TL, TR, BL, BR) of `x, y, u, v`.
pub const FLOATS_PER_QUAD: usize = 16;

/// Inputs of a single [`layout_text`] call.
///
/// Sizes are in screen pixels; the engine divides them by
/// `font_size_ratio` to work in the atlas (vertex) space.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutParams<'a> {
    pub text_align: TextAlign,
    pub contain: Contain,
    pub scrollable: bool,
    pub word_break: WordBreak,
    pub width: f32,
    pub height: f32,
    pub font_size_ratio: f32,
    pub line_height: f32,
    pub letter_spacing: f32,
    /// Zero means unlimited.
    pub max_lines: u32,
    pub overflow_suffix: &'a [char],
    /// Render window in font space. Lines outside of it emit no quads, and
    /// an empty window emits none at all.
    pub render_window: Bound,
    /// Width of the whole text in font space, when a previous layout already
    /// measured it. `Center` and `Right` align unconstrained text to it.
    pub text_width: Option<f32>,
    /// Measure every line to the end of the text instead of stopping below
    /// the render window.
    pub force_full_layout: bool,
}

/// Counters and measurements of a [`layout_text`] call.
///
/// `max_x`/`max_y` are in font space and cover every line from the top of
/// the text to the last line processed by this call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutResult {
    pub buffer_num_floats: usize,
    pub buffer_num_quads: usize,
    pub layout_num_characters: usize,
    pub max_x: f32,
    pub max_y: f32,
    /// Lines known so far (length of the line cache).
    pub num_lines: usize,
    /// The end of the text was reached, so `max_x`/`num_lines` are final.
    pub fully_processed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineEnd {
    EndOfText,
    Newline,
    Wrap,
    Truncated,
}

/// Rewind point at the first character of the current word.
#[derive(Clone, Copy)]
struct WordStart {
    index: usize,
    floats: usize,
    num_chars: usize,
    line_w: f32,
    first_on_line: bool,
}

/// Writes quads into a caller-owned buffer that only ever grows.
struct QuadWriter<'a> {
    buffer: &'a mut Vec<f32>,
    len: usize,
    scale_w: f32,
    scale_h: f32,
}

impl QuadWriter<'_> {
    fn push(&mut self, x: f32, y: f32, glyph: &SdfGlyph) {
        let needed = self.len + FLOATS_PER_QUAD;
        if self.buffer.len() < needed {
            let grown = needed.max(self.buffer.len() * 2);
            self.buffer.resize(grown, 0.0);
        }

        let (x2, y2) = (x + glyph.width, y + glyph.height);
        let u1 = glyph.x / self.scale_w;
        let v1 = glyph.y / self.scale_h;
        let u2 = (glyph.x + glyph.width) / self.scale_w;
        let v2 = (glyph.y + glyph.height) / self.scale_h;

        self.buffer[self.len..needed].copy_from_slice(&[
            x, y, u1, v1, //
            x2, y, u2, v1, //
            x, y2, u1, v2, //
            x2, y2, u2, v2,
        ]);
        self.len = needed;
    }

    /// Moves the quads in `from..to` horizontally by `dx`.
    fn shift_x(&mut self, from: usize, to: usize, dx: f32) {
        for quad in self.buffer[from..to].chunks_exact_mut(FLOATS_PER_QUAD) {
            for vertex in quad.chunks_exact_mut(4) {
                vertex[0] += dx;
            }
        }
    }
}

/// Lays out `text` starting at the line described by `start`.
///
/// Walks the text line by line from the cached line start, appending one
/// quad per visible glyph to `buffer` (which is grown but never shrunk),
/// and records every newly discovered line start in `line_cache`. Layout
/// stops at the first line below the render window unless
/// `force_full_layout` is set, in which case the remaining lines are
/// measured without emitting quads.
///
/// Wrapping only happens when `contain != Contain::None`; a glyph breaks
/// the line when its advance ends past the line width. Words are never
/// hyphenated:
///
/// - [`WordBreak::Normal`] moves the word to the next line, or lets it
///   overflow when it already starts the line.
/// - [`WordBreak::BreakWord`] moves the word, and splits it at the
///   overflowing character when it starts the line.
/// - [`WordBreak::BreakAll`] splits at the overflowing character.
///
/// With `max_lines` reached, or with `contain == Both` on a non-scrollable
/// element whose next line would not fit, the last line is cut short so the
/// overflow suffix fits behind it.
pub fn layout_text(
    params: &LayoutParams<'_>,
    start: StartConditions,
    text: &[char],
    font: &SdfFontData,
    line_cache: &mut LineCache,
    buffer: &mut Vec<f32>,
) -> Result<LayoutResult, LayoutError> {
    if text.is_empty() || params.font_size_ratio <= 0.0 {
        return Ok(LayoutResult {
            num_lines: line_cache.len(),
            fully_processed: true,
            ..LayoutResult::default()
        });
    }

    let ratio = params.font_size_ratio;
    let v_lh = params.line_height / ratio;
    let v_w = params.width / ratio;
    let v_h = params.height / ratio;
    let v_ls = params.letter_spacing / ratio;
    let wrap = params.contain != Contain::None;
    let rw = params.render_window;
    let window_empty = rw.is_empty();
    let cull_x = params.text_align == TextAlign::Left;
    // unconstrained lines align once the widest line is known
    let mut unaligned: Vec<(usize, usize, f32)> = Vec::new();

    let mut line_idx = start.line_index;
    let (mut char_idx, mut max_x, mut max_y) = match line_cache.get(line_idx) {
        Some(entry) => (entry.codepoint_index, entry.max_x, entry.max_y),
        None if line_idx == line_cache.len() && line_idx == 0 => (0, 0.0, 0.0),
        None => {
            return Err(LayoutError::LineCacheGap {
                expected: line_idx,
                found: line_cache.len(),
            });
        }
    };

    let suffix_w = measure(font, params.overflow_suffix, v_ls);

    let mut writer = QuadWriter {
        buffer,
        len: 0,
        scale_w: font.scale_w,
        scale_h: font.scale_h,
    };
    let mut num_chars = 0usize;
    let mut cur_y = start.sdf_y;
    let mut fully_processed = false;

    loop {
        if line_idx == line_cache.len() {
            line_cache.push(
                line_idx,
                LineCacheEntry {
                    codepoint_index: char_idx,
                    max_x,
                    max_y,
                },
            )?;
        }

        if !params.force_full_layout && cur_y > rw.max.y {
            break;
        }

        let in_window = !window_empty && cur_y + v_lh >= rw.min.y && cur_y <= rw.max.y;
        let next_line_fits = (params.max_lines == 0 || line_idx + 1 < params.max_lines as usize)
            && (params.contain != Contain::Both
                || params.scrollable
                || cur_y + v_lh + font.max_char_height <= v_h);
        let line_limit = match (wrap, next_line_fits) {
            (false, _) => f32::INFINITY,
            (true, true) => v_w,
            (true, false) => v_w - suffix_w,
        };

        let line_start_floats = writer.len;
        let mut cur_x = start.sdf_x;
        let mut line_w = 0.0f32;
        let mut line_has_content = false;
        let mut prev: Option<char> = None;
        let mut word: Option<WordStart> = None;
        let mut line_end = LineEnd::EndOfText;

        while char_idx < text.len() {
            let ch = text[char_idx];
            if ch == '\n' {
                char_idx += 1;
                line_end = LineEnd::Newline;
                break;
            }
            let Some(glyph) = font.glyph(ch) else {
                char_idx += 1;
                continue;
            };

            let is_space = ch == ' ';
            let kern = prev.map_or(0.0, |p| font.kerning(p, ch));
            let char_end_x = cur_x + kern + glyph.x_advance;

            if is_space {
                word = None;
            } else if word.is_none() {
                word = Some(WordStart {
                    index: char_idx,
                    floats: writer.len,
                    num_chars,
                    line_w,
                    first_on_line: !line_has_content,
                });
            }

            if char_end_x > line_limit {
                if !next_line_fits {
                    line_end = LineEnd::Truncated;
                    break;
                }
                if is_space {
                    line_end = LineEnd::Wrap;
                    break;
                }
                let break_here = match (params.word_break, word) {
                    (WordBreak::Normal | WordBreak::BreakWord, Some(ws)) if !ws.first_on_line => {
                        char_idx = ws.index;
                        writer.len = ws.floats;
                        num_chars = ws.num_chars;
                        line_w = ws.line_w;
                        true
                    }
                    (WordBreak::Normal, _) => false,
                    (WordBreak::BreakWord | WordBreak::BreakAll, _) => line_has_content,
                };
                if break_here {
                    line_end = LineEnd::Wrap;
                    break;
                }
            }

            cur_x += kern;
            if glyph.has_area() && in_window {
                let quad_x = cur_x + glyph.x_offset;
                let visible_x = !cull_x || (quad_x <= rw.max.x && quad_x + glyph.width >= rw.min.x);
                if visible_x {
                    writer.push(quad_x, cur_y + glyph.y_offset, glyph);
                }
            }
            cur_x += glyph.x_advance + v_ls;
            if !is_space {
                line_w = cur_x;
                line_has_content = true;
            }
            prev = Some(ch);
            num_chars += 1;
            char_idx += 1;
        }

        let more_text = char_idx < text.len();
        let append_suffix = line_end == LineEnd::Truncated
            || (line_end == LineEnd::Newline && !next_line_fits && more_text);
        if append_suffix {
            let mut prev = prev;
            for &ch in params.overflow_suffix {
                let Some(glyph) = font.glyph(ch) else {
                    continue;
                };
                cur_x += prev.map_or(0.0, |p| font.kerning(p, ch));
                if glyph.has_area() && in_window {
                    writer.push(cur_x + glyph.x_offset, cur_y + glyph.y_offset, glyph);
                }
                cur_x += glyph.x_advance + v_ls;
                line_w = cur_x;
                prev = Some(ch);
            }
        }

        max_x = max_x.max(line_w);
        max_y = max_y.max(cur_y + v_lh);

        if in_window && params.text_align != TextAlign::Left && writer.len > line_start_floats {
            if wrap {
                let dx = align_offset(params.text_align, v_w, line_w);
                writer.shift_x(line_start_floats, writer.len, dx);
            } else {
                unaligned.push((line_start_floats, writer.len, line_w));
            }
        }

        let last_line = match line_end {
            LineEnd::EndOfText | LineEnd::Truncated => true,
            LineEnd::Newline => !next_line_fits,
            LineEnd::Wrap => false,
        };
        if last_line {
            fully_processed = true;
            break;
        }

        if line_end == LineEnd::Wrap {
            while char_idx < text.len() && text[char_idx] == ' ' {
                char_idx += 1;
            }
        }
        line_idx += 1;
        cur_y += v_lh;
    }

    if !unaligned.is_empty() {
        let align_w = match params.text_width {
            Some(width) if !fully_processed => width.max(max_x),
            _ => max_x,
        };
        for (from, to, line_w) in unaligned {
            let dx = align_offset(params.text_align, align_w, line_w);
            writer.shift_x(from, to, dx);
        }
    }

    let buffer_num_floats = writer.len;
    log::trace!(
        "layout: {} chars, {} quads, {} lines cached, fully processed: {}",
        num_chars,
        buffer_num_floats / FLOATS_PER_QUAD,
        line_cache.len(),
        fully_processed
    );

    Ok(LayoutResult {
        buffer_num_floats,
        buffer_num_quads: buffer_num_floats / FLOATS_PER_QUAD,
        layout_num_characters: num_chars,
        max_x,
        max_y,
        num_lines: line_cache.len(),
        fully_processed,
    })
}

fn align_offset(align: TextAlign, align_w: f32, line_w: f32) -> f32 {
    match align {
        TextAlign::Center => (align_w - line_w) / 2.0,
        TextAlign::Right => align_w - line_w,
        TextAlign::Left => 0.0,
    }
}

/// Advance width of `chars` set on one line, in font space.
fn measure(font: &SdfFontData, chars: &[char], letter_spacing: f32) -> f32 {
    let mut prev: Option<char> = None;
    let mut width = 0.0;
    for &ch in chars {
        let Some(glyph) = font.glyph(ch) else {
            continue;
        };
        width += prev.map_or(0.0, |p| font.kerning(p, ch)) + glyph.x_advance + letter_spacing;
        prev = Some(ch);
    }
    width
}
