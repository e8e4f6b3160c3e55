use crate::bounds::{Bound, bound, empty_bound, scale_bound};

/// Slice of a text element that is laid out and kept in the vertex buffer.
///
/// `screen` is in element-local, scrolled pixels (`y` grows with
/// `scroll_y`); `sdf` is the same rectangle in font space. An empty window
/// (`num_lines == 0`) that is `valid` means "nothing to render", which is
/// different from a window that has not been computed yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderWindow {
    pub screen: Bound,
    pub sdf: Bound,
    /// May be negative when the window reaches above the first line.
    pub first_line_idx: i32,
    pub num_lines: u32,
    pub valid: bool,
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self {
            screen: empty_bound(),
            sdf: empty_bound(),
            first_line_idx: 0,
            num_lines: 0,
            valid: false,
        }
    }
}

impl RenderWindow {
    /// Pixel margin covering `num_extra_lines` lines above and below.
    pub fn margin_for_lines(line_height: f32, num_extra_lines: u32) -> f32 {
        line_height * num_extra_lines as f32
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    fn clear(&mut self) {
        self.screen = empty_bound();
        self.sdf = empty_bound();
        self.first_line_idx = 0;
        self.num_lines = 0;
        self.valid = true;
    }

    /// Whether the buffer built for this window still covers `visible`
    /// for an element at (`x`, `y`) scrolled by `scroll_y`.
    pub fn covers(&self, visible: Option<&Bound>, x: f32, y: f32, scroll_y: f32) -> bool {
        if !self.valid {
            return false;
        }
        let Some(visible) = visible else {
            // Nothing on screen, whatever is buffered is enough.
            return true;
        };
        if self.num_lines == 0 {
            return false;
        }
        let s = &self.screen;
        x + s.min.x <= visible.min.x
            && x + s.max.x >= visible.max.x
            && y - scroll_y + s.min.y <= visible.min.y
            && y - scroll_y + s.max.y >= visible.max.y
    }
}

/// Computes the render window for an element at (`x`, `y`).
///
/// `visible` is the element's visible rectangle, already intersected with
/// ancestor clips and the renderer bounds. `buffer_margin` (pixels) is added
/// above and below so small scrolls stay inside the window. The window is
/// rounded outward to whole lines.
pub fn set_render_window(
    out: &mut RenderWindow,
    x: f32,
    y: f32,
    scroll_y: f32,
    line_height: f32,
    buffer_margin: f32,
    visible: Option<&Bound>,
    font_size_ratio: f32,
) {
    let Some(visible) = visible.filter(|v| !v.is_empty()) else {
        out.clear();
        return;
    };
    if line_height <= 0.0 || font_size_ratio <= 0.0 {
        out.clear();
        return;
    }

    let screen = bound(
        visible.min.x - x,
        visible.min.y - y + scroll_y - buffer_margin,
        visible.max.x - x,
        visible.max.y - y + scroll_y + buffer_margin,
    );

    let first_line_idx = (screen.min.y / line_height).floor() as i32;
    let last_line_end = (screen.max.y / line_height).ceil() as i32;

    out.screen = screen;
    out.sdf = scale_bound(&screen, font_size_ratio);
    out.first_line_idx = first_line_idx;
    out.num_lines = last_line_end.saturating_sub(first_line_idx).max(0) as u32;
    out.valid = true;
}
