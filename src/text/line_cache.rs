use crate::error::LayoutError;
use crate::text::props::VerticalAlign;
use crate::text::render_window::RenderWindow;

/// Resume point for line `i`: where the line starts and the running
/// maxima of every line before it, all in font space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineCacheEntry {
    pub codepoint_index: usize,
    pub max_x: f32,
    pub max_y: f32,
}

/// Append-only index of line starts.
///
/// Entries are only ever pushed in line order; the whole cache is dropped
/// when anything that affects line breaking changes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineCache {
    entries: Vec<LineCacheEntry>,
}

impl LineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, line: usize) -> Option<&LineCacheEntry> {
        self.entries.get(line)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Records the start of `line`, which must be exactly the next line.
    pub fn push(&mut self, line: usize, entry: LineCacheEntry) -> Result<(), LayoutError> {
        if line != self.entries.len() {
            return Err(LayoutError::LineCacheGap {
                expected: line,
                found: self.entries.len(),
            });
        }
        if let Some(last) = self.entries.last()
            && entry.codepoint_index < last.codepoint_index
        {
            return Err(LayoutError::LineCacheOrder {
                codepoint: entry.codepoint_index,
                previous: last.codepoint_index,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineCacheEntry> {
        self.entries.iter()
    }
}

/// Where layout resumes: a cached line and the cursor at its start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StartConditions {
    pub line_index: usize,
    pub sdf_x: f32,
    pub sdf_y: f32,
}

/// Picks the closest cached line at or before the first line of the render
/// window.
///
/// Returns `None` when there is nothing to lay out: the window is empty or
/// starts below the already known end of the text (`text_h`, screen px).
pub fn get_start_conditions(
    sdf_font_size: f32,
    sdf_line_height: f32,
    vertical_align: VerticalAlign,
    offset_y: f32,
    font_size_ratio: f32,
    render_window: &RenderWindow,
    line_cache: &LineCache,
    text_h: Option<f32>,
) -> Option<StartConditions> {
    if render_window.num_lines == 0 {
        return None;
    }

    let first_visible = render_window.first_line_idx.max(0) as usize;
    let line_index = match line_cache.len() {
        0 => 0,
        len => first_visible.min(len - 1),
    };

    let start = line_start(
        line_index,
        sdf_font_size,
        sdf_line_height,
        vertical_align,
        offset_y,
        font_size_ratio,
    );
    if let Some(text_h) = text_h
        && start.sdf_y >= text_h / font_size_ratio
    {
        return None;
    }
    Some(start)
}

/// Cursor at the start of `line_index`, in font space.
pub fn line_start(
    line_index: usize,
    sdf_font_size: f32,
    sdf_line_height: f32,
    vertical_align: VerticalAlign,
    offset_y: f32,
    font_size_ratio: f32,
) -> StartConditions {
    let valign_offset = match vertical_align {
        VerticalAlign::Top => 0.0,
        VerticalAlign::Middle => (sdf_line_height - sdf_font_size) / 2.0,
        VerticalAlign::Bottom => sdf_line_height - sdf_font_size,
    };
    StartConditions {
        line_index,
        sdf_x: 0.0,
        sdf_y: offset_y / font_size_ratio + line_index as f32 * sdf_line_height + valign_offset,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::bound;
    use crate::text::render_window::set_render_window;

    fn cache_with(lines: &[usize]) -> LineCache {
        let mut cache = LineCache::new();
        for (i, &cp) in lines.iter().enumerate() {
            cache
                .push(
                    i,
                    LineCacheEntry {
                        codepoint_index: cp,
                        max_x: 0.0,
                        max_y: 0.0,
                    },
                )
                .unwrap();
        }
        cache
    }

    fn window_at(scroll_y: f32) -> RenderWindow {
        let mut rw = RenderWindow::default();
        let visible = bound(0.0, 0.0, 100.0, 100.0);
        set_render_window(&mut rw, 0.0, 0.0, scroll_y, 10.0, 0.0, Some(&visible), 1.0);
        rw
    }

    #[test]
    fn push_rejects_gaps_and_reordering() {
        let mut cache = cache_with(&[0, 5]);
        let entry = LineCacheEntry {
            codepoint_index: 9,
            max_x: 0.0,
            max_y: 0.0,
        };
        assert_eq!(
            cache.push(3, entry),
            Err(LayoutError::LineCacheGap {
                expected: 3,
                found: 2
            })
        );
        assert!(matches!(
            cache.push(
                2,
                LineCacheEntry {
                    codepoint_index: 1,
                    ..entry
                }
            ),
            Err(LayoutError::LineCacheOrder { .. })
        ));
        cache.push(2, entry).unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn empty_cache_starts_at_top() {
        let start = get_start_conditions(
            42.0,
            50.0,
            VerticalAlign::Top,
            0.0,
            1.0,
            &window_at(300.0),
            &LineCache::new(),
            None,
        )
        .unwrap();
        assert_eq!(start.line_index, 0);
        assert_eq!(start.sdf_y, 0.0);
    }

    #[test]
    fn resumes_at_first_visible_cached_line() {
        let cache = cache_with(&[0, 10, 20, 30, 40, 50, 60]);
        let start = get_start_conditions(
            10.0,
            10.0,
            VerticalAlign::Top,
            0.0,
            1.0,
            &window_at(35.0),
            &cache,
            None,
        )
        .unwrap();
        assert_eq!(start.line_index, 3);
        assert_eq!(start.sdf_y, 30.0);
    }

    #[test]
    fn falls_back_to_last_cached_line() {
        let cache = cache_with(&[0, 10, 20]);
        let start = get_start_conditions(
            10.0,
            10.0,
            VerticalAlign::Top,
            0.0,
            1.0,
            &window_at(100.0),
            &cache,
            None,
        )
        .unwrap();
        assert_eq!(start.line_index, 2);
    }

    #[test]
    fn nothing_to_do_past_the_end_of_text() {
        let cache = cache_with(&[0, 10, 20]);
        assert_eq!(
            get_start_conditions(
                10.0,
                10.0,
                VerticalAlign::Top,
                0.0,
                1.0,
                &window_at(100.0),
                &cache,
                Some(20.0),
            ),
            None
        );
    }

    #[test]
    fn empty_window_yields_nothing() {
        let mut rw = RenderWindow::default();
        set_render_window(&mut rw, 0.0, 0.0, 0.0, 10.0, 0.0, None, 1.0);
        assert_eq!(
            get_start_conditions(
                10.0,
                10.0,
                VerticalAlign::Top,
                0.0,
                1.0,
                &rw,
                &LineCache::new(),
                None
            ),
            None
        );
    }

    #[test]
    fn vertical_align_offsets_the_cursor() {
        let start = get_start_conditions(
            40.0,
            60.0,
            VerticalAlign::Middle,
            5.0,
            0.5,
            &window_at(0.0),
            &LineCache::new(),
            None,
        )
        .unwrap();
        assert_eq!(start.sdf_y, 10.0 + 10.0);
    }
}
