use crate::bounds::ElementBounds;
use crate::error::TextError;
use crate::renderer::BufferId;
use crate::text::layout::{FLOATS_PER_QUAD, LayoutResult};
use crate::text::line_cache::LineCache;
use crate::text::props::TextProps;
use crate::text::render_window::RenderWindow;
use crate::texture::TextureHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextStatus {
    Initial,
    Loading,
    Loaded,
    Failed,
}

/// Emitted when an element's status changes.
#[derive(Clone, Debug, PartialEq)]
pub enum TextEvent {
    /// Dimensions in screen pixels, as far as they are known.
    Loaded { width: f32, height: f32 },
    Failed(TextError),
}

/// Counters for profiling and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextDebugStats {
    /// Number of `layout_text` runs.
    pub layout_count: u64,
    pub last_layout_num_characters: usize,
    /// Bytes of the vertex data last produced.
    pub buffer_bytes: usize,
}

/// Everything the SDF renderer keeps per text element.
pub struct TextRenderState {
    pub(crate) props: TextProps,
    /// `props.text` split into characters, refreshed when the text changes.
    pub(crate) chars: Vec<char>,
    pub(crate) suffix: Vec<char>,
    pub(crate) status: TextStatus,
    pub(crate) error: Option<TextError>,
    pub(crate) font_face: Option<fontdb::ID>,
    pub(crate) font_size_ratio: f32,
    /// Screen pixels.
    pub(crate) line_height: f32,
    pub(crate) distance_range: f32,
    pub(crate) element_bounds: ElementBounds,
    pub(crate) render_window: RenderWindow,
    pub(crate) line_cache: LineCache,
    pub(crate) vertex_buffer: Vec<f32>,
    pub(crate) buffer_num_floats: usize,
    pub(crate) buffer_uploaded: bool,
    pub(crate) gpu_buffer: Option<BufferId>,
    pub(crate) last_layout: LayoutResult,
    /// Final text size, known once a layout reached the end of the text.
    pub(crate) text_w: Option<f32>,
    pub(crate) text_h: Option<f32>,
    pub(crate) update_scheduled: bool,
    /// Atlas this element is registered on as a renderable owner.
    pub(crate) atlas: Option<TextureHandle>,
    pub(crate) stats: TextDebugStats,
}

impl TextRenderState {
    /// Fresh state in the `Initial` status.
    pub fn new(props: TextProps) -> Self {
        Self {
            chars: props.text.chars().collect(),
            suffix: props.overflow_suffix.chars().collect(),
            props,
            status: TextStatus::Initial,
            error: None,
            font_face: None,
            font_size_ratio: 1.0,
            line_height: 0.0,
            distance_range: 0.0,
            element_bounds: ElementBounds::default(),
            render_window: RenderWindow::default(),
            line_cache: LineCache::new(),
            vertex_buffer: Vec::new(),
            buffer_num_floats: 0,
            buffer_uploaded: false,
            gpu_buffer: None,
            last_layout: LayoutResult::default(),
            text_w: None,
            text_h: None,
            update_scheduled: false,
            atlas: None,
            stats: TextDebugStats::default(),
        }
    }

    /// Current property values.
    pub fn props(&self) -> &TextProps {
        &self.props
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TextStatus {
        self.status
    }

    /// Why the element failed, if it did.
    pub fn error(&self) -> Option<&TextError> {
        self.error.as_ref()
    }

    /// Line range the vertex buffer was laid out for.
    pub fn render_window(&self) -> &RenderWindow {
        &self.render_window
    }

    /// Start conditions of the lines laid out so far.
    pub fn line_cache(&self) -> &LineCache {
        &self.line_cache
    }

    /// `font_size` over the SDF font's native size.
    pub fn font_size_ratio(&self) -> f32 {
        self.font_size_ratio
    }

    /// Glyph quads in the vertex buffer.
    pub fn num_quads(&self) -> usize {
        self.buffer_num_floats / FLOATS_PER_QUAD
    }

    /// Vertex data produced by the last layout.
    pub fn vertices(&self) -> &[f32] {
        &self.vertex_buffer[..self.buffer_num_floats]
    }

    /// Final text size in screen pixels, once known.
    pub fn text_dimensions(&self) -> Option<(f32, f32)> {
        self.text_w.zip(self.text_h)
    }

    /// Counters describing the last layout.
    pub fn debug_stats(&self) -> TextDebugStats {
        self.stats
    }

    /// Drops everything derived from line breaking.
    pub(crate) fn invalidate_layout_cache(&mut self) {
        self.line_cache.clear();
        self.render_window.invalidate();
        self.element_bounds.invalidate();
        self.text_w = None;
        self.text_h = None;
    }

    pub(crate) fn invalidate_bounds(&mut self) {
        self.element_bounds.invalidate();
    }

    /// Returns the event to emit when the status actually changed.
    pub(crate) fn set_status(&mut self, status: TextStatus) -> Option<TextEvent> {
        if self.status == status {
            return None;
        }
        self.status = status;
        match status {
            TextStatus::Loaded => {
                self.error = None;
                let (width, height) = self.text_dimensions().unwrap_or((
                    self.last_layout.max_x * self.font_size_ratio,
                    self.last_layout.max_y * self.font_size_ratio,
                ));
                Some(TextEvent::Loaded { width, height })
            }
            TextStatus::Failed => self.error.clone().map(TextEvent::Failed),
            TextStatus::Initial | TextStatus::Loading => None,
        }
    }
}
