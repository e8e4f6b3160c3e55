/// Quad emission, wrapping and truncation.
pub mod layout;
/// Resume points for incremental layout.
pub mod line_cache;
/// Text element properties and the setter dispatch table.
pub mod props;
/// The slice of text kept in the vertex buffer.
pub mod render_window;
/// Per-element state machine driving layout and draw calls.
pub mod sdf_renderer;
/// Per-element state, status and events.
pub mod state;

pub use layout::{FLOATS_PER_QUAD, LayoutParams, LayoutResult, layout_text};
pub use line_cache::{
    LineCache, LineCacheEntry, StartConditions, get_start_conditions, line_start,
};
pub use props::{CacheAction, Contain, TextAlign, TextProp, TextProps, VerticalAlign, WordBreak};
pub use render_window::{RenderWindow, set_render_window};
pub use sdf_renderer::SdfTextRenderer;
pub use state::{TextDebugStats, TextEvent, TextRenderState, TextStatus};

/// Handle of a text element. Ids are never reused, so a stale id held by a
/// late callback can never reach a newer element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextId(pub u64);
