use std::collections::HashMap;
use std::sync::Arc;

use crate::bounds::{Bound, clip_bound};
use crate::error::{LayoutError, TextError};
use crate::font_face::FontFaceState;
use crate::font_storage::FontRegistry;
use crate::renderer::{
    RenderBackend, RenderContext, RenderOp, SDF_BUFFER_LAYOUT, SdfUniforms, color_to_rgba,
};
use crate::text::TextId;
use crate::text::layout::{LayoutParams, LayoutResult, layout_text};
use crate::text::line_cache::{get_start_conditions, line_start};
use crate::text::props::{CacheAction, Contain, TextProp, TextProps};
use crate::text::render_window::set_render_window;
use crate::text::state::{TextDebugStats, TextEvent, TextRenderState, TextStatus};
use crate::texture::{OwnerId, TextureHandle};

/// Outcome of one update pass that did not fail.
enum Progress {
    /// The font face is still loading; a waiter has been registered.
    WaitingForFont,
    Ready { atlas: TextureHandle },
}

/// Lays out and draws SDF text elements.
///
/// Property changes only mark an element dirty; the actual work happens in
/// [`Self::flush_updates`], once per frame, no matter how many properties
/// changed in between.
pub struct SdfTextRenderer {
    states: HashMap<TextId, TextRenderState, fxhash::FxBuildHasher>,
    next_id: u64,
    dirty: Vec<TextId>,
    events: Vec<(TextId, TextEvent)>,
    renderer_bounds: Bound,
    /// Extra pixels buffered above and below scrollable text.
    bounds_margin: f32,
}

impl SdfTextRenderer {
    /// Renderer drawing into `renderer_bounds`, laying out `bounds_margin` pixels beyond it.
    pub fn new(renderer_bounds: Bound, bounds_margin: f32) -> Self {
        Self {
            states: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            next_id: 1,
            dirty: Vec::new(),
            events: Vec::new(),
            renderer_bounds,
            bounds_margin,
        }
    }

    /// Creates a text element and schedules its first update.
    pub fn create_state(&mut self, props: TextProps) -> TextId {
        let id = TextId(self.next_id);
        self.next_id += 1;
        self.states.insert(id, TextRenderState::new(props));
        self.schedule_update(id);
        id
    }

    /// Sets one property. Returns whether the value changed.
    ///
    /// An unchanged value does nothing at all: no status change and no
    /// scheduled update.
    pub fn set_prop(&mut self, id: TextId, prop: TextProp) -> bool {
        let Some(state) = self.states.get_mut(&id) else {
            log::warn!("property set on unknown text {:?}", id);
            return false;
        };

        let refresh_text = matches!(prop, TextProp::Text(_));
        let refresh_suffix = matches!(prop, TextProp::OverflowSuffix(_));
        let Some(action) = state.props.apply(prop) else {
            return false;
        };
        if refresh_text {
            state.chars = state.props.text.chars().collect();
        }
        if refresh_suffix {
            state.suffix = state.props.overflow_suffix.chars().collect();
        }

        match action {
            CacheAction::ResolveFont => {
                state.font_face = None;
                state.invalidate_layout_cache();
            }
            CacheAction::InvalidateLayout => state.invalidate_layout_cache(),
            CacheAction::InvalidateBounds => state.invalidate_bounds(),
            CacheAction::Schedule => {}
            CacheAction::RenderOnly => return true,
        }
        self.schedule_update(id);
        true
    }

    /// Marks `id` dirty. At most one pending update per element.
    pub fn schedule_update(&mut self, id: TextId) {
        match self.states.get_mut(&id) {
            Some(state) if !state.update_scheduled => {
                state.update_scheduled = true;
                self.dirty.push(id);
            }
            Some(_) => {}
            None => log::debug!("update scheduled for destroyed text {:?}", id),
        }
    }

    /// Runs the pending update of every dirty element.
    pub fn flush_updates(&mut self, fonts: &mut FontRegistry) {
        let dirty = std::mem::take(&mut self.dirty);
        for id in dirty {
            let Some(state) = self.states.get_mut(&id) else {
                continue;
            };
            state.update_scheduled = false;
            self.update_state(id, fonts);
        }
    }

    /// Whether any element waits for an update.
    pub fn has_pending_updates(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Brings the element's vertex data up to date.
    ///
    /// Skips layout entirely while the buffered render window still covers
    /// the visible part of the element.
    pub fn update_state(&mut self, id: TextId, fonts: &mut FontRegistry) {
        let renderer_bounds = self.renderer_bounds;
        let bounds_margin = self.bounds_margin;
        let Some(state) = self.states.get_mut(&id) else {
            log::warn!("update for unknown text {:?}", id);
            return;
        };

        if state.status == TextStatus::Initial {
            state.set_status(TextStatus::Loading);
        }

        let event = match run_update(state, id, fonts, &renderer_bounds, bounds_margin) {
            Ok(Progress::WaitingForFont) => {
                sync_atlas_owner(state, id, None);
                state.set_status(TextStatus::Loading)
            }
            Ok(Progress::Ready { atlas }) => {
                let event = state.set_status(TextStatus::Loaded);
                sync_atlas_owner(state, id, Some(atlas));
                event
            }
            Err(err) => {
                log::error!("text {:?} failed: {}", id, err);
                state.error = Some(err);
                sync_atlas_owner(state, id, None);
                state.set_status(TextStatus::Failed)
            }
        };
        if let Some(event) = event {
            self.events.push((id, event));
        }
    }

    /// Queues the draw call of a loaded element.
    pub fn render_quads<B: RenderBackend + ?Sized>(
        &mut self,
        id: TextId,
        ctx: &RenderContext,
        backend: &mut B,
    ) {
        let Some(state) = self.states.get_mut(&id) else {
            return;
        };
        if state.status != TextStatus::Loaded || state.num_quads() == 0 {
            return;
        }
        let Some(atlas) = state.atlas.as_ref() else {
            return;
        };
        let Some(texture) = backend.get_ctx_texture(&atlas.lock()) else {
            return;
        };

        let clip = if state.props.contain == Contain::Both && state.props.scrollable {
            match clip_bound(&state.props.element_rect(), ctx.clip.as_ref()) {
                Some(clip) => Some(clip),
                None => return,
            }
        } else {
            ctx.clip
        };

        let buffer = match state.gpu_buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = backend.create_buffer(&SDF_BUFFER_LAYOUT);
                state.gpu_buffer = Some(buffer);
                buffer
            }
        };
        if !state.buffer_uploaded {
            backend.upload_buffer(buffer, bytemuck::cast_slice(state.vertices()));
            state.buffer_uploaded = true;
        }

        backend.add_render_op(RenderOp {
            texture,
            buffer,
            num_quads: state.num_quads(),
            uniforms: SdfUniforms {
                transform: ctx.transform.to_array(),
                color: color_to_rgba(state.props.color, ctx.alpha),
                scroll_y: state.props.effective_scroll_y(),
                size: state.font_size_ratio,
                distance_range: state.distance_range,
                debug: 0,
            },
            clip,
            z_index: ctx.z_index,
        });
    }

    /// Removes an element and releases its GPU buffer and atlas ownership.
    ///
    /// Font load notifications that arrive later for `id` are ignored.
    pub fn destroy_state<B: RenderBackend + ?Sized>(&mut self, id: TextId, backend: &mut B) {
        let Some(mut state) = self.states.remove(&id) else {
            return;
        };
        if let Some(buffer) = state.gpu_buffer.take() {
            backend.delete_buffer(buffer);
        }
        sync_atlas_owner(&mut state, id, None);
    }

    /// Changes the screen area text may be visible in.
    pub fn set_renderer_bounds(&mut self, bounds: Bound) {
        if bounds == self.renderer_bounds {
            return;
        }
        self.renderer_bounds = bounds;
        let ids: Vec<TextId> = self.states.keys().copied().collect();
        for id in ids {
            if let Some(state) = self.states.get_mut(&id) {
                state.invalidate_bounds();
            }
            self.schedule_update(id);
        }
    }

    /// Screen area text may be visible in.
    pub fn renderer_bounds(&self) -> Bound {
        self.renderer_bounds
    }

    /// Status events since the last call.
    pub fn take_events(&mut self) -> Vec<(TextId, TextEvent)> {
        std::mem::take(&mut self.events)
    }

    /// Render state of `id`, if it exists.
    pub fn state(&self, id: TextId) -> Option<&TextRenderState> {
        self.states.get(&id)
    }

    /// Lifecycle status of `id`.
    pub fn status(&self, id: TextId) -> Option<TextStatus> {
        self.states.get(&id).map(|s| s.status())
    }

    /// Final text size of `id` in screen pixels, once known.
    pub fn text_dimensions(&self, id: TextId) -> Option<(f32, f32)> {
        self.states.get(&id).and_then(|s| s.text_dimensions())
    }

    /// Layout counters of `id`.
    pub fn debug_stats(&self, id: TextId) -> Option<TextDebugStats> {
        self.states.get(&id).map(|s| s.debug_stats())
    }

    /// Number of live text elements.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no text element is alive.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn run_update(
    state: &mut TextRenderState,
    id: TextId,
    fonts: &mut FontRegistry,
    renderer_bounds: &Bound,
    bounds_margin: f32,
) -> Result<Progress, TextError> {
    let face_id = match state.font_face {
        Some(face_id) => face_id,
        None => {
            let descriptor = state.props.font_descriptor();
            let face_id = fonts
                .resolve(&descriptor)
                .ok_or_else(|| TextError::FontResolution {
                    family: descriptor.family.clone(),
                })?;
            state.font_face = Some(face_id);
            face_id
        }
    };

    let Some(face) = fonts.face_mut(face_id) else {
        state.font_face = None;
        return Err(TextError::FontResolution {
            family: state.props.font_family.clone(),
        });
    };
    if let FontFaceState::Failed(reason) = face.state() {
        return Err(TextError::FontLoad {
            family: face.descriptor().family.clone(),
            reason: reason.clone(),
        });
    }
    if !face.loaded() {
        face.once_loaded(id);
        return Ok(Progress::WaitingForFont);
    }
    let atlas = Arc::clone(face.atlas());
    let data = face.data().ok_or(LayoutError::MissingFontData)?;

    let props = &state.props;
    let ratio = props.font_size / data.size;
    let line_height = props.line_height.unwrap_or(data.line_height * ratio);
    state.font_size_ratio = ratio;
    state.line_height = line_height;
    state.distance_range = ratio * data.distance_range;

    if !state.element_bounds.valid {
        state
            .element_bounds
            .update(&props.element_rect(), props.clip.as_ref(), renderer_bounds);
    }
    let visible = state.element_bounds.visible;
    let scroll_y = props.effective_scroll_y();

    if state
        .render_window
        .covers(visible.as_ref(), props.x, props.y, scroll_y)
    {
        return Ok(Progress::Ready { atlas });
    }

    let margin = if props.contain == Contain::Both && props.scrollable {
        bounds_margin
    } else {
        0.0
    };
    set_render_window(
        &mut state.render_window,
        props.x,
        props.y,
        scroll_y,
        line_height,
        margin,
        visible.as_ref(),
        ratio,
    );

    // everything but a scroll box sizes itself from the text, so the first
    // layout runs to the end even past the window
    let measure_all =
        !(props.contain == Contain::Both && props.scrollable) && state.text_h.is_none();
    let start = get_start_conditions(
        data.size,
        line_height / ratio,
        props.vertical_align,
        props.offset_y,
        ratio,
        &state.render_window,
        &state.line_cache,
        state.text_h,
    )
    .or_else(|| {
        measure_all.then(|| {
            line_start(
                0,
                data.size,
                line_height / ratio,
                props.vertical_align,
                props.offset_y,
                ratio,
            )
        })
    });
    let Some(start) = start else {
        state.buffer_num_floats = 0;
        state.buffer_uploaded = false;
        state.last_layout = LayoutResult {
            fully_processed: true,
            ..state.last_layout
        };
        return Ok(Progress::Ready { atlas });
    };

    let params = LayoutParams {
        text_align: props.text_align,
        contain: props.contain,
        scrollable: props.scrollable,
        word_break: props.word_break,
        width: props.width,
        height: props.height,
        font_size_ratio: ratio,
        line_height,
        letter_spacing: props.letter_spacing,
        max_lines: props.max_lines,
        overflow_suffix: &state.suffix,
        render_window: state.render_window.sdf,
        text_width: state.text_w.map(|w| w / ratio),
        force_full_layout: measure_all,
    };
    let result = layout_text(
        &params,
        start,
        &state.chars,
        data,
        &mut state.line_cache,
        &mut state.vertex_buffer,
    )?;

    state.buffer_num_floats = result.buffer_num_floats;
    state.buffer_uploaded = false;
    state.last_layout = result;
    state.stats.layout_count += 1;
    state.stats.last_layout_num_characters = result.layout_num_characters;
    state.stats.buffer_bytes = result.buffer_num_floats * std::mem::size_of::<f32>();

    if result.fully_processed {
        state.text_w = Some(result.max_x * ratio);
        state.text_h = Some(result.num_lines as f32 * line_height);
    }

    // a fresh layout reports its dimensions again
    state.status = TextStatus::Loading;
    Ok(Progress::Ready { atlas })
}

/// Registers `id` as renderable owner of `atlas` while it has quads to draw,
/// and releases a previously owned atlas otherwise.
fn sync_atlas_owner(state: &mut TextRenderState, id: TextId, atlas: Option<TextureHandle>) {
    let owner = OwnerId::Text(id);
    let wanted = atlas.filter(|_| state.status == TextStatus::Loaded && state.num_quads() > 0);

    if let Some(current) = state.atlas.take() {
        let keep = wanted.as_ref().is_some_and(|w| Arc::ptr_eq(w, &current));
        if keep {
            state.atlas = Some(current);
            return;
        }
        current.lock().set_renderable_owner(owner, false);
    }
    if let Some(atlas) = wanted {
        atlas.lock().set_renderable_owner(owner, true);
        state.atlas = Some(atlas);
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::time::Instant;

    use parking_lot::Mutex;

    use super::*;
    use crate::bounds::bound;
    use crate::font_face::{FontDescriptor, SdfFontData};
    use crate::renderer::RecordingBackend;
    use crate::text::layout::FLOATS_PER_QUAD;
    use crate::text::props::TextAlign;
    use crate::texture::test_support::counting_loader;
    use crate::texture::{Texture, TextureId, request_load};

    const CHARSET: &str = "abcdefghijklmnopqrstuvwxyz .";

    struct Fixture {
        fonts: FontRegistry,
        text: SdfTextRenderer,
        backend: RecordingBackend,
        face: fontdb::ID,
        atlas: TextureHandle,
    }

    fn fixture(loaded: bool) -> Fixture {
        let (loader, _) = counting_loader();
        let atlas = Arc::new(Mutex::new(Texture::new(TextureId(1), loader, Instant::now())));
        request_load(&atlas);
        atlas.lock().set_loaded((256, 256), 256 * 256 * 4);

        let mut fonts = FontRegistry::new();
        let face = fonts.register_face(FontDescriptor::new("Mono"), Arc::clone(&atlas));
        if loaded {
            fonts.mark_loaded(face, SdfFontData::monospace(10.0, 10.0, CHARSET));
        }
        Fixture {
            fonts,
            text: SdfTextRenderer::new(bound(0.0, 0.0, 1920.0, 1080.0), 100.0),
            backend: RecordingBackend::new(),
            face,
            atlas,
        }
    }

    fn props(text: &str) -> TextProps {
        TextProps {
            text: text.into(),
            font_family: "Mono".into(),
            font_size: 10.0,
            ..TextProps::default()
        }
    }

    fn scroll_box(text: &str) -> TextProps {
        TextProps {
            contain: Contain::Both,
            scrollable: true,
            width: 100.0,
            height: 100.0,
            ..props(text)
        }
    }

    impl Fixture {
        fn flush(&mut self) {
            self.text.flush_updates(&mut self.fonts);
        }

        fn layouts(&self, id: TextId) -> u64 {
            self.text.debug_stats(id).unwrap().layout_count
        }
    }

    #[test]
    fn loads_and_reports_dimensions() {
        let mut f = fixture(true);
        let id = f.text.create_state(props("abc\nde"));
        assert_eq!(f.text.status(id), Some(TextStatus::Initial));
        f.flush();

        assert_eq!(f.text.status(id), Some(TextStatus::Loaded));
        assert_eq!(f.text.text_dimensions(id), Some((30.0, 20.0)));
        assert_eq!(
            f.text.take_events(),
            vec![(
                id,
                TextEvent::Loaded {
                    width: 30.0,
                    height: 20.0
                }
            )]
        );
        assert_eq!(f.text.state(id).unwrap().num_quads(), 5);
    }

    #[test]
    fn second_update_without_changes_does_no_layout() {
        let mut f = fixture(true);
        let id = f.text.create_state(scroll_box(&"line\n".repeat(100)));
        f.flush();
        assert_eq!(f.layouts(id), 1);

        f.text.update_state(id, &mut f.fonts);
        f.text.update_state(id, &mut f.fonts);
        assert_eq!(f.layouts(id), 1);
        assert_eq!(f.text.take_events().len(), 1);
    }

    #[test]
    fn scrolling_inside_the_margin_is_free() {
        let mut f = fixture(true);
        let id = f.text.create_state(scroll_box(&"line\n".repeat(100)));
        f.flush();

        f.text.set_prop(id, TextProp::ScrollY(50.0));
        f.flush();
        assert_eq!(f.layouts(id), 1);

        f.text.set_prop(id, TextProp::ScrollY(150.0));
        f.flush();
        assert_eq!(f.layouts(id), 2);
        // resumed from the cache instead of starting over
        let state = f.text.state(id).unwrap();
        assert!(state.render_window().first_line_idx > 0);
        assert!(state.line_cache().len() > 20);
    }

    #[test]
    fn property_writes_in_one_tick_coalesce() {
        let mut f = fixture(true);
        let id = f.text.create_state(props("abc"));
        f.flush();

        f.text.set_prop(id, TextProp::Text("hello".into()));
        f.text.set_prop(id, TextProp::FontSize(20.0));
        f.text.set_prop(id, TextProp::LetterSpacing(1.0));
        f.text.set_prop(id, TextProp::Text("hello world".into()));
        assert_eq!(f.text.dirty, vec![id]);
        f.flush();
        assert_eq!(f.layouts(id), 2);
        assert!(!f.text.has_pending_updates());
    }

    #[test]
    fn unchanged_property_schedules_nothing() {
        let mut f = fixture(true);
        let id = f.text.create_state(props("abc"));
        f.flush();
        f.text.take_events();

        assert!(!f.text.set_prop(id, TextProp::Text("abc".into())));
        assert!(!f.text.set_prop(id, TextProp::FontSize(10.0)));
        assert!(!f.text.has_pending_updates());
        assert_eq!(f.text.status(id), Some(TextStatus::Loaded));

        assert!(f.text.set_prop(id, TextProp::Color(0xFF00_00FF)));
        assert!(!f.text.has_pending_updates());
    }

    #[test]
    fn waits_for_font_then_loads() {
        let mut f = fixture(false);
        let id = f.text.create_state(props("abc"));
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Loading));
        assert_eq!(f.layouts(id), 0);

        let waiters = f
            .fonts
            .mark_loaded(f.face, SdfFontData::monospace(10.0, 10.0, CHARSET));
        assert_eq!(waiters, vec![id]);
        for waiter in waiters {
            f.text.schedule_update(waiter);
        }
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Loaded));
    }

    #[test]
    fn destroyed_while_loading_ignores_late_font() {
        let mut f = fixture(false);
        let id = f.text.create_state(props("abc"));
        f.flush();
        f.text.destroy_state(id, &mut f.backend);

        let waiters = f
            .fonts
            .mark_loaded(f.face, SdfFontData::monospace(10.0, 10.0, CHARSET));
        for waiter in waiters {
            f.text.schedule_update(waiter);
        }
        f.flush();
        assert_eq!(f.text.status(id), None);
        assert!(f.text.is_empty());
        assert!(!f.text.has_pending_updates());
    }

    #[test]
    fn unknown_family_fails() {
        let mut f = fixture(true);
        let id = f.text.create_state(TextProps {
            font_family: "Nope".into(),
            ..props("abc")
        });
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Failed));
        let events = f.text.take_events();
        assert!(matches!(
            &events[..],
            [(_, TextEvent::Failed(TextError::FontResolution { family }))] if family == "Nope"
        ));

        f.text.set_prop(id, TextProp::FontFamily("Mono".into()));
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Loaded));
    }

    #[test]
    fn failed_font_fails_waiters() {
        let mut f = fixture(false);
        let id = f.text.create_state(props("abc"));
        f.flush();
        for waiter in f.fonts.mark_failed(f.face, "decode error") {
            f.text.schedule_update(waiter);
        }
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Failed));
        assert!(matches!(
            f.text.state(id).unwrap().error(),
            Some(TextError::FontLoad { .. })
        ));
    }

    #[test]
    fn empty_text_is_loaded_with_nothing_to_draw() {
        let mut f = fixture(true);
        let id = f.text.create_state(props(""));
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Loaded));
        f.text.render_quads(id, &RenderContext::default(), &mut f.backend);
        assert!(f.backend.ops().is_empty());
    }

    #[test]
    fn invisible_element_is_loaded_with_nothing_to_draw() {
        let mut f = fixture(true);
        let id = f.text.create_state(TextProps {
            x: 5000.0,
            ..props("abc")
        });
        f.flush();
        assert_eq!(f.text.status(id), Some(TextStatus::Loaded));
        assert_eq!(f.text.state(id).unwrap().num_quads(), 0);
        assert!(f.text.state(id).unwrap().render_window().valid);
        assert_eq!(f.text.text_dimensions(id), Some((30.0, 10.0)));
        assert_eq!(
            f.text.take_events(),
            vec![(
                id,
                TextEvent::Loaded {
                    width: 30.0,
                    height: 10.0
                }
            )]
        );
    }

    #[test]
    fn auto_height_text_is_measured_past_the_screen() {
        let mut f = fixture(true);
        let id = f.text.create_state(TextProps {
            contain: Contain::Width,
            width: 500.0,
            ..props(&"abc\n".repeat(300))
        });
        f.flush();
        assert_eq!(f.layouts(id), 1);
        assert_eq!(f.text.text_dimensions(id), Some((30.0, 3010.0)));
        // lines touching the 1080 px screen plus its 100 px margin
        assert_eq!(f.text.state(id).unwrap().num_quads(), 119 * 3);

        // the size survives a layout that stops at the window
        f.text.set_prop(id, TextProp::Y(-500.0));
        f.flush();
        assert_eq!(f.layouts(id), 2);
        assert!(!f.text.state(id).unwrap().last_layout.fully_processed);
        assert_eq!(f.text.text_dimensions(id), Some((30.0, 3010.0)));
    }

    #[test]
    fn unconstrained_center_text_aligns_to_its_widest_line() {
        let mut f = fixture(true);
        let id = f.text.create_state(TextProps {
            text_align: TextAlign::Center,
            ..props("ab\nabcd")
        });
        f.flush();
        let vertices = f.text.state(id).unwrap().vertices().to_vec();
        assert_eq!(vertices[0], 10.0);
        assert_eq!(vertices[2 * FLOATS_PER_QUAD], 0.0);
    }

    #[test]
    fn render_uploads_once_and_uses_straight_alpha() {
        let mut f = fixture(true);
        let id = f.text.create_state(TextProps {
            color: 0xFF80_0080,
            ..props("ab")
        });
        f.flush();

        let ctx = RenderContext {
            alpha: 0.5,
            z_index: 3,
            ..RenderContext::default()
        };
        f.text.render_quads(id, &ctx, &mut f.backend);
        f.text.render_quads(id, &ctx, &mut f.backend);

        assert_eq!(f.backend.uploads.len(), 1);
        let ops = f.backend.take_ops();
        assert_eq!(ops.len(), 2);
        let op = ops[0];
        assert_eq!(op.num_quads, 2);
        assert_eq!(op.z_index, 3);
        assert_eq!(op.uniforms.color, [1.0, 128.0 / 255.0, 0.0, 128.0 / 255.0 * 0.5]);
        assert_eq!(op.uniforms.size, 1.0);
        assert_eq!(op.uniforms.distance_range, 4.0);

        let floats = f.backend.buffer_floats(op.buffer).unwrap();
        assert_eq!(floats, f.text.state(id).unwrap().vertices());

        f.text.set_prop(id, TextProp::Text("abc".into()));
        f.flush();
        f.text.render_quads(id, &ctx, &mut f.backend);
        assert_eq!(f.backend.uploads.len(), 2);
    }

    #[test]
    fn scrollable_box_clips_to_its_rect() {
        let mut f = fixture(true);
        let id = f.text.create_state(TextProps {
            x: 10.0,
            y: 20.0,
            ..scroll_box("abc")
        });
        f.flush();
        let ctx = RenderContext {
            clip: Some(bound(0.0, 0.0, 50.0, 1000.0)),
            ..RenderContext::default()
        };
        f.text.render_quads(id, &ctx, &mut f.backend);
        assert_eq!(
            f.backend.ops()[0].clip,
            Some(bound(10.0, 20.0, 50.0, 120.0))
        );
    }

    #[test]
    fn nothing_is_drawn_without_an_atlas_texture() {
        let mut f = fixture(true);
        let id = f.text.create_state(props("abc"));
        f.flush();
        f.atlas.lock().free();
        f.text.render_quads(id, &RenderContext::default(), &mut f.backend);
        assert!(f.backend.ops().is_empty());
        assert!(f.backend.uploads.is_empty());
    }

    #[test]
    fn atlas_ownership_follows_the_element() {
        let mut f = fixture(true);
        let id = f.text.create_state(props("abc"));
        f.flush();
        assert!(f.atlas.lock().renderable());

        f.text.set_prop(id, TextProp::Text(String::new()));
        f.flush();
        assert!(!f.atlas.lock().renderable());

        f.text.set_prop(id, TextProp::Text("abc".into()));
        f.flush();
        f.text.render_quads(id, &RenderContext::default(), &mut f.backend);
        assert!(f.atlas.lock().renderable());

        f.text.destroy_state(id, &mut f.backend);
        assert!(!f.atlas.lock().renderable());
        assert_eq!(f.backend.deleted_buffers.len(), 1);
        assert_eq!(f.backend.live_buffers(), 0);
    }

    #[test]
    fn renderer_bounds_change_reschedules_everything() {
        let mut f = fixture(true);
        let a = f.text.create_state(props("abc"));
        let b = f.text.create_state(props("def"));
        f.flush();
        f.text.set_renderer_bounds(bound(0.0, 0.0, 800.0, 600.0));
        assert_eq!(f.text.dirty.len(), 2);
        f.flush();
        assert_eq!(f.text.status(a), Some(TextStatus::Loaded));
        assert_eq!(f.text.status(b), Some(TextStatus::Loaded));
    }
}
