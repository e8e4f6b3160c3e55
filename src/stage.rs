use std::time::Instant;

use crate::bounds::bound;
use crate::error::{ConfigError, FontDataError, TextureError};
use crate::font_face::{FontDescriptor, SdfFontData};
use crate::font_storage::FontRegistry;
use crate::renderer::{RenderBackend, RenderContext};
use crate::text::{SdfTextRenderer, TextEvent, TextId, TextProp, TextProps};
use crate::texture::{
    DEFAULT_MAX_RETRY_COUNT, MemoryEvent, MemoryInfo, TextureHandle, TextureLoader,
    TextureMemoryConfig, TextureMemoryManager, request_load,
};

/// Stage-wide settings.
#[derive(Clone, Debug, PartialEq)]
pub struct StageConfig {
    pub app_width: f32,
    pub app_height: f32,
    /// Pixels buffered above and below scrollable text.
    pub bounds_margin: f32,
    pub texture_memory: TextureMemoryConfig,
    /// Automatic load retries of textures created through the stage.
    pub default_max_retry_count: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            app_width: 1920.0,
            app_height: 1080.0,
            bounds_margin: 100.0,
            texture_memory: TextureMemoryConfig::default(),
            default_max_retry_count: DEFAULT_MAX_RETRY_COUNT,
        }
    }
}

/// High-level entry point tying fonts, textures and text together.
///
/// A stage owns its font registry, so several stages (or tests) never share
/// font state. All methods are meant to be called from the render thread;
/// asynchronous font and texture loads report back through
/// [`Self::font_loaded`] and [`Self::texture_loaded`] and friends.
///
/// The fields are public to allow direct access to the underlying parts when
/// necessary.
pub struct Stage<B: RenderBackend> {
    pub fonts: FontRegistry,
    pub memory: TextureMemoryManager,
    pub text: SdfTextRenderer,
    pub backend: B,
    config: StageConfig,
}

impl<B: RenderBackend> Stage<B> {
    pub fn new(config: StageConfig, backend: B) -> Result<Self, ConfigError> {
        let memory = TextureMemoryManager::new(config.texture_memory.clone())?;
        let text = SdfTextRenderer::new(
            bound(0.0, 0.0, config.app_width, config.app_height),
            config.bounds_margin,
        );
        Ok(Self {
            fonts: FontRegistry::new(),
            memory,
            text,
            backend,
            config,
        })
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    /// Changes the application size; every text element re-checks what it
    /// shows.
    pub fn resize(&mut self, app_width: f32, app_height: f32) {
        self.config.app_width = app_width;
        self.config.app_height = app_height;
        self.text
            .set_renderer_bounds(bound(0.0, 0.0, app_width, app_height));
    }
}

/// font loading
impl<B: RenderBackend> Stage<B> {
    /// Registers an SDF face and starts loading its atlas through `loader`.
    ///
    /// The metrics are expected later through [`Self::font_loaded`]. Atlas
    /// textures are exempt from memory cleanup.
    pub fn register_font_face(
        &mut self,
        descriptor: FontDescriptor,
        atlas_loader: Box<dyn TextureLoader>,
        now: Instant,
    ) -> fontdb::ID {
        let atlas = self.create_atlas(atlas_loader, now);
        self.fonts.register_face(descriptor, atlas)
    }

    /// Registers an outline font measured for `charset`, with its atlas
    /// loaded through `atlas_loader`.
    pub fn load_font_binary(
        &mut self,
        data: impl Into<Vec<u8>>,
        size: f32,
        distance_range: f32,
        charset: &str,
        atlas_loader: Box<dyn TextureLoader>,
        now: Instant,
    ) -> Result<fontdb::ID, FontDataError> {
        let atlas = self.create_atlas(atlas_loader, now);
        self.fonts
            .load_font_binary(data, size, distance_range, charset, atlas)
    }

    fn create_atlas(&mut self, loader: Box<dyn TextureLoader>, now: Instant) -> TextureHandle {
        let atlas = self.create_texture(loader, now);
        atlas.lock().prevent_cleanup = true;
        request_load(&atlas);
        atlas
    }

    /// Metrics of a registered face arrived; waiting text elements update on
    /// the next frame.
    pub fn font_loaded(&mut self, face: fontdb::ID, data: SdfFontData) {
        for id in self.fonts.mark_loaded(face, data) {
            self.text.schedule_update(id);
        }
    }

    /// Loading a face failed; waiting text elements fail on the next frame.
    pub fn font_failed(&mut self, face: fontdb::ID, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("font face {:?} failed to load: {}", face, reason);
        for id in self.fonts.mark_failed(face, reason) {
            self.text.schedule_update(id);
        }
    }
}

/// textures
impl<B: RenderBackend> Stage<B> {
    pub fn create_texture(&mut self, loader: Box<dyn TextureLoader>, now: Instant) -> TextureHandle {
        let texture = self.memory.create_texture(loader, now);
        texture
            .lock()
            .set_max_retry_count(self.config.default_max_retry_count);
        texture
    }

    pub fn texture_loaded(&mut self, texture: &TextureHandle, dimensions: (u32, u32), bytes: u64) {
        self.memory.texture_loaded(texture, dimensions, bytes);
    }

    /// Records the failure and retries while the retry budget lasts.
    ///
    /// Failures of destroyed textures are dropped.
    pub fn texture_failed(&mut self, texture: &TextureHandle, error: TextureError) {
        let id = texture.lock().id();
        let message = error.to_string();
        match self.memory.texture_failed(texture, error) {
            Ok(()) => {
                log::warn!("texture {:?} failed: {}", id, message);
                self.release_freed();
                request_load(texture);
            }
            Err(err) => log::debug!("texture {:?} failure ignored: {}", id, err),
        }
    }

    /// Explicit retry of a texture that gave up.
    pub fn retry_texture(&mut self, texture: &TextureHandle) {
        self.memory.retry_texture(texture);
        self.release_freed();
    }

    pub fn free_texture(&mut self, texture: &TextureHandle) {
        self.memory.free_texture(texture);
        self.release_freed();
    }

    pub fn destroy_texture(&mut self, texture: &TextureHandle) {
        self.memory.destroy_texture(texture);
        self.release_freed();
    }

    pub fn memory_info(&self) -> MemoryInfo {
        self.memory.get_memory_info()
    }

    pub fn take_memory_events(&mut self) -> Vec<MemoryEvent> {
        self.memory.take_events()
    }

    fn release_freed(&mut self) {
        for id in self.memory.take_freed() {
            self.backend.free_ctx_texture(id);
        }
    }
}

/// text
impl<B: RenderBackend> Stage<B> {
    pub fn create_text(&mut self, props: TextProps) -> TextId {
        self.text.create_state(props)
    }

    pub fn set_text_prop(&mut self, id: TextId, prop: TextProp) -> bool {
        self.text.set_prop(id, prop)
    }

    pub fn destroy_text(&mut self, id: TextId) {
        self.text.destroy_state(id, &mut self.backend);
    }

    pub fn take_text_events(&mut self) -> Vec<(TextId, TextEvent)> {
        self.text.take_events()
    }
}

/// frame
impl<B: RenderBackend> Stage<B> {
    /// Runs one frame: pending text updates, the memory cleanup check, then
    /// the draw calls of `nodes` in order.
    pub fn draw_frame(&mut self, now: Instant, nodes: &[(TextId, RenderContext)]) {
        self.text.flush_updates(&mut self.fonts);
        self.memory.check_cleanup(now);
        self.release_freed();
        for (id, ctx) in nodes {
            self.text.render_quads(*id, ctx, &mut self.backend);
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::renderer::RecordingBackend;
    use crate::text::{Contain, TextStatus};
    use crate::texture::test_support::counting_loader;
    use crate::texture::{OwnerId, TextureId, TextureState};

    const MB: u64 = 1_000_000;
    const CHARSET: &str = "abcdefghijklmnopqrstuvwxyz .";

    fn stage() -> Stage<RecordingBackend> {
        let config = StageConfig {
            texture_memory: TextureMemoryConfig {
                critical_threshold: 100 * MB,
                baseline_memory_allocation: 0,
                ..TextureMemoryConfig::default()
            },
            ..StageConfig::default()
        };
        Stage::new(config, RecordingBackend::new()).unwrap()
    }

    fn with_font(stage: &mut Stage<RecordingBackend>, now: Instant) -> TextureHandle {
        let (loader, _) = counting_loader();
        let face = stage.register_font_face(FontDescriptor::new("Mono"), loader, now);
        stage.font_loaded(face, SdfFontData::monospace(10.0, 10.0, CHARSET));
        let atlas = Arc::clone(stage.fonts.face(face).unwrap().atlas());
        stage.texture_loaded(&atlas, (512, 512), MB);
        atlas
    }

    fn text(value: &str) -> TextProps {
        TextProps {
            text: value.into(),
            font_family: "Mono".into(),
            font_size: 20.0,
            ..TextProps::default()
        }
    }

    #[test]
    fn rejects_invalid_memory_config() {
        let config = StageConfig {
            texture_memory: TextureMemoryConfig {
                target_threshold_level: -0.1,
                ..TextureMemoryConfig::default()
            },
            ..StageConfig::default()
        };
        assert!(Stage::new(config, RecordingBackend::new()).is_err());
    }

    #[test]
    fn frame_draws_loaded_text() {
        let now = Instant::now();
        let mut stage = stage();
        with_font(&mut stage, now);
        let id = stage.create_text(text("hello world"));

        stage.draw_frame(now, &[(id, RenderContext::default())]);

        let ops = stage.backend.take_ops();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].num_quads, 10);
        assert_eq!(ops[0].uniforms.size, 2.0);
        assert_eq!(stage.text.text_dimensions(id), Some((220.0, 20.0)));
    }

    #[test]
    fn text_registered_before_font_draws_once_font_arrives() {
        let now = Instant::now();
        let mut stage = stage();
        let (loader, _) = counting_loader();
        let face = stage.register_font_face(FontDescriptor::new("Mono"), loader, now);
        let id = stage.create_text(text("abc"));

        stage.draw_frame(now, &[(id, RenderContext::default())]);
        assert_eq!(stage.text.status(id), Some(TextStatus::Loading));
        assert!(stage.backend.ops().is_empty());

        stage.font_loaded(face, SdfFontData::monospace(10.0, 10.0, CHARSET));
        let atlas = Arc::clone(stage.fonts.face(face).unwrap().atlas());
        stage.texture_loaded(&atlas, (512, 512), MB);
        stage.draw_frame(now, &[(id, RenderContext::default())]);
        assert_eq!(stage.backend.ops().len(), 1);
    }

    #[test]
    fn font_failure_reaches_waiting_text() {
        let now = Instant::now();
        let mut stage = stage();
        let (loader, _) = counting_loader();
        let face = stage.register_font_face(FontDescriptor::new("Mono"), loader, now);
        let id = stage.create_text(text("abc"));
        stage.draw_frame(now, &[]);

        stage.font_failed(face, "network error");
        stage.draw_frame(now, &[]);
        assert_eq!(stage.text.status(id), Some(TextStatus::Failed));
        assert!(matches!(
            stage.take_text_events().last(),
            Some((_, TextEvent::Failed(_)))
        ));
    }

    #[test]
    fn cleanup_spares_atlases_and_drawn_textures() {
        let start = Instant::now();
        let mut stage = stage();
        let atlas = with_font(&mut stage, start);
        let id = stage.create_text(text("abc"));
        stage.draw_frame(start, &[(id, RenderContext::default())]);

        let (loader, _) = counting_loader();
        let image = stage.create_texture(loader, start);
        request_load(&image);
        stage.texture_loaded(&image, (2048, 2048), 60 * MB);
        let (loader, _) = counting_loader();
        let shown = stage.create_texture(loader, start);
        request_load(&shown);
        shown.lock().set_renderable_owner(OwnerId::Node(1), true);
        stage.texture_loaded(&shown, (2048, 2048), 50 * MB);
        let image_id = image.lock().id();
        assert!(stage.memory.critical_cleanup_requested());

        // within the grace period nothing goes
        stage.draw_frame(start + Duration::from_millis(500), &[]);
        assert_eq!(image.lock().state(), TextureState::Loaded);
        assert_eq!(
            stage.take_memory_events(),
            vec![
                MemoryEvent::CriticalCleanup {
                    mem_used: 111 * MB,
                    critical_threshold: 100 * MB
                },
                MemoryEvent::CriticalCleanupFailed {
                    mem_used: 111 * MB,
                    critical_threshold: 100 * MB
                }
            ]
        );

        stage.backend.get_ctx_texture(&image.lock());
        stage.draw_frame(start + Duration::from_secs(6), &[]);
        assert_eq!(image.lock().state(), TextureState::Freed);
        assert_eq!(shown.lock().state(), TextureState::Loaded);
        assert_eq!(atlas.lock().state(), TextureState::Loaded);
        assert_eq!(stage.backend.freed_textures, vec![image_id]);
        assert_eq!(stage.memory_info().mem_used, 51 * MB);
    }

    #[test]
    fn failed_textures_retry_until_the_budget_is_spent() {
        let mut stage = Stage::new(
            StageConfig {
                default_max_retry_count: 2,
                ..StageConfig::default()
            },
            RecordingBackend::new(),
        )
        .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let texture = stage.create_texture(
            Box::new(move |_: TextureId| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
            Instant::now(),
        );
        request_load(&texture);
        for _ in 0..5 {
            stage.texture_failed(&texture, TextureError::Load("timeout".into()));
        }
        // first request plus two retries
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(texture.lock().state(), TextureState::Failed);

        stage.retry_texture(&texture);
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn failure_after_destroy_does_not_reload() {
        let mut stage = stage();
        let (loader, count) = counting_loader();
        let texture = stage.create_texture(loader, Instant::now());
        request_load(&texture);
        stage.destroy_texture(&texture);

        stage.texture_failed(&texture, TextureError::Load("late".into()));
        assert_eq!(texture.lock().state(), TextureState::Destroyed);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        stage.texture_loaded(&texture, (64, 64), MB);
        assert_eq!(texture.lock().state(), TextureState::Destroyed);
        assert_eq!(stage.memory_info().mem_used, 0);
    }

    #[test]
    fn auto_height_text_reports_its_full_size() {
        let now = Instant::now();
        let mut stage = stage();
        with_font(&mut stage, now);
        let id = stage.create_text(TextProps {
            contain: Contain::Width,
            width: 500.0,
            font_size: 10.0,
            ..text(&"abc\n".repeat(300))
        });
        stage.draw_frame(now, &[(id, RenderContext::default())]);

        // 300 lines plus the empty line after the last newline
        assert_eq!(stage.text.text_dimensions(id), Some((30.0, 3010.0)));
        assert_eq!(
            stage.take_text_events(),
            vec![(
                id,
                TextEvent::Loaded {
                    width: 30.0,
                    height: 3010.0
                }
            )]
        );
        // only lines within 100 px of the screen are in the buffer
        assert_eq!(stage.text.state(id).unwrap().num_quads(), 119 * 3);
    }

    #[test]
    fn destroying_text_releases_its_buffer() {
        let now = Instant::now();
        let mut stage = stage();
        let atlas = with_font(&mut stage, now);
        let id = stage.create_text(TextProps {
            contain: Contain::Width,
            width: 50.0,
            ..text("abc def")
        });
        stage.draw_frame(now, &[(id, RenderContext::default())]);
        assert_eq!(atlas.lock().renderable_owner_count(), 1);

        stage.destroy_text(id);
        assert_eq!(stage.backend.live_buffers(), 0);
        assert_eq!(atlas.lock().renderable_owner_count(), 0);
        stage.draw_frame(now, &[(id, RenderContext::default())]);
        assert_eq!(stage.backend.ops().len(), 1);
    }

    #[test]
    fn resize_reveals_hidden_text() {
        let now = Instant::now();
        let mut stage = stage();
        with_font(&mut stage, now);
        let id = stage.create_text(TextProps {
            x: 2000.0,
            ..text("abc")
        });
        stage.draw_frame(now, &[(id, RenderContext::default())]);
        assert!(stage.backend.ops().is_empty());

        stage.resize(2560.0, 1440.0);
        stage.draw_frame(now, &[(id, RenderContext::default())]);
        assert_eq!(stage.backend.ops().len(), 1);
    }
}
