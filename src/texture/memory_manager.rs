use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{ConfigError, TextureError};
use crate::texture::{
    Texture, TextureHandle, TextureId, TextureLoader, TextureState, request_load,
};

/// Memory thresholds and sweep cadence.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMemoryConfig {
    /// Bytes at which a cleanup is forced on the next check. `0` disables
    /// memory management entirely.
    pub critical_threshold: u64,
    /// Fraction of `critical_threshold` a sweep tries to get below.
    pub target_threshold_level: f32,
    pub cleanup_interval: Duration,
    /// Memory the renderer uses before any texture is loaded.
    pub baseline_memory_allocation: u64,
    pub debug_logging: bool,
}

impl Default for TextureMemoryConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 124_000_000,
            target_threshold_level: 0.5,
            cleanup_interval: Duration::from_secs(5),
            baseline_memory_allocation: 26_000_000,
            debug_logging: false,
        }
    }
}

/// Read-only snapshot for the host application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryInfo {
    pub mem_used: u64,
    pub critical_threshold: u64,
    pub target_threshold: u64,
    pub baseline_memory_allocation: u64,
    pub loaded_textures: usize,
    pub renderable_textures_loaded: usize,
}

/// Memory pressure notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryEvent {
    /// A sweep started because usage crossed the critical threshold.
    CriticalCleanup { mem_used: u64, critical_threshold: u64 },
    /// A sweep ended with usage still at or above the critical threshold.
    CriticalCleanupFailed { mem_used: u64, critical_threshold: u64 },
}

struct TrackedTexture {
    handle: TextureHandle,
    bytes: u64,
}

/// Tracks the GPU memory of every loaded texture and evicts unreferenced
/// ones when usage gets too high.
///
/// Callers must not hold a texture's lock while calling into the manager.
pub struct TextureMemoryManager {
    config: TextureMemoryConfig,
    target_threshold: u64,
    mem_used: u64,
    next_id: u64,
    /// Textures currently holding memory.
    loaded: HashMap<TextureId, TrackedTexture, fxhash::FxBuildHasher>,
    critical_cleanup_requested: bool,
    last_cleanup: Option<Instant>,
    events: Vec<MemoryEvent>,
    freed: Vec<TextureId>,
}

impl TextureMemoryManager {
    /// Creates a manager, rejecting inconsistent thresholds.
    pub fn new(config: TextureMemoryConfig) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&config.target_threshold_level) {
            return Err(ConfigError::TargetThresholdLevel(
                config.target_threshold_level,
            ));
        }
        let target_threshold =
            (config.critical_threshold as f64 * config.target_threshold_level as f64) as u64;
        Ok(Self {
            mem_used: config.baseline_memory_allocation,
            target_threshold,
            config,
            next_id: 1,
            loaded: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            critical_cleanup_requested: false,
            last_cleanup: None,
            events: Vec::new(),
            freed: Vec::new(),
        })
    }

    fn enabled(&self) -> bool {
        self.config.critical_threshold > 0
    }

    /// Creates a texture in the `Initial` state.
    pub fn create_texture(&mut self, loader: Box<dyn TextureLoader>, now: Instant) -> TextureHandle {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        Arc::new(Mutex::new(Texture::new(id, loader, now)))
    }

    /// Records that `handle` now occupies `bytes` of GPU memory (0 when
    /// released).
    pub fn set_texture_memory_use(&mut self, handle: &TextureHandle, bytes: u64) {
        let id = handle.lock().id();
        let previous = self.loaded.get(&id).map(|t| t.bytes).unwrap_or(0);
        self.mem_used = self.mem_used.saturating_sub(previous).saturating_add(bytes);

        if bytes == 0 {
            self.loaded.remove(&id);
        } else {
            self.loaded.insert(
                id,
                TrackedTexture {
                    handle: Arc::clone(handle),
                    bytes,
                },
            );
        }

        if self.enabled() && self.mem_used > self.config.critical_threshold {
            self.critical_cleanup_requested = true;
        }
    }

    /// Whether `bytes` more would still stay within the critical threshold.
    pub fn has_capacity(&self, bytes: u64) -> bool {
        !self.enabled() || self.mem_used.saturating_add(bytes) <= self.config.critical_threshold
    }

    /// Marks `handle` loaded and accounts its `bytes`.
    pub fn texture_loaded(&mut self, handle: &TextureHandle, dimensions: (u32, u32), bytes: u64) {
        {
            let mut texture = handle.lock();
            if texture.state() == TextureState::Destroyed {
                return;
            }
            texture.set_loaded(dimensions, bytes);
        }
        self.set_texture_memory_use(handle, bytes);
    }

    /// Records a failed load and releases whatever the texture held.
    ///
    /// A failure arriving after [`Self::destroy_texture`] changes nothing and
    /// yields [`TextureError::Destroyed`].
    pub fn texture_failed(
        &mut self,
        handle: &TextureHandle,
        error: TextureError,
    ) -> Result<(), TextureError> {
        let released = {
            let mut texture = handle.lock();
            if texture.state() == TextureState::Destroyed {
                return Err(TextureError::Destroyed);
            }
            let released = texture.free();
            texture.set_failed(error);
            released
        };
        if released > 0 {
            self.forget(handle, true);
        }
        Ok(())
    }

    /// Releases the GPU data of `handle`; it may be loaded again later.
    pub fn free_texture(&mut self, handle: &TextureHandle) {
        handle.lock().free();
        self.forget(handle, true);
    }

    /// Terminal release of `handle`.
    pub fn destroy_texture(&mut self, handle: &TextureHandle) {
        handle.lock().destroy();
        self.forget(handle, true);
    }

    /// Clears the failure counter, drops whatever is held and loads again.
    pub fn retry_texture(&mut self, handle: &TextureHandle) {
        handle.lock().free();
        self.forget(handle, true);
        handle.lock().reset_retries();
        request_load(handle);
    }

    fn forget(&mut self, handle: &TextureHandle, release_ctx: bool) {
        let id = handle.lock().id();
        if let Some(tracked) = self.loaded.remove(&id) {
            self.mem_used = self.mem_used.saturating_sub(tracked.bytes);
            if release_ctx {
                self.freed.push(id);
            }
        }
    }

    /// Runs a sweep if one was requested by crossing the critical threshold
    /// or the cleanup interval elapsed.
    pub fn check_cleanup(&mut self, now: Instant) {
        if !self.enabled() {
            return;
        }
        let interval_elapsed = match self.last_cleanup {
            Some(last) => now.saturating_duration_since(last) >= self.config.cleanup_interval,
            None => {
                self.last_cleanup = Some(now);
                false
            }
        };
        if self.critical_cleanup_requested || interval_elapsed {
            self.cleanup(now, false);
        }
    }

    /// Frees eligible textures, oldest first, until usage drops below the
    /// target threshold. `aggressive` frees every eligible texture.
    pub fn cleanup(&mut self, now: Instant, aggressive: bool) {
        if !self.enabled() {
            return;
        }
        let critical = self.critical_cleanup_requested;
        let critical_threshold = self.config.critical_threshold;
        self.last_cleanup = Some(now);

        if critical {
            self.events.push(MemoryEvent::CriticalCleanup {
                mem_used: self.mem_used,
                critical_threshold,
            });
        }

        let mem_before = self.mem_used;
        let mut candidates: Vec<(Instant, TextureId, TextureHandle)> = self
            .loaded
            .iter()
            .filter_map(|(&id, tracked)| {
                let texture = tracked.handle.lock();
                // mid-load or failed textures hold no settled memory
                (texture.state() == TextureState::Loaded && texture.can_be_cleaned_up(now))
                    .then(|| (texture.created_at(), id, Arc::clone(&tracked.handle)))
            })
            .collect();
        candidates.sort_by_key(|(created_at, id, _)| (*created_at, *id));

        let mut freed_count = 0usize;
        for (_, _, handle) in candidates {
            if !aggressive && self.mem_used < self.target_threshold {
                break;
            }
            handle.lock().free();
            self.forget(&handle, true);
            freed_count += 1;
        }

        if self.config.debug_logging {
            log::debug!(
                "texture cleanup: freed {} textures, {} -> {} bytes (target {}, critical {})",
                freed_count,
                mem_before,
                self.mem_used,
                self.target_threshold,
                critical_threshold
            );
        }

        if self.mem_used >= critical_threshold {
            log::warn!(
                "texture cleanup could not get below the critical threshold: {} >= {} bytes",
                self.mem_used,
                critical_threshold
            );
            self.events.push(MemoryEvent::CriticalCleanupFailed {
                mem_used: self.mem_used,
                critical_threshold,
            });
        }

        self.critical_cleanup_requested = false;
    }

    /// Snapshot of usage, thresholds and texture counts.
    pub fn get_memory_info(&self) -> MemoryInfo {
        MemoryInfo {
            mem_used: self.mem_used,
            critical_threshold: self.config.critical_threshold,
            target_threshold: self.target_threshold,
            baseline_memory_allocation: self.config.baseline_memory_allocation,
            loaded_textures: self.loaded.len(),
            renderable_textures_loaded: self
                .loaded
                .values()
                .filter(|t| t.handle.lock().renderable())
                .count(),
        }
    }

    /// Whether crossing the critical threshold queued a sweep.
    pub fn critical_cleanup_requested(&self) -> bool {
        self.critical_cleanup_requested
    }

    /// Memory events since the last call.
    pub fn take_events(&mut self) -> Vec<MemoryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Ids whose GPU resources must be released on the backend.
    pub fn take_freed(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.freed)
    }

    /// Thresholds and intervals this manager runs with.
    pub fn config(&self) -> &TextureMemoryConfig {
        &self.config
    }
}
