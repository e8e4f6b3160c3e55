//! GPU texture bookkeeping: load state, memory footprint and renderable
//! ownership used to decide what may be evicted.

pub mod memory_manager;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::TextureError;
use crate::text::TextId;

pub use memory_manager::{MemoryEvent, MemoryInfo, TextureMemoryConfig, TextureMemoryManager};

/// Textures younger than this are never evicted, so that textures requested
/// during bootstrap survive until their owners have established visibility.
pub const CLEANUP_GRACE_PERIOD: Duration = Duration::from_millis(2000);

/// Default number of automatic load retries before a texture gives up.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 5;

/// Shared handle; many nodes and text elements may reference one texture.
pub type TextureHandle = Arc<Mutex<Texture>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Anything that may keep a texture on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OwnerId {
    Node(u64),
    Text(TextId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureState {
    Initial,
    Loading,
    Loaded,
    Failed,
    Freed,
    Destroyed,
}

/// Starts fetching or decoding texture data.
///
/// Completion is reported back asynchronously through
/// [`TextureMemoryManager::texture_loaded`] or
/// [`TextureMemoryManager::texture_failed`]. The texture is not locked while
/// the loader runs, so a loader may lock the handle it serves.
pub trait TextureLoader: Send {
    fn on_load_request(&mut self, texture: TextureId);
}

impl<F: FnMut(TextureId) + Send> TextureLoader for F {
    fn on_load_request(&mut self, texture: TextureId) {
        self(texture)
    }
}

pub struct Texture {
    id: TextureId,
    state: TextureState,
    dimensions: Option<(u32, u32)>,
    mem_used: u64,
    renderable_owners: HashSet<OwnerId, fxhash::FxBuildHasher>,
    retry_count: u32,
    max_retry_count: u32,
    created_at: Instant,
    error: Option<TextureError>,
    loader: Arc<Mutex<Box<dyn TextureLoader>>>,
    /// Exempts the texture from every cleanup sweep.
    pub prevent_cleanup: bool,
}

impl Texture {
    /// Texture in the `Initial` state; `loader` is asked for data on every load.
    pub fn new(id: TextureId, loader: Box<dyn TextureLoader>, created_at: Instant) -> Self {
        Self {
            id,
            state: TextureState::Initial,
            dimensions: None,
            mem_used: 0,
            renderable_owners: HashSet::with_hasher(fxhash::FxBuildHasher::default()),
            retry_count: 0,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            created_at,
            error: None,
            loader: Arc::new(Mutex::new(loader)),
            prevent_cleanup: false,
        }
    }

    /// Identifier the backend knows this texture by.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TextureState {
        self.state
    }

    /// Pixel size, once loaded.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Bytes accounted to this texture; 0 unless loaded.
    pub fn mem_used(&self) -> u64 {
        self.mem_used
    }

    /// Creation time, used for the cleanup grace period.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The last load failure, cleared by a successful load or a retry.
    pub fn error(&self) -> Option<&TextureError> {
        self.error.as_ref()
    }

    /// Failed loads since creation or the last retry.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Failed loads tolerated before loading stops.
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// Changes how many failed loads are tolerated.
    pub fn set_max_retry_count(&mut self, max: u32) {
        self.max_retry_count = max;
    }

    /// Moves the texture to `Loading` and returns the request to hand to
    /// the loader once this texture is unlocked.
    ///
    /// Returns `None` while loading or loaded, after destruction, or once the
    /// retry budget is exhausted (until [`Self::reset_retries`]). Most callers
    /// want [`request_load`].
    pub fn load(&mut self) -> Option<LoadRequest> {
        match self.state {
            TextureState::Loading | TextureState::Loaded | TextureState::Destroyed => None,
            _ if self.retry_count > self.max_retry_count => None,
            _ => {
                self.state = TextureState::Loading;
                Some(LoadRequest {
                    texture: self.id,
                    loader: Arc::clone(&self.loader),
                })
            }
        }
    }

    pub(crate) fn set_loaded(&mut self, dimensions: (u32, u32), mem_used: u64) {
        self.state = TextureState::Loaded;
        self.dimensions = Some(dimensions);
        self.mem_used = mem_used;
        self.error = None;
    }

    pub(crate) fn set_failed(&mut self, error: TextureError) {
        self.state = TextureState::Failed;
        self.retry_count += 1;
        self.error = Some(error);
    }

    /// Drops the GPU data but keeps the object reloadable. Returns the bytes
    /// released.
    pub(crate) fn free(&mut self) -> u64 {
        let released = std::mem::take(&mut self.mem_used);
        if self.state != TextureState::Destroyed {
            self.state = TextureState::Freed;
        }
        released
    }

    pub(crate) fn destroy(&mut self) -> u64 {
        let released = self.free();
        self.state = TextureState::Destroyed;
        self.renderable_owners.clear();
        released
    }

    /// Clears the failure counter so [`Self::load`] works again.
    pub(crate) fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.error = None;
    }

    /// Adds or removes `owner` from the set keeping this texture on screen.
    pub fn set_renderable_owner(&mut self, owner: OwnerId, renderable: bool) {
        if renderable {
            self.renderable_owners.insert(owner);
        } else {
            self.renderable_owners.remove(&owner);
        }
    }

    /// Whether any owner currently draws this texture.
    pub fn renderable(&self) -> bool {
        !self.renderable_owners.is_empty()
    }

    /// Number of owners currently drawing this texture.
    pub fn renderable_owner_count(&self) -> usize {
        self.renderable_owners.len()
    }

    /// Whether a cleanup sweep may free this texture at `now`.
    pub fn can_be_cleaned_up(&self, now: Instant) -> bool {
        if self.prevent_cleanup {
            return false;
        }
        if now.saturating_duration_since(self.created_at) < CLEANUP_GRACE_PERIOD {
            return false;
        }
        if self.renderable() {
            return false;
        }
        self.renderable_owners.is_empty()
    }
}

/// A pending call to a texture's loader.
#[must_use = "the loader is only called by `send`"]
pub struct LoadRequest {
    texture: TextureId,
    loader: Arc<Mutex<Box<dyn TextureLoader>>>,
}

impl LoadRequest {
    /// The texture this request loads.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Calls the loader.
    pub fn send(self) {
        self.loader.lock().on_load_request(self.texture);
    }
}

/// Starts loading `handle` if it is not loading or loaded already and its
/// retry budget allows. Returns whether the loader was called.
///
/// The texture lock is released before the loader runs.
pub fn request_load(handle: &TextureHandle) -> bool {
    let request = handle.lock().load();
    match request {
        Some(request) => {
            request.send();
            true
        }
        None => false,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Loader counting how often it was asked for data.
    pub fn counting_loader() -> (Box<dyn TextureLoader>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let loader = move |_: TextureId| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        (Box::new(loader), count)
    }
}
