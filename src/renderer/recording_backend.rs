use fxhash::{FxHashMap, FxHashSet};

use crate::renderer::{BufferId, BufferLayout, CtxTextureId, RenderBackend, RenderOp};
use crate::texture::{Texture, TextureId, TextureState};

/// Headless backend that keeps every call for inspection.
///
/// Buffers live in memory as raw bytes; textures get a ctx texture as soon
/// as they are loaded.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_buffer: u64,
    buffers: FxHashMap<BufferId, Vec<u8>>,
    /// Every upload as `(buffer, byte length)`.
    pub uploads: Vec<(BufferId, usize)>,
    pub deleted_buffers: Vec<BufferId>,
    ctx_textures: FxHashSet<TextureId>,
    pub freed_textures: Vec<TextureId>,
    ops: Vec<RenderOp>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render ops queued since the last call.
    pub fn take_ops(&mut self) -> Vec<RenderOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    /// Current contents of `buffer` as floats.
    pub fn buffer_floats(&self, buffer: BufferId) -> Option<Vec<f32>> {
        self.buffers
            .get(&buffer)
            .map(|bytes| bytemuck::pod_collect_to_vec::<u8, f32>(bytes))
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn has_ctx_texture(&self, texture: TextureId) -> bool {
        self.ctx_textures.contains(&texture)
    }
}

impl RenderBackend for RecordingBackend {
    fn create_buffer(&mut self, _layout: &BufferLayout) -> BufferId {
        self.next_buffer += 1;
        let id = BufferId(self.next_buffer);
        self.buffers.insert(id, Vec::new());
        id
    }

    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]) {
        match self.buffers.get_mut(&buffer) {
            Some(stored) => {
                stored.clear();
                stored.extend_from_slice(data);
                self.uploads.push((buffer, data.len()));
            }
            None => log::warn!("upload to unknown buffer {:?}", buffer),
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.deleted_buffers.push(buffer);
        }
    }

    fn get_ctx_texture(&mut self, texture: &Texture) -> Option<CtxTextureId> {
        if texture.state() != TextureState::Loaded {
            return None;
        }
        self.ctx_textures.insert(texture.id());
        Some(CtxTextureId(texture.id().0))
    }

    fn free_ctx_texture(&mut self, texture: TextureId) {
        if self.ctx_textures.remove(&texture) {
            self.freed_textures.push(texture);
        }
    }

    fn add_render_op(&mut self, op: RenderOp) {
        self.ops.push(op);
    }
}
