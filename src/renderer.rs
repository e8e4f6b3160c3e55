//! Seam between the text renderer and a GPU backend.
//!
//! The crate never talks to a graphics API directly. It creates and uploads
//! vertex buffers and queues [`RenderOp`]s through [`RenderBackend`], which a
//! host implements on top of wgpu, WebGL or anything else.

pub mod recording_backend;

use bytemuck::{Pod, Zeroable};
use euclid::{Transform2D, UnknownUnit};

use crate::bounds::Bound;
use crate::texture::{Texture, TextureId};

pub use recording_backend::RecordingBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Backend-side texture object bound to a [`Texture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CtxTextureId(pub u64);

/// One float vertex attribute inside an interleaved buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    /// Number of `f32` components.
    pub size: u32,
    /// Byte offset within a vertex.
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferLayout {
    pub stride: u32,
    pub attributes: [VertexAttribute; 2],
}

/// Layout of the buffers written by [`crate::text::layout_text`]:
/// position and atlas coordinate per vertex.
pub const SDF_BUFFER_LAYOUT: BufferLayout = BufferLayout {
    stride: 16,
    attributes: [
        VertexAttribute {
            name: "a_position",
            size: 2,
            offset: 0,
        },
        VertexAttribute {
            name: "a_textureCoordinate",
            size: 2,
            offset: 8,
        },
    ],
};

/// Shader payload of one SDF draw call.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SdfUniforms {
    /// Row-major 2D affine transform (`m11 m12 m21 m22 m31 m32`).
    pub transform: [f32; 6],
    /// Straight (not premultiplied) RGBA; SDF blending needs it that way.
    pub color: [f32; 4],
    pub scroll_y: f32,
    /// Font size ratio scaling atlas space to screen space.
    pub size: f32,
    pub distance_range: f32,
    pub debug: u32,
}

/// Per-frame inputs of a text draw supplied by the scene graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderContext {
    pub transform: Transform2D<f32, UnknownUnit, UnknownUnit>,
    /// Multiplied into the color alpha.
    pub alpha: f32,
    /// Accumulated clip rect of the ancestors, screen space.
    pub clip: Option<Bound>,
    pub z_index: i32,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            transform: Transform2D::identity(),
            alpha: 1.0,
            clip: None,
            z_index: 0,
        }
    }
}

/// A queued draw of `num_quads` quads from `buffer` with the atlas `texture`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOp {
    pub texture: CtxTextureId,
    pub buffer: BufferId,
    pub num_quads: usize,
    pub uniforms: SdfUniforms,
    pub clip: Option<Bound>,
    pub z_index: i32,
}

pub trait RenderBackend {
    fn create_buffer(&mut self, layout: &BufferLayout) -> BufferId;

    /// Replaces the buffer contents.
    fn upload_buffer(&mut self, buffer: BufferId, data: &[u8]);

    fn delete_buffer(&mut self, buffer: BufferId);

    /// Backend texture for `texture`, or `None` while it cannot be drawn
    /// (not loaded yet, freed, failed).
    fn get_ctx_texture(&mut self, texture: &Texture) -> Option<CtxTextureId>;

    /// Releases the backend side of a freed texture.
    fn free_ctx_texture(&mut self, texture: TextureId);

    fn add_render_op(&mut self, op: RenderOp);
}

/// Converts `0xRRGGBBAA` to straight RGBA floats, scaling alpha by `alpha`.
pub fn color_to_rgba(color: u32, alpha: f32) -> [f32; 4] {
    let channel = |shift: u32| ((color >> shift) & 0xFF) as f32 / 255.0;
    [channel(24), channel(16), channel(8), channel(0) * alpha]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_not_premultiplied() {
        let rgba = color_to_rgba(0xFF80_0080, 0.5);
        assert_eq!(rgba[0], 1.0);
        assert_eq!(rgba[1], 128.0 / 255.0);
        assert_eq!(rgba[2], 0.0);
        assert_eq!(rgba[3], 128.0 / 255.0 * 0.5);
    }

    #[test]
    fn uniforms_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<SdfUniforms>(), 56);
        let uniforms = SdfUniforms::zeroed();
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 56);
    }
}
