//! # Kagero
//!
//! SDF text layout and texture memory management for retained-mode
//! renderers running on memory constrained devices.
//!
//! ## Overview
//!
//! `Kagero` lays out text with signed distance field fonts and only keeps
//! the lines that are (nearly) visible in its vertex buffers, so a scroll box
//! holding a whole book costs no more than a screenful. The core of the
//! library is the [`Stage`], which coordinates font registration, texture
//! memory accounting, text updates and draw calls against a
//! [`RenderBackend`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Instant;
//!
//! use kagero::texture::TextureId;
//! use kagero::{
//!     FontDescriptor, RecordingBackend, RenderContext, SdfFontData, Stage, StageConfig, TextProps,
//! };
//!
//! // 1. Create a Stage with a backend
//! let mut stage = Stage::new(StageConfig::default(), RecordingBackend::new()).unwrap();
//!
//! // 2. Register a font; the atlas loader is asked for the texture data
//! let now = Instant::now();
//! let atlas_loader = Box::new(|_: TextureId| { /* fetch the atlas image */ });
//! let face = stage.register_font_face(FontDescriptor::new("Ubuntu"), atlas_loader, now);
//! let metrics = std::fs::read_to_string("ubuntu-sdf.json").unwrap();
//! stage.font_loaded(face, SdfFontData::from_json(&metrics).unwrap());
//!
//! // 3. Create text
//! let text = stage.create_text(TextProps {
//!     text: "Hello".into(),
//!     font_family: "Ubuntu".into(),
//!     ..TextProps::default()
//! });
//!
//! // 4. Draw frames
//! stage.draw_frame(now, &[(text, RenderContext::default())]);
//! ```
//!
//! ## Features
//!
//! *   **Windowed Layout**: Only the lines around the visible area are laid out, with a line cache to resume anywhere.
//! *   **Word Breaking**: `normal`, `break-word` and `break-all` wrapping, `maxLines` and overflow suffixes.
//! *   **Font Matching**: CSS style family, weight, style and stretch matching through `fontdb`.
//! *   **Texture Memory**: Threshold driven cleanup of textures that are not on screen.

pub mod bounds;
pub mod error;
pub mod font_face;
pub mod font_storage;
pub mod renderer;
pub mod stage;
pub mod text;
pub mod texture;

// common re-exports
pub use error::{ConfigError, FontDataError, LayoutError, TextError, TextureError};
pub use font_face::{FontDescriptor, SdfFontData, SdfFontFace};
pub use font_storage::FontRegistry;
pub use renderer::{RecordingBackend, RenderBackend, RenderContext};
pub use stage::{Stage, StageConfig};
pub use text::{TextEvent, TextId, TextProp, TextProps, TextStatus};
pub use texture::{TextureHandle, TextureMemoryConfig, TextureMemoryManager};

// re-export dependencies
pub use euclid;
pub use fontdb;
pub use fontdue;
pub use parking_lot;
