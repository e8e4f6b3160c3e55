//! Error types shared by the text and texture subsystems.
//!
//! None of these are allowed to escape the per-frame loop: the text renderer
//! turns them into a `Failed` status and the memory manager into events.

/// Failure attached to a text element when it enters the `Failed` status.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TextError {
    #[error("could not resolve font face for family '{family}'")]
    FontResolution { family: String },

    #[error("font face '{family}' failed to load: {reason}")]
    FontLoad { family: String, reason: String },

    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),
}

/// Inconsistencies detected while laying out text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("line cache gap: expected line {expected}, cache holds {found} lines")]
    LineCacheGap { expected: usize, found: usize },

    #[error("line cache out of order: codepoint {codepoint} precedes previous line start {previous}")]
    LineCacheOrder { codepoint: usize, previous: usize },

    #[error("font face is marked loaded but carries no metrics")]
    MissingFontData,
}

/// Texture load or lifecycle failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureError {
    #[error("texture load failed: {0}")]
    Load(String),

    #[error("texture has been destroyed")]
    Destroyed,
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("target threshold level must be within 0.0..=1.0, got {0}")]
    TargetThresholdLevel(f32),
}

/// Failure to build an SDF metrics table.
#[derive(Debug, thiserror::Error)]
pub enum FontDataError {
    #[error("invalid font metrics json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("font metrics table contains no glyphs")]
    EmptyCharset,

    #[error("invalid font binary: {0}")]
    InvalidFontBinary(String),

    #[error("font has no horizontal line metrics")]
    MissingLineMetrics,
}
