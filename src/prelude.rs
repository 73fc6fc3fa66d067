// Re-export commonly used types for convenience
pub use crate::cli::{Cli, PlayerConfig};
pub use crate::converter::{FrameRasterizer, GlyphGrid};
pub use crate::decoder::{FrameDirectory, FrameExtractor, FrameSource};
pub use crate::glyph::GlyphMapper;
pub use crate::player::{
    AbortReason, PlaybackState, PlaybackSummary, Player, StopSignal, TerminalGeometry,
};
pub use crate::renderer::{status_line, Surface, TerminalCanvas};
pub use crate::utils::*;
pub use crate::{ErrorCategory, PlayerError, Result};

pub use std::path::Path;
