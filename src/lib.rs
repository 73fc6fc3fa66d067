//! ASCII Reel - plays a video as ASCII art in the terminal
//!
//! The video is transcoded up front into a directory of numbered PNG frames by an
//! external `ffmpeg` process. Playback then loads each frame, samples it down to the
//! current terminal size, maps brightness to glyphs and redraws the same screen
//! region in place, paced against a wall-clock schedule.

pub mod cli;
pub mod converter;
pub mod decoder;
pub mod glyph;
pub mod player;
pub mod prelude;
pub mod renderer;

use std::path::PathBuf;

pub use cli::{Cli, PlayerConfig};
pub use converter::{FrameRasterizer, GlyphGrid};
pub use decoder::{check_decoder, FrameDirectory, FrameExtractor, FrameManifest, FrameSource};
pub use glyph::GlyphMapper;
pub use player::{
    AbortReason, CrosstermGeometry, PlaybackState, PlaybackSummary, Player, StopHandle,
    StopSignal, TerminalGeometry,
};
pub use renderer::{status_line, Surface, TerminalCanvas};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How an error affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unmet condition detected before playback starts.
    Precondition,
    /// Failure while frames are being presented.
    Playback,
    /// Handled locally; playback continues.
    Recoverable,
}

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("standard output is not a terminal")]
    NotATerminal,

    #[error("video file does not exist: {}", .0.display())]
    VideoNotFound(PathBuf),

    #[error("ffmpeg not found at `{}`: https://www.ffmpeg.org/download.html", .0.display())]
    DecoderNotFound(PathBuf),

    #[error("failed to run ffmpeg at `{}`: {source}", path.display())]
    DecoderSpawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("ffmpeg exited with code {code:?}\n{log}")]
    DecoderFailed { code: Option<i32>, log: String },

    #[error("failed to extract {0} from ffmpeg output")]
    DecoderOutput(&'static str),

    #[error("failed to prepare frame directory `{}`: {source}", path.display())]
    FrameDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("console I/O failed: {0}")]
    Console(std::io::Error),

    #[error("failed to query terminal size: {0}")]
    TerminalUnavailable(std::io::Error),

    #[error("terminal too small: {0}x{1}")]
    TerminalTooSmall(u16, u16),

    #[error("terminal size poll failed: {0}")]
    GeometryPoll(std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid glyph grid size {width}x{height}")]
    InvalidGridSize { width: u16, height: u16 },

    #[error("frame image has no pixels")]
    EmptyImage,

    #[error("failed to open frame {index} `{}`: {source}", path.display())]
    FrameOpen {
        index: usize,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode frame {index} `{}`: {source}", path.display())]
    FrameDecode {
        index: usize,
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("frame manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Unclassified I/O; only raised once frames are being written to the terminal.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PlayerError::GeometryPoll(_) => ErrorCategory::Recoverable,
            PlayerError::InvalidGridSize { .. }
            | PlayerError::EmptyImage
            | PlayerError::FrameOpen { .. }
            | PlayerError::FrameDecode { .. }
            | PlayerError::Io(_) => ErrorCategory::Playback,
            _ => ErrorCategory::Precondition,
        }
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Precondition => 2,
            ErrorCategory::Playback | ErrorCategory::Recoverable => 1,
        }
    }
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Utility functions
pub mod utils {
    /// Format duration in a human-readable way
    pub fn format_duration(seconds: f64) -> String {
        let total_seconds = seconds as u64;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{}:{:02}", minutes, secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(PlayerError::NotATerminal.category(), ErrorCategory::Precondition);
        assert_eq!(PlayerError::EmptyImage.category(), ErrorCategory::Playback);
        let poll = PlayerError::GeometryPoll(std::io::Error::other("gone"));
        assert_eq!(poll.category(), ErrorCategory::Recoverable);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(PlayerError::DecoderOutput("frame count").exit_code(), 2);
        let prompt = PlayerError::Console(std::io::ErrorKind::BrokenPipe.into());
        assert_eq!(prompt.exit_code(), 2);
        let spawn = PlayerError::DecoderSpawn {
            path: PathBuf::from("ffmpeg"),
            source: std::io::ErrorKind::PermissionDenied.into(),
        };
        assert_eq!(spawn.exit_code(), 2);
        assert_eq!(PlayerError::Io(std::io::ErrorKind::BrokenPipe.into()).exit_code(), 1);
        let missing = PlayerError::FrameOpen {
            index: 7,
            path: PathBuf::from("imgs/out7.png"),
            source: std::io::ErrorKind::NotFound.into(),
        };
        assert_eq!(missing.exit_code(), 1);
        assert!(missing.to_string().contains("frame 7"));
    }
}
