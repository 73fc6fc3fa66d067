use crate::glyph::GlyphMapper;
use crate::{PlayerError, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the video file to play (asked for on stdin when omitted)
    pub video: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Frame rate to extract frames at
    #[arg(short, long, default_value_t = 24)]
    pub fps: u32,

    /// Directory that receives the extracted frames
    #[arg(short = 'o', long, value_name = "DIR", default_value = "imgs")]
    pub frames_dir: PathBuf,

    /// Brightness to glyph mapping
    #[arg(short, long, value_enum, default_value_t = GlyphMapper::Ramp)]
    pub glyphs: GlyphMapper,

    /// Reuse frames extracted by an earlier run of the same video
    #[arg(short, long)]
    pub reuse: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Settings for one run, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    pub video: PathBuf,
    pub ffmpeg: PathBuf,
    pub frames_dir: PathBuf,
    pub target_fps: u32,
    pub glyphs: GlyphMapper,
    pub reuse_frames: bool,
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(PlayerError::InvalidConfig(
                "frame rate must be greater than 0".to_string(),
            ));
        }

        if let Some(video) = &self.video {
            if !video.exists() {
                return Err(PlayerError::VideoNotFound(video.clone()));
            }
        }

        Ok(())
    }

    /// Build the run configuration, prompting on `input` for a video path if none was given.
    pub fn into_config<R: BufRead>(self, input: R) -> Result<PlayerConfig> {
        let video = match self.video {
            Some(video) => video,
            None => prompt_video_path(input)?,
        };

        if !video.exists() {
            return Err(PlayerError::VideoNotFound(video));
        }

        Ok(PlayerConfig {
            video,
            ffmpeg: self.ffmpeg,
            frames_dir: self.frames_dir,
            target_fps: self.fps,
            glyphs: self.glyphs,
            reuse_frames: self.reuse,
        })
    }
}

fn prompt_video_path<R: BufRead>(mut input: R) -> Result<PathBuf> {
    print!("Enter path to video file: ");
    io::stdout().flush().map_err(PlayerError::Console)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(PlayerError::Console)?;
    Ok(PathBuf::from(line.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ascii-reel", "clip.mp4"]);
        assert_eq!(cli.fps, 24);
        assert_eq!(cli.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(cli.frames_dir, PathBuf::from("imgs"));
        assert_eq!(cli.glyphs, GlyphMapper::Ramp);
        assert!(!cli.reuse);
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let cli = Cli::parse_from(["ascii-reel", "--fps", "0"]);
        assert!(matches!(cli.validate(), Err(PlayerError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_missing_video() {
        let cli = Cli::parse_from(["ascii-reel", "/definitely/not/here.mp4"]);
        assert!(matches!(cli.validate(), Err(PlayerError::VideoNotFound(_))));
    }

    #[test]
    fn test_into_config_with_argument() {
        let video = NamedTempFile::new().unwrap();
        let path = video.path().to_str().unwrap();
        let cli = Cli::parse_from(["ascii-reel", path, "--glyphs", "bands", "-f", "12", "--reuse"]);

        let config = cli.into_config(io::empty()).unwrap();
        assert_eq!(config.video, video.path());
        assert_eq!(config.target_fps, 12);
        assert_eq!(config.glyphs, GlyphMapper::Bands);
        assert!(config.reuse_frames);
    }

    #[test]
    fn test_into_config_prompts() {
        let video = NamedTempFile::new().unwrap();
        let input = format!("{}\n", video.path().display());
        let cli = Cli::parse_from(["ascii-reel"]);

        let config = cli.into_config(input.as_bytes()).unwrap();
        assert_eq!(config.video, video.path());
    }

    #[test]
    fn test_into_config_prompted_path_must_exist() {
        let cli = Cli::parse_from(["ascii-reel"]);
        let result = cli.into_config("missing.mp4\n".as_bytes());
        assert!(matches!(result, Err(PlayerError::VideoNotFound(_))));
    }

    struct ClosedInput;

    impl io::Read for ClosedInput {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn test_prompt_read_failure_is_precondition() {
        let cli = Cli::parse_from(["ascii-reel"]);
        let err = cli.into_config(io::BufReader::new(ClosedInput)).unwrap_err();
        assert!(matches!(err, PlayerError::Console(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
