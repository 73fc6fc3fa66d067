use crate::cli::PlayerConfig;
use crate::utils::format_duration;
use crate::{PlayerError, Result};
use image::DynamicImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// File written next to extracted frames so a later run can reuse them
pub const MANIFEST_FILE: &str = "frames.json";

/// An ordered, 1-indexed sequence of decodable frames with a known rate
pub trait FrameSource {
    fn frame_count(&self) -> usize;

    /// Rate the frames were produced at
    fn fps(&self) -> u32;

    /// Load frame `index` (1-based)
    fn load_frame(&self, index: usize) -> Result<DynamicImage>;
}

/// Directory of `out1.png ... outN.png` produced by ffmpeg
#[derive(Debug, Clone)]
pub struct FrameDirectory {
    dir: PathBuf,
    frame_count: usize,
    fps: u32,
}

impl FrameDirectory {
    pub fn new(dir: impl Into<PathBuf>, frame_count: usize, fps: u32) -> Self {
        Self {
            dir: dir.into(),
            frame_count,
            fps,
        }
    }

    /// Reopen frames extracted by an earlier run of the same video at the same target rate.
    pub fn cached(dir: &Path, video: &Path, target_fps: u32) -> Option<Self> {
        let manifest = FrameManifest::read(dir).ok()?;
        if manifest.target_fps != target_fps || manifest.video != canonical(video) {
            debug!("Manifest in {} does not match {}", dir.display(), video.display());
            return None;
        }
        info!(
            "Reusing {} frames from {}",
            manifest.frame_count,
            dir.display()
        );
        Some(Self::new(dir, manifest.frame_count, manifest.fps))
    }

    /// Path of frame `index` (1-based)
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("out{}.png", index))
    }
}

impl FrameSource for FrameDirectory {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn fps(&self) -> u32 {
        self.fps
    }

    fn load_frame(&self, index: usize) -> Result<DynamicImage> {
        let path = self.frame_path(index);
        if index == 0 || index > self.frame_count {
            return Err(PlayerError::FrameOpen {
                index,
                path,
                source: io::ErrorKind::NotFound.into(),
            });
        }

        let reader = image::io::Reader::open(&path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| PlayerError::FrameOpen {
                index,
                path: path.clone(),
                source,
            })?;

        reader
            .decode()
            .map_err(|source| PlayerError::FrameDecode { index, path, source })
    }
}

/// Record of a completed extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub video: PathBuf,
    pub target_fps: u32,
    pub frame_count: usize,
    pub fps: u32,
}

impl FrameManifest {
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|source| PlayerError::FrameDirectory { path, source })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(&path, text).map_err(|source| PlayerError::FrameDirectory { path, source })
    }
}

/// Runs ffmpeg to turn a video into a frame directory
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    ffmpeg: PathBuf,
    output_dir: PathBuf,
    target_fps: u32,
}

impl FrameExtractor {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            output_dir: config.frames_dir.clone(),
            target_fps: config.target_fps,
        }
    }

    /// Transcode `video` into numbered PNG frames and read back count and rate from the log.
    pub async fn extract(&self, video: &Path) -> Result<FrameDirectory> {
        fs::create_dir_all(&self.output_dir).map_err(|source| PlayerError::FrameDirectory {
            path: self.output_dir.clone(),
            source,
        })?;

        print!("Processing...");
        io::stdout().flush().map_err(PlayerError::Console)?;
        let started = Instant::now();

        let pattern = self.output_dir.join("out%d.png");
        debug!(
            "Running {} -i {} -vf fps={} {}",
            self.ffmpeg.display(),
            video.display(),
            self.target_fps,
            pattern.display()
        );

        let output = Command::new(&self.ffmpeg)
            .arg("-nostdin")
            .arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("fps={}", self.target_fps))
            .arg(&pattern)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            println!();
            return Err(PlayerError::DecoderFailed {
                code: output.status.code(),
                log: log_tail(&log, 20),
            });
        }

        let frame_count = parse_frame_count(&log)
            .filter(|&count| count > 0)
            .ok_or(PlayerError::DecoderOutput("frame count"))?;
        let fps = parse_output_fps(&log).ok_or(PlayerError::DecoderOutput("frame rate"))?;

        println!("\nDone.");
        println!("ffmpeg: frames = {}", frame_count);
        println!(
            "ffmpeg: elapsed time = {}",
            format_duration(started.elapsed().as_secs_f64())
        );
        if fps != self.target_fps {
            info!(
                "ffmpeg reported {} fps for a requested {} fps; pacing at {}",
                fps, self.target_fps, fps
            );
        }

        let manifest = FrameManifest {
            video: canonical(video),
            target_fps: self.target_fps,
            frame_count,
            fps,
        };
        manifest.write(&self.output_dir)?;

        Ok(FrameDirectory::new(&self.output_dir, frame_count, fps))
    }

    fn spawn_error(&self, e: io::Error) -> PlayerError {
        if e.kind() == io::ErrorKind::NotFound {
            PlayerError::DecoderNotFound(self.ffmpeg.clone())
        } else {
            PlayerError::DecoderSpawn {
                path: self.ffmpeg.clone(),
                source: e,
            }
        }
    }
}

/// Confirm the ffmpeg executable exists and runs.
pub async fn check_decoder(ffmpeg: &Path) -> Result<()> {
    let status = Command::new(ffmpeg)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => {
            debug!("Found ffmpeg at {}", ffmpeg.display());
            Ok(())
        }
        Ok(_) => Err(PlayerError::DecoderNotFound(ffmpeg.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PlayerError::DecoderNotFound(ffmpeg.to_path_buf()))
        }
        Err(source) => Err(PlayerError::DecoderSpawn {
            path: ffmpeg.to_path_buf(),
            source,
        }),
    }
}

/// Total frames written: the number between the last `frame=` and the following `fps=`.
pub fn parse_frame_count(log: &str) -> Option<usize> {
    let start = log.rfind("frame=")? + "frame=".len();
    let rest = &log[start..];
    let end = rest.find("fps=")?;
    rest[..end].trim().parse().ok()
}

/// Rate of the first video stream of the first output, rounded to whole frames.
pub fn parse_output_fps(log: &str) -> Option<u32> {
    let output = &log[log.find("Output #0")?..];
    let stream = output
        .lines()
        .find(|line| line.contains("Stream #") && line.contains("Video:"))?;

    let fps: f64 = stream
        .split(',')
        .find_map(|field| field.trim().strip_suffix(" fps"))?
        .trim()
        .parse()
        .ok()?;

    let fps = fps.round();
    if fps >= 1.0 {
        Some(fps as u32)
    } else {
        None
    }
}

/// Last `lines` lines of a log, for error messages.
fn log_tail(log: &str, lines: usize) -> String {
    let all: Vec<&str> = log.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
