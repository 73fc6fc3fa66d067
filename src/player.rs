//! Frame loop: fetch, rasterize, present, pace.
//!
//! One tick per frame. Each tick computes its deadline up front, loads frame `i + 1`,
//! rasterizes it to the most recently polled terminal geometry, presents it and then
//! sleeps until the deadline. A late tick is not compensated for; the next frame simply
//! starts late.
//!
//! Nothing is logged between `initialize` and `restore`: stderr is usually the same
//! terminal the canvas draws on, and a log line there would scroll the region.

use crate::cli::PlayerConfig;
use crate::converter::FrameRasterizer;
use crate::decoder::FrameSource;
use crate::renderer::{status_line, Surface};
use crate::{PlayerError, Result};
use log::{debug, info};
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Source of the terminal's (columns, rows)
pub trait TerminalGeometry {
    fn query(&mut self) -> io::Result<(u16, u16)>;
}

/// Terminal size as reported by crossterm
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermGeometry;

impl TerminalGeometry for CrosstermGeometry {
    fn query(&mut self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Stop was requested, usually Ctrl+C
    Interrupted,
    /// A frame could not be loaded, rasterized or written
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running { frame: usize },
    Completed,
    Aborted(AbortReason),
}

/// Outcome of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub frames_presented: usize,
    pub elapsed: Duration,
    pub interrupted: bool,
}

/// Requests a running player to stop
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// Checked by the player at the top of each tick and while waiting for a deadline
#[derive(Debug, Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub fn pair() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (StopHandle(tx), StopSignal(rx))
    }

    /// A signal that never fires
    pub fn never() -> StopSignal {
        Self::pair().1
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // Handle dropped without stopping.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Interval between frames: `1000 / fps` whole milliseconds.
pub fn frame_duration(fps: u32) -> Duration {
    Duration::from_millis(1000 / fps.max(1) as u64)
}

/// Number of frames between terminal size polls.
pub fn resize_interval(fps: u32) -> usize {
    (fps / 2).max(1) as usize
}

/// Grid size for a terminal: the last row is kept for the status line.
fn grid_size((columns, rows): (u16, u16)) -> Option<(u16, u16)> {
    if columns == 0 || rows < 2 {
        None
    } else {
        Some((columns, rows - 1))
    }
}

/// Drives playback of a frame source onto a surface
pub struct Player<'a, S, C, G> {
    config: &'a PlayerConfig,
    source: S,
    surface: C,
    geometry: G,
    rasterizer: FrameRasterizer,
    grid: (u16, u16),
    state: PlaybackState,
    resizes: usize,
    failed_polls: usize,
}

impl<'a, S, C, G> Player<'a, S, C, G>
where
    S: FrameSource,
    C: Surface,
    G: TerminalGeometry,
{
    /// Create a player, sampling the terminal geometry once.
    pub fn new(config: &'a PlayerConfig, source: S, surface: C, mut geometry: G) -> Result<Self> {
        let size = geometry.query().map_err(PlayerError::TerminalUnavailable)?;
        let grid = grid_size(size).ok_or(PlayerError::TerminalTooSmall(size.0, size.1))?;
        debug!("Initial grid size {}x{}", grid.0, grid.1);

        Ok(Self {
            config,
            source,
            surface,
            geometry,
            rasterizer: FrameRasterizer::new(config.glyphs),
            grid,
            state: PlaybackState::Idle,
            resizes: 0,
            failed_polls: 0,
        })
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Current glyph grid size (columns, rows excluding the status row)
    pub fn grid_size(&self) -> (u16, u16) {
        self.grid
    }

    pub fn surface(&self) -> &C {
        &self.surface
    }

    /// Play every frame once. The surface is restored however the run ends.
    pub async fn run(&mut self, stop: &mut StopSignal) -> Result<PlaybackSummary> {
        let outcome = self.play(stop).await;
        let restored = self.surface.restore();

        if self.resizes > 0 || self.failed_polls > 0 {
            debug!(
                "Terminal resized {} times, {} size polls failed; final grid {}x{}",
                self.resizes, self.failed_polls, self.grid.0, self.grid.1
            );
        }
        if let Ok(summary) = &outcome {
            if summary.interrupted {
                debug!("Playback interrupted after {} frames", summary.frames_presented);
            }
        }

        match outcome {
            Ok(summary) => {
                restored?;
                Ok(summary)
            }
            Err(e) => {
                self.state = PlaybackState::Aborted(AbortReason::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn play(&mut self, stop: &mut StopSignal) -> Result<PlaybackSummary> {
        let fps = self.source.fps();
        if fps == 0 {
            return Err(PlayerError::InvalidConfig(
                "frame rate must be greater than 0".to_string(),
            ));
        }
        let interval = frame_duration(fps);
        let poll_every = resize_interval(fps);
        let frame_count = self.source.frame_count();

        info!(
            "Playing {} frames at {} fps ({}ms per frame) from {}",
            frame_count,
            fps,
            interval.as_millis(),
            self.config.video.display()
        );

        let started = Instant::now();
        let mut presented = 0;
        let (width, height) = self.grid;
        self.surface.initialize(width, height)?;

        for i in 0..frame_count {
            if stop.is_stopped() {
                return Ok(self.interrupted(presented, started));
            }
            self.state = PlaybackState::Running { frame: i + 1 };
            let deadline = Instant::now() + interval;

            let image = self.source.load_frame(i + 1)?;
            let (width, height) = self.grid;
            let grid = self.rasterizer.rasterize(&image, width, height)?;
            drop(image);

            let status = status_line(i, fps, width, height, width);
            self.surface.present(&grid, status.as_deref())?;
            presented += 1;

            if (i + 1) % poll_every == 0 {
                self.poll_geometry()?;
            }

            tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(self.interrupted(presented, started)),
                _ = sleep_until(deadline) => {}
            }
        }

        self.state = PlaybackState::Completed;
        Ok(PlaybackSummary {
            frames_presented: presented,
            elapsed: started.elapsed(),
            interrupted: false,
        })
    }

    fn interrupted(&mut self, presented: usize, started: Instant) -> PlaybackSummary {
        self.state = PlaybackState::Aborted(AbortReason::Interrupted);
        PlaybackSummary {
            frames_presented: presented,
            elapsed: started.elapsed(),
            interrupted: true,
        }
    }

    /// Re-read the terminal size; a failed or unusable reading keeps the previous one.
    fn poll_geometry(&mut self) -> Result<()> {
        let polled = self
            .geometry
            .query()
            .map_err(PlayerError::GeometryPoll)
            .and_then(|size| {
                grid_size(size).ok_or_else(|| {
                    PlayerError::GeometryPoll(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unusable terminal size {}x{}", size.0, size.1),
                    ))
                })
            });

        match polled {
            Ok(grid) if grid != self.grid => {
                self.grid = grid;
                self.resizes += 1;
                self.surface.resize(grid.0, grid.1)
            }
            Ok(_) => Ok(()),
            Err(_) => {
                self.failed_polls += 1;
                Ok(())
            }
        }
    }
}
