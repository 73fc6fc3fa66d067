use anyhow::{Context, Result};
use ascii_reel::utils::format_duration;
use ascii_reel::{
    check_decoder, Cli, CrosstermGeometry, FrameDirectory, FrameExtractor, PlaybackSummary,
    Player, PlayerError, StopSignal, TerminalCanvas,
};
use clap::Parser;
use log::{debug, error, info};

/// Exit status for a run stopped with Ctrl+C
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let code = match run(cli).await {
        Ok(summary) if summary.interrupted => EXIT_INTERRUPTED,
        Ok(_) => 0,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<PlayerError>()
                .map_or(1, PlayerError::exit_code)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<PlaybackSummary> {
    cli.validate()?;

    if !atty::is(atty::Stream::Stdout) {
        return Err(PlayerError::NotATerminal.into());
    }

    let config = cli.into_config(std::io::stdin().lock())?;
    info!("Starting ASCII Reel v{}", ascii_reel::VERSION);
    info!("Playing: {}", config.video.display());

    let cached = if config.reuse_frames {
        FrameDirectory::cached(&config.frames_dir, &config.video, config.target_fps)
    } else {
        None
    };

    let frames = match cached {
        Some(frames) => frames,
        None => {
            check_decoder(&config.ffmpeg).await?;
            FrameExtractor::new(&config)
                .extract(&config.video)
                .await
                .with_context(|| {
                    format!("failed to extract frames from {}", config.video.display())
                })?
        }
    };

    let mut player = Player::new(&config, frames, TerminalCanvas::stdout(), CrosstermGeometry)?;
    let (width, height) = player.grid_size();
    println!("Current terminal dimensions: {} x {}", width, height);

    let (handle, mut stop) = StopSignal::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });
    // Let the signal task register its handler before the first frame.
    tokio::task::yield_now().await;

    let summary = player.run(&mut stop).await?;
    debug!("Final state: {:?}", player.state());

    println!(
        "Playback finished. Total frames: {} in {}",
        summary.frames_presented,
        format_duration(summary.elapsed.as_secs_f64())
    );
    Ok(summary)
}
