//! waveplay - audio waveform viewer with synchronized playback
//!
//! Loads an audio file (HTTP URL or local path), draws its waveform and keeps
//! a playhead in step with playback. Without audio, or when a track fails to
//! load, an animated demo waveform is shown instead.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use waveplay::{app, config};

#[derive(Debug, Parser)]
#[command(name = "waveplay", version, about = "Audio waveform viewer and player")]
struct Cli {
    /// Audio URL or file path to load at startup
    url: Option<String>,

    /// Config file (default: ~/.config/waveplay/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backing pixels per logical pixel for the waveform surface (default: display scale)
    #[arg(long)]
    scale_factor: Option<f32>,
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    log::info!("waveplay starting up");

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let mut config = config::load_config(&config_path);
    if let Some(scale) = cli.scale_factor {
        config.surface.device_pixel_ratio = Some(scale);
    }

    app::run(config, cli.url)?;
    Ok(())
}
