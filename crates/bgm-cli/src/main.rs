//! BGM CLI: exercises the theme background-music player from the command line.
//!
//! - `devices`: list output devices.
//! - `inspect`: print the container header and codec parameters of an asset.
//! - `play`: decode a theme's BGM and loop it until Ctrl-C (needs the `ffmpeg`
//!   feature for ATRAC9).
//! - `tone`: loop a synthesized tone through the player until Ctrl-C.

use anyhow::Result;
use bgm_cli::cli::{Args, Command};
use bgm_cli::config::{AssetTarget, PlayConfig, ToneConfig, load_bgm_config};
use bgm_cli::runtime;
use clap::Parser;
use crossbeam_channel::Receiver;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,theme_bgm=info,bgm_cli=info")
        }))
        .init();

    let mut bgm = load_bgm_config(args.config.as_deref())?;
    if args.device.is_some() {
        bgm.device = args.device.clone();
    }

    match args.cmd {
        Command::Devices => runtime::list_devices(),
        Command::Inspect { asset } => runtime::run_inspect(AssetTarget::from_args(asset)?),
        Command::Play {
            asset,
            volume,
            seconds,
        } => {
            let target = AssetTarget::from_args(asset)?;
            let volume = volume.unwrap_or(bgm.initial_volume);
            runtime::run_play(
                PlayConfig {
                    bgm,
                    target,
                    volume,
                    seconds,
                },
                shutdown_signal()?,
            )
        }
        Command::Tone {
            volume,
            frequency,
            seconds,
            pause_midway,
        } => {
            let volume = volume.unwrap_or(bgm.initial_volume);
            runtime::run_tone(
                ToneConfig {
                    bgm,
                    volume,
                    frequency,
                    seconds,
                    pause_midway,
                },
                shutdown_signal()?,
            )
        }
    }
}

/// Fires once on Ctrl-C.
fn shutdown_signal() -> Result<Receiver<()>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    Ok(rx)
}
