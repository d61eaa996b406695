//! Command implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use theme_bgm::asset::{self, AssetSource, VfsAssetSource};
use theme_bgm::backend::CpalBackend;
use theme_bgm::codec::{Atrac9Params, CodecFactory, NoDecoder};
use theme_bgm::container::EncodedAsset;
use theme_bgm::controller::LoadedTrack;
use theme_bgm::{BgmController, device};

use crate::config::{AssetTarget, PlayConfig, ToneConfig};

/// Print output device names to stdout.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    for (i, name) in device::output_device_names(&host)?.iter().enumerate() {
        println!("#{i}: {name}");
    }
    Ok(())
}

/// Print what the pipeline would see when loading an asset.
pub fn run_inspect(target: AssetTarget) -> Result<()> {
    let (label, bytes) = match target {
        AssetTarget::File(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            (path.display().to_string(), bytes)
        }
        AssetTarget::Theme {
            pref_path,
            theme,
            bgm_file,
        } => {
            let (device, path) = asset::theme_bgm_path(&theme, bgm_file.as_deref());
            let source = VfsAssetSource::new(pref_path);
            let bytes = source.read(device, &path)?;
            (format!("{device}:{path}"), bytes)
        }
    };

    let asset = EncodedAsset::parse(bytes)?;
    for line in describe(&label, &asset) {
        println!("{line}");
    }
    Ok(())
}

fn describe(label: &str, asset: &EncodedAsset) -> Vec<String> {
    let h = asset.header();
    let mut lines = vec![
        format!("asset:          {label}"),
        format!("size:           {} bytes", asset.len()),
        format!("magic:          {}", h.magic_str()),
        format!("format code:    {:#06x}", h.format_code),
        format!("channels:       {}", h.channels),
        format!("sample rate:    {} Hz", h.sample_rate),
        format!("codec id:       {}", h.codec_guid()),
        format!("codec config:   {:?}", h.codec_config),
        format!("payload:        {} bytes at offset {}", asset.payload_size(), asset.payload_offset()),
    ];
    match Atrac9Params::parse(h.codec_config) {
        Ok(p) => {
            lines.push(format!(
                "super-frame:    {} bytes, {} frames x {} samples, {} ch @ {} Hz",
                p.superframe_bytes(),
                p.frames_per_superframe(),
                p.frame_samples(),
                p.channels(),
                p.sample_rate()
            ));
            let sf = p.superframe_bytes().max(1);
            lines.push(format!(
                "super-frames:   ~{}",
                asset.payload_size().div_ceil(sf)
            ));
        }
        Err(e) => lines.push(format!("codec:          {e}")),
    }
    lines
}

/// Decoders available in this build.
fn codecs() -> Arc<dyn CodecFactory> {
    #[cfg(feature = "ffmpeg")]
    {
        Arc::new(theme_bgm::libav::LibavDecoder)
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Arc::new(NoDecoder)
    }
}

fn load_target(player: &BgmController, target: AssetTarget) -> Result<LoadedTrack> {
    let loaded = match target {
        AssetTarget::File(path) => {
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            player.load(bytes)?
        }
        AssetTarget::Theme {
            pref_path,
            theme,
            bgm_file,
        } => {
            let source = VfsAssetSource::new(pref_path);
            player.load_theme(&source, &theme, bgm_file.as_deref())?
        }
    };
    Ok(loaded)
}

/// Decode an asset and loop it until `shutdown` fires or the timeout elapses.
pub fn run_play(config: PlayConfig, shutdown: Receiver<()>) -> Result<()> {
    let backend = CpalBackend::new(config.bgm.device.clone());
    let mut player = BgmController::new(config.bgm, backend, codecs());

    player.init(config.volume).context("open bgm output")?;
    let loaded = load_target(&player, config.target).context("load bgm")?;
    player.start();
    tracing::info!(
        frames = loaded.frames,
        super_frames = loaded.super_frames,
        volume = player.volume(),
        "bgm playing"
    );

    wait(&shutdown, (config.seconds > 0).then(|| Duration::from_secs(config.seconds)));
    player.stop();
    Ok(())
}

/// Loop a sine tone through the player until `shutdown` fires or the timeout
/// elapses.
pub fn run_tone(config: ToneConfig, shutdown: Receiver<()>) -> Result<()> {
    let backend = CpalBackend::new(config.bgm.device.clone());
    let pcm = sine_pcm(config.bgm.sample_rate, config.frequency);
    // Tone PCM is installed directly; nothing is decoded.
    let mut player = BgmController::new(config.bgm, backend, Arc::new(NoDecoder));

    player.init(config.volume).context("open bgm output")?;
    player.loader().install_pcm(pcm);
    player.start();
    tracing::info!(frequency = config.frequency, volume = player.volume(), "tone playing");

    let total = (config.seconds > 0).then(|| Duration::from_secs(config.seconds));
    if config.pause_midway {
        let half = total.map(|t| t / 2).unwrap_or(Duration::from_secs(2));
        if wait(&shutdown, Some(half)) {
            player.set_paused(true);
            tracing::info!("paused");
            std::thread::sleep(Duration::from_secs(1));
            player.set_paused(false);
            tracing::info!("resumed");
            wait(&shutdown, total.map(|t| t - half));
        }
    } else {
        wait(&shutdown, total);
    }

    player.stop();
    Ok(())
}

/// Block for `timeout` (forever when `None`). Returns `false` if interrupted.
fn wait(shutdown: &Receiver<()>, timeout: Option<Duration>) -> bool {
    match timeout {
        Some(t) => matches!(shutdown.recv_timeout(t), Err(RecvTimeoutError::Timeout)),
        None => {
            let _ = shutdown.recv();
            false
        }
    }
}

/// One second of a stereo s16le sine at `frequency` Hz. Whole-Hz tones loop
/// without a seam.
fn sine_pcm(sample_rate: u32, frequency: u32) -> Vec<u8> {
    let frames = sample_rate as usize;
    let mut out = Vec::with_capacity(frames * 4);
    for i in 0..frames {
        let phase = 2.0 * std::f32::consts::PI * frequency as f32 * i as f32 / sample_rate as f32;
        let sample = (phase.sin() * 0.25 * f32::from(i16::MAX)) as i16;
        let bytes = sample.to_le_bytes();
        out.extend_from_slice(&bytes);
        out.extend_from_slice(&bytes);
    }
    out
}
