use serde::Deserialize;

use crate::output::OUTPUT_CHANNELS;

/// Output and decode tuning for the BGM player.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BgmConfig {
    /// Output sample rate in Hz. Decoded tracks are not resampled.
    pub sample_rate: u32,
    /// Requested callback buffer size in frames.
    pub buffer_frames: u32,
    /// Upper bound on the encoded bytes fed to the codec per iteration.
    pub max_super_frame_bytes: usize,
    /// Name given to the audio service context.
    pub context_name: String,
    /// Name given to the output stream.
    pub stream_name: String,
    /// Optional output device, matched by case-insensitive substring.
    pub device: Option<String>,
    /// Volume applied at init, 0..=100.
    pub initial_volume: u8,
}

impl Default for BgmConfig {
    /// s16le stereo at 48 kHz, matching what theme assets decode to.
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            buffer_frames: 4096,
            max_super_frame_bytes: 1024,
            context_name: "Player BGM".to_string(),
            stream_name: "Stream BGM".to_string(),
            device: None,
            initial_volume: 100,
        }
    }
}

impl BgmConfig {
    /// Parameters handed to the audio backend when opening the output stream.
    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            name: self.stream_name.clone(),
            sample_rate: self.sample_rate,
            channels: OUTPUT_CHANNELS as u16,
            buffer_frames: self.buffer_frames,
        }
    }
}

/// Output stream shape. Samples are always 16-bit signed little-endian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamParams {
    pub name: String,
    pub sample_rate: u32,
    /// Always [`OUTPUT_CHANNELS`]; the driver renders interleaved stereo.
    pub channels: u16,
    pub buffer_frames: u32,
}
