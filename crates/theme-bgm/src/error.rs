//! Error taxonomy for the BGM pipeline.
//!
//! None of these are fatal to the host application: a failed load leaves the
//! player silent and a failed init turns the whole feature into a no-op.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BgmError {
    /// The asset source has nothing at the requested location.
    #[error("asset not found: {device}:{path}")]
    NotFound { device: String, path: String },

    /// The buffer is too short to hold the container header.
    #[error("malformed asset: {len} bytes, header needs {needed}")]
    MalformedAsset { len: usize, needed: usize },

    /// The codec refused the configuration word from the header.
    #[error("unsupported codec config {config:#010x}: {reason}")]
    UnsupportedCodecConfig { config: u32, reason: &'static str },

    /// Feeding or draining failed mid-stream, or the payload produced no PCM.
    #[error("decode failed at payload offset {offset} after sending {bytes_attempted} bytes")]
    DecodeFailure { offset: usize, bytes_attempted: usize },

    /// The audio service or output stream could not be opened.
    #[error("audio init failed: {0}")]
    AudioInitFailure(String),
}

impl BgmError {
    pub(crate) fn audio_init(err: anyhow::Error) -> Self {
        Self::AudioInitFailure(format!("{err:#}"))
    }
}

pub type Result<T, E = BgmError> = std::result::Result<T, E>;
