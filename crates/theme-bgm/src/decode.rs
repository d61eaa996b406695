//! Super-frame decode loop.
//!
//! Walks the encoded payload one super-frame at a time and accumulates the
//! interleaved s16le PCM. The whole track decodes or nothing is returned; the
//! caller only installs a complete result.

use crate::codec::CodecFactory;
use crate::container::EncodedAsset;
use crate::error::{BgmError, Result};

/// Fully decoded track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedTrack {
    /// Interleaved s16le samples.
    pub pcm: Vec<u8>,
    pub channels: usize,
    /// Feed/drain cycles performed.
    pub super_frames: usize,
    /// Encoded payload bytes the codec reported as used.
    pub bytes_consumed: usize,
}

impl DecodedTrack {
    /// Frames (one sample per channel) in the decoded PCM.
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.pcm.len() / (self.channels * 2)
    }
}

/// Decode the payload of `asset` with a session opened from its header.
///
/// `max_super_frame_bytes` caps the chunk handed to the codec per iteration,
/// whatever super-frame size the codec reports.
pub fn decode_asset(
    asset: &EncodedAsset,
    codecs: &dyn CodecFactory,
    max_super_frame_bytes: usize,
) -> Result<DecodedTrack> {
    let mut codec = codecs.open(asset.codec_config())?;

    let super_frame_size = codec.super_frame_size().min(max_super_frame_bytes);
    let channels = codec.channels();
    let frame_pcm_bytes = pcm_bytes(codec.samples_per_frame(), channels).unwrap_or(0);
    if super_frame_size == 0 || frame_pcm_bytes == 0 {
        return Err(BgmError::UnsupportedCodecConfig {
            config: asset.codec_config().word(),
            reason: "codec reports an empty or oversized frame",
        });
    }

    let payload = asset.payload();
    let payload_size = payload.len();
    tracing::debug!(
        payload_size,
        super_frame_size,
        channels,
        frame_pcm_bytes,
        "decoding track"
    );

    let mut scratch = vec![0u8; frame_pcm_bytes];
    let mut pcm = Vec::new();
    let mut consumed = 0usize;
    let mut super_frames = 0usize;

    while consumed < payload_size {
        let chunk = super_frame_size.min(payload_size - consumed);
        let failure = BgmError::DecodeFailure {
            offset: consumed,
            bytes_attempted: chunk,
        };

        if let Err(e) = codec.feed(&payload[consumed..consumed + chunk]) {
            tracing::error!(offset = consumed, bytes = chunk, "feed failed: {e:#}");
            return Err(failure);
        }
        let samples = match codec.drain(&mut scratch) {
            Ok(samples) => samples,
            Err(e) => {
                tracing::error!(offset = consumed, bytes = chunk, "drain failed: {e:#}");
                return Err(failure);
            }
        };
        super_frames += 1;

        let produced = pcm_bytes(samples, channels).unwrap_or(usize::MAX);
        if produced > scratch.len() {
            tracing::error!(samples, capacity = scratch.len(), "codec overran frame buffer");
            return Err(failure);
        }
        pcm.extend_from_slice(&scratch[..produced]);

        let used = codec.consumed_bytes().min(super_frame_size);
        if used == 0 {
            tracing::error!(offset = consumed, "codec consumed no input");
            return Err(failure);
        }
        consumed += used;
    }

    if pcm.is_empty() {
        tracing::error!(payload_size, "decoded PCM is empty");
        return Err(BgmError::DecodeFailure {
            offset: consumed,
            bytes_attempted: 0,
        });
    }

    Ok(DecodedTrack {
        pcm,
        channels,
        super_frames,
        bytes_consumed: consumed,
    })
}

/// Interleaved s16 byte count, `None` on overflow.
fn pcm_bytes(samples: usize, channels: usize) -> Option<usize> {
    samples.checked_mul(channels)?.checked_mul(2)
}
