//! Real-time output driver.
//!
//! Invoked by the audio service on its own thread for a fixed number of
//! frames. The work per call is one lock, one bounded copy, and a zero fill:
//! no allocation, no waiting.

use std::sync::Arc;

use crate::backend::{RenderSource, StreamState};
use crate::pcm::SharedPlayback;

/// Output channels the driver renders; tracks are stored as stereo.
pub const OUTPUT_CHANNELS: usize = 2;

const BYTES_PER_SAMPLE: usize = 2;

/// Pulls looping PCM from the shared playback buffer.
#[derive(Debug, Clone)]
pub struct BgmDriver {
    shared: Arc<SharedPlayback>,
}

impl BgmDriver {
    pub fn new(shared: Arc<SharedPlayback>) -> Self {
        Self { shared }
    }

    /// Fill `out` with `frames` frames of s16le stereo.
    ///
    /// Audio that runs out before the end of `out` is followed by silence
    /// rather than looping mid-call. Always reports `frames`.
    pub fn fill_bytes(&self, frames: usize, out: &mut [u8]) -> usize {
        let bytes_needed = (frames * OUTPUT_CHANNELS * BYTES_PER_SAMPLE).min(out.len());
        let mut inner = self.shared.lock();
        inner.buffer.read_bytes(&mut out[..bytes_needed]);
        frames
    }
}

impl RenderSource for BgmDriver {
    fn render(&self, out: &mut [i16]) -> usize {
        let frames = out.len() / OUTPUT_CHANNELS;
        let mut inner = self.shared.lock();
        inner.buffer.read_samples(&mut out[..frames * OUTPUT_CHANNELS]);
        frames
    }

    fn on_state(&self, state: StreamState) {
        match state {
            StreamState::Error => tracing::error!("bgm playback error"),
            StreamState::Started | StreamState::Stopped => {
                tracing::debug!(?state, "bgm stream state")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver_with(pcm: Vec<u8>) -> BgmDriver {
        let shared = Arc::new(SharedPlayback::new());
        shared.install(pcm);
        BgmDriver::new(shared)
    }

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 200 + 1) as u8).collect()
    }

    #[test]
    fn request_longer_than_track_pads_with_silence() {
        let len = 40;
        let driver = driver_with(ramp(len));
        let frames = 16; // 64 bytes
        let mut out = vec![0xAAu8; frames * 4];

        assert_eq!(driver.fill_bytes(frames, &mut out), frames);
        assert_eq!(out[..len], ramp(len)[..]);
        assert!(out[len..].iter().all(|&b| b == 0));
        assert_eq!(driver.shared.lock().buffer.position(), len);
    }

    #[test]
    fn cursor_wraps_across_calls() {
        let driver = driver_with(ramp(24));
        let mut out = vec![0u8; 16];

        driver.fill_bytes(4, &mut out);
        assert_eq!(driver.shared.lock().buffer.position(), 16);
        driver.fill_bytes(4, &mut out);
        assert_eq!(out[..8], ramp(24)[16..]);
        assert_eq!(driver.shared.lock().buffer.position(), 24);
        driver.fill_bytes(4, &mut out);
        assert_eq!(out[..], ramp(24)[..16]);
        assert_eq!(driver.shared.lock().buffer.position(), 16);
    }

    #[test]
    fn render_reports_requested_frames_with_no_track() {
        let driver = BgmDriver::new(Arc::new(SharedPlayback::new()));
        let mut out = [3i16; 512];
        assert_eq!(driver.render(&mut out), 256);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn render_matches_byte_path() {
        let pcm = ramp(64);
        let by_bytes = driver_with(pcm.clone());
        let by_samples = driver_with(pcm);

        let mut bytes = [0u8; 48];
        let mut samples = [0i16; 24];
        by_bytes.fill_bytes(12, &mut bytes);
        by_samples.render(&mut samples);

        let expected: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples.to_vec(), expected);
    }
}
