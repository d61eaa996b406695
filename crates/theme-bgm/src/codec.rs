//! Super-frame codec seam.
//!
//! The bitstream decoder is supplied by the host through [`CodecFactory`]. This
//! module owns the parts the pipeline depends on: the configuration word from
//! the container header and the constants derived from it.

use std::fmt;

use crate::error::{BgmError, Result};

/// 4-byte codec configuration word, kept in file byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecConfig(u32);

impl CodecConfig {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Value as read little-endian from the header.
    pub fn word(self) -> u32 {
        self.0
    }

    fn bitstream(self) -> u32 {
        u32::from_be_bytes(self.to_bytes())
    }
}

impl fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.to_bytes();
        write!(f, "CodecConfig({a:02x} {b:02x} {c:02x} {d:02x})")
    }
}

const CONFIG_SYNC: u32 = 0xFE;

const SAMPLE_RATES: [u32; 16] = [
    11_025, 12_000, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 44_100, 48_000, 64_000,
    88_200, 96_000, 128_000, 176_400, 192_000,
];

const FRAME_SAMPLES_POWER: [u32; 16] = [6, 6, 7, 7, 7, 8, 8, 8, 6, 6, 7, 7, 7, 8, 8, 8];

/// Output channels per channel-configuration index.
const CONFIG_CHANNELS: [usize; 6] = [1, 2, 2, 6, 8, 4];

/// Stream constants carried by an ATRAC9 configuration word.
///
/// Layout, most significant bit first: 8-bit sync (`0xFE`), 4-bit sample-rate
/// index, 3-bit channel config, 1 reserved bit (zero), 11-bit frame bytes
/// minus one, 2-bit super-frame index, 3 unused bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Atrac9Params {
    pub sample_rate_index: usize,
    pub channel_config_index: usize,
    pub frame_bytes: usize,
    pub superframe_index: u32,
}

impl Atrac9Params {
    pub fn parse(config: CodecConfig) -> Result<Self> {
        let bits = config.bitstream();
        let unsupported = |reason| BgmError::UnsupportedCodecConfig {
            config: config.word(),
            reason,
        };

        if bits >> 24 != CONFIG_SYNC {
            return Err(unsupported("missing sync byte"));
        }
        let sample_rate_index = ((bits >> 20) & 0xF) as usize;
        let channel_config_index = ((bits >> 17) & 0x7) as usize;
        if channel_config_index >= CONFIG_CHANNELS.len() {
            return Err(unsupported("unknown channel configuration"));
        }
        if (bits >> 16) & 1 != 0 {
            return Err(unsupported("reserved bit set"));
        }
        let frame_bytes = ((bits >> 5) & 0x7FF) as usize + 1;
        let superframe_index = (bits >> 3) & 0x3;
        if superframe_index == 3 {
            return Err(unsupported("invalid super-frame index"));
        }

        Ok(Self {
            sample_rate_index,
            channel_config_index,
            frame_bytes,
            superframe_index,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sample_rate_index]
    }

    pub fn channels(&self) -> usize {
        CONFIG_CHANNELS[self.channel_config_index]
    }

    pub fn frame_samples(&self) -> usize {
        1 << FRAME_SAMPLES_POWER[self.sample_rate_index]
    }

    pub fn frames_per_superframe(&self) -> usize {
        1 << self.superframe_index
    }

    /// Encoded size of one super-frame.
    pub fn superframe_bytes(&self) -> usize {
        self.frame_bytes << self.superframe_index
    }

    /// PCM samples per channel produced by one super-frame.
    pub fn superframe_samples(&self) -> usize {
        self.frame_samples() * self.frames_per_superframe()
    }
}

/// A stateful decoder bound to one configuration.
///
/// Each iteration feeds at most one super-frame of encoded bytes, then drains
/// the PCM it produced. The codec decides how many of the fed bytes the
/// super-frame occupied.
pub trait SuperFrameCodec: Send {
    /// Nominal encoded size of a super-frame in bytes.
    fn super_frame_size(&self) -> usize;

    /// PCM samples per channel a super-frame can produce.
    fn samples_per_frame(&self) -> usize;

    fn channels(&self) -> usize;

    /// Submit encoded bytes for the next super-frame.
    fn feed(&mut self, data: &[u8]) -> anyhow::Result<()>;

    /// Write interleaved s16le PCM into `pcm` and return the number of samples
    /// per channel written.
    fn drain(&mut self, pcm: &mut [u8]) -> anyhow::Result<usize>;

    /// Encoded bytes the last fed super-frame actually used.
    fn consumed_bytes(&self) -> usize;
}

/// Creates decoder sessions for configuration words read from containers.
pub trait CodecFactory: Send + Sync {
    /// Fails with [`BgmError::UnsupportedCodecConfig`] when the word is not
    /// something this codec can decode.
    fn open(&self, config: CodecConfig) -> Result<Box<dyn SuperFrameCodec>>;
}

/// Factory for hosts that ship no bitstream decoder.
///
/// Still validates the configuration word, so malformed assets are reported
/// as such, but refuses to open a session for well-formed ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDecoder;

impl CodecFactory for NoDecoder {
    fn open(&self, config: CodecConfig) -> Result<Box<dyn SuperFrameCodec>> {
        Atrac9Params::parse(config)?;
        Err(BgmError::UnsupportedCodecConfig {
            config: config.word(),
            reason: "no decoder available",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stereo_48k_config() {
        // 48 kHz, stereo, 256-byte frames, 4 frames per super-frame.
        let params = Atrac9Params::parse(CodecConfig::from_bytes([0xFE, 0x74, 0x1F, 0xF0])).unwrap();
        assert_eq!(params.sample_rate(), 48_000);
        assert_eq!(params.channels(), 2);
        assert_eq!(params.frame_bytes, 256);
        assert_eq!(params.frames_per_superframe(), 4);
        assert_eq!(params.superframe_bytes(), 1024);
        assert_eq!(params.frame_samples(), 256);
        assert_eq!(params.superframe_samples(), 1024);
    }

    #[test]
    fn parses_mono_config() {
        let params = Atrac9Params::parse(CodecConfig::from_bytes([0xFE, 0x50, 0x0B, 0xE0])).unwrap();
        assert_eq!(params.sample_rate(), 32_000);
        assert_eq!(params.channels(), 1);
        assert_eq!(params.frame_bytes, 96);
        assert_eq!(params.superframe_bytes(), 96);
    }

    #[test]
    fn rejects_bad_sync() {
        let err = Atrac9Params::parse(CodecConfig::from_bytes([0x00, 0x74, 0x1F, 0xF0])).unwrap_err();
        assert!(matches!(err, BgmError::UnsupportedCodecConfig { reason: "missing sync byte", .. }));
    }

    #[test]
    fn rejects_unknown_channel_config() {
        // channel config index 6
        let err = Atrac9Params::parse(CodecConfig::from_bytes([0xFE, 0x7C, 0x1F, 0xF0])).unwrap_err();
        assert!(matches!(err, BgmError::UnsupportedCodecConfig { .. }));
    }

    #[test]
    fn rejects_reserved_bit_and_bad_superframe_index() {
        assert!(Atrac9Params::parse(CodecConfig::from_bytes([0xFE, 0x75, 0x1F, 0xF0])).is_err());
        assert!(Atrac9Params::parse(CodecConfig::from_bytes([0xFE, 0x74, 0x1F, 0xF8])).is_err());
    }

    #[test]
    fn no_decoder_refuses_valid_configs() {
        let err = NoDecoder
            .open(CodecConfig::from_bytes([0xFE, 0x74, 0x1F, 0xF0]))
            .err()
            .unwrap();
        assert!(matches!(err, BgmError::UnsupportedCodecConfig { reason: "no decoder available", .. }));
        let err = NoDecoder.open(CodecConfig::from_bytes([0; 4])).err().unwrap();
        assert!(matches!(err, BgmError::UnsupportedCodecConfig { reason: "missing sync byte", .. }));
    }

    #[test]
    fn config_keeps_file_byte_order() {
        let config = CodecConfig::from_bytes([0xFE, 0x74, 0x1F, 0xF0]);
        assert_eq!(config.word(), 0xF01F_74FE);
        assert_eq!(config.to_bytes(), [0xFE, 0x74, 0x1F, 0xF0]);
        assert_eq!(format!("{config:?}"), "CodecConfig(fe 74 1f f0)");
    }
}
