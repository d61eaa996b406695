//! ATRAC9 super-frames decoded by libavcodec.
//!
//! Each super-frame goes to the decoder as one packet; the decoder answers
//! with planar float frames that are interleaved into s16le here.

use std::ptr;

use anyhow::{Context as _, anyhow, bail};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::{Sample, sample};
use ffmpeg::{codec, decoder, ffi, frame};

use crate::codec::{Atrac9Params, CodecConfig, CodecFactory, SuperFrameCodec};
use crate::error::{BgmError, Result};

/// Container version written into the decoder's extradata.
const EXTRADATA_VERSION: u32 = 1;

/// Factory for libavcodec-backed sessions.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibavDecoder;

impl CodecFactory for LibavDecoder {
    fn open(&self, config: CodecConfig) -> Result<Box<dyn SuperFrameCodec>> {
        let params = Atrac9Params::parse(config)?;
        let codec = LibavCodec::open(config, params).map_err(|e| {
            tracing::error!(?config, "libavcodec atrac9 open failed: {e:#}");
            BgmError::UnsupportedCodecConfig {
                config: config.word(),
                reason: "rejected by libavcodec",
            }
        })?;
        Ok(Box::new(codec))
    }
}

pub struct LibavCodec {
    decoder: decoder::Audio,
    params: Atrac9Params,
    frame: frame::Audio,
    consumed: usize,
}

impl LibavCodec {
    fn open(config: CodecConfig, params: Atrac9Params) -> anyhow::Result<Self> {
        ffmpeg::init().context("libav init")?;
        let codec = decoder::find_by_name("atrac9")
            .ok_or_else(|| anyhow!("libavcodec was built without atrac9"))?;
        let mut context = codec::Context::new_with_codec(codec);

        let extradata = extradata(config);
        // SAFETY: the context is exclusively ours and not opened yet; the
        // extradata buffer is allocated with av_mallocz so avcodec frees it.
        unsafe {
            let raw = context.as_mut_ptr();
            let padded = extradata.len() + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
            let buf = ffi::av_mallocz(padded) as *mut u8;
            if buf.is_null() {
                bail!("extradata allocation failed");
            }
            ptr::copy_nonoverlapping(extradata.as_ptr(), buf, extradata.len());
            (*raw).extradata = buf;
            (*raw).extradata_size = extradata.len() as i32;
            (*raw).block_align = params.superframe_bytes() as i32;
            (*raw).sample_rate = params.sample_rate() as i32;
        }

        let decoder = context.decoder().audio().context("open atrac9 decoder")?;
        tracing::debug!(
            rate_hz = params.sample_rate(),
            channels = params.channels(),
            block_align = params.superframe_bytes(),
            "libav atrac9 decoder opened"
        );
        Ok(Self {
            decoder,
            params,
            frame: frame::Audio::empty(),
            consumed: 0,
        })
    }

    fn copy_frame(&self, offset: usize, pcm: &mut [u8]) -> anyhow::Result<usize> {
        let format = self.frame.format();
        if format != Sample::F32(sample::Type::Planar) {
            bail!("unexpected decoder output {format:?}");
        }
        let channels = self.params.channels();
        let frames = self.frame.samples();
        let planes: Vec<&[f32]> = (0..channels).map(|ch| self.frame.plane::<f32>(ch)).collect();
        interleave_planar(&planes, frames, offset, pcm)
            .ok_or_else(|| anyhow!("decoded frame does not fit the output buffer"))
    }
}

impl SuperFrameCodec for LibavCodec {
    fn super_frame_size(&self) -> usize {
        self.params.superframe_bytes()
    }

    fn samples_per_frame(&self) -> usize {
        self.params.superframe_samples()
    }

    fn channels(&self) -> usize {
        self.params.channels()
    }

    fn feed(&mut self, data: &[u8]) -> anyhow::Result<()> {
        let packet = ffmpeg::Packet::copy(data);
        self.decoder.send_packet(&packet).context("send_packet")?;
        self.consumed = data.len().min(self.params.superframe_bytes());
        Ok(())
    }

    fn drain(&mut self, pcm: &mut [u8]) -> anyhow::Result<usize> {
        let mut written = 0;
        loop {
            match self.decoder.receive_frame(&mut self.frame) {
                Ok(()) => written += self.copy_frame(written, pcm)?,
                Err(ffmpeg::Error::Other {
                    errno: ffmpeg::error::EAGAIN,
                }) => break,
                Err(e) => return Err(e).context("receive_frame"),
            }
        }
        Ok(written)
    }

    fn consumed_bytes(&self) -> usize {
        self.consumed
    }
}

/// Decoder extradata: version, configuration word, reserved.
fn extradata(config: CodecConfig) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[..4].copy_from_slice(&EXTRADATA_VERSION.to_le_bytes());
    out[4..8].copy_from_slice(&config.to_bytes());
    out
}

/// Write `frames` frames from per-channel float planes as interleaved s16le,
/// starting `offset` frames into `pcm`. `None` if they do not fit.
fn interleave_planar(planes: &[&[f32]], frames: usize, offset: usize, pcm: &mut [u8]) -> Option<usize> {
    let channels = planes.len();
    let end = offset.checked_add(frames)?.checked_mul(channels)?.checked_mul(2)?;
    if end > pcm.len() || planes.iter().any(|p| p.len() < frames) {
        return None;
    }
    for (ch, plane) in planes.iter().enumerate() {
        for (i, &v) in plane[..frames].iter().enumerate() {
            let s = (v.clamp(-1.0, 1.0) * 32_767.0) as i16;
            let at = ((offset + i) * channels + ch) * 2;
            pcm[at..at + 2].copy_from_slice(&s.to_le_bytes());
        }
    }
    Some(frames)
}
