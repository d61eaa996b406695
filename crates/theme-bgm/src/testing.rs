//! Fixtures shared by unit tests: container builder, a deterministic codec, and
//! a recording audio backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{AudioBackend, AudioContext, OutputStream, RenderSource};
use crate::codec::{Atrac9Params, CodecConfig, CodecFactory, SuperFrameCodec};
use crate::config::StreamParams;
use crate::container::PAYLOAD_OFFSET;
use crate::error::Result;

pub(crate) const AT9_GUID: [u8; 16] = [
    0xD2, 0x42, 0xE1, 0x47, 0xBA, 0x36, 0x8D, 0x4D, 0x88, 0xFC, 0x61, 0x65, 0x4F, 0x8C, 0x83, 0x6C,
];

/// 48 kHz stereo, 256-byte frames, one frame per super-frame.
pub(crate) const STEREO_256: [u8; 4] = [0xFE, 0x74, 0x1F, 0xE0];

/// 48 kHz stereo, 256-byte frames, four frames per super-frame.
pub(crate) const STEREO_1024: [u8; 4] = [0xFE, 0x74, 0x1F, 0xF0];

/// Build a container: header, zero padding with a `data` chunk tag, payload.
pub(crate) fn build_asset(config: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let total = PAYLOAD_OFFSET + payload.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((total - 8) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&52u32.to_le_bytes());
    out.extend_from_slice(&0xFFFEu16.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&48_000u32.to_le_bytes());
    out.extend_from_slice(&48_000u32.to_le_bytes());
    out.extend_from_slice(&256u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&34u16.to_le_bytes());
    out.extend_from_slice(&256u16.to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&AT9_GUID);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&config);
    out.resize(PAYLOAD_OFFSET - 8, 0);
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Ways the test codec can misbehave.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Behaviour {
    /// Reported super-frame size instead of the one derived from the config.
    pub super_frame_size: Option<usize>,
    /// Fail the n-th feed call (0-based).
    pub fail_feed_at: Option<usize>,
    /// Fail the n-th drain call (0-based).
    pub fail_drain_at: Option<usize>,
    /// Drain produces no samples.
    pub silent: bool,
    /// Report this many consumed bytes instead of the chunk length.
    pub consumed: Option<usize>,
    /// Report this many drained samples instead of a full super-frame.
    pub samples: Option<usize>,
}

#[derive(Default)]
pub(crate) struct CodecLog {
    pub feeds: AtomicUsize,
    pub drains: AtomicUsize,
    pub fed_bytes: AtomicUsize,
}

/// Decodes each fed byte into a short deterministic run of samples.
pub(crate) struct TestCodec {
    params: Atrac9Params,
    behaviour: Behaviour,
    log: Arc<CodecLog>,
    chunk: Vec<u8>,
    feeds: usize,
    drains: usize,
}

impl SuperFrameCodec for TestCodec {
    fn super_frame_size(&self) -> usize {
        self.behaviour
            .super_frame_size
            .unwrap_or_else(|| self.params.superframe_bytes())
    }

    fn samples_per_frame(&self) -> usize {
        self.params.superframe_samples()
    }

    fn channels(&self) -> usize {
        self.params.channels()
    }

    fn feed(&mut self, data: &[u8]) -> anyhow::Result<()> {
        let n = self.feeds;
        self.feeds += 1;
        self.log.feeds.fetch_add(1, Ordering::SeqCst);
        if self.behaviour.fail_feed_at == Some(n) {
            anyhow::bail!("corrupt super-frame");
        }
        self.log.fed_bytes.fetch_add(data.len(), Ordering::SeqCst);
        self.chunk.clear();
        self.chunk.extend_from_slice(data);
        Ok(())
    }

    fn drain(&mut self, pcm: &mut [u8]) -> anyhow::Result<usize> {
        let n = self.drains;
        self.drains += 1;
        self.log.drains.fetch_add(1, Ordering::SeqCst);
        if self.behaviour.fail_drain_at == Some(n) {
            anyhow::bail!("drain failed");
        }
        if self.behaviour.silent || self.chunk.is_empty() {
            return Ok(0);
        }
        for (i, out) in pcm.chunks_exact_mut(2).enumerate() {
            let byte = self.chunk[i % self.chunk.len()];
            let sample = (i16::from(byte) - 128) * 64 + (n as i16);
            out.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(self.behaviour.samples.unwrap_or(self.samples_per_frame()))
    }

    fn consumed_bytes(&self) -> usize {
        self.behaviour.consumed.unwrap_or(self.chunk.len())
    }
}

pub(crate) struct TestCodecFactory {
    pub behaviour: Behaviour,
    pub log: Arc<CodecLog>,
}

impl TestCodecFactory {
    pub fn new() -> Self {
        Self::with(Behaviour::default())
    }

    pub fn with(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            log: Arc::new(CodecLog::default()),
        }
    }
}

impl CodecFactory for TestCodecFactory {
    fn open(&self, config: CodecConfig) -> Result<Box<dyn SuperFrameCodec>> {
        let params = Atrac9Params::parse(config)?;
        Ok(Box::new(TestCodec {
            params,
            behaviour: self.behaviour,
            log: self.log.clone(),
            chunk: Vec::new(),
            feeds: 0,
            drains: 0,
        }))
    }
}

/// Everything the fake backend was asked to do, in order.
#[derive(Default)]
pub(crate) struct BackendLog {
    pub events: Mutex<Vec<String>>,
    pub source: Mutex<Option<Arc<dyn RenderSource>>>,
    pub gain: Mutex<Option<f32>>,
    pub params: Mutex<Option<StreamParams>>,
}

impl BackendLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

pub(crate) struct FakeBackend {
    pub log: Arc<BackendLog>,
    pub fail_context: bool,
    pub fail_stream: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            log: Arc::new(BackendLog::default()),
            fail_context: false,
            fail_stream: false,
        }
    }
}

impl AudioBackend for FakeBackend {
    fn open_context(&self, name: &str) -> anyhow::Result<Box<dyn AudioContext>> {
        if self.fail_context {
            anyhow::bail!("no audio service");
        }
        self.log.push(format!("context:{name}"));
        Ok(Box::new(FakeContext {
            log: self.log.clone(),
            fail_stream: self.fail_stream,
        }))
    }
}

struct FakeContext {
    log: Arc<BackendLog>,
    fail_stream: bool,
}

impl AudioContext for FakeContext {
    fn open_output(
        &self,
        params: &StreamParams,
        source: Arc<dyn RenderSource>,
    ) -> anyhow::Result<Box<dyn OutputStream>> {
        if self.fail_stream {
            anyhow::bail!("device busy");
        }
        self.log.push(format!("open:{}", params.name));
        *self.log.params.lock().unwrap() = Some(params.clone());
        *self.log.source.lock().unwrap() = Some(source);
        Ok(Box::new(FakeStream {
            log: self.log.clone(),
            running: AtomicBool::new(false),
        }))
    }
}

impl Drop for FakeContext {
    fn drop(&mut self) {
        self.log.push("context-drop");
    }
}

struct FakeStream {
    log: Arc<BackendLog>,
    running: AtomicBool,
}

impl OutputStream for FakeStream {
    fn start(&mut self) -> anyhow::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        self.log.push("start");
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.log.push("stop");
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) -> anyhow::Result<()> {
        *self.log.gain.lock().unwrap() = Some(gain);
        self.log.push(format!("volume:{gain}"));
        Ok(())
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.log.push("stream-drop");
    }
}
