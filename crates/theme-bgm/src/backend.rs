//! Audio service seam and its CPAL implementation.
//!
//! The controller talks to the platform through three layers: a backend that
//! opens a service context, the context that opens an output stream, and the
//! stream itself. The stream only ever holds a shared reference to the
//! [`RenderSource`] it pulls from.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::StreamParams;
use crate::device;

/// Stream state changes reported to the render source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Started,
    Stopped,
    Error,
}

/// Something that can produce interleaved s16 frames on demand.
///
/// `render` runs on the audio service's real-time thread.
pub trait RenderSource: Send + Sync + 'static {
    /// Fill `out` completely and return the number of frames it holds.
    fn render(&self, out: &mut [i16]) -> usize;

    fn on_state(&self, state: StreamState);
}

/// Entry point to an audio service.
pub trait AudioBackend: Send + Sync {
    fn open_context(&self, name: &str) -> Result<Box<dyn AudioContext>>;
}

/// An open audio service. Must outlive every stream it opened.
pub trait AudioContext: Send {
    fn open_output(
        &self,
        params: &StreamParams,
        source: Arc<dyn RenderSource>,
    ) -> Result<Box<dyn OutputStream>>;
}

/// A stream bound to a render source. Starting and stopping keeps the source
/// and its position; dropping the stream closes it.
pub trait OutputStream {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Linear gain, 0.0..=1.0.
    fn set_volume(&mut self, gain: f32) -> Result<()>;
}

/// CPAL output on the default host.
#[derive(Clone, Debug, Default)]
pub struct CpalBackend {
    /// Output device substring; the host default when unset.
    pub device: Option<String>,
}

impl CpalBackend {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl AudioBackend for CpalBackend {
    fn open_context(&self, name: &str) -> Result<Box<dyn AudioContext>> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, self.device.as_deref())?;
        let description = device
            .description()
            .map(|d| d.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        tracing::info!(context = name, host = ?host.id(), device = %description, "audio context opened");
        Ok(Box::new(CpalContext {
            name: name.to_string(),
            device,
        }))
    }
}

struct CpalContext {
    name: String,
    device: cpal::Device,
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        tracing::debug!(context = %self.name, "audio context released");
    }
}

impl AudioContext for CpalContext {
    fn open_output(
        &self,
        params: &StreamParams,
        source: Arc<dyn RenderSource>,
    ) -> Result<Box<dyn OutputStream>> {
        let default = self.device.default_output_config()?;
        let sample_format = default.sample_format();
        let mut config = cpal::StreamConfig {
            channels: params.channels,
            sample_rate: params.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        if let cpal::SupportedBufferSize::Range { min, max } = default.buffer_size() {
            config.buffer_size = cpal::BufferSize::Fixed(params.buffer_frames.max(*min).min(*max));
        }

        let gain = Arc::new(AtomicU32::new(1.0f32.to_bits()));
        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &config, params, &source, &gain),
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &config, params, &source, &gain),
            cpal::SampleFormat::I32 => build_stream::<i32>(&self.device, &config, params, &source, &gain),
            cpal::SampleFormat::U16 => build_stream::<u16>(&self.device, &config, params, &source, &gain),
            other => Err(anyhow!("Unsupported sample format: {other:?}")),
        }?;
        // CPAL streams may start running as soon as they are built.
        stream.pause()?;

        tracing::info!(
            stream = %params.name,
            rate_hz = params.sample_rate,
            channels = params.channels,
            buffer = ?config.buffer_size,
            format = ?sample_format,
            "output stream opened"
        );
        Ok(Box::new(CpalStream {
            stream,
            source,
            gain,
        }))
    }
}

/// Build a stream for the device's native sample type.
///
/// The callback renders into a scratch buffer sized here from the negotiated
/// buffer, then converts and scales into `data`.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: &StreamParams,
    source: &Arc<dyn RenderSource>,
    gain: &Arc<AtomicU32>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = usize::from(params.channels.max(1));
    let scratch_frames = match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => frames as usize,
        cpal::BufferSize::Default => (params.buffer_frames as usize).max(1024),
    };
    let mut scratch = vec![0i16; scratch_frames * channels];

    let source_cb = source.clone();
    let gain_cb = gain.clone();
    let source_err = source.clone();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let gain = f32::from_bits(gain_cb.load(Ordering::Relaxed));
            fill_output(source_cb.as_ref(), &mut scratch, data, gain);
        },
        move |err| {
            tracing::warn!("stream error: {err}");
            source_err.on_state(StreamState::Error);
        },
        None,
    )?;
    Ok(stream)
}

/// Render one callback's worth of audio with a single `render` call, so a
/// short track never wraps mid-callback.
///
/// `scratch` only grows when the host hands over more than was negotiated.
fn fill_output<T>(source: &dyn RenderSource, scratch: &mut Vec<i16>, data: &mut [T], gain: f32)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    if scratch.len() < data.len() {
        scratch.resize(data.len(), 0);
    }
    let rendered = &mut scratch[..data.len()];
    source.render(rendered);
    for (dst, &s) in data.iter_mut().zip(rendered.iter()) {
        let v = f32::from(s) / 32_768.0 * gain;
        *dst = <T as cpal::Sample>::from_sample::<f32>(v);
    }
}

struct CpalStream {
    stream: cpal::Stream,
    source: Arc<dyn RenderSource>,
    gain: Arc<AtomicU32>,
}

impl OutputStream for CpalStream {
    fn start(&mut self) -> Result<()> {
        self.stream.play()?;
        self.source.on_state(StreamState::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stream.pause()?;
        self.source.on_state(StreamState::Stopped);
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) -> Result<()> {
        self.gain.store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        Ok(())
    }
}
