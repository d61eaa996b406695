//! Playback controller.
//!
//! Owns the output stream, the audio service context, and the lifecycle
//! thread for one session, and drives the state machine:
//!
//! ```text
//! Uninitialized --init--> Ready --start--> Playing <--set_paused--> Paused
//!                                      \            \              /
//!                                       +----stop--> Stopping --> Stopped --init--> Ready
//! ```
//!
//! Loading a track never touches the stream: the decoded PCM replaces the
//! shared buffer and whatever stream is open keeps pulling from it.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::asset::{self, AssetSource, VfsDevice};
use crate::backend::{AudioBackend, AudioContext, OutputStream, RenderSource};
use crate::codec::CodecFactory;
use crate::config::BgmConfig;
use crate::container::EncodedAsset;
use crate::decode::decode_asset;
use crate::error::{BgmError, Result};
use crate::output::BgmDriver;
use crate::pcm::SharedPlayback;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Uninitialized,
    Ready,
    Playing,
    Paused,
    Stopping,
    Stopped,
}

/// Summary of a successfully installed track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadedTrack {
    pub frames: usize,
    pub super_frames: usize,
    pub bytes_consumed: usize,
}

/// Decodes assets and installs the result into the shared playback buffer.
///
/// Cheap to clone and `Send`, so decoding can run off the controller's thread.
/// Concurrent loads are not cancelled; the last one to install wins.
#[derive(Clone)]
pub struct TrackLoader {
    shared: Arc<SharedPlayback>,
    codecs: Arc<dyn CodecFactory>,
    max_super_frame_bytes: usize,
}

impl TrackLoader {
    /// Parse, decode, and install a complete asset.
    pub fn load(&self, bytes: Vec<u8>) -> Result<LoadedTrack> {
        let asset = EncodedAsset::parse(bytes)?;
        let track = decode_asset(&asset, self.codecs.as_ref(), self.max_super_frame_bytes)?;
        drop(asset);

        let loaded = LoadedTrack {
            frames: track.frames(),
            super_frames: track.super_frames,
            bytes_consumed: track.bytes_consumed,
        };
        self.shared.install(track.pcm);
        tracing::info!(
            frames = loaded.frames,
            super_frames = loaded.super_frames,
            "bgm track installed"
        );
        Ok(loaded)
    }

    /// Read an asset from `source` and load it.
    pub fn load_asset(
        &self,
        source: &dyn AssetSource,
        device: VfsDevice,
        path: &str,
    ) -> Result<LoadedTrack> {
        let bytes = source.read(device, path).inspect_err(|e| {
            if device.is_user_storage() {
                tracing::error!("theme bgm unreadable {device}:{path}: {e}");
            } else {
                tracing::debug!("system bgm unavailable {device}:{path}: {e}");
            }
        })?;
        self.load(bytes)
    }

    /// Decode on a worker thread.
    pub fn spawn_load(&self, bytes: Vec<u8>) -> JoinHandle<Result<LoadedTrack>> {
        let loader = self.clone();
        thread::spawn(move || loader.load(bytes))
    }

    /// Install already-decoded interleaved s16le stereo PCM.
    pub fn install_pcm(&self, pcm: Vec<u8>) {
        self.shared.install(pcm);
    }

    pub fn clear(&self) {
        self.shared.clear();
    }
}

type Lifecycle = JoinHandle<Option<Box<dyn AudioContext>>>;
type LifecycleBody = Box<dyn FnOnce() -> Option<Box<dyn AudioContext>> + Send>;
type SpawnLifecycle = fn(LifecycleBody) -> io::Result<Lifecycle>;

fn spawn_lifecycle(body: LifecycleBody) -> io::Result<Lifecycle> {
    thread::Builder::new()
        .name("bgm-lifecycle".to_string())
        .spawn(body)
}

/// Resources that exist between `init` and `stop`.
///
/// The lifecycle thread owns the audio context while the session is open and
/// returns it on join, so the context always outlives the stream.
struct Session {
    stream: Box<dyn OutputStream>,
    lifecycle: Lifecycle,
}

/// Background music player for one application session.
pub struct BgmController {
    config: BgmConfig,
    backend: Box<dyn AudioBackend>,
    loader: TrackLoader,
    driver: Arc<BgmDriver>,
    state: PlaybackState,
    session: Option<Session>,
    volume: u8,
    spawn_lifecycle: SpawnLifecycle,
}

impl BgmController {
    pub fn new(
        config: BgmConfig,
        backend: impl AudioBackend + 'static,
        codecs: Arc<dyn CodecFactory>,
    ) -> Self {
        let shared = Arc::new(SharedPlayback::new());
        let loader = TrackLoader {
            shared: shared.clone(),
            codecs,
            max_super_frame_bytes: config.max_super_frame_bytes,
        };
        Self {
            volume: config.initial_volume.min(100),
            config,
            backend: Box::new(backend),
            loader,
            driver: Arc::new(BgmDriver::new(shared)),
            state: PlaybackState::Uninitialized,
            session: None,
            spawn_lifecycle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Last volume applied to an open stream, 0..=100.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn loader(&self) -> TrackLoader {
        self.loader.clone()
    }

    /// Open the audio service and an output stream, then start the lifecycle
    /// thread. On failure the controller stays where it was and playback is
    /// simply unavailable.
    pub fn init(&mut self, volume: u8) -> Result<()> {
        match self.state {
            PlaybackState::Uninitialized | PlaybackState::Stopped => {}
            state => {
                tracing::warn!(?state, "bgm player already initialized");
                return Ok(());
            }
        }

        let context = self
            .backend
            .open_context(&self.config.context_name)
            .map_err(|e| {
                tracing::error!("audio context init failed: {e:#}");
                BgmError::audio_init(e)
            })?;

        let source: Arc<dyn RenderSource> = self.driver.clone();
        let stream = context
            .open_output(&self.config.stream_params(), source)
            .map_err(|e| {
                tracing::error!("output stream init failed: {e:#}");
                BgmError::audio_init(e)
            })?;

        // The context moves to the lifecycle thread only once it exists.
        let shared = self.loader.shared.clone();
        shared.reset_stop();
        let (handoff, incoming) = crossbeam_channel::bounded::<Box<dyn AudioContext>>(1);
        let spawned = (self.spawn_lifecycle)(Box::new(move || {
            let context = incoming.recv().ok()?;
            shared.wait_for_stop();
            tracing::debug!("bgm lifecycle woken");
            Some(context)
        }));
        let lifecycle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("bgm lifecycle spawn failed: {e}");
                drop(stream);
                drop(context);
                return Err(BgmError::AudioInitFailure(e.to_string()));
            }
        };
        if let Err(crossbeam_channel::SendError(context)) = handoff.send(context) {
            tracing::error!("bgm lifecycle exited before taking the context");
            drop(stream);
            drop(context);
            let _ = lifecycle.join();
            return Err(BgmError::AudioInitFailure(
                "lifecycle thread exited early".to_string(),
            ));
        }

        self.session = Some(Session { stream, lifecycle });
        self.state = PlaybackState::Ready;
        self.set_volume(volume);
        tracing::info!(volume = self.volume, "bgm player ready");
        Ok(())
    }

    /// Begin pulling audio from the buffer.
    pub fn start(&mut self) {
        match self.state {
            PlaybackState::Ready | PlaybackState::Paused => self.run_stream(true),
            PlaybackState::Playing => {}
            state => tracing::error!(?state, "bgm stream not initialized"),
        }
    }

    /// Pause or resume without closing the stream or moving the cursor.
    pub fn set_paused(&mut self, pause: bool) {
        match (self.state, pause) {
            (PlaybackState::Playing, true) => self.run_stream(false),
            (PlaybackState::Paused | PlaybackState::Ready, false) => self.run_stream(true),
            (PlaybackState::Playing, false) | (PlaybackState::Paused, true) => {}
            (PlaybackState::Ready, true) => tracing::debug!("bgm not started; pause ignored"),
            (state, _) => tracing::error!(?state, "bgm stream not initialized"),
        }
    }

    fn run_stream(&mut self, play: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (result, next) = if play {
            (session.stream.start(), PlaybackState::Playing)
        } else {
            (session.stream.stop(), PlaybackState::Paused)
        };
        match result {
            Ok(()) => {
                tracing::debug!(from = ?self.state, to = ?next, "bgm state");
                self.state = next;
            }
            Err(e) => tracing::error!(play, "bgm stream control failed: {e:#}"),
        }
    }

    /// Set the volume from 0..=100; larger values are clamped to 100.
    pub fn set_volume(&mut self, volume: u8) {
        let Some(session) = self.session.as_mut() else {
            tracing::error!(volume, "bgm stream not initialized");
            return;
        };
        let volume = volume.min(100);
        match session.stream.set_volume(f32::from(volume) / 100.0) {
            Ok(()) => self.volume = volume,
            Err(e) => tracing::warn!(volume, "bgm volume change failed: {e:#}"),
        }
    }

    /// Tear the session down. Safe to call repeatedly.
    ///
    /// The lifecycle thread is woken and joined first; only then are the
    /// stream and the service context released, in that order.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.state = PlaybackState::Stopping;

        let Session {
            mut stream,
            lifecycle,
        } = session;

        let shared = &self.loader.shared;
        shared.request_stop();
        let context = lifecycle.join();
        if context.is_err() {
            tracing::error!("bgm lifecycle thread panicked");
        }

        if let Err(e) = stream.stop() {
            tracing::warn!("bgm stream stop failed: {e:#}");
        }
        drop(stream);
        drop(context);

        shared.reset_stop();
        self.state = PlaybackState::Stopped;
        tracing::info!("bgm player stopped");
    }

    /// Decode and install a track. Works in every state; an open stream picks
    /// up the new content on its next callback.
    pub fn load(&self, bytes: Vec<u8>) -> Result<LoadedTrack> {
        self.loader.load(bytes)
    }

    pub fn load_asset(
        &self,
        source: &dyn AssetSource,
        device: VfsDevice,
        path: &str,
    ) -> Result<LoadedTrack> {
        self.loader.load_asset(source, device, path)
    }

    /// Switch to a theme's music.
    ///
    /// The previous track is dropped first, so a theme whose music fails to
    /// load is silent rather than playing the old theme's track.
    pub fn load_theme(
        &self,
        source: &dyn AssetSource,
        content_id: &str,
        bgm_file: Option<&str>,
    ) -> Result<LoadedTrack> {
        self.loader.clear();
        let (device, path) = asset::theme_bgm_path(content_id, bgm_file);
        tracing::info!(theme = content_id, %device, path = %path, "loading theme bgm");
        self.loader.load_asset(source, device, &path)
    }
}

impl Drop for BgmController {
    fn drop(&mut self) {
        self.stop();
    }
}
