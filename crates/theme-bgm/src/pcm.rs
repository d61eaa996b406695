//! Looping PCM buffer shared between the decode path and the output callback.
//!
//! One mutex guards the decoded bytes, the read cursor, and the lifecycle stop
//! flag. The condition variable next to it is only used for shutdown.

use std::ops::Range;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Interleaved s16le PCM with a read cursor.
///
/// `position <= data.len()` always holds; reaching the end wraps to the start
/// on the next read, so a loaded track loops until playback is stopped.
#[derive(Debug, Default)]
pub struct PcmBuffer {
    data: Vec<u8>,
    position: usize,
}

impl PcmBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Swap in new content and rewind.
    pub fn replace(&mut self, data: Vec<u8>) {
        self.data = data;
        self.position = 0;
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    /// Claim up to `bytes_needed` bytes from the cursor and advance past them.
    ///
    /// Wraps to the start first if the cursor sits at the end. Never crosses
    /// the end within one call, so the returned range may be short.
    fn advance(&mut self, bytes_needed: usize) -> Range<usize> {
        if self.position >= self.data.len() {
            self.position = 0;
        }
        let start = self.position;
        let take = bytes_needed.min(self.data.len() - start);
        self.position += take;
        start..start + take
    }

    /// Copy the next `out.len()` bytes into `out`, zero-filling whatever the
    /// buffer cannot supply before its end. Returns the bytes of real audio.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> usize {
        let range = self.advance(out.len());
        let n = range.len();
        out[..n].copy_from_slice(&self.data[range]);
        out[n..].fill(0);
        n
    }

    /// Same as [`read_bytes`](Self::read_bytes) but decoding into samples.
    /// Returns the samples of real audio.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        let range = self.advance(out.len() * 2);
        let n = range.len() / 2;
        for (dst, src) in out.iter_mut().zip(self.data[range].chunks_exact(2)) {
            *dst = i16::from_le_bytes([src[0], src[1]]);
        }
        out[n..].fill(0);
        n
    }
}

/// State guarded by the playback mutex.
#[derive(Debug, Default)]
pub struct PlaybackInner {
    pub buffer: PcmBuffer,
    pub stop_requested: bool,
}

/// The playback mutex and its shutdown condition.
#[derive(Debug, Default)]
pub struct SharedPlayback {
    inner: Mutex<PlaybackInner>,
    stop_cv: Condvar,
}

impl SharedPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the playback state. A poisoned lock is recovered; the guarded data
    /// has no invariant a panic could break halfway.
    pub fn lock(&self) -> MutexGuard<'_, PlaybackInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replace the track in one critical section.
    pub fn install(&self, pcm: Vec<u8>) {
        self.lock().buffer.replace(pcm);
    }

    pub fn clear(&self) {
        self.lock().buffer.clear();
    }

    /// Set the stop flag under the lock, then wake the lifecycle thread.
    pub fn request_stop(&self) {
        self.lock().stop_requested = true;
        self.stop_cv.notify_all();
    }

    pub fn reset_stop(&self) {
        self.lock().stop_requested = false;
    }

    /// Block until [`request_stop`](Self::request_stop) has been called.
    pub fn wait_for_stop(&self) {
        let guard = self.lock();
        let _guard = self
            .stop_cv
            .wait_while(guard, |inner| !inner.stop_requested)
            .unwrap_or_else(|p| p.into_inner());
    }
}
