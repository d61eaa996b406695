//! Theme background music: container parsing, super-frame decoding, and looping
//! real-time playback behind a single owned controller.

pub mod asset;
pub mod backend;
pub mod codec;
pub mod config;
pub mod container;
pub mod controller;
pub mod decode;
pub mod device;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod libav;
pub mod output;
pub mod pcm;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{BgmController, PlaybackState, TrackLoader};
pub use error::BgmError;
