//! Asset byte source.
//!
//! Themes reference their music by a logical `(device, path)` pair. The host
//! application owns the real virtual filesystem; this module defines the seam
//! plus a directory-backed implementation laid out as `<root>/<device>/<path>`.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::{BgmError, Result};

/// System BGM used when a theme does not ship its own track.
pub const DEFAULT_BGM_PATH: &str = "data/systembgm/home.at9";

/// Content id of the built-in theme.
pub const DEFAULT_THEME_ID: &str = "default";

/// Logical storage devices a theme asset can live on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VfsDevice {
    Pd0,
    Ux0,
    Ur0,
    Vs0,
    Os0,
    Sa0,
}

impl VfsDevice {
    pub fn as_str(self) -> &'static str {
        match self {
            VfsDevice::Pd0 => "pd0",
            VfsDevice::Ux0 => "ux0",
            VfsDevice::Ur0 => "ur0",
            VfsDevice::Vs0 => "vs0",
            VfsDevice::Os0 => "os0",
            VfsDevice::Sa0 => "sa0",
        }
    }

    /// Whether assets on this device are installed by the user rather than
    /// shipped with firmware.
    pub fn is_user_storage(self) -> bool {
        matches!(self, VfsDevice::Ux0 | VfsDevice::Ur0)
    }
}

impl fmt::Display for VfsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VfsDevice {
    type Err = BgmError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().trim_end_matches(':').to_ascii_lowercase();
        match name.as_str() {
            "pd0" => Ok(VfsDevice::Pd0),
            "ux0" => Ok(VfsDevice::Ux0),
            "ur0" => Ok(VfsDevice::Ur0),
            "vs0" => Ok(VfsDevice::Vs0),
            "os0" => Ok(VfsDevice::Os0),
            "sa0" => Ok(VfsDevice::Sa0),
            _ => Err(BgmError::NotFound {
                device: s.to_string(),
                path: String::new(),
            }),
        }
    }
}

/// Resolves a logical asset location into its bytes.
pub trait AssetSource: Send + Sync {
    fn read(&self, device: VfsDevice, path: &str) -> Result<Vec<u8>>;
}

/// Asset source backed by a directory tree with one subdirectory per device.
#[derive(Clone, Debug)]
pub struct VfsAssetSource {
    root: PathBuf,
}

impl VfsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a logical location, or `None` if `path` would leave the
    /// device directory.
    pub fn host_path(&self, device: VfsDevice, path: &str) -> Option<PathBuf> {
        let mut out = self.root.join(device.as_str());
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(out)
    }
}

impl AssetSource for VfsAssetSource {
    fn read(&self, device: VfsDevice, path: &str) -> Result<Vec<u8>> {
        let not_found = || BgmError::NotFound {
            device: device.to_string(),
            path: path.to_string(),
        };
        let host = self.host_path(device, path).ok_or_else(not_found)?;
        match std::fs::read(&host) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::debug!(path = %host.display(), "asset read failed: {e}");
                Err(not_found())
            }
        }
    }
}

/// Location of a theme's BGM asset.
///
/// The built-in theme and themes without a BGM entry fall back to the system
/// track on `pd0`; installed themes keep their music under `ux0:theme/<id>/`.
pub fn theme_bgm_path(content_id: &str, bgm_file: Option<&str>) -> (VfsDevice, String) {
    let bgm_file = bgm_file.map(str::trim).filter(|f| !f.is_empty());
    match bgm_file {
        Some(file) if content_id != DEFAULT_THEME_ID => (
            VfsDevice::Ux0,
            format!("theme/{content_id}/{}", file.trim_start_matches('/')),
        ),
        _ => (VfsDevice::Pd0, DEFAULT_BGM_PATH.to_string()),
    }
}
