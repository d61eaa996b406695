use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
pub use theme_bgm::config::BgmConfig;

use crate::cli::AssetArgs;

/// Load player settings from TOML, or defaults when no file is given.
pub fn load_bgm_config(path: Option<&Path>) -> Result<BgmConfig> {
    let Some(path) = path else {
        return Ok(BgmConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_bgm_config(&raw).with_context(|| format!("parse config {}", path.display()))
}

fn parse_bgm_config(raw: &str) -> Result<BgmConfig> {
    Ok(toml::from_str(raw)?)
}

/// Where `inspect` and `play` read the asset from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetTarget {
    File(PathBuf),
    Theme {
        pref_path: PathBuf,
        theme: String,
        bgm_file: Option<String>,
    },
}

impl AssetTarget {
    pub fn from_args(args: AssetArgs) -> Result<Self> {
        match (args.file, args.pref_path) {
            (Some(file), _) => Ok(Self::File(file)),
            (None, Some(pref_path)) => Ok(Self::Theme {
                pref_path,
                theme: args.theme,
                bgm_file: args.bgm_file,
            }),
            (None, None) => bail!("an asset needs --file or --pref-path"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub bgm: BgmConfig,
    pub target: AssetTarget,
    pub volume: u8,
    pub seconds: u64,
}

#[derive(Clone, Debug)]
pub struct ToneConfig {
    pub bgm: BgmConfig,
    pub volume: u8,
    pub frequency: u32,
    pub seconds: u64,
    pub pause_midway: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = parse_bgm_config("buffer_frames = 2048\ndevice = \"USB\"\n").unwrap();
        assert_eq!(cfg.buffer_frames, 2048);
        assert_eq!(cfg.device.as_deref(), Some("USB"));
        assert_eq!(cfg.sample_rate, 48_000);
        assert_eq!(cfg.max_super_frame_bytes, 1024);
    }

    #[test]
    fn empty_config_is_default() {
        let cfg = parse_bgm_config("").unwrap();
        assert_eq!(cfg.initial_volume, 100);
        assert_eq!(cfg.stream_name, "Stream BGM");
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(parse_bgm_config("sample_rate = \"fast\"").is_err());
    }

    #[test]
    fn missing_file_defaults() {
        let cfg = load_bgm_config(None).unwrap();
        assert_eq!(cfg.stream_params().channels, 2);
    }

    fn asset_args(file: Option<&str>, pref_path: Option<&str>) -> AssetArgs {
        AssetArgs {
            file: file.map(PathBuf::from),
            pref_path: pref_path.map(PathBuf::from),
            theme: "default".to_string(),
            bgm_file: None,
        }
    }

    #[test]
    fn asset_target_prefers_file() {
        let target = AssetTarget::from_args(asset_args(Some("home.at9"), None)).unwrap();
        assert_eq!(target, AssetTarget::File(PathBuf::from("home.at9")));

        let target = AssetTarget::from_args(asset_args(None, Some("/vfs"))).unwrap();
        assert_eq!(
            target,
            AssetTarget::Theme {
                pref_path: PathBuf::from("/vfs"),
                theme: "default".to_string(),
                bgm_file: None,
            }
        );
    }

    #[test]
    fn asset_target_needs_a_source() {
        assert!(AssetTarget::from_args(asset_args(None, None)).is_err());
    }

    #[test]
    fn channel_count_is_not_configurable() {
        let cfg = parse_bgm_config("channels = 1
").unwrap();
        assert_eq!(cfg.stream_params().channels, 2);
    }
}
