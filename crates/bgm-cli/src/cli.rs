use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bgm-cli", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// TOML file with player settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List output devices and exit
    Devices,

    /// Print the container header and codec parameters of a theme's BGM
    Inspect {
        #[command(flatten)]
        asset: AssetArgs,
    },

    /// Decode a theme's BGM and loop it until Ctrl-C or the timeout
    Play {
        #[command(flatten)]
        asset: AssetArgs,

        /// Volume, 0-100 (larger values are clamped)
        #[arg(long)]
        volume: Option<u8>,

        /// Stop after this many seconds (0 = until Ctrl-C)
        #[arg(long, default_value_t = 0)]
        seconds: u64,
    },

    /// Loop a test tone through the BGM player until Ctrl-C or the timeout
    Tone {
        /// Volume, 0-100 (larger values are clamped)
        #[arg(long)]
        volume: Option<u8>,

        /// Tone frequency in Hz
        #[arg(long, default_value_t = 440)]
        frequency: u32,

        /// Stop after this many seconds (0 = until Ctrl-C)
        #[arg(long, default_value_t = 0)]
        seconds: u64,

        /// Pause for a second halfway through to exercise pause/resume
        #[arg(long)]
        pause_midway: bool,
    },
}

/// Where to read a BGM asset from: a file, or a theme resolved on a virtual
/// filesystem root.
#[derive(ClapArgs, Debug, Clone)]
pub struct AssetArgs {
    /// Read this file directly instead of resolving a theme
    #[arg(long, conflicts_with_all = ["pref_path", "theme", "bgm_file"])]
    pub file: Option<PathBuf>,

    /// Root of the virtual filesystem (one directory per device)
    #[arg(long)]
    pub pref_path: Option<PathBuf>,

    /// Theme content id
    #[arg(long, default_value = "default")]
    pub theme: String,

    /// BGM file named by the theme descriptor, relative to the theme directory
    #[arg(long)]
    pub bgm_file: Option<String>,
}
