//! Configuration system for Peruere
//!
//! Settings come from three places, lowest precedence first: built-in
//! defaults, the TOML file at `~/.config/peruere/config.toml` (auto-generated
//! on first run if missing), and command line flags.

use anyhow::{Context, Result};
use clap::Parser;
use peruere_geometry::{parse_geometry, Geometry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Play a looping video as the X11 desktop wallpaper
#[derive(Parser, Debug)]
#[command(name = "peruere", version, about, long_about = None)]
pub struct Cli {
    /// The file to play as a wallpaper
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Window geometry, e.g. 1920x1080+0+0 (negative offsets as +-N)
    #[arg(short, long, value_name = "WxH+X+Y")]
    pub geometry: Option<String>,

    /// Override the geometry's width
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Override the geometry's height
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Override the geometry's x offset
    #[arg(long, value_name = "PIXELS", allow_negative_numbers = true)]
    pub x_offset: Option<i32>,

    /// Override the geometry's y offset
    #[arg(long, value_name = "PIXELS", allow_negative_numbers = true)]
    pub y_offset: Option<i32>,

    /// X display to connect to (defaults to $DISPLAY)
    #[arg(long, value_name = "NAME")]
    pub display: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Mute audio
    #[arg(long)]
    pub mute: bool,

    /// mpv hardware decoding mode (e.g. auto, vaapi)
    #[arg(long, value_name = "MODE")]
    pub hwdec: Option<String>,

    /// mpv video output driver
    #[arg(long, value_name = "DRIVER")]
    pub vo: Option<String>,

    /// Path to the mpv binary
    #[arg(long = "mpv", value_name = "PATH")]
    pub mpv_binary: Option<PathBuf>,

    /// Extra mpv option, repeatable (e.g. --mpv-option panscan=1.0)
    #[arg(long = "mpv-option", value_name = "KEY=VALUE")]
    pub mpv_options: Vec<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Media file (or anything mpv can open) to loop
    pub file: PathBuf,
    /// X display name; `None` uses $DISPLAY
    pub display: Option<String>,
    pub window: WindowConfig,
    pub player: PlayerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: PathBuf::from("video.mp4"),
            display: None,
            window: WindowConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

impl Config {
    /// Build the effective configuration for this run
    ///
    /// An explicit `--config` file must exist; the default one is created
    /// when missing.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from(path)?,
            None => Self::load_default()?,
        };

        config.apply_cli(cli)?;
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Load the default config file, or use defaults if it doesn't exist
    fn load_default() -> Result<Self> {
        let Some(config_path) = Self::config_path() else {
            warn!("No config directory available, using defaults");
            return Ok(Self::default());
        };

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            // Auto-generate default config file
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the path to the config file
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("peruere").join("config.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    /// Layer command line flags over the file configuration
    ///
    /// `--geometry` replaces the whole geometry, then the per-field flags
    /// replace single fields of whatever geometry is in effect.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(file) = &cli.file {
            self.file = file.clone();
        }

        if let Some(value) = &cli.geometry {
            self.window.geometry = parse_geometry(value)
                .with_context(|| format!("Invalid --geometry {:?}", value))?;
        }

        let geometry = &mut self.window.geometry;
        if let Some(width) = cli.width {
            geometry.width = width;
        }
        if let Some(height) = cli.height {
            geometry.height = height;
        }
        if let Some(x) = cli.x_offset {
            geometry.x = x;
        }
        if let Some(y) = cli.y_offset {
            geometry.y = y;
        }

        if let Some(display) = &cli.display {
            self.display = Some(display.clone());
        }

        let player = &mut self.player;
        if cli.mute {
            player.mute = true;
        }
        if let Some(hwdec) = &cli.hwdec {
            player.hwdec = Some(hwdec.clone());
        }
        if let Some(vo) = &cli.vo {
            player.vo = vo.clone();
        }
        if let Some(binary) = &cli.mpv_binary {
            player.binary = binary.clone();
        }
        player.options.extend(cli.mpv_options.iter().cloned());

        Ok(())
    }
}

/// Wallpaper window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Size and position, `WIDTHxHEIGHT+X+Y`
    pub geometry: Geometry,
    /// WM_NAME / _NET_WM_NAME of the window
    pub name: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            name: "peruere".to_string(),
        }
    }
}

/// mpv configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// mpv executable, looked up in $PATH when relative
    pub binary: PathBuf,
    /// Video output driver
    pub vo: String,
    /// Hardware decoding mode; mpv's default when unset
    pub hwdec: Option<String>,
    pub mute: bool,
    /// Loop the file forever
    #[serde(rename = "loop")]
    pub loop_file: bool,
    /// Ask compositors to unredirect the video window
    pub bypass_compositor: bool,
    /// Extra `key=value` options passed to mpv as `--key=value`
    pub options: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mpv"),
            vo: "gpu".to_string(),
            hwdec: None,
            mute: false,
            loop_file: true,
            bypass_compositor: true,
            options: Vec::new(),
        }
    }
}
