//! Configuration types and file loading for `cardboard`, using [`toml`] and [`serde`].
//!
//! Keybindings are **not** part of this file: they are installed at runtime by the config script
//! issuing `Bind` commands over the IPC socket. What lives here is the small set of knobs the
//! server reads once at startup and that a running instance can still have rewritten live through
//! the `config` command family (`mouse_mod`, `gap`, `focus_color`).

#[macro_use]
extern crate tracing;

use std::path::{Path, PathBuf};
use std::time::Duration;

use csscolorparser::Color;
use serde::Deserialize;
use thiserror::Error;

fn default_gap() -> i32 {
    8
}

fn default_mouse_mods() -> u32 {
    1 << 6 // logo/super, matching the reference keybinding set
}

fn default_focus_color() -> Color {
    Color::new(0.38, 0.55, 0.95, 1.0)
}

const fn default_ms_per_frame() -> u64 {
    16
}

const fn default_animation_duration_ms() -> u64 {
    250
}

/// Timing knobs for the view-position animation queue.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnimationConfig {
    /// Period between `timer_callback` ticks.
    #[serde(rename = "ms-per-frame")]
    pub ms_per_frame: u64,
    /// Duration of a single move/resize animation.
    #[serde(rename = "duration-ms")]
    pub duration_ms: u64,
}

impl AnimationConfig {
    pub fn ms_per_frame(&self) -> Duration {
        Duration::from_millis(self.ms_per_frame)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            ms_per_frame: default_ms_per_frame(),
            duration_ms: default_animation_duration_ms(),
        }
    }
}

/// The compositor's runtime configuration.
///
/// Every field here can also be changed after startup through the corresponding `config`
/// sub-command; this struct just provides the initial values and the `toml` deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Pixel gap inserted between tiles and around the usable area's border.
    #[serde(deserialize_with = "deserialize_non_negative")]
    pub gap: i32,
    /// Modifier mask (see [`crate::modifiers`]) that must be held for interactive move/resize
    /// grabs started from a pointer button, independent of any keybinding modifiers.
    pub mouse_mods: u32,
    /// Border color drawn around the focused view.
    #[serde(with = "color_serde")]
    pub focus_color: Color,
    /// Move/resize animation timing.
    pub animation: AnimationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gap: default_gap(),
            mouse_mods: default_mouse_mods(),
            focus_color: default_focus_color(),
            animation: AnimationConfig::default(),
        }
    }
}

fn deserialize_non_negative<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i32::deserialize(deserializer)?;
    if value < 0 {
        return Err(serde::de::Error::custom("gap must not be negative"));
    }
    Ok(value)
}

mod color_serde {
    use csscolorparser::Color;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(color: &Color, serializer: S) -> Result<S::Ok, S::Error> {
        color.to_hex_string().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Returns `$XDG_CONFIG_HOME/cardboard/config.toml`, falling back to `$HOME/.config` when
/// `XDG_CONFIG_HOME` is unset.
pub fn default_config_path() -> Option<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("cardboard");
    dirs.find_config_file("config.toml")
        .or_else(|| dirs.place_config_file("config.toml").ok())
}

impl Config {
    /// Loads configuration from `path`, or returns the default configuration if `path` does not
    /// exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(?path, "no configuration file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The path to the executable config script launched once the IPC socket is listening.
pub fn config_script_path() -> Option<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("cardboard");
    dirs.find_config_file("cardboardrc")
}
