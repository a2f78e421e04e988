//! Configuration file management for voxmemo.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory and created with defaults
//! on first use.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Audio device to preselect. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `voxmemo list-devices`
    /// - device name from `voxmemo list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Number of recent samples the analyser keeps for amplitude sampling
    #[serde(default = "default_analyser_size")]
    pub analyser_size: usize,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_analyser_size() -> usize {
    2048
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            analyser_size: default_analyser_size(),
        }
    }
}

/// Layout and animation constants for the scrolling waveform.
///
/// All distances are in drawing-surface units (terminal cells for the TUI).
/// The value is immutable once handed to a sampler or reconstructor, so live
/// and replayed timelines built from the same config lay out identically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VisualizationConfig {
    /// Horizontal pitch of one bar, including the gap
    #[serde(default = "default_bar_width")]
    pub bar_width: f32,
    /// Empty space between adjacent bars
    #[serde(default = "default_bar_gap")]
    pub bar_gap: f32,
    /// Height of a silent bar and of every padding bar
    #[serde(default = "default_min_bar_height")]
    pub min_bar_height: f32,
    /// Tallest bar as a fraction of the surface height
    #[serde(default = "default_max_bar_height_ratio")]
    pub max_bar_height_ratio: f32,
    /// Lowest magnitude recorded for a sample (0-255 scale)
    #[serde(default = "default_magnitude_floor")]
    pub magnitude_floor: f32,
    /// Leftward scroll velocity in units per second
    #[serde(default = "default_shift_speed")]
    pub shift_speed: f32,
    /// Seconds a new bar takes to grow to full height
    #[serde(default = "default_growth_secs")]
    pub growth_secs: f32,
    /// Seconds a new bar waits at the right edge before scrolling
    #[serde(default = "default_shift_delay_secs")]
    pub shift_delay_secs: f32,
}

fn default_bar_width() -> f32 {
    2.0
}

fn default_bar_gap() -> f32 {
    1.0
}

fn default_min_bar_height() -> f32 {
    0.25
}

fn default_max_bar_height_ratio() -> f32 {
    0.9
}

fn default_magnitude_floor() -> f32 {
    2.0
}

fn default_shift_speed() -> f32 {
    20.0
}

fn default_growth_secs() -> f32 {
    0.2
}

fn default_shift_delay_secs() -> f32 {
    0.1
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            bar_width: default_bar_width(),
            bar_gap: default_bar_gap(),
            min_bar_height: default_min_bar_height(),
            max_bar_height_ratio: default_max_bar_height_ratio(),
            magnitude_floor: default_magnitude_floor(),
            shift_speed: default_shift_speed(),
            growth_secs: default_growth_secs(),
            shift_delay_secs: default_shift_delay_secs(),
        }
    }
}

/// Shortest allowed gap between two node insertions.
pub const MIN_NODE_DELAY: Duration = Duration::from_millis(1);

/// Longest allowed gap between two node insertions.
pub const MAX_NODE_DELAY: Duration = Duration::from_secs(10);

impl VisualizationConfig {
    /// Time between consecutive node insertions.
    ///
    /// Derived from pitch and velocity so adjacent bars are always exactly one
    /// `bar_width` apart, however irregular the drawing ticks are. Clamped to
    /// `MIN_NODE_DELAY..=MAX_NODE_DELAY`, which `validate` enforces for loaded
    /// configs.
    pub fn per_node_delay(&self) -> Duration {
        let secs = self.bar_width as f64 / self.shift_speed as f64;
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay.clamp(MIN_NODE_DELAY, MAX_NODE_DELAY),
            Err(_) if secs.is_nan() || secs > 0.0 => MAX_NODE_DELAY,
            Err(_) => MIN_NODE_DELAY,
        }
    }

    /// Checks that the constants describe a drawable layout.
    ///
    /// # Errors
    /// - If bar width or shift speed is not a finite positive number
    /// - If a bar takes less than 1ms or more than 10s to scroll by one width
    /// - If the gap leaves no room for a bar
    /// - If the height range is inverted
    /// - If a timing is negative or not finite
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.bar_width.is_finite() || self.bar_width <= 0.0 {
            return Err(anyhow!("visualization.bar_width must be positive"));
        }
        if !self.shift_speed.is_finite() || self.shift_speed <= 0.0 {
            return Err(anyhow!("visualization.shift_speed must be positive"));
        }
        let node_delay = self.bar_width as f64 / self.shift_speed as f64;
        if !(MIN_NODE_DELAY.as_secs_f64()..=MAX_NODE_DELAY.as_secs_f64()).contains(&node_delay) {
            return Err(anyhow!(
                "visualization.bar_width / shift_speed must be between {}ms and {}s, got {node_delay}s",
                MIN_NODE_DELAY.as_millis(),
                MAX_NODE_DELAY.as_secs()
            ));
        }
        if !(self.bar_gap >= 0.0 && self.bar_gap < self.bar_width) {
            return Err(anyhow!(
                "visualization.bar_gap must be in [0, bar_width)"
            ));
        }
        if !(self.min_bar_height >= 0.0 && self.min_bar_height.is_finite())
            || !(0.0..=1.0).contains(&self.max_bar_height_ratio)
        {
            return Err(anyhow!(
                "visualization bar heights must be non-negative and max_bar_height_ratio within 0-1"
            ));
        }
        if !self.magnitude_floor.is_finite() {
            return Err(anyhow!("visualization.magnitude_floor must be finite"));
        }
        let timings = [self.growth_secs, self.shift_delay_secs];
        if timings.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(anyhow!("visualization timings must not be negative"));
        }
        Ok(())
    }
}

/// Color theming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThemeConfig {
    /// Team identifier used to pick the color palette
    #[serde(default = "default_team")]
    pub team: String,
}

fn default_team() -> String {
    "default".to_string()
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            team: default_team(),
        }
    }
}

/// Where accepted recordings are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory for accepted recordings; the system temp directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoxmemoConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl VoxmemoConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// Writes a default config file first if none exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read or created
    /// - If the TOML is malformed or describes an invalid layout
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit path, creating it with defaults if missing.
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "No config found, writing defaults to {}",
                config_path.display()
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: VoxmemoConfig = toml::from_str(&config_content)?;
        config.visualization.validate()?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        self.save_to(&config_path)
    }

    fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config_content = toml::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    /// Directory accepted recordings are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".config")
        .join("voxmemo");

    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow!("Failed to create config directory: {e}"))?;

    Ok(config_dir.join("voxmemo.toml"))
}
