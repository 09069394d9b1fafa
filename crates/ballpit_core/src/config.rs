//! Scene configuration: loading, saving and validation.
//!
//! Configs are JSON files. Every field has a default, so a file only needs the
//! values it wants to change:
//!
//! ```json
//! {
//!   "simulation": { "count": 120, "gravity": 0.0 },
//!   "colors": ["#5227FF", "#FF9FFC", "#B19EEF"],
//!   "layout": { "height_fraction": 0.6, "band_offset": 0.2 }
//! }
//! ```

use ballpit_physics::{SimulationConfig, SimulationConfigError};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::surface::SurfaceSettings;

/// Everything needed to build one ball-pit scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallpitConfig {
    pub simulation: SimulationConfig,
    /// Palette stops as hex strings, first stop on instance 0
    pub colors: Vec<String>,
    pub ambient_color: String,
    pub ambient_intensity: f32,
    /// Point light intensity in lumens
    pub light_intensity: f32,
    pub light_range: f32,
    pub material: MaterialSettings,
    pub subsurface: SubsurfaceSettings,
    pub layout: SceneLayout,
    /// Duration of the eased move of the pointer target
    pub cursor_tween_secs: f32,
    pub surface: SurfaceSettings,
    /// Fixed seed for reproducible layouts
    pub seed: Option<u64>,
}

impl Default for BallpitConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            colors: vec![
                "#5227FF".to_string(),
                "#FF9FFC".to_string(),
                "#B19EEF".to_string(),
            ],
            ambient_color: "#FFFFFF".to_string(),
            ambient_intensity: 400.0,
            light_intensity: 400_000.0,
            light_range: 40.0,
            material: MaterialSettings::default(),
            subsurface: SubsurfaceSettings::default(),
            layout: SceneLayout::default(),
            cursor_tween_secs: 0.35,
            surface: SurfaceSettings::default(),
            seed: None,
        }
    }
}

/// Base PBR parameters shared by every sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSettings {
    pub metalness: f32,
    pub roughness: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            metalness: 0.5,
            roughness: 0.5,
            clearcoat: 1.0,
            clearcoat_roughness: 0.15,
        }
    }
}

/// Tunables of the subsurface glow term added on top of PBR lighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsurfaceSettings {
    /// How far the surface normal bends the light direction
    pub distortion: f32,
    /// Constant glow floor
    pub ambient: f32,
    pub attenuation: f32,
    /// Falloff exponent of the view-aligned lobe
    pub power: f32,
    pub scale: f32,
}

impl Default for SubsurfaceSettings {
    fn default() -> Self {
        Self {
            distortion: 0.1,
            ambient: 0.0,
            attenuation: 0.1,
            power: 2.0,
            scale: 10.0,
        }
    }
}

/// Where the simulation box sits inside the visible world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneLayout {
    /// Fraction of the visible world height the box spans
    pub height_fraction: f32,
    /// Vertical offset of the box center, as a fraction of world height
    pub band_offset: f32,
    /// Relative bound change at which bodies are scattered again
    pub reinit_threshold: f32,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            height_fraction: 1.0,
            band_offset: 0.0,
            reinit_threshold: 0.2,
        }
    }
}

impl BallpitConfig {
    /// Check every section; the simulation section is checked by the engine
    /// rules so both layers agree.
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;
        self.palette()?;
        parse_color(&self.ambient_color)?;

        if self.layout.height_fraction <= 0.0 || !self.layout.height_fraction.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "layout.height_fraction must be positive, got {}",
                self.layout.height_fraction
            )));
        }
        if self.layout.reinit_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "layout.reinit_threshold must not be negative, got {}",
                self.layout.reinit_threshold
            )));
        }
        if self.cursor_tween_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cursor_tween_secs must not be negative, got {}",
                self.cursor_tween_secs
            )));
        }

        self.surface.validate()
    }

    /// Parsed palette stops.
    pub fn palette(&self) -> ConfigResult<Vec<Color>> {
        if self.colors.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        self.colors.iter().map(|c| parse_color(c)).collect()
    }

    pub fn ambient(&self) -> ConfigResult<Color> {
        parse_color(&self.ambient_color)
    }
}

/// Parse a `#RRGGBB` / `#RRGGBBAA` / `#RGB` string.
pub fn parse_color(hex: &str) -> ConfigResult<Color> {
    Srgba::hex(hex)
        .map(Color::Srgba)
        .map_err(|_| ConfigError::InvalidColor(hex.to_string()))
}

/// Error from loading or validating a config.
#[derive(Debug)]
pub enum ConfigError {
    /// File system error
    Io(std::io::Error),
    /// Malformed JSON
    Json(serde_json::Error),
    /// Simulation section rejected
    Simulation(SimulationConfigError),
    /// Palette entry is not a hex color
    InvalidColor(String),
    /// Palette needs at least one stop
    EmptyPalette,
    /// Any other out-of-range value
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
            ConfigError::Simulation(e) => write!(f, "Simulation config: {}", e),
            ConfigError::InvalidColor(c) => write!(f, "Invalid color: {:?}", c),
            ConfigError::EmptyPalette => write!(f, "Palette has no colors"),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<SimulationConfigError> for ConfigError {
    fn from(e: SimulationConfigError) -> Self {
        ConfigError::Simulation(e)
    }
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> ConfigResult<BallpitConfig> {
    let file = File::open(path.as_ref())?;
    let config: BallpitConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    Ok(config)
}

/// Write a config as pretty JSON.
pub fn save_config<P: AsRef<Path>>(config: &BallpitConfig, path: P) -> ConfigResult<()> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), config)?;
    Ok(())
}
