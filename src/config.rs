use crate::avoidance::AvoidanceParams;
use crate::error::ConfigError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How an agent routes around obstacles once straight movement is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathfindingMode {
    #[default]
    AStar,
    FlowField,
}

/// Tuning for the movement system. All distances are world units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    #[serde(default)]
    pub pathfinding_mode: PathfindingMode,
    #[serde(default)]
    pub steering_enabled: bool,
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius: f64,
    /// Degrees per second
    #[serde(default = "default_turn_speed")]
    pub turn_speed: f64,
    #[serde(default = "default_obstacle_check_distance")]
    pub obstacle_check_distance: f64,
    #[serde(default = "default_avoidance_margin")]
    pub avoidance_margin: f64,
    #[serde(default = "default_slide_factor")]
    pub slide_factor: f64,
    #[serde(default = "default_crowd_radius")]
    pub crowd_radius: f64,
    /// Steering acceleration limit as a multiple of the agent's speed
    #[serde(default = "default_max_force_factor")]
    pub max_force_factor: f64,
    #[serde(default = "default_slow_radius")]
    pub slow_radius: f64,
    #[serde(default = "default_flow_cache_capacity")]
    pub flow_cache_capacity: usize,
    #[serde(default = "default_flow_cache_max_age")]
    pub flow_cache_max_age_ticks: u64,
    #[serde(default = "default_true")]
    pub use_flow_cache: bool,
    /// Consecutive stalled ticks in Blocked before a full re-path is forced
    #[serde(default = "default_stuck_repath_ticks")]
    pub stuck_repath_ticks: u32,
    #[serde(default)]
    pub turn_in_place: bool,
    /// Heading error in degrees above which an agent stops to turn first
    #[serde(default = "default_turn_threshold")]
    pub turn_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_cols")]
    pub cols: i32,
    #[serde(default = "default_rows")]
    pub rows: i32,
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsConfig {
    #[serde(default = "default_unit_speed")]
    pub default_speed: f64,
    #[serde(default = "default_unit_radius")]
    pub default_radius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// Screen pixels per world unit
    #[serde(default = "default_pixels_per_unit")]
    pub pixels_per_unit: f32,
    #[serde(default = "default_bg_r")]
    pub background_r: u8,
    #[serde(default = "default_bg_g")]
    pub background_g: u8,
    #[serde(default = "default_bg_b")]
    pub background_b: u8,
    #[serde(default = "default_true")]
    pub show_paths: bool,
    #[serde(default)]
    pub show_flow_field: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub record_trace: bool,
    #[serde(default = "default_trace_path")]
    pub trace_path: String,
}

// Default values
fn default_true() -> bool { true }
fn default_arrival_radius() -> f64 { 0.1 }
fn default_turn_speed() -> f64 { 360.0 }
fn default_obstacle_check_distance() -> f64 { 3.0 }
fn default_avoidance_margin() -> f64 { 0.05 }
fn default_slide_factor() -> f64 { 0.6 }
fn default_crowd_radius() -> f64 { 1.5 }
fn default_max_force_factor() -> f64 { 4.0 }
fn default_slow_radius() -> f64 { 1.0 }
fn default_flow_cache_capacity() -> usize { 20 }
fn default_flow_cache_max_age() -> u64 { 150 }
fn default_stuck_repath_ticks() -> u32 { 30 }
fn default_turn_threshold() -> f64 { 45.0 }
fn default_cols() -> i32 { 32 }
fn default_rows() -> i32 { 24 }
fn default_cell_size() -> f64 { 1.0 }
fn default_unit_speed() -> f64 { 4.0 }
fn default_unit_radius() -> f64 { 0.35 }
fn default_window_title() -> String { "rtsmove - locomotion sandbox".to_string() }
fn default_pixels_per_unit() -> f32 { 28.0 }
fn default_bg_r() -> u8 { 30 }
fn default_bg_g() -> u8 { 30 }
fn default_bg_b() -> u8 { 30 }
fn default_trace_path() -> String { "trace.json".to_string() }

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            pathfinding_mode: PathfindingMode::default(),
            steering_enabled: false,
            arrival_radius: default_arrival_radius(),
            turn_speed: default_turn_speed(),
            obstacle_check_distance: default_obstacle_check_distance(),
            avoidance_margin: default_avoidance_margin(),
            slide_factor: default_slide_factor(),
            crowd_radius: default_crowd_radius(),
            max_force_factor: default_max_force_factor(),
            slow_radius: default_slow_radius(),
            flow_cache_capacity: default_flow_cache_capacity(),
            flow_cache_max_age_ticks: default_flow_cache_max_age(),
            use_flow_cache: true,
            stuck_repath_ticks: default_stuck_repath_ticks(),
            turn_in_place: false,
            turn_threshold: default_turn_threshold(),
        }
    }
}

impl MovementConfig {
    pub fn avoidance(&self) -> AvoidanceParams {
        AvoidanceParams {
            margin: self.avoidance_margin,
            slide_factor: self.slide_factor,
            crowd_radius: self.crowd_radius,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
            cell_size: default_cell_size(),
        }
    }
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            default_speed: default_unit_speed(),
            default_radius: default_unit_radius(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            pixels_per_unit: default_pixels_per_unit(),
            background_r: default_bg_r(),
            background_g: default_bg_g(),
            background_b: default_bg_b(),
            show_paths: true,
            show_flow_field: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            record_trace: false,
            trace_path: default_trace_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            movement: MovementConfig::default(),
            units: UnitsConfig::default(),
            visual: VisualConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from file, or use defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Read { path, .. }) => {
                info!("No config at {}, using default configuration", path);
                Config::default()
            }
            Err(e) => {
                warn!("{}; using default configuration", e);
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let movement = MovementConfig::default();
        assert_eq!(movement.pathfinding_mode, PathfindingMode::AStar);
        assert_eq!(movement.arrival_radius, 0.1);
        assert_eq!(movement.turn_speed, 360.0);
        assert_eq!(movement.obstacle_check_distance, 3.0);
        assert_eq!(movement.avoidance().margin, 0.05);
        assert_eq!(movement.avoidance().slide_factor, 0.6);
        assert_eq!(movement.flow_cache_capacity, 20);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [grid]
            cols = 10

            [movement]
            pathfinding_mode = "flow_field"
            steering_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.cols, 10);
        assert_eq!(config.grid.rows, 24);
        assert_eq!(config.movement.pathfinding_mode, PathfindingMode::FlowField);
        assert!(config.movement.steering_enabled);
        assert_eq!(config.movement.stuck_repath_ticks, 30);
        assert!(config.visual.show_paths);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml("[movement]\narrival_radius = \"far\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::load("does/not/exist.toml"),
            Err(ConfigError::Read { .. })
        ));
        assert_eq!(Config::load_or_default("does/not/exist.toml").grid.cols, 32);
    }
}
