//! Arm configuration loading and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of controlled joints.
pub const AXIS_COUNT: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("expected {AXIS_COUNT} [[axes]] sections, found {0}")]
    AxisCount(usize),
    #[error("axis {0}: gear ratio must be non-zero")]
    ZeroGearRatio(usize),
    #[error("axis {0}: direction must be 1 or -1, got {1}")]
    BadDirection(usize, i8),
    #[error("axis {axis}: lower limit {lower} is not below upper limit {upper}")]
    BadLimits { axis: usize, lower: f64, upper: f64 },
    #[error("coupled pair ({0}, {1}) is invalid")]
    BadCoupledPair(usize, usize),
    #[error("velocity loop rate must be positive, got {0}")]
    BadLoopRate(f64),
    #[error("active axis index {0} out of range")]
    BadActiveAxis(usize),
    #[error("reconfiguration requires the velocity controller to be stopped")]
    ControllerRunning,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub arm: ArmSection,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub coupling: CouplingConfig,
    #[serde(default)]
    pub velocity_loop: VelocityLoopConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            arm: ArmSection::default(),
            bus: BusConfig::default(),
            axes: default_axes(),
            coupling: CouplingConfig::default(),
            velocity_loop: VelocityLoopConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmSection {
    #[serde(default)]
    pub arm_name: Option<String>,
    /// Global multiplier applied to every commanded speed.
    #[serde(default = "default_speed_scale")]
    pub speed_scale: f64,
    #[serde(default = "default_base_speed")]
    pub default_speed_rpm: f64,
    #[serde(default = "default_base_accel")]
    pub default_accel: f64,
}

impl Default for ArmSection {
    fn default() -> Self {
        Self {
            arm_name: None,
            speed_scale: default_speed_scale(),
            default_speed_rpm: default_base_speed(),
            default_accel: default_base_accel(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    pub serial: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            serial: "".to_string(),
            baud: default_baud(),
            reply_timeout_ms: default_reply_timeout_ms(),
        }
    }
}

/// Per-axis drive parameters.
///
/// The gear ratio is signed: its sign encodes the mechanical direction of the
/// joint, so no separate sign flip is applied anywhere downstream. The
/// `direction` field from the config file is folded into `gear_ratio` by
/// [`Config::axis_table`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AxisConfig {
    pub gear_ratio: f64,
    #[serde(default = "default_encoder_resolution")]
    pub encoder_resolution: u32,
    #[serde(default = "default_direction")]
    pub direction: i8,
    #[serde(default = "default_lower_limit")]
    pub lower_limit: f64,
    #[serde(default = "default_upper_limit")]
    pub upper_limit: f64,
    #[serde(default = "default_max_speed_rpm")]
    pub max_speed_rpm: u16,
    #[serde(default = "default_max_accel")]
    pub max_accel: u8,
    /// Calibrated zero position in encoder ticks, reached after homing.
    #[serde(default)]
    pub zero_position: i64,
    /// User trim added to `zero_position` during homing.
    #[serde(default)]
    pub homing_offset: i64,
    /// Parked pose in encoder ticks.
    #[serde(default)]
    pub park_position: i64,
    #[serde(default = "default_homing_speed")]
    pub homing_speed: u16,
    #[serde(default = "default_homing_accel")]
    pub homing_accel: u8,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CouplingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_coupled_pair")]
    pub pair: [usize; 2],
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pair: default_coupled_pair(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VelocityLoopConfig {
    #[serde(default = "default_loop_hz")]
    pub loop_hz: f64,
    #[serde(default = "default_kp_pos")]
    pub kp_pos: f64,
    #[serde(default = "default_kp_rot")]
    pub kp_rot: f64,
    #[serde(default = "default_rpm_limit")]
    pub rpm_limit: u16,
    #[serde(default = "default_velocity_accel")]
    pub accel: u8,
    #[serde(default = "default_active_axes")]
    pub active_axes: Vec<usize>,
}

impl Default for VelocityLoopConfig {
    fn default() -> Self {
        Self {
            loop_hz: default_loop_hz(),
            kp_pos: default_kp_pos(),
            kp_rot: default_kp_rot(),
            rpm_limit: default_rpm_limit(),
            accel: default_velocity_accel(),
            active_axes: default_active_axes(),
        }
    }
}

impl Config {
    /// Validate the axis sections and fold each direction sign into its gear
    /// ratio, yielding the runtime table both motion paths share.
    pub fn axis_table(&self) -> Result<[AxisConfig; AXIS_COUNT], ConfigError> {
        if self.axes.len() != AXIS_COUNT {
            return Err(ConfigError::AxisCount(self.axes.len()));
        }
        let mut table = [self.axes[0]; AXIS_COUNT];
        for (i, axis) in self.axes.iter().enumerate() {
            if axis.gear_ratio == 0.0 {
                return Err(ConfigError::ZeroGearRatio(i));
            }
            if axis.direction != 1 && axis.direction != -1 {
                return Err(ConfigError::BadDirection(i, axis.direction));
            }
            if axis.lower_limit >= axis.upper_limit {
                return Err(ConfigError::BadLimits {
                    axis: i,
                    lower: axis.lower_limit,
                    upper: axis.upper_limit,
                });
            }
            let mut finalized = *axis;
            finalized.gear_ratio = axis.gear_ratio * f64::from(axis.direction);
            finalized.direction = 1;
            table[i] = finalized;
        }
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.axis_table()?;
        let [a, b] = self.coupling.pair;
        if a == b || a >= AXIS_COUNT || b >= AXIS_COUNT {
            return Err(ConfigError::BadCoupledPair(a, b));
        }
        if self.velocity_loop.loop_hz <= 0.0 {
            return Err(ConfigError::BadLoopRate(self.velocity_loop.loop_hz));
        }
        for &axis in &self.velocity_loop.active_axes {
            if axis >= AXIS_COUNT {
                return Err(ConfigError::BadActiveAxis(axis));
            }
        }
        Ok(())
    }
}

// Gear ratios of the stock drive train; axes 4 and 5 share the wrist gearbox.
fn default_axes() -> Vec<AxisConfig> {
    [13.5, 150.0, 150.0, 48.0, 33.91, 33.91]
        .iter()
        .map(|&gear_ratio| AxisConfig {
            gear_ratio,
            encoder_resolution: default_encoder_resolution(),
            direction: default_direction(),
            lower_limit: default_lower_limit(),
            upper_limit: default_upper_limit(),
            max_speed_rpm: default_max_speed_rpm(),
            max_accel: default_max_accel(),
            zero_position: 0,
            homing_offset: 0,
            park_position: 0,
            homing_speed: default_homing_speed(),
            homing_accel: default_homing_accel(),
        })
        .collect()
}

fn default_speed_scale() -> f64 { 1.0 }
fn default_base_speed() -> f64 { 500.0 }
fn default_base_accel() -> f64 { 150.0 }
fn default_baud() -> u32 { 500000 }
fn default_reply_timeout_ms() -> u64 { 500 }
fn default_encoder_resolution() -> u32 { 16384 }
fn default_direction() -> i8 { 1 }
fn default_lower_limit() -> f64 { -std::f64::consts::PI }
fn default_upper_limit() -> f64 { std::f64::consts::PI }
fn default_max_speed_rpm() -> u16 { 3000 }
fn default_max_accel() -> u8 { 255 }
fn default_homing_speed() -> u16 { 500 }
fn default_homing_accel() -> u8 { 150 }
fn default_coupled_pair() -> [usize; 2] { [4, 5] }
fn default_loop_hz() -> f64 { 50.0 }
fn default_kp_pos() -> f64 { 2.0 }
fn default_kp_rot() -> f64 { 2.0 }
fn default_rpm_limit() -> u16 { 3000 }
fn default_velocity_accel() -> u8 { 20 }
fn default_active_axes() -> Vec<usize> { (0..AXIS_COUNT).collect() }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                config.validate()?;
                Ok(config)
            }
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}
