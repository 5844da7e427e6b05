//! Vehicle constants and runtime settings.
//!
//! Both structs deserialize from partial JSON: any field left out keeps its default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Highest identifier representable in a 29-bit extended frame.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

pub const DEFAULT_BASE_ID: u32 = 0x100;
pub const DEFAULT_TICK_MS: u64 = 50;
pub const DEFAULT_TCP_PORT: u16 = 8090;
pub const DEFAULT_INTERFACE: &str = "vcan0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Physical constants of the simulated vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub mass_kg: f64,
    pub wheel_radius_m: f64,
    pub final_drive_ratio: f64,
    /// Forward gears at 0..=4, reverse at 5.
    pub gear_ratios: [f64; 6],

    pub drag_coefficient: f64,
    pub frontal_area_m2: f64,
    pub air_density: f64,
    pub rolling_resistance: f64,
    pub gravity: f64,
    pub max_brake_force_n: f64,
    pub max_speed_ms: f64,
    pub creep_threshold_ms: f64,

    pub idle_rpm: u32,
    pub stall_rpm: u32,
    pub max_torque_nm: f64,
    pub min_torque_nm: f64,
    pub peak_torque_rpm: f64,
    pub torque_curve_width_rpm: f64,

    pub idle_fuel_rate_lph: f64,
    pub max_fuel_rate_lph: f64,
    pub fuel_rpm_reference: f64,
    pub tank_capacity_l: f64,
    pub min_fuel_to_start_percent: u8,
    pub min_speed_for_fuel_rate_ms: f64,

    pub ambient_temp_c: u8,
    pub max_engine_temp_c: u8,

    /// Mode changes (other than to neutral) need the vehicle below this speed.
    pub shift_speed_limit_ms: f64,
    pub handbrake_speed_limit_ms: f64,
    pub upshift_rpm: u32,
    pub downshift_rpm: u32,
    /// km/h the vehicle must exceed to leave gear `i` upward.
    pub upshift_speed_kmh: [f64; 4],
    /// km/h the vehicle must drop below to leave gear `i + 1` downward.
    pub downshift_speed_kmh: [f64; 4],

    pub turn_signal_cancel_m: f64,
    pub battery_timeout_s: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            mass_kg: 1950.0,
            wheel_radius_m: 0.3,
            final_drive_ratio: 3.7,
            gear_ratios: [3.5, 2.2, 1.6, 1.2, 0.9, 3.2],
            drag_coefficient: 0.39,
            frontal_area_m2: 2.2,
            air_density: 1.225,
            rolling_resistance: 0.02,
            gravity: 9.81,
            max_brake_force_n: 2000.0,
            max_speed_ms: 60.0,
            creep_threshold_ms: 0.1,
            idle_rpm: 800,
            stall_rpm: 500,
            max_torque_nm: 250.0,
            min_torque_nm: 50.0,
            peak_torque_rpm: 3000.0,
            torque_curve_width_rpm: 4000.0,
            idle_fuel_rate_lph: 0.8,
            max_fuel_rate_lph: 25.0,
            fuel_rpm_reference: 6000.0,
            tank_capacity_l: 50.0,
            min_fuel_to_start_percent: 5,
            min_speed_for_fuel_rate_ms: 1.0,
            ambient_temp_c: 20,
            max_engine_temp_c: 120,
            shift_speed_limit_ms: 0.5,
            handbrake_speed_limit_ms: 8.0,
            upshift_rpm: 3000,
            downshift_rpm: 1500,
            upshift_speed_kmh: [15.0, 30.0, 45.0, 65.0],
            downshift_speed_kmh: [10.0, 25.0, 40.0, 55.0],
            turn_signal_cancel_m: 200.0,
            battery_timeout_s: 300.0,
        }
    }
}

impl VehicleConfig {
    /// Liters of fuel represented by one percentage point of the tank.
    pub fn liters_per_percent(&self) -> f64 {
        self.tank_capacity_l / 100.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mass_kg <= 0.0 {
            return Err(ConfigError::Invalid("mass_kg must be positive".into()));
        }
        if self.wheel_radius_m <= 0.0 {
            return Err(ConfigError::Invalid("wheel_radius_m must be positive".into()));
        }
        if self.tank_capacity_l <= 0.0 {
            return Err(ConfigError::Invalid("tank_capacity_l must be positive".into()));
        }
        if self.torque_curve_width_rpm <= 0.0 {
            return Err(ConfigError::Invalid("torque_curve_width_rpm must be positive".into()));
        }
        if self.ambient_temp_c > self.max_engine_temp_c {
            return Err(ConfigError::Invalid(
                "ambient_temp_c must not exceed max_engine_temp_c".into(),
            ));
        }
        Ok(())
    }
}

/// Runtime settings for the simulator process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub tick_ms: u64,
    pub base_id: u32,
    pub tcp_port: u16,
    /// Interface label written into candump lines.
    pub interface: String,
    pub countdown_s: u8,
    pub vehicle: VehicleConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            base_id: DEFAULT_BASE_ID,
            tcp_port: DEFAULT_TCP_PORT,
            interface: DEFAULT_INTERFACE.to_string(),
            countdown_s: 3,
            vehicle: VehicleConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive".into()));
        }
        let last_id = self.base_id.checked_add(crate::telemetry::SIGNAL_COUNT as u32 - 1);
        match last_id {
            Some(id) if id <= MAX_EXTENDED_ID => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "base_id {:#x} leaves no room for {} signals",
                    self.base_id,
                    crate::telemetry::SIGNAL_COUNT
                )));
            }
        }
        if self.interface.is_empty() {
            return Err(ConfigError::Invalid("interface label must not be empty".into()));
        }
        self.vehicle.validate()
    }
}
