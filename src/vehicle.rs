use crate::config::VehicleConfig;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const INITIAL_FUEL_PERCENT: u8 = 75;
pub const REVERSE_GEAR_INDEX: u8 = 5;
pub const TOP_GEAR_INDEX: u8 = 4;
pub const MS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionMode {
    Park,
    Reverse,
    Neutral,
    Drive,
}

impl TransmissionMode {
    /// Letter shown on the selector and carried on the wire.
    pub fn letter(self) -> char {
        match self {
            TransmissionMode::Park => 'P',
            TransmissionMode::Reverse => 'R',
            TransmissionMode::Neutral => 'N',
            TransmissionMode::Drive => 'D',
        }
    }

    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'P' => Some(TransmissionMode::Park),
            b'R' => Some(TransmissionMode::Reverse),
            b'N' => Some(TransmissionMode::Neutral),
            b'D' => Some(TransmissionMode::Drive),
            _ => None,
        }
    }

    /// Modes with the driveline coupled to the wheels.
    pub fn is_in_gear(self) -> bool {
        matches!(self, TransmissionMode::Drive | TransmissionMode::Reverse)
    }
}

/// Every physical and logical quantity of the vehicle.
///
/// Owned by the tick loop; only the transmission state machine and the
/// physics integrator mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub ignition: bool,
    pub speed_ms: f64,
    pub engine_rpm: u32,
    pub engine_torque_nm: f64,
    pub transmission_mode: TransmissionMode,
    pub gear_index: u8,

    pub fuel_level_percent: u8,
    pub fuel_accumulator_l: f64,
    pub fuel_rate_l_per_100km: f64,
    pub engine_temp_c: u8,

    pub odometer_km: f64,
    pub trip_km: f64,

    pub turn_left: bool,
    pub turn_right: bool,
    pub hazard: bool,
    pub turn_signal_distance_m: f64,

    pub battery_ok: bool,
    pub battery_off_timer_s: f64,
    pub backlight_on: bool,

    pub throttle: f64,
    pub brake: f64,

    pub last_tick_time: Option<Instant>,
}

impl VehicleState {
    pub fn new() -> Self {
        Self {
            ignition: false,
            speed_ms: 0.0,
            engine_rpm: 0,
            engine_torque_nm: 0.0,
            transmission_mode: TransmissionMode::Park,
            gear_index: 0,
            fuel_level_percent: INITIAL_FUEL_PERCENT,
            fuel_accumulator_l: 0.0,
            fuel_rate_l_per_100km: 0.0,
            engine_temp_c: VehicleConfig::default().ambient_temp_c,
            odometer_km: 0.0,
            trip_km: 0.0,
            turn_left: false,
            turn_right: false,
            hazard: false,
            turn_signal_distance_m: 0.0,
            battery_ok: true,
            battery_off_timer_s: 0.0,
            backlight_on: false,
            throttle: 0.0,
            brake: 0.0,
            last_tick_time: None,
        }
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_ms * MS_TO_KMH
    }

    pub fn left_lamp(&self) -> bool {
        self.turn_left || self.hazard
    }

    pub fn right_lamp(&self) -> bool {
        self.turn_right || self.hazard
    }

    /// Seconds elapsed since the previous tick; zero on the first one.
    pub fn advance_clock(&mut self, now: Instant) -> f64 {
        let dt_s = match self.last_tick_time {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick_time = Some(now);
        dt_s
    }

    pub fn view(&self) -> VehicleStateView {
        VehicleStateView::from(self)
    }

    /// Checks the invariants that must hold after every tick.
    pub fn check_invariants(&self, config: &VehicleConfig) -> Result<(), &'static str> {
        if self.transmission_mode == TransmissionMode::Park && self.speed_ms != 0.0 {
            return Err("vehicle moving while in park");
        }
        if self.turn_left && self.turn_right {
            return Err("both turn signals active");
        }
        if self.engine_temp_c < config.ambient_temp_c || self.engine_temp_c > config.max_engine_temp_c {
            return Err("engine temperature out of range");
        }
        if self.fuel_level_percent > 100 {
            return Err("fuel level above 100%");
        }
        if self.speed_ms < 0.0 || self.speed_ms > config.max_speed_ms {
            return Err("speed out of range");
        }
        if !(0.0..=1.0).contains(&self.throttle) || !(0.0..=1.0).contains(&self.brake) {
            return Err("pedal intent out of range");
        }
        Ok(())
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy of the vehicle state handed to display consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStateView {
    pub ignition: bool,
    pub speed_ms: f64,
    pub speed_kmh: f64,
    pub engine_rpm: u32,
    pub engine_torque_nm: f64,
    pub transmission_mode: TransmissionMode,
    pub gear_index: u8,
    pub fuel_level_percent: u8,
    pub fuel_rate_l_per_100km: f64,
    pub engine_temp_c: u8,
    pub odometer_km: f64,
    pub trip_km: f64,
    pub turn_left: bool,
    pub turn_right: bool,
    pub hazard: bool,
    pub left_lamp: bool,
    pub right_lamp: bool,
    pub battery_ok: bool,
    pub backlight_on: bool,
    pub throttle: f64,
    pub brake: f64,
}

impl From<&VehicleState> for VehicleStateView {
    fn from(state: &VehicleState) -> Self {
        Self {
            ignition: state.ignition,
            speed_ms: state.speed_ms,
            speed_kmh: state.speed_kmh(),
            engine_rpm: state.engine_rpm,
            engine_torque_nm: state.engine_torque_nm,
            transmission_mode: state.transmission_mode,
            gear_index: state.gear_index,
            fuel_level_percent: state.fuel_level_percent,
            fuel_rate_l_per_100km: state.fuel_rate_l_per_100km,
            engine_temp_c: state.engine_temp_c,
            odometer_km: state.odometer_km,
            trip_km: state.trip_km,
            turn_left: state.turn_left,
            turn_right: state.turn_right,
            hazard: state.hazard,
            left_lamp: state.left_lamp(),
            right_lamp: state.right_lamp(),
            battery_ok: state.battery_ok,
            backlight_on: state.backlight_on,
            throttle: state.throttle,
            brake: state.brake,
        }
    }
}

impl VehicleStateView {
    /// Selector text as shown on the cluster, e.g. `D2` or `P`.
    pub fn gear_display(&self) -> String {
        match self.transmission_mode {
            TransmissionMode::Drive => format!("D{}", self.gear_index + 1),
            mode => mode.letter().to_string(),
        }
    }
}
