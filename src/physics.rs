use crate::config::VehicleConfig;
use crate::vehicle::{TransmissionMode, VehicleState, MS_TO_KMH, REVERSE_GEAR_INDEX, TOP_GEAR_INDEX};
use std::f64::consts::PI;

const SECONDS_PER_HOUR: f64 = 3600.0;
const METERS_PER_KM: f64 = 1000.0;

/// Blend of throttle and engine speed used to interpolate fuel flow.
const FUEL_THROTTLE_WEIGHT: f64 = 0.7;
const FUEL_RPM_WEIGHT: f64 = 0.3;

const HEAT_RPM_REFERENCE: f64 = 5000.0;
const HEAT_RPM_GAIN: f64 = 0.5;
const HEAT_THROTTLE_GAIN: f64 = 0.5;
const COOLING_SPEED_REFERENCE_MS: f64 = 20.0;
const COOLING_GAIN: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forces {
    pub propulsive_n: f64,
    pub drag_n: f64,
    pub rolling_n: f64,
    pub braking_n: f64,
}

impl Forces {
    pub fn net(&self) -> f64 {
        self.propulsive_n - self.drag_n - self.rolling_n - self.braking_n
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutcome {
    pub dt_s: f64,
    pub distance_m: f64,
    pub acceleration_ms2: f64,
    pub fuel_flow_lph: f64,
    pub forces: Forces,
}

/// Advances the continuous quantities of a [`VehicleState`] by one tick.
#[derive(Debug, Clone)]
pub struct PhysicsIntegrator {
    config: VehicleConfig,
}

impl PhysicsIntegrator {
    pub fn new(config: VehicleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Ratio of the gear currently driving the wheels, or `None` when the
    /// driveline is decoupled.
    pub fn active_gear_ratio(&self, state: &VehicleState) -> Option<f64> {
        let ratio = match state.transmission_mode {
            TransmissionMode::Reverse => Some(self.config.gear_ratios[usize::from(REVERSE_GEAR_INDEX)]),
            TransmissionMode::Drive if state.gear_index <= TOP_GEAR_INDEX => {
                Some(self.config.gear_ratios[usize::from(state.gear_index)])
            }
            _ => None,
        };
        ratio.filter(|ratio| *ratio > 0.0)
    }

    pub fn target_rpm(&self, state: &VehicleState) -> u32 {
        if !state.ignition {
            return 0;
        }
        let idle = f64::from(self.config.idle_rpm);
        let Some(ratio) = self.active_gear_ratio(state) else {
            return self.config.idle_rpm;
        };

        let wheel_rev_per_s = state.speed_ms / (2.0 * PI * self.config.wheel_radius_m);
        let rpm = wheel_rev_per_s * ratio * self.config.final_drive_ratio * 60.0;
        rpm.max(idle) as u32
    }

    pub fn update_rpm(&self, state: &mut VehicleState) {
        state.engine_rpm = self.target_rpm(state);
    }

    /// Triangular torque curve around the peak, floored so idle torque is nonzero.
    pub fn engine_torque(&self, rpm: u32, throttle: f64) -> f64 {
        let offset = (f64::from(rpm) - self.config.peak_torque_rpm).abs();
        let curve = self.config.max_torque_nm * (1.0 - offset / self.config.torque_curve_width_rpm);
        throttle * curve.max(self.config.min_torque_nm)
    }

    pub fn forces(&self, state: &VehicleState, torque_nm: f64) -> Forces {
        let c = &self.config;
        let v = state.speed_ms;

        let propulsive_n = if state.ignition && state.transmission_mode.is_in_gear() {
            self.active_gear_ratio(state)
                .map_or(0.0, |ratio| torque_nm * ratio * c.final_drive_ratio / c.wheel_radius_m)
        } else {
            0.0
        };

        Forces {
            propulsive_n,
            drag_n: 0.5 * c.air_density * c.drag_coefficient * c.frontal_area_m2 * v * v,
            rolling_n: c.rolling_resistance * c.mass_kg * c.gravity,
            braking_n: state.brake * c.max_brake_force_n,
        }
    }

    /// Fuel flow in liters per hour; zero with the engine off.
    pub fn fuel_flow(&self, state: &VehicleState) -> f64 {
        if !state.ignition {
            return 0.0;
        }
        let c = &self.config;
        let load = state.throttle * FUEL_THROTTLE_WEIGHT
            + (f64::from(state.engine_rpm) / c.fuel_rpm_reference) * FUEL_RPM_WEIGHT;
        c.idle_fuel_rate_lph + (c.max_fuel_rate_lph - c.idle_fuel_rate_lph) * load
    }

    /// Integrates speed, distance, fuel and temperature. RPM must already be
    /// up to date for this tick.
    pub fn integrate(&self, state: &mut VehicleState, dt_s: f64) -> StepOutcome {
        let torque_nm = self.engine_torque(state.engine_rpm, state.throttle);
        state.engine_torque_nm = torque_nm;

        let forces = self.forces(state, torque_nm);
        let acceleration_ms2 = forces.net() / self.config.mass_kg;
        state.speed_ms = self.next_speed(state, acceleration_ms2, dt_s);

        let distance_m = state.speed_ms * dt_s;
        state.odometer_km += distance_m / METERS_PER_KM;
        state.trip_km += distance_m / METERS_PER_KM;

        let fuel_flow_lph = self.fuel_flow(state);
        self.consume_fuel(state, fuel_flow_lph, dt_s);
        state.fuel_rate_l_per_100km = self.fuel_rate_per_100km(state.speed_ms, fuel_flow_lph);

        self.update_temperature(state);

        debug_assert!(
            state.transmission_mode != TransmissionMode::Park || state.speed_ms == 0.0,
            "Vehicle moving at {} m/s in park",
            state.speed_ms
        );

        StepOutcome {
            dt_s,
            distance_m,
            acceleration_ms2,
            fuel_flow_lph,
            forces,
        }
    }

    fn next_speed(&self, state: &VehicleState, acceleration_ms2: f64, dt_s: f64) -> f64 {
        let mut speed = state.speed_ms + acceleration_ms2 * dt_s;

        match state.transmission_mode {
            TransmissionMode::Park => speed = 0.0,
            // no rolling back while in gear
            TransmissionMode::Drive | TransmissionMode::Reverse if speed < self.config.creep_threshold_ms => {
                speed = 0.0;
            }
            _ => {}
        }

        speed.clamp(0.0, self.config.max_speed_ms)
    }

    /// Carries sub-percent consumption forward so rounding never drifts.
    fn consume_fuel(&self, state: &mut VehicleState, fuel_flow_lph: f64, dt_s: f64) {
        if !state.ignition {
            return;
        }
        state.fuel_accumulator_l += fuel_flow_lph * (dt_s / SECONDS_PER_HOUR);

        let per_percent = self.config.liters_per_percent();
        if state.fuel_accumulator_l >= per_percent {
            state.fuel_level_percent = state.fuel_level_percent.saturating_sub(1);
            state.fuel_accumulator_l -= per_percent;
        }
    }

    pub fn fuel_rate_per_100km(&self, speed_ms: f64, fuel_flow_lph: f64) -> f64 {
        if speed_ms > self.config.min_speed_for_fuel_rate_ms {
            let hours_per_100km = 100.0 / (speed_ms * MS_TO_KMH);
            fuel_flow_lph * hours_per_100km
        } else {
            0.0
        }
    }

    fn update_temperature(&self, state: &mut VehicleState) {
        let ambient = i32::from(self.config.ambient_temp_c);
        let max = i32::from(self.config.max_engine_temp_c);
        let current = i32::from(state.engine_temp_c);

        let next = if state.ignition {
            let heating = (f64::from(state.engine_rpm) / HEAT_RPM_REFERENCE) * HEAT_RPM_GAIN
                + state.throttle * HEAT_THROTTLE_GAIN;
            let cooling = (state.speed_ms / COOLING_SPEED_REFERENCE_MS) * COOLING_GAIN;
            // truncates toward zero, so small net changes are lost
            current + (heating - cooling) as i32
        } else if current > ambient {
            current - 1
        } else {
            current
        };

        state.engine_temp_c = next.clamp(ambient, max) as u8;
    }
}
