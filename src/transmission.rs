//! Discrete-state logic: selector mode, automatic gear, ignition, signals, battery.

use crate::config::VehicleConfig;
use crate::input::DiscreteRequest;
use crate::vehicle::{TransmissionMode, VehicleState, MS_TO_KMH, REVERSE_GEAR_INDEX, TOP_GEAR_INDEX};
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const MAX_TRANSITIONS_PER_TICK: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    IgnitionOn,
    IgnitionOff,
    ModeChanged { from: TransmissionMode, to: TransmissionMode },
    Shifted { from: u8, to: u8 },
    Stalled,
    HandbrakeApplied,
    LightsToggled { on: bool },
    TripReset,
    SignalsChanged { left: bool, right: bool, hazard: bool },
    SignalsCancelled,
    BatteryDepleted,
}

pub type TransitionList = Vec<Transition, MAX_TRANSITIONS_PER_TICK>;

#[derive(Debug, Clone)]
pub struct TransmissionController {
    config: VehicleConfig,
}

impl TransmissionController {
    pub fn new(config: VehicleConfig) -> Self {
        Self { config }
    }

    /// Applies one operator request. Guarded requests that fail their guard
    /// leave the state untouched and return `None`.
    pub fn apply_request(&self, state: &mut VehicleState, request: DiscreteRequest) -> Option<Transition> {
        match request {
            DiscreteRequest::StartStop => self.toggle_ignition(state),
            DiscreteRequest::SelectDrive => self.select_mode(state, TransmissionMode::Drive),
            DiscreteRequest::SelectReverse => self.select_mode(state, TransmissionMode::Reverse),
            DiscreteRequest::SelectNeutral => self.select_mode(state, TransmissionMode::Neutral),
            DiscreteRequest::SelectPark => self.select_mode(state, TransmissionMode::Park),
            DiscreteRequest::Handbrake => self.apply_handbrake(state),
            DiscreteRequest::ToggleLights => {
                state.backlight_on = !state.backlight_on;
                info!("Lights {}", if state.backlight_on { "on" } else { "off" });
                Some(Transition::LightsToggled { on: state.backlight_on })
            }
            DiscreteRequest::ResetTrip => {
                state.trip_km = 0.0;
                state.fuel_accumulator_l = 0.0;
                info!("Trip reset");
                Some(Transition::TripReset)
            }
            DiscreteRequest::TurnLeft => Some(self.toggle_turn_left(state)),
            DiscreteRequest::TurnRight => Some(self.toggle_turn_right(state)),
            DiscreteRequest::Hazard => Some(self.toggle_hazard(state)),
            // The run flag belongs to the simulator loop.
            DiscreteRequest::Quit => None,
        }
    }

    pub fn apply_requests(&self, state: &mut VehicleState, requests: &[DiscreteRequest]) -> TransitionList {
        let mut transitions = TransitionList::new();
        for &request in requests {
            if let Some(transition) = self.apply_request(state, request) {
                let _ = transitions.push(transition);
            }
        }
        transitions
    }

    fn toggle_ignition(&self, state: &mut VehicleState) -> Option<Transition> {
        if state.ignition {
            state.ignition = false;
            state.speed_ms = 0.0;
            state.engine_rpm = 0;
            info!("Engine stopped");
            return Some(Transition::IgnitionOff);
        }

        let selector_allows = matches!(
            state.transmission_mode,
            TransmissionMode::Park | TransmissionMode::Neutral
        );
        if state.battery_ok && state.fuel_level_percent > self.config.min_fuel_to_start_percent && selector_allows {
            state.ignition = true;
            state.engine_rpm = self.config.idle_rpm;
            state.battery_off_timer_s = 0.0;
            info!("Engine started");
            Some(Transition::IgnitionOn)
        } else {
            debug!(
                battery_ok = state.battery_ok,
                fuel = state.fuel_level_percent,
                mode = ?state.transmission_mode,
                "Start refused"
            );
            None
        }
    }

    fn select_mode(&self, state: &mut VehicleState, target: TransmissionMode) -> Option<Transition> {
        let from = state.transmission_mode;
        let slow_enough = state.speed_ms < self.config.shift_speed_limit_ms;

        let allowed = match target {
            TransmissionMode::Drive | TransmissionMode::Reverse => slow_enough && from != target,
            TransmissionMode::Neutral => true,
            TransmissionMode::Park => slow_enough,
        };
        if !allowed {
            debug!(?from, ?target, speed_ms = state.speed_ms, "Mode change refused");
            return None;
        }

        state.transmission_mode = target;
        match target {
            TransmissionMode::Drive => state.gear_index = 0,
            TransmissionMode::Reverse => state.gear_index = REVERSE_GEAR_INDEX,
            TransmissionMode::Park => state.speed_ms = 0.0,
            TransmissionMode::Neutral => {}
        }

        if from == target {
            return None;
        }
        info!("Shifted to {:?}", target);
        Some(Transition::ModeChanged { from, to: target })
    }

    fn apply_handbrake(&self, state: &mut VehicleState) -> Option<Transition> {
        if state.speed_ms < self.config.handbrake_speed_limit_ms {
            state.speed_ms = 0.0;
            info!("Handbrake engaged");
            Some(Transition::HandbrakeApplied)
        } else {
            debug!(speed_ms = state.speed_ms, "Handbrake ignored at speed");
            None
        }
    }

    fn toggle_turn_left(&self, state: &mut VehicleState) -> Transition {
        if state.hazard {
            state.hazard = false;
            state.turn_left = false;
        } else {
            state.turn_left = !state.turn_left;
        }
        state.turn_right = false;
        state.turn_signal_distance_m = 0.0;
        Self::signals_changed(state)
    }

    fn toggle_turn_right(&self, state: &mut VehicleState) -> Transition {
        if state.hazard {
            state.hazard = false;
            state.turn_right = false;
        } else {
            state.turn_right = !state.turn_right;
        }
        state.turn_left = false;
        state.turn_signal_distance_m = 0.0;
        Self::signals_changed(state)
    }

    /// Toggles the left lamp and has the right lamp follow it.
    fn toggle_hazard(&self, state: &mut VehicleState) -> Transition {
        state.hazard = !state.left_lamp();
        state.turn_left = false;
        state.turn_right = false;
        state.turn_signal_distance_m = 0.0;
        Self::signals_changed(state)
    }

    fn signals_changed(state: &VehicleState) -> Transition {
        Transition::SignalsChanged {
            left: state.turn_left,
            right: state.turn_right,
            hazard: state.hazard,
        }
    }

    /// One automatic up- or downshift at most; only in drive with the engine running.
    pub fn auto_shift(&self, state: &mut VehicleState) -> Option<Transition> {
        if !state.ignition || state.transmission_mode != TransmissionMode::Drive {
            return None;
        }

        let gear = state.gear_index.min(TOP_GEAR_INDEX);
        let speed_kmh = state.speed_ms * MS_TO_KMH;

        let new_gear = if state.engine_rpm > self.config.upshift_rpm && gear < TOP_GEAR_INDEX {
            if speed_kmh > self.config.upshift_speed_kmh[usize::from(gear)] {
                gear + 1
            } else {
                gear
            }
        } else if state.engine_rpm < self.config.downshift_rpm && gear > 0 {
            if speed_kmh < self.config.downshift_speed_kmh[usize::from(gear - 1)] {
                gear - 1
            } else {
                gear
            }
        } else {
            gear
        };

        if new_gear == state.gear_index {
            return None;
        }

        let from = state.gear_index;
        state.gear_index = new_gear;
        info!("Shifted to gear {}", new_gear + 1);
        Some(Transition::Shifted { from, to: new_gear })
    }

    /// Bookkeeping that follows integration: signal auto-cancel, battery
    /// timer and the stall check, in that order.
    pub fn post_step(&self, state: &mut VehicleState, distance_m: f64, dt_s: f64) -> TransitionList {
        let mut transitions = TransitionList::new();

        if let Some(transition) = self.update_turn_signals(state, distance_m) {
            let _ = transitions.push(transition);
        }
        if let Some(transition) = self.update_battery(state, dt_s) {
            let _ = transitions.push(transition);
        }
        if let Some(transition) = self.check_stall(state) {
            let _ = transitions.push(transition);
        }

        transitions
    }

    fn update_turn_signals(&self, state: &mut VehicleState, distance_m: f64) -> Option<Transition> {
        if !(state.turn_left || state.turn_right || state.hazard) {
            state.turn_signal_distance_m = 0.0;
            return None;
        }

        state.turn_signal_distance_m += distance_m;
        if state.turn_signal_distance_m > self.config.turn_signal_cancel_m {
            state.turn_left = false;
            state.turn_right = false;
            state.hazard = false;
            state.turn_signal_distance_m = 0.0;
            info!("Turn signals cancelled");
            return Some(Transition::SignalsCancelled);
        }
        None
    }

    fn update_battery(&self, state: &mut VehicleState, dt_s: f64) -> Option<Transition> {
        if state.ignition {
            state.battery_ok = true;
            state.battery_off_timer_s = 0.0;
            return None;
        }

        state.battery_off_timer_s += dt_s;
        if state.battery_ok && state.battery_off_timer_s > self.config.battery_timeout_s {
            state.battery_ok = false;
            warn!(off_for_s = state.battery_off_timer_s, "Battery depleted");
            return Some(Transition::BatteryDepleted);
        }
        None
    }

    /// Forced ignition-off when the engine drops below stall speed in gear.
    pub fn check_stall(&self, state: &mut VehicleState) -> Option<Transition> {
        if state.ignition
            && state.engine_rpm < self.config.stall_rpm
            && state.transmission_mode != TransmissionMode::Neutral
        {
            state.ignition = false;
            state.speed_ms = 0.0;
            state.engine_rpm = 0;
            warn!("Engine stalled");
            return Some(Transition::Stalled);
        }
        None
    }
}
