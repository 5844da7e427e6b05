//! Terminal cluster display.
//!
//! The simulator renders from its own snapshot; the standalone dashboard
//! renders from what it decoded off the bus. Both go through [`Panel`].

use crate::telemetry::DashboardReadout;
use crate::vehicle::{TransmissionMode, VehicleStateView};
use colored::*;
use std::fmt::Write as _;
use std::io::{self, Write};
use tracing::debug;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const BAR_WIDTH: usize = 20;
const PANEL_WIDTH: usize = 44;

/// Consumer of per-tick snapshots. Must not feed anything back into the loop.
pub trait SnapshotConsumer {
    fn render(&mut self, view: &VehicleStateView);
}

/// Values shown on the cluster, already in display units.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub ignition: bool,
    pub speed_kmh: u32,
    pub rpm: u32,
    pub mode: Option<TransmissionMode>,
    /// One-based gear number shown next to `DRIVE`.
    pub gear: u8,
    pub fuel_level_percent: u8,
    pub fuel_rate_l_per_100km: f64,
    pub engine_temp_c: u8,
    pub odometer_km: f64,
    pub trip_km: f64,
    pub left_lamp: bool,
    pub right_lamp: bool,
    pub battery_ok: bool,
    pub backlight_on: bool,
    /// Throttle and brake; only the simulator side knows them.
    pub pedals: Option<(f64, f64)>,
}

impl From<&VehicleStateView> for Panel {
    fn from(view: &VehicleStateView) -> Self {
        Self {
            ignition: view.ignition,
            speed_kmh: view.speed_kmh as u32,
            rpm: view.engine_rpm,
            mode: Some(view.transmission_mode),
            gear: view.gear_index.wrapping_add(1),
            fuel_level_percent: view.fuel_level_percent,
            fuel_rate_l_per_100km: view.fuel_rate_l_per_100km,
            engine_temp_c: view.engine_temp_c,
            odometer_km: view.odometer_km,
            trip_km: view.trip_km,
            left_lamp: view.left_lamp,
            right_lamp: view.right_lamp,
            battery_ok: view.battery_ok,
            backlight_on: view.backlight_on,
            pedals: Some((view.throttle, view.brake)),
        }
    }
}

impl From<&DashboardReadout> for Panel {
    fn from(readout: &DashboardReadout) -> Self {
        Self {
            ignition: readout.ignition,
            speed_kmh: u32::from(readout.speed_kmh),
            rpm: u32::from(readout.rpm),
            mode: readout.transmission_mode,
            gear: readout.gear_position,
            fuel_level_percent: readout.fuel_level_percent,
            fuel_rate_l_per_100km: readout.fuel_rate_l_per_100km,
            engine_temp_c: readout.engine_temp_c,
            odometer_km: readout.odometer_km,
            trip_km: readout.trip_km,
            left_lamp: readout.turn_left,
            right_lamp: readout.turn_right,
            battery_ok: readout.battery_ok,
            backlight_on: readout.backlight_on,
            pedals: None,
        }
    }
}

impl Panel {
    pub fn gear_label(&self) -> String {
        match self.mode {
            Some(TransmissionMode::Park) => "PARK".to_string(),
            Some(TransmissionMode::Reverse) => "REVERSE".to_string(),
            Some(TransmissionMode::Neutral) => "NEUTRAL".to_string(),
            Some(TransmissionMode::Drive) => format!("DRIVE {}", self.gear),
            None => "UNKNOWN".to_string(),
        }
    }
}

fn on_off(on: bool) -> ColoredString {
    if on {
        "ON".bright_green()
    } else {
        "OFF".dimmed()
    }
}

fn lamp(on: bool) -> ColoredString {
    if on {
        "ON".bright_yellow().bold()
    } else {
        "OFF".dimmed()
    }
}

fn value(text: String) -> ColoredString {
    text.as_str().bright_white()
}

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {:<13}{}", label, value);
}

/// `[====      ]` style bar for a value in `[0, 1]`.
pub fn pedal_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
    format!("[{}{}] {:>3}%", "=".repeat(filled), " ".repeat(BAR_WIDTH - filled), (fraction * 100.0) as u32)
}

/// Renders the panel without any cursor control.
pub fn render_panel(panel: &Panel) -> String {
    let rule = "═".repeat(PANEL_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule.as_str().bright_blue());
    let _ = writeln!(out, "  {}", "VEHICLE SIMULATOR".bright_blue().bold());
    let _ = writeln!(out, "{}", rule.as_str().bright_blue());

    row(&mut out, "Engine:", on_off(panel.ignition));
    row(&mut out, "Speed:", value(format!("{} km/h", panel.speed_kmh)));
    row(&mut out, "RPM:", value(format!("{} rpm", panel.rpm)));
    row(&mut out, "Gear:", panel.gear_label().as_str().bright_cyan());
    row(&mut out, "Fuel:", value(format!("{}%", panel.fuel_level_percent)));
    row(&mut out, "Fuel Rate:", value(format!("{:.1} L/100km", panel.fuel_rate_l_per_100km)));
    row(&mut out, "Engine Temp:", value(format!("{}°C", panel.engine_temp_c)));
    row(&mut out, "Odometer:", value(format!("{:.1} km", panel.odometer_km)));
    row(&mut out, "Trip:", value(format!("{:.1} km", panel.trip_km)));
    row(&mut out, "Turn Left:", lamp(panel.left_lamp));
    row(&mut out, "Turn Right:", lamp(panel.right_lamp));
    row(
        &mut out,
        "Battery:",
        if panel.battery_ok { "OK".bright_green() } else { "LOW".bright_red().bold() },
    );
    row(&mut out, "Backlight:", on_off(panel.backlight_on));

    let _ = writeln!(out, "{}", rule.as_str().bright_blue());
    let _ = writeln!(out, "  A accelerate   B brake     S start/stop");
    let _ = writeln!(out, "  D drive        R reverse   N neutral   P park");
    let _ = writeln!(out, "  arrows signals space handbrake");
    let _ = writeln!(out, "  L lights       T trip      Q quit");
    let _ = writeln!(out, "{}", rule.as_str().bright_blue());

    if let Some((throttle, brake)) = panel.pedals {
        let _ = writeln!(out, "Throttle: {}   Brake: {}", pedal_bar(throttle), pedal_bar(brake));
    }
    out
}

/// Clears the terminal and redraws the panel on every render.
pub struct TerminalDashboard<W: Write> {
    out: W,
    frames_rendered: u64,
}

impl TerminalDashboard<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDashboard<W> {
    pub fn new(out: W) -> Self {
        Self { out, frames_rendered: 0 }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render_panel(&mut self, panel: &Panel) {
        let text = render_panel(panel);
        let result = write!(self.out, "{}{}", CLEAR_SCREEN, text).and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.frames_rendered += 1,
            Err(e) => debug!("Dashboard write failed: {}", e),
        }
    }

    pub fn render_readout(&mut self, readout: &DashboardReadout) {
        self.render_panel(&Panel::from(readout));
    }
}

impl<W: Write> SnapshotConsumer for TerminalDashboard<W> {
    fn render(&mut self, view: &VehicleStateView) {
        self.render_panel(&Panel::from(view));
    }
}
