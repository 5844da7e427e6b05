use vehbus::dashboard::{pedal_bar, render_panel, Panel, SnapshotConsumer, TerminalDashboard};
use vehbus::telemetry::{DashboardReadout, TelemetryEncoder};
use vehbus::vehicle::{TransmissionMode, VehicleState};

fn plain() {
    colored::control::set_override(false);
}

fn moving_state() -> VehicleState {
    let mut state = VehicleState::new();
    state.ignition = true;
    state.speed_ms = 10.0;
    state.engine_rpm = 4122;
    state.transmission_mode = TransmissionMode::Drive;
    state.gear_index = 1;
    state.odometer_km = 12.34;
    state.throttle = 0.5;
    state
}

#[cfg(test)]
mod panel_tests {
    use super::*;

    #[test]
    fn test_gear_labels() {
        let mut state = VehicleState::new();
        assert_eq!(Panel::from(&state.view()).gear_label(), "PARK");

        state.transmission_mode = TransmissionMode::Reverse;
        assert_eq!(Panel::from(&state.view()).gear_label(), "REVERSE");

        state.transmission_mode = TransmissionMode::Drive;
        state.gear_index = 2;
        assert_eq!(Panel::from(&state.view()).gear_label(), "DRIVE 3");

        assert_eq!(Panel::from(&DashboardReadout::default()).gear_label(), "UNKNOWN");
    }

    #[test]
    fn test_panel_matches_decoded_frames() {
        let state = moving_state();
        let mut readout = DashboardReadout::default();
        for frame in TelemetryEncoder::default().encode(&state.view()) {
            readout.apply(&frame).unwrap();
        }

        let local = Panel::from(&state.view());
        let remote = Panel::from(&readout);

        assert_eq!(remote.speed_kmh, local.speed_kmh);
        assert_eq!(remote.rpm, local.rpm);
        assert_eq!(remote.gear_label(), local.gear_label());
        assert_eq!(remote.pedals, None);
        assert_eq!(local.pedals, Some((0.5, 0.0)));
    }

    #[test]
    fn test_pedal_bar() {
        assert_eq!(pedal_bar(0.0), format!("[{}]   0%", " ".repeat(20)));
        assert_eq!(pedal_bar(0.5), format!("[{}{}]  50%", "=".repeat(10), " ".repeat(10)));
        assert_eq!(pedal_bar(1.0), format!("[{}] 100%", "=".repeat(20)));
    }
}

#[cfg(test)]
mod rendering_tests {
    use super::*;

    #[test]
    fn test_render_panel_text() {
        plain();
        let text = render_panel(&Panel::from(&moving_state().view()));

        assert!(text.contains("36 km/h"));
        assert!(text.contains("4122 rpm"));
        assert!(text.contains("DRIVE 2"));
        assert!(text.contains("12.3 km"));
        assert!(text.contains("Throttle:"));
    }

    #[test]
    fn test_readout_panel_has_no_pedals() {
        plain();
        let text = render_panel(&Panel::from(&DashboardReadout::default()));

        assert!(!text.contains("Throttle:"));
    }

    #[test]
    fn test_terminal_dashboard_clears_before_drawing() {
        plain();
        let mut dashboard = TerminalDashboard::new(Vec::<u8>::new());

        dashboard.render(&moving_state().view());
        dashboard.render_readout(&DashboardReadout::default());

        assert_eq!(dashboard.frames_rendered(), 2);
        let output = String::from_utf8(dashboard.into_inner()).unwrap();
        assert!(output.starts_with("\x1b[2J\x1b[H"));
        assert_eq!(output.matches("\x1b[2J\x1b[H").count(), 2);
    }
}
