//! The tick loop owner.
//!
//! A [`VehicleSimulator`] holds the only copy of the [`VehicleState`] and
//! runs one fixed pipeline per tick: resolve commands, apply discrete
//! requests, recompute RPM, shift, integrate, post-step bookkeeping, encode
//! and publish. Nothing here blocks; pacing is the caller's job.

use crate::command_source::CommandSource;
use crate::config::{ConfigError, SimConfig};
use crate::input::{CommandToken, InputResolver, PedalIntent};
use crate::physics::PhysicsIntegrator;
use crate::telemetry::{FrameSet, TelemetryEncoder};
use crate::transmission::{TransitionList, TransmissionController};
use crate::transport::{TransportError, TransportSink};
use crate::vehicle::{VehicleState, VehicleStateView};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Transmission failures are reported once per this many.
const TX_ERROR_LOG_INTERVAL: u64 = 10;

/// Failures that stop the simulator before its first tick.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimStats {
    pub ticks: u64,
    pub frames_sent: u64,
    pub tx_errors: u64,
    pub ignored_tokens: u64,
}

/// Everything one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub dt_s: f64,
    pub frames: FrameSet,
    pub transitions: TransitionList,
    pub tx_errors: u32,
    /// Set on the tick that consumed a quit command.
    pub quit: bool,
}

pub struct VehicleSimulator {
    config: SimConfig,
    state: VehicleState,
    resolver: InputResolver,
    gearbox: TransmissionController,
    physics: PhysicsIntegrator,
    encoder: TelemetryEncoder,
    stats: SimStats,
    running: bool,
}

impl VehicleSimulator {
    pub fn new(config: &SimConfig) -> Self {
        Self::with_state(config, VehicleState::new())
    }

    /// Starts from an arbitrary state instead of the power-on defaults.
    pub fn with_state(config: &SimConfig, state: VehicleState) -> Self {
        Self {
            config: config.clone(),
            state,
            resolver: InputResolver::new(),
            gearbox: TransmissionController::new(config.vehicle.clone()),
            physics: PhysicsIntegrator::new(config.vehicle.clone()),
            encoder: TelemetryEncoder::new(config.base_id),
            stats: SimStats::default(),
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        if self.running {
            info!("Simulator stopping");
        }
        self.running = false;
    }

    /// Polls the source, advances by the wall-clock time since the previous
    /// tick and publishes the resulting frames.
    pub fn run_tick(
        &mut self,
        source: &mut dyn CommandSource,
        sink: &mut dyn TransportSink,
        now: Instant,
    ) -> TickReport {
        let commands = source.poll_commands();
        let dt_s = self.state.advance_clock(now);
        let mut report = self.step(&commands, dt_s);
        report.tx_errors = self.publish(&report.frames, sink);
        report
    }

    /// Advances the vehicle by `dt_s` seconds under `commands` without
    /// touching any sink.
    pub fn step(&mut self, commands: &[CommandToken], dt_s: f64) -> TickReport {
        let previous = PedalIntent {
            throttle: self.state.throttle,
            brake: self.state.brake,
        };
        let resolution = self.resolver.resolve(commands.iter().copied(), previous);
        self.state.throttle = resolution.intent.throttle;
        self.state.brake = resolution.intent.brake;
        self.stats.ignored_tokens += resolution.ignored as u64;

        let mut transitions = self.gearbox.apply_requests(&mut self.state, &resolution.requests);
        let quit = resolution.quit_requested();
        if quit {
            self.stop();
        }

        self.physics.update_rpm(&mut self.state);
        if let Some(shift) = self.gearbox.auto_shift(&mut self.state) {
            let _ = transitions.push(shift);
        }

        let outcome = self.physics.integrate(&mut self.state, dt_s);
        for transition in self.gearbox.post_step(&mut self.state, outcome.distance_m, dt_s) {
            let _ = transitions.push(transition);
        }

        debug_assert_eq!(self.state.check_invariants(&self.config.vehicle), Ok(()));

        self.stats.ticks += 1;
        let frames = self.encoder.encode(&self.state.view());

        TickReport {
            dt_s,
            frames,
            transitions,
            tx_errors: 0,
            quit,
        }
    }

    /// Sends every frame once; failures are counted, never retried.
    pub fn publish(&mut self, frames: &FrameSet, sink: &mut dyn TransportSink) -> u32 {
        let mut failed = 0;
        for frame in frames {
            match sink.send(frame.id, &frame.data) {
                Ok(()) => self.stats.frames_sent += 1,
                Err(e) => {
                    failed += 1;
                    self.stats.tx_errors += 1;
                    if self.stats.tx_errors % TX_ERROR_LOG_INTERVAL == 1 {
                        warn!(
                            sink = sink.name(),
                            total = self.stats.tx_errors,
                            "TX error on {:#05x}: {}",
                            frame.id,
                            e
                        );
                    }
                }
            }
        }
        if let Err(e) = sink.flush() {
            debug!(sink = sink.name(), "Flush failed: {}", e);
        }
        failed
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn snapshot(&self) -> VehicleStateView {
        self.state.view()
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn encoder(&self) -> &TelemetryEncoder {
        &self.encoder
    }
}
