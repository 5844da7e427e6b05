//! # Vehicle Bus Simulator
//!
//! A single-vehicle longitudinal dynamics simulation that publishes its state
//! as fixed-format telemetry frames on a bus-style protocol, driven by
//! discrete operator commands.
//!
//! ## Features
//!
//! - **Vehicle model**: speed, engine RPM, torque curve, drag, rolling resistance and braking
//! - **Automatic transmission**: P/R/N/D selector with guarded mode changes and 5-speed auto shifting
//! - **Ignition and body**: start/stop with stall detection, turn signals with auto-cancel, hazard, lights, battery drain
//! - **Telemetry**: 14 little-endian signal frames per tick, plus a decoder for cluster displays
//! - **Transports**: TCP broadcast, `candump`-style text and trace logging
//! - **Embedded-friendly**: bounded buffers for payloads, frame sets and command queues
//!
//! ## Quick Start
//!
//! ```rust
//! use vehbus::{CommandToken, RecordingSink, SimConfig, VehicleSimulator};
//!
//! let mut sim = VehicleSimulator::new(&SimConfig::default());
//! let mut sink = RecordingSink::new();
//!
//! let report = sim.step(&[CommandToken::StartStop], 0.05);
//! sim.publish(&report.frames, &mut sink);
//!
//! assert!(sim.state().ignition);
//! assert_eq!(sink.frames.len(), 14);
//! ```
//!
//! ## Architecture
//!
//! - [`simulator`] - Tick loop owner and public API
//! - [`input`] - Command tokens, key decoding and pedal resolution
//! - [`transmission`] - Selector, gears, ignition, signals and battery
//! - [`physics`] - Longitudinal dynamics, fuel and temperature
//! - [`telemetry`] - Frame encoding and decoding
//! - [`transport`] - Frame sinks
//! - [`command_source`] - Non-blocking command producers
//! - [`dashboard`] - Terminal cluster display
//! - [`config`] - Vehicle constants and runtime settings

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod command_source;
pub mod config;
pub mod dashboard;
pub mod input;
pub mod physics;
pub mod simulator;
pub mod telemetry;
pub mod transmission;
pub mod transport;
pub mod vehicle;

// Re-export main public types for convenience
pub use command_source::{ChannelCommandSource, CommandSource, ScriptedCommandSource};
pub use config::{SimConfig, VehicleConfig};
pub use input::CommandToken;
pub use simulator::{SimError, SimStats, TickReport, VehicleSimulator};
pub use telemetry::{DashboardReadout, Frame, TelemetryEncoder};
pub use transport::{BroadcastSink, CandumpSink, LogSink, RecordingSink, TransportError, TransportSink};
pub use vehicle::{TransmissionMode, VehicleState, VehicleStateView};
