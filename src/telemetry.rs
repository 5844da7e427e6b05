//! Fixed-format telemetry frames.
//!
//! Every tick the encoder produces one frame per [`Signal`], identifiers
//! `base_id + offset`, multi-byte fields little-endian. The decoder side
//! ([`DashboardReadout`]) is what a cluster display runs against the bus.

use crate::config::DEFAULT_BASE_ID;
use crate::vehicle::{TransmissionMode, VehicleStateView};
use arrayvec::ArrayVec;
use core::fmt;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;

pub const SIGNAL_COUNT: usize = 14;
pub const MAX_PAYLOAD_LEN: usize = 8;

pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;
pub type FrameSet = ArrayVec<Frame, SIGNAL_COUNT>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Speed,
    Rpm,
    FuelLevel,
    EngineTemp,
    TurnLeft,
    TurnRight,
    Battery,
    Backlight,
    TransmissionMode,
    Ignition,
    Odometer,
    Trip,
    FuelRate,
    GearPosition,
}

impl Signal {
    pub const ALL: [Signal; SIGNAL_COUNT] = [
        Signal::Speed,
        Signal::Rpm,
        Signal::FuelLevel,
        Signal::EngineTemp,
        Signal::TurnLeft,
        Signal::TurnRight,
        Signal::Battery,
        Signal::Backlight,
        Signal::TransmissionMode,
        Signal::Ignition,
        Signal::Odometer,
        Signal::Trip,
        Signal::FuelRate,
        Signal::GearPosition,
    ];

    pub const fn offset(self) -> u32 {
        match self {
            Signal::Speed => 0x00,
            Signal::Rpm => 0x01,
            Signal::FuelLevel => 0x02,
            Signal::EngineTemp => 0x03,
            Signal::TurnLeft => 0x04,
            Signal::TurnRight => 0x05,
            Signal::Battery => 0x06,
            Signal::Backlight => 0x07,
            Signal::TransmissionMode => 0x08,
            Signal::Ignition => 0x09,
            Signal::Odometer => 0x0A,
            Signal::Trip => 0x0B,
            Signal::FuelRate => 0x0C,
            Signal::GearPosition => 0x0D,
        }
    }

    /// Payload width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Signal::Odometer => 4,
            Signal::Speed | Signal::Rpm | Signal::Trip | Signal::FuelRate => 2,
            _ => 1,
        }
    }

    pub fn from_offset(offset: u32) -> Option<Self> {
        Signal::ALL.iter().copied().find(|signal| signal.offset() == offset)
    }
}

const_assert!(Signal::Odometer.width() <= MAX_PAYLOAD_LEN);
const_assert!(Signal::GearPosition.offset() as usize == SIGNAL_COUNT - 1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u32,
    pub data: Payload,
}

impl Frame {
    /// `None` when the payload does not fit in a classic frame.
    pub fn new(id: u32, payload: &[u8]) -> Option<Self> {
        Payload::from_slice(payload).ok().map(|data| Self { id, data })
    }

    /// Renders the frame the way `candump` prints it.
    pub fn to_candump(&self, interface: &str) -> String {
        let mut line = format!("  {}  {:03X}   [{}] ", interface, self.id, self.data.len());
        for byte in &self.data {
            line.push_str(&format!(" {:02X}", byte));
        }
        line
    }

    /// Parses a `candump` line, e.g. `  vcan0  100   [2]  24 00`.
    pub fn parse_candump(line: &str) -> Result<Self, DecodeError> {
        let malformed = || DecodeError::MalformedLine(line.trim().to_string());
        let parts: alloc::vec::Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(malformed());
        }

        let id = u32::from_str_radix(parts[1], 16).map_err(|_| malformed())?;
        let dlc: usize = parts[2]
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|len| len.parse().ok())
            .ok_or_else(malformed)?;
        if dlc > MAX_PAYLOAD_LEN || parts.len() < 3 + dlc {
            return Err(malformed());
        }

        let mut data = Payload::new();
        for byte in &parts[3..3 + dlc] {
            let value = u8::from_str_radix(byte, 16).map_err(|_| malformed())?;
            let _ = data.push(value);
        }
        Ok(Self { id, data })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X}#", self.id)?;
        for byte in &self.data {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame {id:#x} carries {actual} bytes, expected {expected}")]
    PayloadTooShort { id: u32, expected: usize, actual: usize },

    #[error("invalid transmission mode byte {0:#04x}")]
    InvalidMode(u8),

    #[error("malformed frame line: {0}")]
    MalformedLine(String),
}

/// Serializes vehicle snapshots into the 14 signal frames.
#[derive(Debug, Clone)]
pub struct TelemetryEncoder {
    base_id: u32,
}

impl TelemetryEncoder {
    pub fn new(base_id: u32) -> Self {
        Self { base_id }
    }

    pub fn base_id(&self) -> u32 {
        self.base_id
    }

    pub fn id_of(&self, signal: Signal) -> u32 {
        self.base_id + signal.offset()
    }

    pub fn encode(&self, view: &VehicleStateView) -> FrameSet {
        Signal::ALL
            .iter()
            .map(|&signal| Frame {
                id: self.id_of(signal),
                data: Self::encode_signal(signal, view),
            })
            .collect()
    }

    pub fn encode_signal(signal: Signal, view: &VehicleStateView) -> Payload {
        let data = match signal {
            Signal::Speed => payload(&(view.speed_kmh as u64 as u16).to_le_bytes()),
            Signal::Rpm => payload(&(view.engine_rpm as u16).to_le_bytes()),
            Signal::FuelLevel => payload(&[view.fuel_level_percent]),
            Signal::EngineTemp => payload(&[view.engine_temp_c]),
            Signal::TurnLeft => payload(&[u8::from(view.left_lamp)]),
            Signal::TurnRight => payload(&[u8::from(view.right_lamp)]),
            Signal::Battery => payload(&[u8::from(view.battery_ok)]),
            Signal::Backlight => payload(&[u8::from(view.backlight_on)]),
            Signal::TransmissionMode => payload(&[view.transmission_mode.letter() as u8]),
            Signal::Ignition => payload(&[u8::from(view.ignition)]),
            Signal::Odometer => payload(&(tenths(view.odometer_km) as u32).to_le_bytes()),
            Signal::Trip => payload(&(tenths(view.trip_km) as u16).to_le_bytes()),
            Signal::FuelRate => payload(&(tenths(view.fuel_rate_l_per_100km) as u16).to_le_bytes()),
            Signal::GearPosition => payload(&[view.gear_index.wrapping_add(1)]),
        };
        debug_assert_eq!(data.len(), signal.width());
        data
    }
}

impl Default for TelemetryEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_ID)
    }
}

/// Fixed-point tenths, truncated; the casts at the call sites wrap.
fn tenths(value: f64) -> u64 {
    (value * 10.0) as u64
}

// Signal widths are pinned below the frame limit, so this never truncates.
fn payload(bytes: &[u8]) -> Payload {
    Payload::from_slice(bytes).unwrap_or_default()
}

/// What a cluster display knows after reading frames off the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReadout {
    pub base_id: u32,
    pub speed_kmh: u16,
    pub rpm: u16,
    pub fuel_level_percent: u8,
    pub engine_temp_c: u8,
    pub turn_left: bool,
    pub turn_right: bool,
    pub battery_ok: bool,
    pub backlight_on: bool,
    pub transmission_mode: Option<TransmissionMode>,
    pub ignition: bool,
    pub odometer_km: f64,
    pub trip_km: f64,
    pub fuel_rate_l_per_100km: f64,
    pub gear_position: u8,
    pub frames_applied: u64,
}

impl DashboardReadout {
    pub fn new(base_id: u32) -> Self {
        Self {
            base_id,
            speed_kmh: 0,
            rpm: 0,
            fuel_level_percent: 0,
            engine_temp_c: 0,
            turn_left: false,
            turn_right: false,
            battery_ok: false,
            backlight_on: false,
            transmission_mode: None,
            ignition: false,
            odometer_km: 0.0,
            trip_km: 0.0,
            fuel_rate_l_per_100km: 0.0,
            gear_position: 0,
            frames_applied: 0,
        }
    }

    /// Updates the readout from one frame. Returns `Ok(false)` for frames that
    /// carry none of the vehicle signals.
    pub fn apply(&mut self, frame: &Frame) -> Result<bool, DecodeError> {
        let Some(signal) = frame
            .id
            .checked_sub(self.base_id)
            .and_then(Signal::from_offset)
        else {
            return Ok(false);
        };

        let data = frame.data.as_slice();
        if data.len() < signal.width() {
            return Err(DecodeError::PayloadTooShort {
                id: frame.id,
                expected: signal.width(),
                actual: data.len(),
            });
        }

        let u16_at = |data: &[u8]| u16::from_le_bytes([data[0], data[1]]);
        match signal {
            Signal::Speed => self.speed_kmh = u16_at(data),
            Signal::Rpm => self.rpm = u16_at(data),
            Signal::FuelLevel => self.fuel_level_percent = data[0],
            Signal::EngineTemp => self.engine_temp_c = data[0],
            Signal::TurnLeft => self.turn_left = data[0] != 0,
            Signal::TurnRight => self.turn_right = data[0] != 0,
            Signal::Battery => self.battery_ok = data[0] != 0,
            Signal::Backlight => self.backlight_on = data[0] != 0,
            Signal::TransmissionMode => {
                let mode = TransmissionMode::from_letter(data[0]).ok_or(DecodeError::InvalidMode(data[0]))?;
                self.transmission_mode = Some(mode);
            }
            Signal::Ignition => self.ignition = data[0] != 0,
            Signal::Odometer => {
                let raw = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                self.odometer_km = f64::from(raw) / 10.0;
            }
            Signal::Trip => self.trip_km = f64::from(u16_at(data)) / 10.0,
            Signal::FuelRate => self.fuel_rate_l_per_100km = f64::from(u16_at(data)) / 10.0,
            Signal::GearPosition => self.gear_position = data[0],
        }

        self.frames_applied = self.frames_applied.saturating_add(1);
        Ok(true)
    }

    /// Selector text, `D<n>` in drive.
    pub fn gear_display(&self) -> String {
        match self.transmission_mode {
            Some(TransmissionMode::Drive) => format!("D{}", self.gear_position),
            Some(mode) => mode.letter().to_string(),
            None => "-".to_string(),
        }
    }
}

impl Default for DashboardReadout {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_ID)
    }
}
