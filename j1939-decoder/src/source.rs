//! Frame source abstraction
//!
//! The physical CAN interface (SPI transceiver, register programming) is an
//! external collaborator. The core sees it through [`FrameSource`]: a
//! non-blocking poll for the next pending frame plus a configuration hook
//! for bit rate and acceptance filters.
//!
//! [`SimulatedBus`] is the shipped implementation for bench runs without a
//! transceiver: a deterministic generator cycling through every monitored
//! PGN with an engine-speed ramp/hold pattern.

use crate::bus::CanBusConfig;
use crate::types::{RawFrame, TransportError};

/// Non-blocking source of raw CAN frames
pub trait FrameSource {
    /// Apply bit rate and acceptance filters before monitoring starts
    fn configure(&mut self, config: &CanBusConfig) -> Result<(), TransportError>;

    /// Poll for one pending frame; `Ok(None)` means nothing pending
    fn poll_frame(&mut self) -> Result<Option<RawFrame>, TransportError>;
}

const SIM_MIN_RPM: f64 = 800.0;
const SIM_MAX_RPM: f64 = 3500.0;
/// Polls spent ramping between min and max engine speed
const SIM_RAMP_TICKS: u64 = 200;
/// Polls spent holding at the extremes
const SIM_HOLD_TICKS: u64 = 150;

/// Deterministic signal generator standing in for the physical bus
///
/// Each poll yields one frame, cycling round-robin through the monitored
/// PGNs. Values follow the tick counter, not the wall clock, so output is
/// reproducible.
#[derive(Debug, Default)]
pub struct SimulatedBus {
    tick: u64,
    configured: bool,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn rpm(&self) -> f64 {
        let cycle = 2 * (SIM_RAMP_TICKS + SIM_HOLD_TICKS);
        let phase = self.tick % cycle;
        let span = SIM_MAX_RPM - SIM_MIN_RPM;

        if phase < SIM_RAMP_TICKS {
            SIM_MIN_RPM + span * (phase as f64 / SIM_RAMP_TICKS as f64)
        } else if phase < SIM_RAMP_TICKS + SIM_HOLD_TICKS {
            SIM_MAX_RPM
        } else if phase < 2 * SIM_RAMP_TICKS + SIM_HOLD_TICKS {
            let ramp = phase - SIM_RAMP_TICKS - SIM_HOLD_TICKS;
            SIM_MAX_RPM - span * (ramp as f64 / SIM_RAMP_TICKS as f64)
        } else {
            SIM_MIN_RPM
        }
    }

    fn next_frame(&self) -> RawFrame {
        let rpm_raw = (self.rpm() * 8.0) as u16;
        let throttle_raw = ((self.rpm() - SIM_MIN_RPM) / 30.0) as u8;

        match self.tick % 5 {
            // Electronic Engine Controller 1
            0 => {
                let [hi, lo] = rpm_raw.to_be_bytes();
                RawFrame::new(
                    arbitration_id(3, 0xF004, 0x00),
                    &[0xFF, throttle_raw, 0xFF, hi, lo, 0xFF, 0xFF, 0xFF],
                )
            }
            // Cruise Control/Vehicle Speed: raw counts of 1/256 km/h
            1 => {
                let speed_raw = ((self.rpm() / 100.0) * 256.0) as u16;
                let [hi, lo] = speed_raw.to_be_bytes();
                RawFrame::new(
                    arbitration_id(6, 0xFEF1, 0x00),
                    &[0xFF, hi, lo, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
                )
            }
            // Engine Temperature: warms with engine speed
            2 => {
                let coolant_raw = (110.0 + self.rpm() / 100.0) as u8;
                RawFrame::new(
                    arbitration_id(6, 0xFEEE, 0x00),
                    &[coolant_raw, coolant_raw + 10, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
                )
            }
            // Fuel Economy
            3 => {
                let rate_raw = (self.rpm() / 10.0) as u16;
                let [hi, lo] = rate_raw.to_be_bytes();
                RawFrame::new(
                    arbitration_id(6, 0xFEF2, 0x00),
                    &[0xFF, 180, hi, lo, 0xFF, 0xFF, 0xFF, 0xFF],
                )
            }
            // Engine Load
            _ => {
                let load_raw = ((self.rpm() / SIM_MAX_RPM) * 250.0) as u8;
                RawFrame::new(
                    arbitration_id(3, 0xF003, 0x00),
                    &[0xFF, 0xFF, load_raw, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
                )
            }
        }
    }
}

impl FrameSource for SimulatedBus {
    fn configure(&mut self, config: &CanBusConfig) -> Result<(), TransportError> {
        log::info!(
            "simulated bus configured: {} bit/s, {} acceptance filters",
            config.bit_rate,
            config.pgn_filters.len()
        );
        self.configured = true;
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<RawFrame>, TransportError> {
        if !self.configured {
            return Err(TransportError::Read(
                "bus polled before configuration".to_string(),
            ));
        }
        let frame = self.next_frame();
        self.tick += 1;
        Ok(Some(frame))
    }
}

/// Compose a 29-bit J1939 arbitration ID from priority, PGN and source address
pub fn arbitration_id(priority: u8, pgn: u32, source_address: u8) -> u32 {
    (u32::from(priority & 0x7) << 26) | ((pgn & 0x1FFFF) << 8) | u32::from(source_address)
}
